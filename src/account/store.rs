/// Persisted per-user credential records
///
/// All writes to the refresh_token column go through this store, and the
/// only callers are the session manager's login/logout/refresh paths.
use crate::{
    account::NewUser,
    db::user::{User, UserProfile},
    error::{ApiError, ApiResult},
};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Columns safe to expose; excludes password_hash and refresh_token
const PROFILE_COLUMNS: &str =
    "id, handle, email, full_name, avatar_url, cover_image_url, created_at, updated_at";

#[derive(Clone)]
pub struct UserStore {
    db: SqlitePool,
}

impl UserStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Insert a new user.
    ///
    /// Uniqueness of handle and email is enforced by the database in the
    /// same statement that inserts the row; there is no separate existence
    /// probe and therefore no check-then-insert race.
    pub async fn create(&self, new_user: NewUser) -> ApiResult<UserProfile> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO users (id, handle, email, full_name, password_hash, avatar_url, cover_image_url, refresh_token, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, ?8)",
        )
        .bind(&id)
        .bind(&new_user.handle)
        .bind(&new_user.email)
        .bind(&new_user.full_name)
        .bind(&new_user.password_hash)
        .bind(&new_user.avatar_url)
        .bind(&new_user.cover_image_url)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(map_unique_violation)?;

        Ok(UserProfile {
            id,
            handle: new_user.handle,
            email: new_user.email,
            full_name: new_user.full_name,
            avatar_url: new_user.avatar_url,
            cover_image_url: new_user.cover_image_url,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get the full record, including credential fields
    pub async fn find_by_id(&self, id: &str) -> ApiResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    /// Resolve a login identifier (handle or email, already lowercased)
    pub async fn find_by_identifier(&self, identifier: &str) -> ApiResult<Option<User>> {
        let user =
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE handle = ?1 OR email = ?1")
                .bind(identifier)
                .fetch_optional(&self.db)
                .await?;

        Ok(user)
    }

    /// Get the sanitized projection used for responses
    pub async fn find_profile_by_id(&self, id: &str) -> ApiResult<Option<UserProfile>> {
        let profile = sqlx::query_as::<_, UserProfile>(&format!(
            "SELECT {} FROM users WHERE id = ?1",
            PROFILE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(profile)
    }

    /// Store a freshly issued refresh token, replacing whatever was there
    pub async fn set_refresh_token(&self, id: &str, token: &str) -> ApiResult<()> {
        sqlx::query("UPDATE users SET refresh_token = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(token)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Clear the stored refresh token (logout). Idempotent.
    pub async fn clear_refresh_token(&self, id: &str) -> ApiResult<()> {
        sqlx::query("UPDATE users SET refresh_token = NULL, updated_at = ?1 WHERE id = ?2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Compare-and-swap rotation: replace the stored refresh token only if
    /// it still equals the presented one. Returns false when the presented
    /// token has already been rotated out (or cleared), which is how two
    /// racing refresh calls are reduced to exactly one winner.
    pub async fn rotate_refresh_token(
        &self,
        id: &str,
        presented: &str,
        replacement: &str,
    ) -> ApiResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token = ?1, updated_at = ?2
             WHERE id = ?3 AND refresh_token = ?4",
        )
        .bind(replacement)
        .bind(Utc::now())
        .bind(id)
        .bind(presented)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn update_password_hash(&self, id: &str, password_hash: &str) -> ApiResult<()> {
        sqlx::query("UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Update display name and/or email; absent fields stay as they are
    pub async fn update_profile(
        &self,
        id: &str,
        full_name: Option<&str>,
        email: Option<&str>,
    ) -> ApiResult<UserProfile> {
        sqlx::query(
            "UPDATE users SET full_name = COALESCE(?1, full_name),
                              email = COALESCE(?2, email),
                              updated_at = ?3
             WHERE id = ?4",
        )
        .bind(full_name)
        .bind(email)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(map_unique_violation)?;

        self.find_profile_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Account not found".to_string()))
    }

    pub async fn update_avatar(&self, id: &str, avatar_url: &str) -> ApiResult<UserProfile> {
        sqlx::query("UPDATE users SET avatar_url = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(avatar_url)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.db)
            .await?;

        self.find_profile_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Account not found".to_string()))
    }

    pub async fn update_cover_image(&self, id: &str, cover_url: &str) -> ApiResult<UserProfile> {
        sqlx::query("UPDATE users SET cover_image_url = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(cover_url)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.db)
            .await?;

        self.find_profile_by_id(id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Account not found".to_string()))
    }
}

/// Translate a unique-constraint violation into the duplicate-account error
fn map_unique_violation(e: sqlx::Error) -> ApiError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            let field = if db_err.message().contains("users.handle") {
                "Handle"
            } else {
                "Email"
            };
            return ApiError::Duplicate(format!("{} is already registered", field));
        }
    }

    ApiError::Database(e)
}
