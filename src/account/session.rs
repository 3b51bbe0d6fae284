/// Session lifecycle: registration, login, logout, refresh, password change
///
/// Orchestrates the password hasher, token codec, media store, and user
/// store. This is the only component that writes the refresh-token field;
/// every path through it leaves at most one valid refresh token per user.
use crate::{
    account::{NewUser, Registration, TokenPair, UserStore},
    auth::{password, token::TokenCodec},
    db::user::UserProfile,
    error::{ApiError, ApiResult},
    media::MediaStore,
};
use std::path::Path;
use std::sync::Arc;

pub struct SessionManager {
    store: UserStore,
    codec: TokenCodec,
    media: Arc<dyn MediaStore>,
}

impl SessionManager {
    pub fn new(store: UserStore, codec: TokenCodec, media: Arc<dyn MediaStore>) -> Self {
        Self {
            store,
            codec,
            media,
        }
    }

    /// Register a new account.
    ///
    /// Validation happens before any store or upload interaction. The
    /// avatar is required; a failed cover upload degrades to no cover,
    /// matching its optional status.
    pub async fn register(
        &self,
        registration: Registration,
        avatar_path: &Path,
        cover_path: Option<&Path>,
    ) -> ApiResult<UserProfile> {
        let full_name = registration.full_name.trim().to_string();
        let handle = registration.handle.trim().to_lowercase();
        let email = registration.email.trim().to_lowercase();

        if full_name.is_empty() {
            return Err(ApiError::Validation("Full name is required".to_string()));
        }
        validate_handle(&handle)?;
        validate_email(&email)?;
        if registration.password.is_empty() {
            return Err(ApiError::Validation("Password is required".to_string()));
        }

        let password_hash = password::hash(&registration.password)?;

        let avatar_url = self
            .media
            .upload(avatar_path)
            .await?
            .ok_or_else(|| ApiError::Upstream("Avatar upload failed".to_string()))?;

        let cover_image_url = match cover_path {
            Some(path) => self.media.upload(path).await?,
            None => None,
        };

        let profile = self
            .store
            .create(NewUser {
                full_name,
                handle,
                email,
                password_hash,
                avatar_url,
                cover_image_url,
            })
            .await?;

        tracing::info!(handle = %profile.handle, "Registered new account");

        Ok(profile)
    }

    /// Authenticate by handle or email and issue a fresh token pair,
    /// persisting the refresh half.
    pub async fn login(
        &self,
        identifier: &str,
        password_input: &str,
    ) -> ApiResult<(UserProfile, TokenPair)> {
        let identifier = identifier.trim().to_lowercase();
        if identifier.is_empty() {
            return Err(ApiError::Validation(
                "Handle or email is required".to_string(),
            ));
        }

        let user = self
            .store
            .find_by_identifier(&identifier)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound("No account with this handle or email".to_string())
            })?;

        if !password::verify(password_input, &user.password_hash) {
            return Err(ApiError::InvalidCredentials);
        }

        let profile = UserProfile::from(user);
        let pair = self.issue_pair(&profile)?;
        self.store
            .set_refresh_token(&profile.id, &pair.refresh_token)
            .await?;

        tracing::info!(handle = %profile.handle, "Login");

        Ok((profile, pair))
    }

    /// Clear the stored refresh token. Idempotent: logging out twice, or
    /// while already logged out, is not an error.
    pub async fn logout(&self, user_id: &str) -> ApiResult<()> {
        self.store.clear_refresh_token(user_id).await
    }

    /// Rotate a token pair against a presented refresh token.
    ///
    /// Every failure collapses to InvalidToken: expired, malformed, unknown
    /// account, or rotated-out. The rotation itself is a conditional update
    /// comparing the presented token to the stored one, so of two racing
    /// refresh calls exactly one can win.
    pub async fn refresh(&self, presented: &str) -> ApiResult<(UserProfile, TokenPair)> {
        let claims = self
            .codec
            .verify_refresh(presented)
            .map_err(|_| ApiError::InvalidToken)?;

        let user = self
            .store
            .find_by_id(&claims.sub)
            .await?
            .ok_or(ApiError::InvalidToken)?;

        let profile = UserProfile::from(user);
        let pair = self.issue_pair(&profile)?;

        let rotated = self
            .store
            .rotate_refresh_token(&profile.id, presented, &pair.refresh_token)
            .await?;
        if !rotated {
            tracing::warn!(handle = %profile.handle, "Refresh with stale token rejected");
            return Err(ApiError::InvalidToken);
        }

        Ok((profile, pair))
    }

    /// Change the account password after re-verifying the old one.
    /// The stored refresh token is left in place; outstanding sessions
    /// survive a password change.
    pub async fn change_password(
        &self,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> ApiResult<()> {
        if new_password.is_empty() {
            return Err(ApiError::Validation("New password is required".to_string()));
        }

        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Account not found".to_string()))?;

        if !password::verify(old_password, &user.password_hash) {
            return Err(ApiError::InvalidCredentials);
        }

        let new_hash = password::hash(new_password)?;
        self.store.update_password_hash(user_id, &new_hash).await?;

        tracing::info!(handle = %user.handle, "Password changed");

        Ok(())
    }

    /// Update display name and/or email. Absent fields are untouched; a
    /// new email must be valid and not taken.
    pub async fn update_profile(
        &self,
        user_id: &str,
        full_name: Option<String>,
        email: Option<String>,
    ) -> ApiResult<UserProfile> {
        let full_name = match full_name {
            Some(name) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(ApiError::Validation(
                        "Full name cannot be empty".to_string(),
                    ));
                }
                Some(name)
            }
            None => None,
        };

        let email = match email {
            Some(email) => {
                let email = email.trim().to_lowercase();
                validate_email(&email)?;
                Some(email)
            }
            None => None,
        };

        if full_name.is_none() && email.is_none() {
            return Err(ApiError::Validation("Nothing to update".to_string()));
        }

        self.store
            .update_profile(user_id, full_name.as_deref(), email.as_deref())
            .await
    }

    /// Replace the avatar with a freshly staged upload
    pub async fn update_avatar(&self, user_id: &str, path: &Path) -> ApiResult<UserProfile> {
        let url = self
            .media
            .upload(path)
            .await?
            .ok_or_else(|| ApiError::Upstream("Avatar upload failed".to_string()))?;

        self.store.update_avatar(user_id, &url).await
    }

    /// Replace the cover image with a freshly staged upload
    pub async fn update_cover_image(&self, user_id: &str, path: &Path) -> ApiResult<UserProfile> {
        let url = self
            .media
            .upload(path)
            .await?
            .ok_or_else(|| ApiError::Upstream("Cover image upload failed".to_string()))?;

        self.store.update_cover_image(user_id, &url).await
    }

    fn issue_pair(&self, profile: &UserProfile) -> ApiResult<TokenPair> {
        let access_token = self
            .codec
            .issue_access(profile)
            .map_err(|e| ApiError::Internal(format!("Token signing failed: {}", e)))?;
        let refresh_token = self
            .codec
            .issue_refresh(&profile.id)
            .map_err(|e| ApiError::Internal(format!("Token signing failed: {}", e)))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}

fn validate_handle(handle: &str) -> ApiResult<()> {
    if handle.is_empty() {
        return Err(ApiError::Validation("Handle is required".to_string()));
    }
    if handle.len() < 3 || handle.len() > 30 {
        return Err(ApiError::Validation(
            "Handle must be 3-30 characters".to_string(),
        ));
    }
    if !handle
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(ApiError::Validation(
            "Handle may only contain letters, digits, '_', '-' and '.'".to_string(),
        ));
    }

    Ok(())
}

fn validate_email(email: &str) -> ApiResult<()> {
    if email.is_empty() {
        return Err(ApiError::Validation("Email is required".to_string()));
    }
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(ApiError::Validation("Invalid email address".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::store::tests::test_pool;
    use crate::config::TokenConfig;
    use async_trait::async_trait;

    /// Media store stub: fixed URL, or simulated upload failure
    struct FakeMedia {
        url: Option<String>,
    }

    #[async_trait]
    impl MediaStore for FakeMedia {
        async fn upload(&self, _local_path: &Path) -> ApiResult<Option<String>> {
            Ok(self.url.clone())
        }
    }

    fn codec() -> TokenCodec {
        TokenCodec::new(&TokenConfig {
            access_secret: "access-secret-access-secret-access-secret".to_string(),
            refresh_secret: "refresh-secret-refresh-secret-refresh-secret".to_string(),
            access_ttl_secs: 900,
            refresh_ttl_secs: 864000,
        })
    }

    async fn manager() -> SessionManager {
        let store = UserStore::new(test_pool().await);
        SessionManager::new(
            store,
            codec(),
            Arc::new(FakeMedia {
                url: Some("http://localhost/media/fake.png".to_string()),
            }),
        )
    }

    fn registration(handle: &str) -> Registration {
        Registration {
            full_name: format!("{} Example", handle),
            handle: handle.to_string(),
            email: format!("{}@example.com", handle),
            password: "hunter2hunter2".to_string(),
        }
    }

    async fn register(mgr: &SessionManager, handle: &str) -> UserProfile {
        mgr.register(registration(handle), Path::new("/tmp/avatar.png"), None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_sanitizes_and_normalizes() {
        let mgr = manager().await;

        let profile = mgr
            .register(registration("Alice"), Path::new("/tmp/a.png"), None)
            .await
            .unwrap();
        assert_eq!(profile.handle, "alice");
        assert_eq!(profile.email, "alice@example.com");

        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("refreshToken").is_none());
    }

    #[tokio::test]
    async fn test_register_duplicate_handle_case_insensitive() {
        let mgr = manager().await;
        register(&mgr, "alice").await;

        let mut second = registration("ALICE");
        second.email = "other@example.com".to_string();
        let err = mgr
            .register(second, Path::new("/tmp/a.png"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_register_avatar_upload_failure() {
        let store = UserStore::new(test_pool().await);
        let mgr = SessionManager::new(store, codec(), Arc::new(FakeMedia { url: None }));

        let err = mgr
            .register(registration("alice"), Path::new("/tmp/a.png"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input() {
        let mgr = manager().await;

        let mut bad = registration("al");
        assert!(matches!(
            mgr.register(bad, Path::new("/tmp/a.png"), None).await,
            Err(ApiError::Validation(_))
        ));

        bad = registration("alice");
        bad.email = "not-an-email".to_string();
        assert!(matches!(
            mgr.register(bad, Path::new("/tmp/a.png"), None).await,
            Err(ApiError::Validation(_))
        ));

        bad = registration("alice");
        bad.password = String::new();
        assert!(matches!(
            mgr.register(bad, Path::new("/tmp/a.png"), None).await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_login_errors() {
        let mgr = manager().await;
        register(&mgr, "alice").await;

        assert!(matches!(
            mgr.login("nobody", "whatever").await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            mgr.login("alice", "wrong password").await,
            Err(ApiError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_login_by_handle_or_email() {
        let mgr = manager().await;
        register(&mgr, "alice").await;

        let (profile, pair) = mgr.login("alice", "hunter2hunter2").await.unwrap();
        assert_eq!(profile.handle, "alice");
        assert!(!pair.access_token.is_empty());

        // Identifier is case-normalized the same way registration is
        let (by_email, _) = mgr
            .login("Alice@Example.com", "hunter2hunter2")
            .await
            .unwrap();
        assert_eq!(by_email.id, profile.id);
    }

    #[tokio::test]
    async fn test_refresh_succeeds_exactly_once() {
        let mgr = manager().await;
        register(&mgr, "alice").await;
        let (_, pair) = mgr.login("alice", "hunter2hunter2").await.unwrap();

        let (_, rotated) = mgr.refresh(&pair.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, pair.refresh_token);

        // The rotated-out token is dead
        assert!(matches!(
            mgr.refresh(&pair.refresh_token).await,
            Err(ApiError::InvalidToken)
        ));

        // The replacement works
        mgr.refresh(&rotated.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn test_logout_invalidates_refresh_token() {
        let mgr = manager().await;
        let profile = register(&mgr, "alice").await;
        let (_, pair) = mgr.login("alice", "hunter2hunter2").await.unwrap();

        mgr.logout(&profile.id).await.unwrap();
        // Logging out again is fine
        mgr.logout(&profile.id).await.unwrap();

        assert!(matches!(
            mgr.refresh(&pair.refresh_token).await,
            Err(ApiError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_refresh_rejects_garbage_and_unknown_accounts() {
        let mgr = manager().await;

        assert!(matches!(
            mgr.refresh("not a token").await,
            Err(ApiError::InvalidToken)
        ));

        // Signed for a user id that does not exist: same error, no
        // indication whether the id was ever real
        let orphan = codec().issue_refresh("no-such-user").unwrap();
        assert!(matches!(
            mgr.refresh(&orphan).await,
            Err(ApiError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_refresh_single_winner() {
        let mgr = manager().await;
        register(&mgr, "alice").await;
        let (_, pair) = mgr.login("alice", "hunter2hunter2").await.unwrap();

        let (a, b) = tokio::join!(
            mgr.refresh(&pair.refresh_token),
            mgr.refresh(&pair.refresh_token)
        );

        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one racing refresh may win");

        let loser = if a.is_err() { a } else { b };
        assert!(matches!(loser, Err(ApiError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_change_password() {
        let mgr = manager().await;
        let profile = register(&mgr, "alice").await;

        // Wrong old password: hash unchanged, old password still works
        assert!(matches!(
            mgr.change_password(&profile.id, "wrong", "new-password").await,
            Err(ApiError::InvalidCredentials)
        ));
        mgr.login("alice", "hunter2hunter2").await.unwrap();

        // Correct old password: new works, old does not
        mgr.change_password(&profile.id, "hunter2hunter2", "new-password")
            .await
            .unwrap();
        mgr.login("alice", "new-password").await.unwrap();
        assert!(matches!(
            mgr.login("alice", "hunter2hunter2").await,
            Err(ApiError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let mgr = manager().await;
        let alice = register(&mgr, "alice").await;
        register(&mgr, "bob").await;

        let updated = mgr
            .update_profile(&alice.id, Some("Alice Renamed".to_string()), None)
            .await
            .unwrap();
        assert_eq!(updated.full_name, "Alice Renamed");
        assert_eq!(updated.email, "alice@example.com");

        // Taking bob's email collides
        assert!(matches!(
            mgr.update_profile(&alice.id, None, Some("bob@example.com".to_string()))
                .await,
            Err(ApiError::Duplicate(_))
        ));

        // Empty update is rejected
        assert!(matches!(
            mgr.update_profile(&alice.id, None, None).await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_avatar() {
        let mgr = manager().await;
        let alice = register(&mgr, "alice").await;

        let updated = mgr
            .update_avatar(&alice.id, Path::new("/tmp/new.png"))
            .await
            .unwrap();
        assert_eq!(updated.avatar_url, "http://localhost/media/fake.png");
    }

    #[tokio::test]
    async fn test_refresh_token_survives_password_change() {
        let mgr = manager().await;
        let profile = register(&mgr, "alice").await;
        let (_, pair) = mgr.login("alice", "hunter2hunter2").await.unwrap();

        mgr.change_password(&profile.id, "hunter2hunter2", "new-password")
            .await
            .unwrap();

        // Existing refresh token is deliberately not revoked
        mgr.refresh(&pair.refresh_token).await.unwrap();
    }
}
