/// Channel lookup and subscription edges
///
/// A channel is just a user viewed from the outside: the profile carries
/// the two edge counts (inbound subscribers, outbound subscriptions) and,
/// when a viewer is known, whether that viewer subscribes to the channel.
use crate::{
    db::user::UserProfile,
    error::{ApiError, ApiResult},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Public channel projection. Built from the sanitized user profile, so it
/// can never carry credential fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    pub handle: String,
    pub email: String,
    pub full_name: String,
    pub avatar_url: String,
    pub cover_image_url: Option<String>,
    pub subscribers_count: i64,
    pub subscribed_to_count: i64,
    pub is_subscribed: bool,
}

#[derive(Clone)]
pub struct ChannelStore {
    db: SqlitePool,
}

impl ChannelStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Aggregate a channel's profile: resolve by normalized handle, count
    /// both edge directions, and probe viewer membership. Read-only.
    pub async fn channel_profile(
        &self,
        handle: &str,
        viewer_id: Option<&str>,
    ) -> ApiResult<ChannelProfile> {
        let handle = handle.trim().to_lowercase();
        if handle.is_empty() {
            return Err(ApiError::Validation("Channel handle is required".to_string()));
        }

        let target = sqlx::query_as::<_, UserProfile>(
            "SELECT id, handle, email, full_name, avatar_url, cover_image_url, created_at, updated_at
             FROM users WHERE handle = ?1",
        )
        .bind(&handle)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Channel {} does not exist", handle)))?;

        let subscribers_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE channel_id = ?1")
                .bind(&target.id)
                .fetch_one(&self.db)
                .await?;

        let subscribed_to_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE subscriber_id = ?1")
                .bind(&target.id)
                .fetch_one(&self.db)
                .await?;

        let is_subscribed = match viewer_id {
            Some(viewer) => {
                let found: i64 = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM subscriptions
                     WHERE channel_id = ?1 AND subscriber_id = ?2)",
                )
                .bind(&target.id)
                .bind(viewer)
                .fetch_one(&self.db)
                .await?;
                found != 0
            }
            None => false,
        };

        Ok(ChannelProfile {
            handle: target.handle,
            email: target.email,
            full_name: target.full_name,
            avatar_url: target.avatar_url,
            cover_image_url: target.cover_image_url,
            subscribers_count,
            subscribed_to_count,
            is_subscribed,
        })
    }

    /// Create a subscription edge. Subscribing twice is a no-op: edges are
    /// deduplicated on write, counts are of distinct edges.
    pub async fn subscribe(&self, subscriber_id: &str, channel_handle: &str) -> ApiResult<()> {
        let channel_id = self.resolve_channel_id(channel_handle).await?;

        if channel_id == subscriber_id {
            return Err(ApiError::Validation(
                "Cannot subscribe to your own channel".to_string(),
            ));
        }

        sqlx::query(
            "INSERT OR IGNORE INTO subscriptions (subscriber_id, channel_id, created_at)
             VALUES (?1, ?2, ?3)",
        )
        .bind(subscriber_id)
        .bind(&channel_id)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Remove a subscription edge. Idempotent.
    pub async fn unsubscribe(&self, subscriber_id: &str, channel_handle: &str) -> ApiResult<()> {
        let channel_id = self.resolve_channel_id(channel_handle).await?;

        sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = ?1 AND channel_id = ?2")
            .bind(subscriber_id)
            .bind(&channel_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn resolve_channel_id(&self, handle: &str) -> ApiResult<String> {
        let handle = handle.trim().to_lowercase();

        sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE handle = ?1")
            .bind(&handle)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Channel {} does not exist", handle)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{store::tests::{new_user, test_pool}, UserStore};

    async fn setup() -> (ChannelStore, UserStore, SqlitePool) {
        let pool = test_pool().await;
        (
            ChannelStore::new(pool.clone()),
            UserStore::new(pool.clone()),
            pool,
        )
    }

    #[tokio::test]
    async fn test_channel_profile_counts() {
        let (channels, users, _pool) = setup().await;

        let a = users.create(new_user("alice")).await.unwrap();
        let b = users.create(new_user("bob")).await.unwrap();
        let c = users.create(new_user("chan")).await.unwrap();
        let d = users.create(new_user("dora")).await.unwrap();

        channels.subscribe(&a.id, "chan").await.unwrap();
        channels.subscribe(&b.id, "chan").await.unwrap();
        channels.subscribe(&c.id, "alice").await.unwrap();

        let profile = channels.channel_profile("chan", None).await.unwrap();
        assert_eq!(profile.subscribers_count, 2);
        assert_eq!(profile.subscribed_to_count, 1);
        assert!(!profile.is_subscribed);

        let as_a = channels.channel_profile("chan", Some(&a.id)).await.unwrap();
        assert!(as_a.is_subscribed);

        let as_d = channels.channel_profile("chan", Some(&d.id)).await.unwrap();
        assert!(!as_d.is_subscribed);
    }

    #[tokio::test]
    async fn test_handle_lookup_is_case_insensitive() {
        let (channels, users, _pool) = setup().await;
        users.create(new_user("chan")).await.unwrap();

        let profile = channels.channel_profile("ChAn", None).await.unwrap();
        assert_eq!(profile.handle, "chan");
    }

    #[tokio::test]
    async fn test_unknown_channel() {
        let (channels, _users, _pool) = setup().await;

        assert!(matches!(
            channels.channel_profile("ghost", None).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            channels.subscribe("some-id", "ghost").await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_subscribe_is_deduped() {
        let (channels, users, pool) = setup().await;
        let a = users.create(new_user("alice")).await.unwrap();
        users.create(new_user("chan")).await.unwrap();

        channels.subscribe(&a.id, "chan").await.unwrap();
        channels.subscribe(&a.id, "chan").await.unwrap();

        let profile = channels.channel_profile("chan", None).await.unwrap();
        assert_eq!(profile.subscribers_count, 1);

        // One distinct edge row, not two
        let edges = sqlx::query_as::<_, crate::db::user::Subscription>(
            "SELECT * FROM subscriptions WHERE subscriber_id = ?1",
        )
        .bind(&a.id)
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(edges.len(), 1);
    }

    #[tokio::test]
    async fn test_self_subscribe_rejected() {
        let (channels, users, _pool) = setup().await;
        let a = users.create(new_user("alice")).await.unwrap();

        assert!(matches!(
            channels.subscribe(&a.id, "alice").await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let (channels, users, _pool) = setup().await;
        let a = users.create(new_user("alice")).await.unwrap();
        users.create(new_user("chan")).await.unwrap();

        channels.subscribe(&a.id, "chan").await.unwrap();
        channels.unsubscribe(&a.id, "chan").await.unwrap();
        // Unsubscribing again is a no-op
        channels.unsubscribe(&a.id, "chan").await.unwrap();

        let profile = channels.channel_profile("chan", Some(&a.id)).await.unwrap();
        assert_eq!(profile.subscribers_count, 0);
        assert!(!profile.is_subscribed);
    }

    #[tokio::test]
    async fn test_profile_never_exposes_secrets() {
        let (channels, users, _pool) = setup().await;
        let u = users.create(new_user("chan")).await.unwrap();
        users.set_refresh_token(&u.id, "secret").await.unwrap();

        let profile = channels.channel_profile("chan", None).await.unwrap();
        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("refreshToken").is_none());
    }
}
