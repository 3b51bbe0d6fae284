/// Application context and dependency wiring
use crate::{
    account::{SessionManager, UserStore},
    auth::token::TokenCodec,
    channel::ChannelStore,
    config::ServerConfig,
    db,
    error::ApiResult,
    media::{DiskMediaStore, MediaStore},
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub users: UserStore,
    pub channels: ChannelStore,
    pub sessions: Arc<SessionManager>,
    pub tokens: TokenCodec,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> ApiResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let pool = db::create_pool(
            &config.storage.database_path,
            db::DatabaseOptions::default(),
        )
        .await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        let users = UserStore::new(pool.clone());
        let channels = ChannelStore::new(pool.clone());
        let tokens = TokenCodec::new(&config.tokens);

        let media: Arc<dyn MediaStore> = Arc::new(DiskMediaStore::new(
            config.storage.media_directory.clone(),
            config.service.public_base_url.clone(),
        ));

        let sessions = Arc::new(SessionManager::new(
            users.clone(),
            tokens.clone(),
            media,
        ));

        Ok(Self {
            config: Arc::new(config),
            db: pool,
            users,
            channels,
            sessions,
            tokens,
        })
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> ApiResult<()> {
        let dirs = [
            &config.storage.media_directory,
            &config.storage.media_tmp_directory,
        ];

        for dir in dirs {
            if !dir.exists() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
