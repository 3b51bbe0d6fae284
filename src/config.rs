/// Configuration management for the VidStream backend
use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub tokens: TokenConfig,
    pub cookies: CookieOptions,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Base URL under which uploaded media is served
    pub public_base_url: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub media_directory: PathBuf,
    /// Staging area for multipart uploads before they reach the media store
    pub media_tmp_directory: PathBuf,
}

/// Token signing configuration.
///
/// Access and refresh tokens use independent secrets so compromise of one
/// class does not forge the other, and independent lifetimes (access short,
/// refresh long).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

/// Attributes applied to the accessToken / refreshToken cookies.
///
/// This is a plain value handed to each response-construction call; there
/// is no shared mutable cookie state anywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieOptions {
    pub secure: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ApiResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("VIDSTREAM_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("VIDSTREAM_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| ApiError::Validation("Invalid port number".to_string()))?;
        let public_base_url = env::var("VIDSTREAM_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port));

        let database_path: PathBuf = env::var("VIDSTREAM_DB_PATH")
            .unwrap_or_else(|_| "./data/vidstream.sqlite".to_string())
            .into();
        let media_directory: PathBuf = env::var("VIDSTREAM_MEDIA_DIR")
            .unwrap_or_else(|_| "./data/media".to_string())
            .into();
        let media_tmp_directory: PathBuf = env::var("VIDSTREAM_MEDIA_TMP_DIR")
            .unwrap_or_else(|_| "./data/tmp".to_string())
            .into();

        let access_secret = env::var("VIDSTREAM_ACCESS_TOKEN_SECRET")
            .map_err(|_| ApiError::Validation("Access token secret required".to_string()))?;
        let refresh_secret = env::var("VIDSTREAM_REFRESH_TOKEN_SECRET")
            .map_err(|_| ApiError::Validation("Refresh token secret required".to_string()))?;
        let access_ttl_secs = env::var("VIDSTREAM_ACCESS_TOKEN_TTL_SECS")
            .unwrap_or_else(|_| "900".to_string())
            .parse()
            .unwrap_or(900);
        let refresh_ttl_secs = env::var("VIDSTREAM_REFRESH_TOKEN_TTL_SECS")
            .unwrap_or_else(|_| "864000".to_string())
            .parse()
            .unwrap_or(864000);

        let cookie_secure = env::var("VIDSTREAM_COOKIE_SECURE")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_base_url,
            },
            storage: StorageConfig {
                database_path,
                media_directory,
                media_tmp_directory,
            },
            tokens: TokenConfig {
                access_secret,
                refresh_secret,
                access_ttl_secs,
                refresh_ttl_secs,
            },
            cookies: CookieOptions {
                secure: cookie_secure,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> ApiResult<()> {
        if self.service.hostname.is_empty() {
            return Err(ApiError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.tokens.access_secret.len() < 32 {
            return Err(ApiError::Validation(
                "Access token secret must be at least 32 characters".to_string(),
            ));
        }

        if self.tokens.refresh_secret.len() < 32 {
            return Err(ApiError::Validation(
                "Refresh token secret must be at least 32 characters".to_string(),
            ));
        }

        if self.tokens.access_secret == self.tokens.refresh_secret {
            return Err(ApiError::Validation(
                "Access and refresh token secrets must differ".to_string(),
            ));
        }

        Ok(())
    }
}
