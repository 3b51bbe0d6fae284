/// Signed bearer token issuance and verification
///
/// Two token classes share the HS256 codec but nothing else: access and
/// refresh tokens are signed with independent secrets and carry independent
/// lifetimes, so compromise of one class does not forge the other. The
/// codec is pure — no I/O, no persisted state.
use crate::{config::TokenConfig, db::user::UserProfile};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id
    pub sub: String,
    pub handle: String,
    pub email: String,
    pub full_name: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by a refresh token. Identity only, plus a unique token
/// id: rotation compares tokens by exact value, so two tokens minted for
/// the same user in the same second must still differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// User id
    pub sub: String,
    /// Unique token id
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Why verification failed
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("bad signature")]
    BadSignature,
    #[error("malformed token")]
    Malformed,
}

/// Codec for the two bearer token classes
#[derive(Clone)]
pub struct TokenCodec {
    access_secret: String,
    refresh_secret: String,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenCodec {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            access_secret: config.access_secret.clone(),
            refresh_secret: config.refresh_secret.clone(),
            access_ttl_secs: config.access_ttl_secs,
            refresh_ttl_secs: config.refresh_ttl_secs,
        }
    }

    /// Issue an access token carrying the user's identity claims
    pub fn issue_access(&self, user: &UserProfile) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: user.id.clone(),
            handle: user.handle.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            iat: now,
            exp: now + self.access_ttl_secs,
        };

        sign(&claims, &self.access_secret)
    }

    /// Issue a refresh token carrying only the user id
    pub fn issue_refresh(&self, user_id: &str) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.refresh_ttl_secs,
        };

        sign(&claims, &self.refresh_secret)
    }

    /// Verify an access token and return its claims
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        check(token, &self.access_secret)
    }

    /// Verify a refresh token and return its claims.
    ///
    /// Signature validity alone does not make a refresh token usable; the
    /// session layer still compares it against the stored copy.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        check(token, &self.refresh_secret)
    }
}

fn sign<T: Serialize>(claims: &T, secret: &str) -> Result<String, TokenError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| TokenError::Malformed)
}

fn check<T: serde::de::DeserializeOwned>(token: &str, secret: &str) -> Result<T, TokenError> {
    let validation = Validation::new(Algorithm::HS256);

    decode::<T>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
            jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::BadSignature,
            _ => TokenError::Malformed,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(&TokenConfig {
            access_secret: "access-secret-access-secret-access-secret".to_string(),
            refresh_secret: "refresh-secret-refresh-secret-refresh-secret".to_string(),
            access_ttl_secs: 900,
            refresh_ttl_secs: 864000,
        })
    }

    fn profile() -> UserProfile {
        let now = Utc::now();
        UserProfile {
            id: "user-1".to_string(),
            handle: "alice".to_string(),
            email: "alice@example.com".to_string(),
            full_name: "Alice Example".to_string(),
            avatar_url: "http://localhost/media/a.png".to_string(),
            cover_image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_access_round_trip() {
        let codec = codec();
        let token = codec.issue_access(&profile()).unwrap();

        let claims = codec.verify_access(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.handle, "alice");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_refresh_round_trip() {
        let codec = codec();
        let token = codec.issue_refresh("user-1").unwrap();

        let claims = codec.verify_refresh(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
    }

    #[test]
    fn test_back_to_back_refresh_tokens_differ() {
        let codec = codec();
        let a = codec.issue_refresh("user-1").unwrap();
        let b = codec.issue_refresh("user-1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_classes_do_not_cross_verify() {
        let codec = codec();

        let access = codec.issue_access(&profile()).unwrap();
        assert!(matches!(
            codec.verify_refresh(&access),
            Err(TokenError::BadSignature)
        ));

        let refresh = codec.issue_refresh("user-1").unwrap();
        // A refresh token fails access verification: wrong secret, and the
        // claim shape would not matter anyway.
        assert!(codec.verify_access(&refresh).is_err());
    }

    #[test]
    fn test_expired_token() {
        let codec = TokenCodec::new(&TokenConfig {
            access_secret: "access-secret-access-secret-access-secret".to_string(),
            refresh_secret: "refresh-secret-refresh-secret-refresh-secret".to_string(),
            // Expired an hour ago, well past any verifier leeway
            access_ttl_secs: -3600,
            refresh_ttl_secs: -3600,
        });

        let token = codec.issue_access(&profile()).unwrap();
        assert!(matches!(
            codec.verify_access(&token),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_malformed_token() {
        let codec = codec();
        assert!(matches!(
            codec.verify_access("not.a.jwt"),
            Err(TokenError::Malformed)
        ));
        assert!(matches!(
            codec.verify_access(""),
            Err(TokenError::Malformed)
        ));
    }
}
