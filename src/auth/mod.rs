/// Authentication: password hashing, token codec, and request extractors
///
/// The extractors resolve a bearer access token to a sanitized identity
/// value which handlers thread explicitly into whatever they do next;
/// nothing is smuggled through request extensions.

pub mod password;
pub mod token;

use crate::{
    api::middleware::extract_access_token,
    context::AppContext,
    db::user::UserProfile,
    error::ApiError,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Authenticated identity - extracts and validates the access token
#[derive(Debug, Clone)]
pub struct Identity {
    pub user: UserProfile,
}

#[async_trait]
impl FromRequestParts<AppContext> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        // Cookie takes precedence over the Authorization header
        let token = extract_access_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("Missing access token".to_string()))?;

        let claims = state
            .tokens
            .verify_access(&token)
            .map_err(|_| ApiError::Unauthorized("Invalid access token".to_string()))?;

        // The token may outlive the account; re-resolve on every request
        let user = state
            .users
            .find_profile_by_id(&claims.sub)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Invalid access token".to_string()))?;

        Ok(Identity { user })
    }
}

/// Optional identity - does not fail if no valid token is presented.
/// Used where a viewer's identity refines the response but is not required.
#[derive(Debug, Clone)]
pub struct OptionalIdentity {
    pub user: Option<UserProfile>,
}

#[async_trait]
impl FromRequestParts<AppContext> for OptionalIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let user = match Identity::from_request_parts(parts, state).await {
            Ok(identity) => Some(identity.user),
            Err(_) => None,
        };

        Ok(OptionalIdentity { user })
    }
}
