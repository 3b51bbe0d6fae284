/// Account management system
///
/// Handles user registration, authentication, token-pair lifecycle, and
/// profile updates.

mod session;
pub(crate) mod store;

pub use session::SessionManager;
pub use store::UserStore;

use crate::db::user::UserProfile;
use serde::{Deserialize, Serialize};

/// Validated registration input, image uploads already resolved to paths
#[derive(Debug, Clone)]
pub struct Registration {
    pub full_name: String,
    pub handle: String,
    pub email: String,
    pub password: String,
}

/// Insertable user record, password already hashed and images uploaded
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub handle: String,
    pub email: String,
    pub password_hash: String,
    pub avatar_url: String,
    pub cover_image_url: Option<String>,
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Handle or email
    pub identifier: String,
    pub password: String,
}

/// The access/refresh pair handed to a caller. Never persisted as a unit;
/// only the refresh half is stored, on the user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Login / refresh response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: UserProfile,
    pub access_token: String,
    pub refresh_token: String,
}

/// Token refresh request body (the token may come from a cookie instead)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Password change request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Profile field update request; absent fields are left unchanged
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
}
