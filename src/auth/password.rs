/// Password hashing with Argon2id
///
/// One-way salted hashes with the crate's default cost parameters. The
/// parameters are baked into the produced PHC string, so verification
/// stays correct if the defaults ever change.
use crate::error::{ApiError, ApiResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, SaltString},
    Argon2, PasswordHasher as _, PasswordVerifier as _,
};

/// Hash a password with a freshly generated salt
pub fn hash(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a stored hash.
///
/// Returns false on mismatch or on an unparseable hash; never errors for
/// well-formed input. The comparison inside argon2 is constant-time.
pub fn verify(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
