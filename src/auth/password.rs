//! Password verification using Argon2 PHC strings.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use once_cell::sync::Lazy;

use crate::auth::AuthError;

/// Hash of a throwaway secret, built once with the same parameters as real
/// hashes. Unknown accounts are verified against it so they cost the same
/// argon2 work as known ones.
static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| hash_password("schoolhub-unknown-account").ok());

/// `Ok(false)` on mismatch; `Err` only when the stored hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AuthError::Internal(format!("invalid password hash format: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Internal(format!("password verify error: {}", e))),
    }
}

/// Spend one verification on an account that does not exist. Always `false`.
pub fn verify_unknown_account(password: &str) -> bool {
    match DUMMY_HASH.as_deref() {
        Some(hash) => {
            let _ = verify_password(password, hash);
        }
        None => tracing::warn!("dummy password hash unavailable; unknown-account login is not equalised"),
    }
    false
}

/// Produce a PHC hash; used by fixtures and provisioning tools.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    use argon2::password_hash::rand_core::OsRng;
    use argon2::password_hash::{PasswordHasher, SaltString};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Internal(format!("password hash error: {}", e)))
}
