//! Static-key check for the headquarters endpoints.
//!
//! This path bypasses tenant resolution and RBAC entirely; it only guards a
//! handful of cross-tenant operational reads.

use sha2::{Digest, Sha256};

use crate::auth::AuthError;

pub const HQ_KEY_HEADER: &str = "x-hq-key";

pub fn require_hq_access(configured: Option<&str>, presented: Option<&str>) -> Result<(), AuthError> {
    let configured = match configured {
        Some(key) if !key.is_empty() => key,
        _ => return Err(AuthError::HqNotConfigured),
    };

    let presented = presented.map(str::trim).unwrap_or_default();
    if presented.is_empty() {
        return Err(AuthError::Unauthenticated);
    }

    // Compare fixed-length digests rather than the raw keys
    let expected = Sha256::digest(configured.as_bytes());
    let actual = Sha256::digest(presented.as_bytes());
    let diff = expected
        .iter()
        .zip(actual.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));

    if diff == 0 {
        Ok(())
    } else {
        tracing::warn!("rejected HQ request with invalid key");
        Err(AuthError::Unauthenticated)
    }
}
