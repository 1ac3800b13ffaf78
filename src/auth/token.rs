//! Signed session tokens with sliding renewal.
//!
//! A token is valid while `now <= exp`, but it is also bounded by an idle
//! window measured from `iat`. Every successful validation inside the idle
//! window yields a freshly issued token carrying the same extra claims, so
//! active users stay signed in while idle sessions lapse.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::auth::AuthError;
use crate::config::SecurityConfig;

/// Claims carried alongside the subject and re-issued on renewal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_admin: Option<bool>,
}

impl ExtraClaims {
    pub fn for_tenant(slug: impl Into<String>) -> Self {
        Self {
            tenant: Some(slug.into()),
            super_admin: None,
        }
    }

    pub fn super_admin() -> Self {
        Self {
            tenant: None,
            super_admin: Some(true),
        }
    }

    pub fn is_super_admin(&self) -> bool {
        self.super_admin.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub iat: i64,
    pub exp: i64,
    #[serde(flatten)]
    pub extra: ExtraClaims,
}

/// Result of a successful validation.
#[derive(Debug, Clone)]
pub struct ValidatedSession {
    pub user_id: i32,
    pub claims: Claims,
    /// Surfaced out-of-band (response header), never in a response body.
    pub renewed_token: String,
}

pub struct TokenService {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_length: Duration,
    idle_window: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &self.algorithm)
            .field("session_length", &self.session_length)
            .field("idle_window", &self.idle_window)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(
        secret: &str,
        algorithm: Algorithm,
        session_length: Duration,
        idle_window: Duration,
    ) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::Config("JWT secret not configured".to_string()));
        }
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(AuthError::Config(format!(
                "unsupported JWT algorithm {:?}, expected an HMAC algorithm",
                algorithm
            )));
        }

        Ok(Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            session_length,
            idle_window,
        })
    }

    pub fn from_config(security: &SecurityConfig) -> Result<Self, AuthError> {
        let algorithm = Algorithm::from_str(&security.jwt_algorithm).map_err(|_| {
            AuthError::Config(format!("unknown JWT algorithm: {}", security.jwt_algorithm))
        })?;
        Self::new(
            &security.jwt_secret,
            algorithm,
            security.session_length(),
            security.idle_window(),
        )
    }

    pub fn session_length(&self) -> Duration {
        self.session_length
    }

    pub fn idle_window(&self) -> Duration {
        self.idle_window
    }

    pub fn issue(&self, subject: i32, extra: &ExtraClaims) -> Result<String, AuthError> {
        self.issue_at(subject, extra, Utc::now().timestamp())
    }

    pub fn issue_at(&self, subject: i32, extra: &ExtraClaims, now: i64) -> Result<String, AuthError> {
        let claims = Claims {
            sub: Some(subject.to_string()),
            iat: now,
            exp: now + self.session_length.num_seconds(),
            extra: extra.clone(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("JWT encode: {}", e)))
    }

    pub fn validate_and_maybe_renew(&self, token: &str) -> Result<ValidatedSession, AuthError> {
        self.validate_at(token, Utc::now().timestamp())
    }

    pub fn validate_at(&self, token: &str, now: i64) -> Result<ValidatedSession, AuthError> {
        let claims = self.decode(token)?;

        let user_id = claims
            .sub
            .as_deref()
            .and_then(|sub| sub.trim().parse::<i32>().ok())
            .ok_or(AuthError::Unauthenticated)?;

        // Idle timeout wins over expiry so inactivity is reported as such
        let idle_elapsed = now - claims.iat;
        if idle_elapsed > self.idle_window.num_seconds() {
            tracing::debug!(user_id, idle_elapsed, "session idle window exceeded");
            return Err(AuthError::SessionExpired);
        }
        if now > claims.exp {
            return Err(AuthError::Unauthenticated);
        }

        // Second-resolution timestamps: keep the renewed iat strictly ahead
        let renewed_at = now.max(claims.iat + 1);
        let renewed_token = self.issue_at(user_id, &claims.extra, renewed_at)?;

        Ok(ValidatedSession {
            user_id,
            claims,
            renewed_token,
        })
    }

    /// Signature check only; time-based rules are applied by the caller.
    fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("rejected session token: {}", e);
                AuthError::Unauthenticated
            })
    }
}
