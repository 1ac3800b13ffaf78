use thiserror::Error;

/// Failure kinds of the request substrate: session, tenant, authorization.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("not authenticated")]
    Unauthenticated,

    /// Idle timeout. Externally identical to `Unauthenticated`.
    #[error("session expired due to inactivity")]
    SessionExpired,

    #[error("tenant required")]
    TenantRequired,

    #[error("tenant not found: {0}")]
    TenantNotFound(String),

    #[error("insufficient permission")]
    InsufficientPermission,

    #[error("insufficient role")]
    InsufficientRole,

    /// Returned instead of a denial when scoping hides the record.
    #[error("not found")]
    NotFound,

    #[error("inactive user")]
    InactiveUser,

    #[error("HQ access not configured")]
    HqNotConfigured,

    #[error("request deadline exceeded")]
    Timeout,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
