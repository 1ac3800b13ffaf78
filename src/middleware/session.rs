use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::auth::{AuthError, Claims};
use crate::error::ApiError;

/// Response header carrying the renewed session token.
pub const REFRESHED_TOKEN_HEADER: &str = "x-refreshed-token";

/// Authenticated session, inserted by `session_middleware`
#[derive(Clone, Debug)]
pub struct Session {
    pub user_id: i32,
    pub claims: Claims,
}

impl Session {
    pub fn tenant_claim(&self) -> Option<&str> {
        self.claims.extra.tenant.as_deref()
    }

    pub fn is_super_admin(&self) -> bool {
        self.claims.extra.is_super_admin()
    }
}

/// Validates the bearer token, injects `Session`, and attaches the renewed
/// token to the response.
pub async fn session_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&headers)?;

    let validated = state.tokens.validate_and_maybe_renew(token).map_err(|err| {
        if matches!(err, AuthError::SessionExpired) {
            tracing::info!("session rejected after idle timeout");
        }
        err
    })?;

    request.extensions_mut().insert(Session {
        user_id: validated.user_id,
        claims: validated.claims,
    });

    let mut response = next.run(request).await;

    match HeaderValue::from_str(&validated.renewed_token) {
        Ok(value) => {
            response.headers_mut().insert(REFRESHED_TOKEN_HEADER, value);
        }
        Err(e) => tracing::warn!("renewed token is not a valid header value: {}", e),
    }

    Ok(response)
}

/// Extract the token from `Authorization: Bearer <token>`
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::Unauthenticated)?;

    let (scheme, token) = value.trim().split_once(' ').ok_or(AuthError::Unauthenticated)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::Unauthenticated);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::Unauthenticated);
    }
    Ok(token)
}
