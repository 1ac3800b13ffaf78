// handlers/public/login.rs - POST /api/auth/login handler
//
// The tenant comes from the explicit X-Tenant header: the caller has no
// session yet, so there is no claim to fall back on.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app::AppState;
use crate::audit::{AuditEvent, AuditOutcome, RequestMeta};
use crate::auth::password::{verify_password, verify_unknown_account};
use crate::auth::{AuthError, ExtraClaims};
use crate::database::models::UserCredentials;
use crate::error::ApiError;
use crate::middleware::{request_meta, tenant_hint, ApiResponse, ApiResult};

pub const LOGIN_SUCCESS: &str = "LOGIN_SUCCESS";
pub const LOGIN_FAILED: &str = "LOGIN_FAILED";
pub const LOGIN_INACTIVE: &str = "LOGIN_INACTIVE";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub tenant: String,
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let Json(body) = payload.map_err(|e| ApiError::invalid_json(e.body_text()))?;

    let email = body.email.trim().to_lowercase();
    if email.is_empty() || body.password.is_empty() {
        return Err(ApiError::bad_request("email and password are required"));
    }

    let tenant = state.resolver.resolve(tenant_hint(&headers), None).await?;
    let meta = request_meta(&headers, &tenant);

    let lookup = email.clone();
    let credentials = state
        .uow
        .run_in_tenant(&tenant.schema, move |tx| {
            Box::pin(async move {
                let row = sqlx::query_as::<_, UserCredentials>(
                    "SELECT id, email, hashed_password, is_active FROM users WHERE lower(email) = $1",
                )
                .bind(&lookup)
                .fetch_optional(tx.conn())
                .await?;
                Ok::<_, AuthError>(row)
            })
        })
        .await?;

    // Unknown accounts still pay one argon2 verification
    let password = body.password;
    let stored = credentials.as_ref().map(|user| user.hashed_password.clone());
    let verified = tokio::task::spawn_blocking(move || match stored {
        Some(hash) => verify_password(&password, &hash),
        None => Ok(verify_unknown_account(&password)),
    })
    .await
    .map_err(|e| AuthError::Internal(format!("password verification task failed: {}", e)))??;

    let Some(user) = credentials else {
        record(&state, None, LOGIN_FAILED, AuditOutcome::Failure, &meta, json!({ "email": email, "reason": "unknown user" })).await;
        return Err(AuthError::Unauthenticated.into());
    };

    if !verified {
        record(&state, Some(user.id), LOGIN_FAILED, AuditOutcome::Failure, &meta, json!({ "email": email, "reason": "bad password" })).await;
        return Err(AuthError::Unauthenticated.into());
    }

    if !user.is_active {
        record(&state, Some(user.id), LOGIN_INACTIVE, AuditOutcome::Denied, &meta, json!({ "email": email })).await;
        return Err(AuthError::InactiveUser.into());
    }

    let access_token = state.tokens.issue(user.id, &ExtraClaims::for_tenant(tenant.slug.clone()))?;
    record(&state, Some(user.id), LOGIN_SUCCESS, AuditOutcome::Success, &meta, json!({ "email": email })).await;
    tracing::info!(user_id = user.id, tenant = %tenant.slug, "login succeeded");

    Ok(ApiResponse::success(LoginResponse {
        access_token,
        token_type: "bearer",
        expires_in: state.tokens.session_length().num_seconds(),
        tenant: tenant.slug,
    }))
}

async fn record(
    state: &AppState,
    actor: Option<i32>,
    action: &str,
    outcome: AuditOutcome,
    meta: &RequestMeta,
    details: serde_json::Value,
) {
    let event = AuditEvent::new(actor, action, outcome, "auth")
        .after(details)
        .request(meta.clone());
    state.authorizer.audit().record(event).await;
}
