// handlers/protected/auth.rs - GET /api/auth/whoami, GET /api/auth/me

use axum::{extract::State, Extension};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::app::AppState;
use crate::auth::AuthError;
use crate::database::models::UserRecord;
use crate::middleware::{ApiResponse, ApiResult, Session, TenantContext};
use crate::rbac::{load_context, PgAccessStore};

#[derive(Debug, Serialize)]
pub struct WhoAmI {
    pub user_id: i32,
    pub tenant: Option<String>,
    pub super_admin: bool,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Session echo; no database access.
pub async fn whoami(Extension(session): Extension<Session>) -> ApiResult<WhoAmI> {
    Ok(ApiResponse::success(WhoAmI {
        user_id: session.user_id,
        tenant: session.claims.extra.tenant.clone(),
        super_admin: session.is_super_admin(),
        issued_at: session.claims.iat,
        expires_at: session.claims.exp,
    }))
}

#[derive(Debug, Serialize)]
pub struct Profile {
    pub user: UserRecord,
    pub tenant: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub role_permissions: BTreeMap<String, Vec<String>>,
}

/// Current user with roles and effective permissions, read fresh from the tenant.
pub async fn me(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Extension(ctx): Extension<TenantContext>,
) -> ApiResult<Profile> {
    let user_id = session.user_id;
    let context = state
        .uow
        .run_in_tenant(&ctx.tenant.schema, move |tx| {
            Box::pin(async move {
                let mut store = PgAccessStore::new(tx.conn());
                load_context(&mut store, user_id).await
            })
        })
        .await
        .map_err(|err: AuthError| {
            if matches!(err, AuthError::Unauthenticated) {
                tracing::info!(user_id, tenant = %ctx.tenant.slug, "profile requested for missing or inactive user");
            }
            err
        })?;

    let permissions = context.effective_permissions().iter().map(|c| c.to_string()).collect();
    let role_permissions = context
        .roles
        .iter()
        .map(|(role, caps)| (role.to_string(), caps.iter().map(|c| c.to_string()).collect()))
        .collect();

    Ok(ApiResponse::success(Profile {
        roles: context.role_names(),
        permissions,
        role_permissions,
        tenant: ctx.tenant.slug.clone(),
        user: context.user,
    }))
}
