// handlers/elevated/hq.rs - GET /api/hq/tenants, GET /api/hq/summary

use axum::{extract::State, http::HeaderMap};
use serde::Serialize;

use crate::app::AppState;
use crate::auth::{require_hq_access, AuthError, HQ_KEY_HEADER};
use crate::database::models::Tenant;
use crate::middleware::{ApiResponse, ApiResult};

fn check_key(state: &AppState, headers: &HeaderMap) -> Result<(), AuthError> {
    let presented = headers.get(HQ_KEY_HEADER).and_then(|v| v.to_str().ok());
    require_hq_access(state.hq_api_key.as_deref(), presented)
}

pub async fn hq_tenants(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Vec<Tenant>> {
    check_key(&state, &headers)?;
    let tenants = state.resolver.registry().list_active().await?;
    Ok(ApiResponse::success(tenants))
}

#[derive(Debug, Clone, Copy, Serialize, Default)]
pub struct TenantCounts {
    pub users: i64,
    pub active_users: i64,
    pub students: i64,
}

#[derive(Debug, Serialize)]
pub struct TenantSummary {
    pub slug: String,
    pub schema: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<TenantCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

/// Per-tenant counts, one pinned transaction per tenant in turn.
pub async fn hq_summary(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Vec<TenantSummary>> {
    check_key(&state, &headers)?;
    let tenants = state.resolver.registry().list_active().await?;
    // Owned up front so no borrowing closure is held across the awaits below
    let schemas: Vec<String> = tenants.iter().map(|t| t.schema_name.clone()).collect();

    let results = state
        .uow
        .for_each_tenant(schemas.iter().map(String::as_str), |tx| {
            Box::pin(async move {
                let (users, active_users) = sqlx::query_as::<_, (i64, i64)>(
                    "SELECT COUNT(*), COUNT(*) FILTER (WHERE is_active) FROM users",
                )
                .fetch_one(tx.conn())
                .await?;
                let students = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM students")
                    .fetch_one(tx.conn())
                    .await?;
                Ok::<_, AuthError>(TenantCounts {
                    users,
                    active_users,
                    students,
                })
            })
        })
        .await;

    let summaries = tenants
        .iter()
        .zip(results)
        .map(|(tenant, (schema, outcome))| match outcome {
            Ok(counts) => TenantSummary {
                slug: tenant.slug.clone(),
                schema,
                counts: Some(counts),
                error: None,
            },
            Err(err) => {
                tracing::warn!(tenant = %tenant.slug, "tenant summary failed: {}", err);
                TenantSummary {
                    slug: tenant.slug.clone(),
                    schema,
                    counts: None,
                    error: Some("unavailable"),
                }
            }
        })
        .collect();

    tracing::info!(tenants = tenants.len(), "served HQ summary");
    Ok(ApiResponse::success(summaries))
}
