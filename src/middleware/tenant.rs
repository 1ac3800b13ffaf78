use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use super::session::Session;
use crate::app::AppState;
use crate::audit::RequestMeta;
use crate::auth::AuthError;
use crate::error::ApiError;
use crate::tenancy::ResolvedTenant;

/// Explicit tenant hint, used by surfaces not yet authenticated into a tenant.
pub const TENANT_HEADER: &str = "x-tenant";

/// Resolved tenant plus request metadata for audit events
#[derive(Clone, Debug)]
pub struct TenantContext {
    pub tenant: ResolvedTenant,
    pub meta: RequestMeta,
}

/// Resolves the tenant of an authenticated request from its session claim.
///
/// Must run after `session_middleware`. An `X-Tenant` header may only
/// restate the claim; pointing a session at another tenant is rejected.
pub async fn tenant_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = request
        .extensions()
        .get::<Session>()
        .cloned()
        .ok_or(AuthError::Unauthenticated)?;

    let claim = session.tenant_claim();
    if let Some(hint) = tenant_hint(request.headers()) {
        if Some(hint) != claim.map(str::trim) {
            tracing::warn!(
                user_id = session.user_id,
                "tenant header '{}' does not match session tenant",
                hint
            );
            return Err(AuthError::Unauthenticated.into());
        }
    }

    let tenant = state.resolver.resolve(None, claim).await?;
    tracing::debug!(tenant = %tenant.slug, schema = %tenant.schema, "resolved session tenant");

    let meta = request_meta(request.headers(), &tenant);
    request.extensions_mut().insert(TenantContext { tenant, meta });

    Ok(next.run(request).await)
}

/// Non-blank `X-Tenant` value, if any.
pub fn tenant_hint(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Client address and agent as reported by the proxy in front of us.
pub fn request_meta(headers: &HeaderMap, tenant: &ResolvedTenant) -> RequestMeta {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);

    let ip = header("x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|s| s.trim().to_string()))
        .or_else(|| header("x-real-ip"));

    RequestMeta::for_tenant(tenant.schema.clone()).with_client(ip, header("user-agent"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn request_meta_prefers_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 172.16.0.2"));
        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.1"));
        headers.insert("user-agent", HeaderValue::from_static("curl/8"));

        let tenant = ResolvedTenant {
            id: 1,
            slug: "northside".to_string(),
            schema: "t_northside".to_string(),
        };
        let meta = request_meta(&headers, &tenant);
        assert_eq!(meta.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(meta.user_agent.as_deref(), Some("curl/8"));
        assert_eq!(meta.tenant_schema.as_deref(), Some("t_northside"));
    }

    #[test]
    fn blank_tenant_hint_is_absent() {
        let mut headers = HeaderMap::new();
        assert_eq!(tenant_hint(&headers), None);
        headers.insert(TENANT_HEADER, HeaderValue::from_static("  "));
        assert_eq!(tenant_hint(&headers), None);
        headers.insert(TENANT_HEADER, HeaderValue::from_static(" northside "));
        assert_eq!(tenant_hint(&headers), Some("northside"));
    }
}
