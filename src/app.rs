use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::audit::{AuditEmitter, AuditSink, FanoutAuditSink, PgAuditSink, TracingAuditSink};
use crate::auth::{AuthError, TokenService, HQ_KEY_HEADER};
use crate::config::AppConfig;
use crate::database::UnitOfWork;
use crate::handlers::{elevated, protected, public};
use crate::middleware::{session_middleware, tenant_middleware, REFRESHED_TOKEN_HEADER, TENANT_HEADER};
use crate::rbac::Authorizer;
use crate::tenancy::{PgTenantRegistry, TenantRegistry, TenantResolver};

/// Shared, read-only request dependencies. Cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub tokens: Arc<TokenService>,
    pub resolver: TenantResolver,
    pub uow: UnitOfWork,
    pub authorizer: Authorizer,
    pub hq_api_key: Option<Arc<str>>,
}

impl AppState {
    /// Wire the production collaborators from configuration.
    pub fn from_config(pool: PgPool, config: &AppConfig) -> Result<Self, AuthError> {
        let tokens = TokenService::from_config(&config.security)?;
        let registry: Arc<dyn TenantRegistry> = Arc::new(PgTenantRegistry::new(pool.clone()));
        let uow = UnitOfWork::from_config(pool.clone(), config);

        let sink: Arc<dyn AuditSink> = if config.security.audit_to_database {
            Arc::new(FanoutAuditSink::new(vec![
                Arc::new(TracingAuditSink),
                Arc::new(PgAuditSink::spawn(uow.clone(), PgAuditSink::DEFAULT_CAPACITY)),
            ]))
        } else {
            Arc::new(TracingAuditSink)
        };

        Ok(Self::new(
            pool,
            tokens,
            registry,
            uow,
            AuditEmitter::new(sink),
            config.security.hq_api_key.as_deref(),
        ))
    }

    pub fn new(
        pool: PgPool,
        tokens: TokenService,
        registry: Arc<dyn TenantRegistry>,
        uow: UnitOfWork,
        audit: AuditEmitter,
        hq_api_key: Option<&str>,
    ) -> Self {
        Self {
            pool,
            tokens: Arc::new(tokens),
            resolver: TenantResolver::new(registry),
            uow,
            authorizer: Authorizer::new(audit),
            hq_api_key: hq_api_key.filter(|k| !k.is_empty()).map(Arc::from),
        }
    }
}

pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        // Public
        .route("/health", get(public::health))
        .route("/api/auth/login", post(public::login))
        // Protected: session, then tenant
        .merge(session_routes(state.clone()))
        .merge(tenant_routes(state.clone()))
        // Elevated: static HQ key, no tenant, no RBAC
        .route("/api/hq/tenants", get(elevated::hq_tenants))
        .route("/api/hq/summary", get(elevated::hq_summary))
        // Global middleware: tracing outermost, then CORS
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(cors_origins)),
        )
        .with_state(state)
}

/// Routes that need a valid session but no tenant transaction.
fn session_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/auth/whoami", get(protected::whoami))
        .route_layer(from_fn_with_state(state, session_middleware))
}

fn tenant_routes(state: AppState) -> Router<AppState> {
    // Layers run bottom-up: session first, then tenant
    Router::new()
        .route("/api/auth/me", get(protected::me))
        .route("/api/students/:id/access", get(protected::student_access))
        .route_layer(from_fn_with_state(state.clone(), tenant_middleware))
        .route_layer(from_fn_with_state(state, session_middleware))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(TENANT_HEADER),
            HeaderName::from_static(HQ_KEY_HEADER),
        ])
        .expose_headers([HeaderName::from_static(REFRESHED_TOKEN_HEADER)]);

    // Credentials cannot be combined with a wildcard origin
    if origins.iter().any(|origin| origin.trim() == "*") {
        if origins.len() > 1 {
            tracing::warn!("CORS_ORIGINS contains '*'; other listed origins are ignored");
        }
        return base.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(origins)).allow_credentials(true)
}
