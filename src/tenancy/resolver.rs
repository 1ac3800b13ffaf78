use std::sync::Arc;

use serde::Serialize;

use crate::auth::AuthError;
use crate::database::DatabaseManager;
use crate::tenancy::TenantRegistry;

/// Concrete tenant a request runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTenant {
    pub id: i32,
    pub slug: String,
    pub schema: String,
}

#[derive(Clone)]
pub struct TenantResolver {
    registry: Arc<dyn TenantRegistry>,
}

impl TenantResolver {
    pub fn new(registry: Arc<dyn TenantRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<dyn TenantRegistry> {
        &self.registry
    }

    /// Turn a tenant hint into a schema. An explicit hint wins over the
    /// session claim; blank values count as absent.
    pub async fn resolve(
        &self,
        explicit: Option<&str>,
        claim: Option<&str>,
    ) -> Result<ResolvedTenant, AuthError> {
        let slug = pick_slug(explicit, claim).ok_or(AuthError::TenantRequired)?;

        let tenant = self
            .registry
            .lookup_by_slug(slug)
            .await?
            .ok_or_else(|| {
                tracing::warn!("tenant resolution failed: '{}' not found or inactive", slug);
                AuthError::TenantNotFound(slug.to_string())
            })?;

        if !DatabaseManager::is_valid_schema_name(&tenant.schema_name) {
            tracing::error!(
                "tenant '{}' has an unusable schema identifier '{}'",
                tenant.slug,
                tenant.schema_name
            );
            return Err(AuthError::Internal("tenant misconfigured".to_string()));
        }

        Ok(ResolvedTenant {
            id: tenant.id,
            slug: tenant.slug,
            schema: tenant.schema_name,
        })
    }
}

fn pick_slug<'a>(explicit: Option<&'a str>, claim: Option<&'a str>) -> Option<&'a str> {
    let present = |value: Option<&'a str>| value.map(str::trim).filter(|v| !v.is_empty());
    present(explicit).or_else(|| present(claim))
}
