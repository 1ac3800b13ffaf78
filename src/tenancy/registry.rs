use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::AuthError;
use crate::database::models::Tenant;

/// Maps a tenant's public slug to its schema. Backed by the shared namespace.
#[async_trait]
pub trait TenantRegistry: Send + Sync {
    /// Active tenant with this slug, if any. Deactivated tenants are not returned.
    async fn lookup_by_slug(&self, slug: &str) -> Result<Option<Tenant>, AuthError>;

    async fn list_active(&self) -> Result<Vec<Tenant>, AuthError>;
}

pub struct PgTenantRegistry {
    pool: PgPool,
}

impl PgTenantRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantRegistry for PgTenantRegistry {
    async fn lookup_by_slug(&self, slug: &str) -> Result<Option<Tenant>, AuthError> {
        // Schema-qualified: this runs outside any tenant pin
        let tenant = sqlx::query_as::<_, Tenant>(
            "SELECT id, name, slug, schema_name, is_active
             FROM public.tenants
             WHERE slug = $1 AND is_active",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }

    async fn list_active(&self) -> Result<Vec<Tenant>, AuthError> {
        let tenants = sqlx::query_as::<_, Tenant>(
            "SELECT id, name, slug, schema_name, is_active
             FROM public.tenants
             WHERE is_active
             ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(tenants)
    }
}

/// Fixed in-memory registry, for tests and single-school deployments.
#[derive(Debug, Clone, Default)]
pub struct StaticTenantRegistry {
    tenants: Vec<Tenant>,
}

impl StaticTenantRegistry {
    pub fn new(tenants: Vec<Tenant>) -> Self {
        Self { tenants }
    }

    pub fn with_tenant(mut self, id: i32, slug: &str, schema_name: &str) -> Self {
        self.tenants.push(Tenant {
            id,
            name: slug.to_string(),
            slug: slug.to_string(),
            schema_name: schema_name.to_string(),
            is_active: true,
        });
        self
    }
}

#[async_trait]
impl TenantRegistry for StaticTenantRegistry {
    async fn lookup_by_slug(&self, slug: &str) -> Result<Option<Tenant>, AuthError> {
        Ok(self
            .tenants
            .iter()
            .find(|t| t.is_active && t.slug == slug)
            .cloned())
    }

    async fn list_active(&self) -> Result<Vec<Tenant>, AuthError> {
        Ok(self.tenants.iter().filter(|t| t.is_active).cloned().collect())
    }
}
