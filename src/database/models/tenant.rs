use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Row of `public.tenants`, the shared registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub schema_name: String,
    pub is_active: bool,
}
