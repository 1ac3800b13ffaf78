pub mod registry;
pub mod resolver;

pub use registry::{PgTenantRegistry, StaticTenantRegistry, TenantRegistry};
pub use resolver::{ResolvedTenant, TenantResolver};
