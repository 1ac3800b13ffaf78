// handlers/elevated/mod.rs - Cross-tenant operational handlers
//
// Guarded by the static HQ key only. These bypass tenant resolution and RBAC.
pub mod hq;

pub use hq::{hq_summary, hq_tenants};
