//! Role and permission checks with role-specific data scoping.

pub mod capability;
pub mod engine;
pub mod scope;
pub mod store;

pub use capability::{Capability, Needs, RecordScope, Requirement, RestrictedRole, RoleName, ADMIN_TIER_ROLES};
pub use engine::{load_context, AccessContext, AccessRequest, Authorizer, Grant};
pub use scope::{ClassAssignment, DataScope};
pub use store::{AccessStore, MemoryAccessStore, PgAccessStore, RoleGrantRow};
