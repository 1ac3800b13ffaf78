pub mod response;
pub mod session;
pub mod tenant;

pub use response::{ApiResponse, ApiResult};
pub use session::{extract_bearer_token, session_middleware, Session, REFRESHED_TOKEN_HEADER};
pub use tenant::{request_meta, tenant_hint, tenant_middleware, TenantContext, TENANT_HEADER};
