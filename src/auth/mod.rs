pub mod error;
pub mod hq;
pub mod password;
pub mod token;

pub use error::AuthError;
pub use hq::{require_hq_access, HQ_KEY_HEADER};
pub use token::{Claims, ExtraClaims, TokenService, ValidatedSession};
