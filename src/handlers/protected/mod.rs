// handlers/protected/mod.rs - Handlers behind the session (and tenant) middleware
pub mod auth;
pub mod students;

pub use auth::{me, whoami};
pub use students::student_access;
