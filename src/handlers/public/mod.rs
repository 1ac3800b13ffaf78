// handlers/public/mod.rs - Handlers that run without a session
pub mod health;
pub mod login;

pub use health::health;
pub use login::login;
