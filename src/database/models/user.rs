use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Tenant-local user as seen by the authorization engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: i32,
    pub email: String,
    pub full_name: String,
    pub is_active: bool,
}

/// Login lookup; carries the password hash and is never serialized.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: i32,
    pub email: String,
    pub hashed_password: String,
    pub is_active: bool,
}
