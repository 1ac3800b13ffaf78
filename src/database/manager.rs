use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Builds the single shared pool and owns identifier hygiene for tenant schemas.
///
/// The pool carries no per-tenant state: connections are never given a
/// `search_path` at connect time. Tenant pins live only inside a transaction
/// (see `unit_of_work`).
pub struct DatabaseManager;

impl DatabaseManager {
    /// Shared namespace holding the tenant registry.
    pub const SHARED_SCHEMA: &'static str = "public";

    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let options = Self::pool_options(config)?;
        let pool = options.connect(&config.url).await?;
        info!("Created shared database pool for {}", Self::redacted_url(&config.url));
        Ok(pool)
    }

    /// Pool that connects on first use; lets the router start before the database is up.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let options = Self::pool_options(config)?;
        Ok(options.connect_lazy(&config.url)?)
    }

    fn pool_options(config: &DatabaseConfig) -> Result<PgPoolOptions, DatabaseError> {
        if config.url.is_empty() {
            return Err(DatabaseError::ConfigMissing("DATABASE_URL"));
        }
        url::Url::parse(&config.url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;

        Ok(PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout()))
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }

    /// Quote SQL identifier to prevent injection
    pub fn quote_identifier(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Value for a transaction-local `search_path`: the tenant first, shared namespace second.
    pub fn tenant_search_path(schema: &str) -> String {
        format!(
            "{}, {}",
            Self::quote_identifier(schema),
            Self::SHARED_SCHEMA
        )
    }

    /// Validate tenant schema names. Accepts lowercase identifiers made of
    /// [a-z0-9_], starting with a letter or underscore, at most 63 bytes, and
    /// never a system or shared schema.
    pub fn is_valid_schema_name(name: &str) -> bool {
        if name.is_empty() || name.len() > 63 {
            return false;
        }
        if name == Self::SHARED_SCHEMA || name == "information_schema" || name.starts_with("pg_") {
            return false;
        }
        let mut chars = name.chars();
        let first_ok = chars
            .next()
            .map(|c| c.is_ascii_lowercase() || c == '_')
            .unwrap_or(false);
        first_ok && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    }

    /// Database URL with the password stripped, for logs.
    pub fn redacted_url(raw: &str) -> String {
        match url::Url::parse(raw) {
            Ok(mut url) => {
                if url.password().is_some() {
                    let _ = url.set_password(Some("***"));
                }
                url.to_string()
            }
            Err(_) => "<invalid database url>".to_string(),
        }
    }
}
