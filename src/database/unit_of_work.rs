//! Schema-scoped unit of work.
//!
//! Every tenant request runs in exactly one transaction whose `search_path`
//! is pinned to the tenant schema (shared namespace second). The pin is set
//! with `set_config(..., true)`, so Postgres discards it when the transaction
//! ends, whether by commit, rollback, or the connection being returned after
//! a dropped future. Nothing tenant-specific is ever written at pool or
//! session level.

use futures::future::BoxFuture;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::AuthError;
use crate::config::AppConfig;
use crate::database::manager::DatabaseManager;

/// Handle bound to one pinned tenant transaction.
pub struct TenantTx {
    tx: Transaction<'static, Postgres>,
    schema: String,
}

impl TenantTx {
    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn conn(&mut self) -> &mut PgConnection {
        &mut *self.tx
    }

    /// First schema of the effective search path, as Postgres sees it.
    pub async fn current_schema(&mut self) -> Result<String, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT current_schema()::text")
            .fetch_one(&mut *self.tx)
            .await
    }
}

#[derive(Clone, Debug)]
pub struct UnitOfWork {
    pool: PgPool,
    statement_timeout: Duration,
    deadline: Duration,
}

impl UnitOfWork {
    pub fn new(pool: PgPool, statement_timeout: Duration, deadline: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
            deadline,
        }
    }

    pub fn from_config(pool: PgPool, config: &AppConfig) -> Self {
        Self::new(
            pool,
            config.database.statement_timeout(),
            config.api.request_timeout(),
        )
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run `work` inside one transaction pinned to `schema`.
    ///
    /// Commits when `work` returns `Ok`, rolls back on `Err`. If the deadline
    /// passes, the in-flight transaction is dropped (and thereby rolled back)
    /// and `AuthError::Timeout` is returned.
    pub async fn run_in_tenant<T, E, F>(&self, schema: &str, work: F) -> Result<T, E>
    where
        F: for<'t> FnOnce(&'t mut TenantTx) -> BoxFuture<'t, Result<T, E>> + Send,
        T: Send,
        E: From<AuthError> + Send,
    {
        match tokio::time::timeout(self.deadline, self.run_pinned(schema, work)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(schema, deadline = ?self.deadline, "tenant unit of work exceeded its deadline");
                Err(AuthError::Timeout.into())
            }
        }
    }

    /// One transaction per tenant, strictly one after another.
    ///
    /// Failures are collected per tenant; one tenant failing does not stop
    /// the others.
    pub async fn for_each_tenant<'s, T, E, F>(
        &self,
        schemas: impl IntoIterator<Item = &'s str>,
        mut work: F,
    ) -> Vec<(String, Result<T, E>)>
    where
        F: for<'t> FnMut(&'t mut TenantTx) -> BoxFuture<'t, Result<T, E>> + Send,
        T: Send,
        E: From<AuthError> + Send,
    {
        let mut results = Vec::new();
        for schema in schemas {
            let outcome = self.run_in_tenant(schema, |tx| work(tx)).await;
            results.push((schema.to_string(), outcome));
        }
        results
    }

    async fn run_pinned<T, E, F>(&self, schema: &str, work: F) -> Result<T, E>
    where
        F: for<'t> FnOnce(&'t mut TenantTx) -> BoxFuture<'t, Result<T, E>> + Send,
        T: Send,
        E: From<AuthError> + Send,
    {
        if !DatabaseManager::is_valid_schema_name(schema) {
            return Err(AuthError::Internal(format!("invalid tenant schema identifier: {}", schema)).into());
        }

        let mut tx = self.pool.begin().await.map_err(AuthError::from)?;

        sqlx::query("SELECT set_config('search_path', $1, true)")
            .bind(DatabaseManager::tenant_search_path(schema))
            .execute(&mut *tx)
            .await
            .map_err(AuthError::from)?;

        if !self.statement_timeout.is_zero() {
            sqlx::query("SELECT set_config('statement_timeout', $1, true)")
                .bind(self.statement_timeout.as_millis().to_string())
                .execute(&mut *tx)
                .await
                .map_err(AuthError::from)?;
        }

        debug!(schema, "opened tenant transaction");

        let mut handle = TenantTx {
            tx,
            schema: schema.to_string(),
        };

        match work(&mut handle).await {
            Ok(value) => {
                handle.tx.commit().await.map_err(AuthError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = handle.tx.rollback().await {
                    warn!(schema, "rollback of tenant transaction failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }
}
