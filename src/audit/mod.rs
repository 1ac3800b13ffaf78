//! Best-effort audit side channel.
//!
//! Emission is spawned onto the runtime and awaited, so it completes even when
//! the request future that triggered it is dropped. Sink failures and panics
//! are logged and swallowed; they never change an authorization outcome or
//! roll back domain work.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::database::UnitOfWork;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<crate::auth::AuthError> for AuditError {
    fn from(err: crate::auth::AuthError) -> Self {
        AuditError::Unavailable(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Granted,
    Denied,
    Success,
    Failure,
}

/// Where a request came from. All fields are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub tenant_schema: Option<String>,
}

impl RequestMeta {
    pub const MAX_USER_AGENT_LEN: usize = 500;

    pub fn for_tenant(schema: impl Into<String>) -> Self {
        Self {
            tenant_schema: Some(schema.into()),
            ..Default::default()
        }
    }

    pub fn with_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address.filter(|ip| !ip.is_empty());
        self.user_agent = user_agent.map(|ua| ua.chars().take(Self::MAX_USER_AGENT_LEN).collect());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub actor: Option<i32>,
    pub action: String,
    pub outcome: AuditOutcome,
    pub resource_type: String,
    pub resource_id: Option<i32>,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub request: RequestMeta,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        actor: Option<i32>,
        action: impl Into<String>,
        outcome: AuditOutcome,
        resource_type: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor,
            action: action.into(),
            outcome,
            resource_type: resource_type.into(),
            resource_id: None,
            before: None,
            after: None,
            request: RequestMeta::default(),
            timestamp: Utc::now(),
        }
    }

    pub fn resource_id(mut self, id: Option<i32>) -> Self {
        self.resource_id = id;
        self
    }

    pub fn before(mut self, value: Value) -> Self {
        self.before = Some(value);
        self
    }

    pub fn after(mut self, value: Value) -> Self {
        self.after = Some(value);
        self
    }

    pub fn request(mut self, meta: RequestMeta) -> Self {
        self.request = meta;
        self
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn write(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

#[derive(Clone)]
pub struct AuditEmitter {
    sink: Arc<dyn AuditSink>,
}

impl AuditEmitter {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingAuditSink))
    }

    pub async fn record(&self, event: AuditEvent) {
        let sink = Arc::clone(&self.sink);
        let action = event.action.clone();
        let handle = tokio::spawn(async move { sink.write(&event).await });

        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(action = %action, "audit logging failed: {}", err),
            Err(join_err) => tracing::warn!(action = %action, "audit sink aborted: {}", join_err),
        }
    }
}

/// Structured log line on the `audit` target.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn write(&self, event: &AuditEvent) -> Result<(), AuditError> {
        tracing::info!(
            target: "audit",
            id = %event.id,
            actor = ?event.actor,
            action = %event.action,
            outcome = ?event.outcome,
            resource_type = %event.resource_type,
            resource_id = ?event.resource_id,
            tenant_schema = ?event.request.tenant_schema,
            ip = ?event.request.ip_address,
            after = ?event.after,
            "audit event"
        );
        Ok(())
    }
}

/// Queues events for a background writer that inserts them into the tenant's
/// `audit_logs` table, each on its own short transaction.
///
/// `write` only enqueues. The request that produced the event never waits for
/// a second pool connection; the writer acquires one after the request has
/// released its own. A full queue drops the event with a warning.
pub struct PgAuditSink {
    queue: mpsc::Sender<AuditEvent>,
}

impl PgAuditSink {
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Start the writer task on the current runtime. It exits once every
    /// sender is dropped and the queue is drained.
    pub fn spawn(uow: UnitOfWork, capacity: usize) -> Self {
        let (queue, mut rx) = mpsc::channel::<AuditEvent>(capacity.max(1));

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let action = event.action.clone();
                if let Err(err) = insert_event(&uow, event).await {
                    tracing::warn!(action = %action, "audit write failed: {}", err);
                }
            }
            tracing::debug!("audit writer stopped");
        });

        Self { queue }
    }
}

async fn insert_event(uow: &UnitOfWork, event: AuditEvent) -> Result<(), AuditError> {
    let Some(schema) = event.request.tenant_schema.clone() else {
        return Ok(());
    };

    uow.run_in_tenant(&schema, move |tx| {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO audit_logs
                    (user_id, action, resource_type, resource_id, old_values, new_values,
                     ip_address, user_agent, tenant_schema)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(event.actor)
            .bind(&event.action)
            .bind(&event.resource_type)
            .bind(event.resource_id)
            .bind(&event.before)
            .bind(&event.after)
            .bind(&event.request.ip_address)
            .bind(&event.request.user_agent)
            .bind(&event.request.tenant_schema)
            .execute(tx.conn())
            .await?;
            Ok::<(), AuditError>(())
        })
    })
    .await
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn write(&self, event: &AuditEvent) -> Result<(), AuditError> {
        if event.request.tenant_schema.is_none() {
            tracing::debug!(action = %event.action, "audit event without tenant; skipping table write");
            return Ok(());
        }

        match self.queue.try_send(event.clone()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                Err(AuditError::Unavailable("audit queue full".to_string()))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(AuditError::Unavailable("audit writer stopped".to_string()))
            }
        }
    }
}

/// Writes to every sink in order. All sinks are attempted; the first failure is reported.
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl AuditSink for FanoutAuditSink {
    async fn write(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(err) = sink.write(event).await {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Keeps events in memory; used by tests and diagnostics.
#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn actions(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.action).collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn write(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.events
            .lock()
            .map_err(|_| AuditError::Unavailable("memory sink poisoned".to_string()))?
            .push(event.clone());
        Ok(())
    }
}
