//! Audit records for access decisions
//!
//! The engine emits one `AuditLogEntry` per `check_access` call to an
//! injected `AuditSink`. Sink failures are logged by the engine and never
//! change the decision.

use crate::error::Result;
use crate::types::{AccessCheckResult, AccessContext, Action, Resource, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Immutable record of one access decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    /// Unique entry ID
    pub id: String,

    /// Decision time
    pub timestamp: DateTime<Utc>,

    pub user_id: UserId,
    pub action: String,
    pub resource_type: String,

    /// Resource id, `*` for collection-level checks
    pub resource_id: String,

    pub allowed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denied_reason: Option<String>,

    /// Caller context as supplied to the check
    pub context: AccessContext,
}

impl AuditLogEntry {
    /// Build an entry for a finished decision
    pub fn for_decision(
        context: &AccessContext,
        action: &Action,
        resource: &Resource,
        result: &AccessCheckResult,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            user_id: context.user_id.clone(),
            action: action.name.clone(),
            resource_type: resource.resource_type.clone(),
            resource_id: resource.id.clone().unwrap_or_else(|| "*".to_string()),
            allowed: result.allowed,
            denied_reason: if result.allowed { None } else { result.reason.clone() },
            context: context.clone(),
        }
    }
}

/// Receiver of audit entries
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record one access decision
    async fn log_access(&self, entry: AuditLogEntry) -> Result<()>;
}

/// Emits each entry as a structured `tracing` event on the `access_audit` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn log_access(&self, entry: AuditLogEntry) -> Result<()> {
        info!(
            target: "access_audit",
            id = %entry.id,
            user_id = %entry.user_id,
            action = %entry.action,
            resource_type = %entry.resource_type,
            resource_id = %entry.resource_id,
            allowed = entry.allowed,
            denied_reason = entry.denied_reason.as_deref().unwrap_or(""),
            "access decision"
        );
        Ok(())
    }
}

/// Bounded in-memory audit log
pub struct MemoryAuditSink {
    buffer: RwLock<Vec<AuditLogEntry>>,
    capacity: usize,
}

impl MemoryAuditSink {
    /// Keeps the most recent 10,000 entries
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: RwLock::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    /// All retained entries, oldest first
    pub async fn entries(&self) -> Vec<AuditLogEntry> {
        self.buffer.read().await.clone()
    }

    /// Most recent entries for a principal, newest first
    pub async fn entries_for_user(&self, user_id: &str, limit: usize) -> Vec<AuditLogEntry> {
        let buffer = self.buffer.read().await;
        buffer
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.buffer.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.buffer.read().await.is_empty()
    }

    pub async fn stats(&self) -> AuditStats {
        let buffer = self.buffer.read().await;
        let allowed = buffer.iter().filter(|e| e.allowed).count();

        AuditStats {
            total_decisions: buffer.len(),
            allowed_decisions: allowed,
            denied_decisions: buffer.len() - allowed,
        }
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn log_access(&self, entry: AuditLogEntry) -> Result<()> {
        let mut buffer = self.buffer.write().await;
        buffer.push(entry);

        if buffer.len() > self.capacity {
            let overflow = buffer.len() - self.capacity;
            buffer.drain(0..overflow);
        }

        Ok(())
    }
}

/// Audit statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditStats {
    pub total_decisions: usize,
    pub allowed_decisions: usize,
    pub denied_decisions: usize,
}
