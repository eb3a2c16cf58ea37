//! Audit logging: key, secret, and auth operations emit structured events.
//!
//! Events never carry plaintext, key material, or password hashes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

use crate::types::DekId;

// ---------------------------------------------------------------------------
// Audit events
// ---------------------------------------------------------------------------

/// What happened.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AuditAction {
    DekCreated { dek_id: DekId, kek_id: String },
    DekDeactivated { dek_id: DekId },
    DekDeleted { dek_id: DekId },
    KekRotationCompleted { new_kek_id: String, total: usize, success: usize, failed: usize },
    SecretCreated { secret_id: Uuid, dek_id: DekId },
    SecretUpdated { secret_id: Uuid },
    SecretDeleted { secret_id: Uuid },
    SecretRotated { secret_id: Uuid, from_dek: DekId, to_dek: DekId },
    DecryptionFailed { dek_id: DekId },
    ClientRegistered { client_id: Uuid },
    ClientRevoked { client_id: Uuid },
    LoginSucceeded { client_id: Uuid },
    LoginFailed { name: String },
}

/// A structured audit event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub detail: Option<String>,
}

impl AuditEvent {
    pub fn new(action: AuditAction) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Audit sink trait
// ---------------------------------------------------------------------------

/// Where audit events go. Implement this for your SIEM/log system.
///
/// Synchronous to avoid the `async_trait` indirection on the hot path;
/// async sinks should buffer internally (e.g. channel-based).
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Emits events as structured `tracing` records. The default sink.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "strongbox::audit",
            action = ?event.action,
            detail = event.detail.as_deref().unwrap_or(""),
            "audit"
        );
    }
}

/// Collects events in memory. For tests.
#[derive(Default)]
pub struct InMemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events.lock().unwrap().push(event);
    }
}
