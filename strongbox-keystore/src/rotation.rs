//! Opportunistic secret rotation: a bounded worker pool re-encrypts
//! secrets under the current default DEK after a read observes them
//! sealed under an older one.
//!
//! Invariants:
//! - scheduling never blocks the read path (bounded queue, `try_send`);
//! - concurrent triggers for one secret coalesce (in-flight set);
//! - per-item errors are logged and dropped; the next read re-triggers.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use strongbox_envelope::envelope;

use crate::audit::{AuditAction, AuditEvent, AuditSink};
use crate::engine::DekEngine;
use crate::error::{ErrorKind, Result};
use crate::storage::DurableStore;

/// Handle for scheduling secrets onto the rotation pool.
pub struct RotationPool {
    tx: mpsc::Sender<Uuid>,
    inflight: Arc<Mutex<HashSet<Uuid>>>,
}

impl RotationPool {
    /// Spawn `workers` consumers over a queue of `capacity` secret ids.
    pub fn spawn(
        store: Arc<dyn DurableStore>,
        engine: Arc<DekEngine>,
        audit: Arc<dyn AuditSink>,
        workers: usize,
        capacity: usize,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel::<Uuid>(capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let inflight: Arc<Mutex<HashSet<Uuid>>> = Arc::new(Mutex::new(HashSet::new()));

        for worker in 0..workers.max(1) {
            let rx = rx.clone();
            let inflight = inflight.clone();
            let store = store.clone();
            let engine = engine.clone();
            let audit = audit.clone();
            tokio::spawn(async move {
                loop {
                    let id = {
                        let mut rx = rx.lock().await;
                        match rx.recv().await {
                            Some(id) => id,
                            None => break,
                        }
                    };
                    if let Err(e) = rotate_secret(&*store, &engine, &*audit, &id).await {
                        tracing::warn!(
                            secret_id = %id,
                            worker,
                            error = %e,
                            "opportunistic rotation failed"
                        );
                    }
                    inflight.lock().unwrap().remove(&id);
                }
            });
        }

        Arc::new(Self { tx, inflight })
    }

    /// Queue a secret for re-encryption. Returns immediately; a secret
    /// already queued or in progress is not queued again, and a full
    /// queue drops the request (the next read re-triggers it).
    pub fn schedule(&self, secret_id: Uuid) {
        {
            let mut inflight = self.inflight.lock().unwrap();
            if !inflight.insert(secret_id) {
                return;
            }
        }
        if let Err(e) = self.tx.try_send(secret_id) {
            self.inflight.lock().unwrap().remove(&secret_id);
            tracing::warn!(secret_id = %secret_id, error = %e, "rotation queue rejected secret");
        }
    }

    /// Whether anything is queued or being rotated right now.
    pub fn is_idle(&self) -> bool {
        self.inflight.lock().unwrap().is_empty()
    }
}

/// Re-seal one secret under the current default DEK.
///
/// Skips quietly if the secret vanished or was already rotated by the
/// time the worker got to it.
async fn rotate_secret(
    store: &dyn DurableStore,
    engine: &DekEngine,
    audit: &dyn AuditSink,
    secret_id: &Uuid,
) -> Result<()> {
    let Some(mut row) = store.get_secret(secret_id)? else {
        return Ok(());
    };
    let (default_id, default_key) = engine.default_key()?;
    if row.dek_id == default_id {
        return Ok(());
    }

    let old_key = engine.key_for(row.dek_id)?;
    let opened = envelope::open(&old_key, &row.package, Some(row.dek_id))
        .map_err(|_| ErrorKind::CryptoFailure { dek_id: row.dek_id })?;
    let package = envelope::seal(&default_key, default_id, &opened.plaintext)
        .map_err(|e| ErrorKind::internal(format!("re-seal failed: {}", e)))?;

    let from_dek = row.dek_id;
    let now = Utc::now();
    row.package = package;
    row.dek_id = default_id;
    row.last_rotation = Some(now);
    row.updated_at = now;
    store.update_secret(&row)?;

    audit.record(AuditEvent::new(AuditAction::SecretRotated {
        secret_id: *secret_id,
        from_dek,
        to_dek: default_id,
    }));
    tracing::debug!(secret_id = %secret_id, from_dek, to_dek = default_id, "rotated secret");
    Ok(())
}
