//! DEK cache & rotation engine.
//!
//! Owns the in-memory catalogue of unwrapped, ready-to-use DEKs and the
//! current-default pointer, and orchestrates DEK creation, KEK rotation,
//! and DEK deletion against the durable store and the KMS adapter.
//!
//! Locking: the cache and the default pointer live under one `RwLock`, so
//! any default id observed by a reader is resolvable in the same lock
//! scope. The lock is never held across an await point.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use strongbox_envelope::aead::{self, Key};

use crate::audit::{AuditAction, AuditEvent, AuditSink};
use crate::error::{ErrorKind, Result};
use crate::kms::KmsAdapter;
use crate::storage::DurableStore;
use crate::types::{DekId, DekRecord, RotationFailure, RotationReport};

struct DekCache {
    keys: HashMap<DekId, Key>,
    default_id: DekId,
}

/// In-memory DEK catalogue plus lifecycle orchestration.
pub struct DekEngine {
    store: Arc<dyn DurableStore>,
    kms: Arc<dyn KmsAdapter>,
    audit: Arc<dyn AuditSink>,
    cache: RwLock<DekCache>,
    /// KEK new DEKs are wrapped under. Updated after a KEK rotation batch.
    current_kek: RwLock<String>,
}

impl DekEngine {
    /// Load every DEK row, unwrap it, and populate the cache.
    ///
    /// Any row that fails to unwrap is fatal: the service must not start
    /// in a partially usable state. The default DEK id becomes the highest
    /// id observed, or 1 when the table is empty.
    pub async fn load(
        store: Arc<dyn DurableStore>,
        kms: Arc<dyn KmsAdapter>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self> {
        let rows = store.list_deks()?;
        let mut keys = HashMap::with_capacity(rows.len());
        let mut default_id: DekId = 1;

        for row in &rows {
            let key = kms.unwrap_dek(&row.wrapped_key, &row.kek_id).await.map_err(|e| {
                ErrorKind::internal(format!("dek {} failed to unwrap at startup: {}", row.id, e))
            })?;
            keys.insert(row.id, key);
            default_id = default_id.max(row.id);
        }

        tracing::info!(deks = rows.len(), default_dek = default_id, "dek cache populated");

        let current_kek = kms.default_kek_id();
        Ok(Self {
            store,
            kms,
            audit,
            cache: RwLock::new(DekCache { keys, default_id }),
            current_kek: RwLock::new(current_kek),
        })
    }

    /// Id used for newly created or re-encrypted secrets.
    pub fn default_dek_id(&self) -> DekId {
        self.cache.read().unwrap().default_id
    }

    /// The default id and its key material, observed atomically.
    ///
    /// Errors only before bootstrap has guaranteed the first DEK exists.
    pub fn default_key(&self) -> Result<(DekId, Key)> {
        let cache = self.cache.read().unwrap();
        let key = cache
            .keys
            .get(&cache.default_id)
            .cloned()
            .ok_or_else(|| ErrorKind::internal("no dek available for encryption"))?;
        Ok((cache.default_id, key))
    }

    /// Key material for a specific DEK id.
    pub fn key_for(&self, id: DekId) -> Result<Key> {
        self.cache
            .read()
            .unwrap()
            .keys
            .get(&id)
            .cloned()
            .ok_or_else(|| ErrorKind::internal(format!("dek {} not present in cache", id)))
    }

    /// KEK id new DEKs will be wrapped under.
    pub fn current_kek_id(&self) -> String {
        self.current_kek.read().unwrap().clone()
    }

    pub fn get_dek(&self, id: DekId) -> Result<DekRecord> {
        self.store
            .get_dek(id)?
            .ok_or_else(|| ErrorKind::not_found(format!("dek {}", id)))
    }

    pub fn list_deks(&self) -> Result<Vec<DekRecord>> {
        self.store.list_deks()
    }

    // -----------------------------------------------------------------------
    // DEK creation
    // -----------------------------------------------------------------------

    /// Generate a fresh DEK, wrap it under the current KEK, persist it, and
    /// make it the default for subsequent encryption.
    ///
    /// The plaintext key is never persisted and never logged.
    pub async fn create_dek(&self, name: &str) -> Result<DekRecord> {
        let key = aead::generate_key()
            .map_err(|_| ErrorKind::internal("dek generation failed"))?;
        let kek_id = self.current_kek_id();
        let wrapped = self.kms.wrap_dek(&key, &kek_id).await?;
        let row = self.store.create_dek(name, &wrapped, &kek_id)?;

        {
            let mut cache = self.cache.write().unwrap();
            cache.keys.insert(row.id, key);
            cache.default_id = row.id;
        }

        self.audit.record(AuditEvent::new(AuditAction::DekCreated {
            dek_id: row.id,
            kek_id,
        }));
        tracing::info!(dek_id = row.id, name = %row.name, "created dek");
        Ok(row)
    }

    // -----------------------------------------------------------------------
    // KEK rotation
    // -----------------------------------------------------------------------

    /// Re-wrap all DEKs under `new_kek_id`, optionally only those currently
    /// under `old_kek_id`.
    ///
    /// Each row is independent: failures are collected and the batch
    /// continues. Rows already wrapped under the target KEK are no-ops, so
    /// re-running after a partial failure is safe. After the batch, newly
    /// created DEKs wrap under `new_kek_id`.
    pub async fn rotate_kek(
        &self,
        new_kek_id: &str,
        old_kek_id: Option<&str>,
    ) -> Result<RotationReport> {
        let rows: Vec<DekRecord> = self
            .store
            .list_deks()?
            .into_iter()
            .filter(|d| old_kek_id.map_or(true, |old| d.kek_id == old))
            .collect();

        let mut report = RotationReport {
            total: rows.len(),
            ..Default::default()
        };

        for mut row in rows {
            if row.kek_id == new_kek_id {
                report.success += 1;
                continue;
            }
            match self.rewrap_row(&mut row, new_kek_id).await {
                Ok(()) => report.success += 1,
                Err(e) => {
                    tracing::warn!(dek_id = row.id, error = %e, "kek rotation failed for dek");
                    report.failures.push(RotationFailure {
                        id: row.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        *self.current_kek.write().unwrap() = new_kek_id.to_string();

        self.audit.record(AuditEvent::new(AuditAction::KekRotationCompleted {
            new_kek_id: new_kek_id.to_string(),
            total: report.total,
            success: report.success,
            failed: report.failures.len(),
        }));
        tracing::info!(
            new_kek = new_kek_id,
            total = report.total,
            success = report.success,
            failed = report.failures.len(),
            "kek rotation batch finished"
        );
        Ok(report)
    }

    async fn rewrap_row(&self, row: &mut DekRecord, new_kek_id: &str) -> Result<()> {
        let key = self.kms.unwrap_dek(&row.wrapped_key, &row.kek_id).await?;
        let wrapped = self.kms.wrap_dek(&key, new_kek_id).await?;

        row.wrapped_key = wrapped;
        row.kek_id = new_kek_id.to_string();
        row.version += 1;
        row.updated_at = Utc::now();
        self.store.update_dek(row)?;

        // The in-memory value is unchanged; refresh anyway so the cache
        // never diverges from what was just verified against the KMS.
        self.cache.write().unwrap().keys.insert(row.id, key);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Deactivation and deletion
    // -----------------------------------------------------------------------

    /// Mark a DEK inactive. It remains in the cache and may still decrypt
    /// existing secrets.
    pub fn deactivate_dek(&self, id: DekId) -> Result<DekRecord> {
        let mut row = self.get_dek(id)?;
        row.active = false;
        row.updated_at = Utc::now();
        self.store.update_dek(&row)?;
        self.audit
            .record(AuditEvent::new(AuditAction::DekDeactivated { dek_id: id }));
        Ok(row)
    }

    /// Delete a DEK. Refused while any secret references it, and refused
    /// for the current default (deleting it would break encryption).
    pub fn delete_dek(&self, id: DekId) -> Result<()> {
        self.get_dek(id)?;

        let references = self.store.count_secrets_for_dek(id)?;
        if references > 0 {
            return Err(ErrorKind::conflict(format!(
                "dek {} is still referenced by {} secret(s)",
                id, references
            )));
        }
        if id == self.default_dek_id() {
            return Err(ErrorKind::conflict(format!(
                "dek {} is the current default and cannot be deleted",
                id
            )));
        }

        self.store.delete_dek(id)?;
        self.cache.write().unwrap().keys.remove(&id);
        self.audit
            .record(AuditEvent::new(AuditAction::DekDeleted { dek_id: id }));
        tracing::info!(dek_id = id, "deleted dek");
        Ok(())
    }
}
