//! Secret CRUD: thin orchestration of the envelope codec, the DEK engine,
//! and the durable store.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use zeroize::Zeroizing;

use strongbox_envelope::{envelope, EnvelopeError};

use crate::audit::{AuditAction, AuditEvent, AuditSink};
use crate::engine::DekEngine;
use crate::error::{ErrorKind, Result};
use crate::rotation::RotationPool;
use crate::storage::DurableStore;
use crate::types::SecretRecord;

/// A decrypted secret: the row plus its plaintext.
#[derive(Debug)]
pub struct SecretContent {
    pub record: SecretRecord,
    pub plaintext: Zeroizing<Vec<u8>>,
}

pub struct SecretService {
    store: Arc<dyn DurableStore>,
    engine: Arc<DekEngine>,
    rotator: Option<Arc<RotationPool>>,
    audit: Arc<dyn AuditSink>,
}

impl SecretService {
    pub fn new(
        store: Arc<dyn DurableStore>,
        engine: Arc<DekEngine>,
        rotator: Option<Arc<RotationPool>>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            engine,
            rotator,
            audit,
        }
    }

    /// Seal `value` under the current default DEK and persist it.
    pub fn create(
        &self,
        name: &str,
        value: &[u8],
        folder_id: Option<Uuid>,
    ) -> Result<SecretRecord> {
        if let Some(folder) = &folder_id {
            if self.store.get_folder(folder)?.is_none() {
                return Err(ErrorKind::not_found(format!("folder {}", folder)));
            }
        }

        let (dek_id, key) = self.engine.default_key()?;
        let package = envelope::seal(&key, dek_id, value)
            .map_err(|e| ErrorKind::internal(format!("seal failed: {}", e)))?;

        let record = SecretRecord::new(name, package, dek_id, folder_id);
        self.store.insert_secret(&record)?;

        self.audit.record(AuditEvent::new(AuditAction::SecretCreated {
            secret_id: record.id,
            dek_id,
        }));
        Ok(record)
    }

    /// Fetch and decrypt a secret by id.
    ///
    /// If the secret is sealed under a DEK other than the current default,
    /// the plaintext is returned immediately and a background re-encrypt
    /// is scheduled.
    pub fn get(&self, id: &Uuid) -> Result<SecretContent> {
        let record = self
            .store
            .get_secret(id)?
            .ok_or_else(|| ErrorKind::not_found(format!("secret {}", id)))?;
        self.open_record(record)
    }

    /// Fetch and decrypt a secret by its unique name.
    pub fn get_by_name(&self, name: &str) -> Result<SecretContent> {
        let record = self
            .store
            .find_secret_by_name(name)?
            .ok_or_else(|| ErrorKind::not_found(format!("secret '{}'", name)))?;
        self.open_record(record)
    }

    fn open_record(&self, record: SecretRecord) -> Result<SecretContent> {
        let key = self.engine.key_for(record.dek_id)?;
        let opened = envelope::open(&key, &record.package, Some(record.dek_id)).map_err(|e| {
            // No plaintext exists at this point; log the DEK id only.
            tracing::error!(secret_id = %record.id, dek_id = record.dek_id, error = %e, "secret failed to decrypt");
            self.audit.record(AuditEvent::new(AuditAction::DecryptionFailed {
                dek_id: record.dek_id,
            }));
            match e {
                EnvelopeError::UnsupportedAlgorithm(alg) => {
                    ErrorKind::internal(format!("stored package uses unsupported algorithm '{}'", alg))
                }
                EnvelopeError::UnsupportedVersion(v) => {
                    ErrorKind::internal(format!("stored package uses unsupported version {}", v))
                }
                _ => ErrorKind::CryptoFailure { dek_id: record.dek_id },
            }
        })?;

        let default_id = self.engine.default_dek_id();
        if opened.header.dek_id != default_id {
            if let Some(rotator) = &self.rotator {
                rotator.schedule(record.id);
            }
        }

        Ok(SecretContent {
            record,
            plaintext: opened.plaintext,
        })
    }

    /// Replace a secret's value (re-sealed under the current default DEK)
    /// and, optionally, its name or folder.
    pub fn update(
        &self,
        id: &Uuid,
        new_value: Option<&[u8]>,
        new_name: Option<&str>,
        new_folder: Option<Option<Uuid>>,
    ) -> Result<SecretRecord> {
        let mut record = self
            .store
            .get_secret(id)?
            .ok_or_else(|| ErrorKind::not_found(format!("secret {}", id)))?;

        if let Some(value) = new_value {
            let (dek_id, key) = self.engine.default_key()?;
            record.package = envelope::seal(&key, dek_id, value)
                .map_err(|e| ErrorKind::internal(format!("seal failed: {}", e)))?;
            record.dek_id = dek_id;
        }
        if let Some(name) = new_name {
            record.name = name.to_string();
        }
        if let Some(folder_id) = new_folder {
            if let Some(folder) = &folder_id {
                if self.store.get_folder(folder)?.is_none() {
                    return Err(ErrorKind::not_found(format!("folder {}", folder)));
                }
            }
            record.folder_id = folder_id;
        }
        record.updated_at = Utc::now();
        self.store.update_secret(&record)?;

        self.audit
            .record(AuditEvent::new(AuditAction::SecretUpdated { secret_id: *id }));
        Ok(record)
    }

    pub fn delete(&self, id: &Uuid) -> Result<()> {
        if self.store.get_secret(id)?.is_none() {
            return Err(ErrorKind::not_found(format!("secret {}", id)));
        }
        self.store.delete_secret(id)?;
        self.audit
            .record(AuditEvent::new(AuditAction::SecretDeleted { secret_id: *id }));
        Ok(())
    }

    /// Metadata for every secret. Plaintext is never included.
    pub fn list(&self) -> Result<Vec<SecretRecord>> {
        self.store.list_secrets()
    }
}
