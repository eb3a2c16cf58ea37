//! Persisted records: Client, DEK, Secret, Folder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// DEK ids are 32-bit monotonic integers beginning at 1.
pub type DekId = u32;

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// An authenticated API client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: Uuid,
    /// Unique login name.
    pub name: String,
    /// Argon2id PHC string. Never leaves the store in any response.
    pub hashed_secret: String,
    /// Inactive clients cannot authenticate.
    pub active: bool,
    pub roles: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ClientRecord {
    pub fn new(
        name: impl Into<String>,
        hashed_secret: String,
        roles: BTreeSet<String>,
        permissions: BTreeSet<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            hashed_secret,
            active: true,
            roles,
            permissions,
            created_at: now,
            updated_at: now,
            last_used_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// DEK
// ---------------------------------------------------------------------------

/// A data-encryption key at rest: only ever stored wrapped by the KEK.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DekRecord {
    /// Immutable, monotonically increasing id.
    pub id: DekId,
    /// Unique name.
    pub name: String,
    /// Key material wrapped by the KMS under `kek_id`.
    #[serde(with = "hex::serde")]
    pub wrapped_key: Vec<u8>,
    /// Which KEK wrapped `wrapped_key`.
    pub kek_id: String,
    /// Bumped on every re-wrap (KEK rotation).
    pub version: u32,
    /// Inactive DEKs may still decrypt existing secrets.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// An encrypted-at-rest secret.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SecretRecord {
    pub id: Uuid,
    /// Unique name.
    pub name: String,
    /// Encoded encrypted package (`strongbox_envelope::wire`).
    #[serde(with = "hex::serde")]
    pub package: Vec<u8>,
    /// Must equal the package header's embedded DEK id.
    pub dek_id: DekId,
    pub folder_id: Option<Uuid>,
    /// Last opportunistic re-encryption, if any.
    pub last_rotation: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SecretRecord {
    pub fn new(name: impl Into<String>, package: Vec<u8>, dek_id: DekId, folder_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            package,
            dek_id,
            folder_id,
            last_rotation: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Folder
// ---------------------------------------------------------------------------

/// A node in the folder forest. Names are unique per parent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FolderRecord {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FolderRecord {
    pub fn new(name: impl Into<String>, parent_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            parent_id,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// KEK rotation report
// ---------------------------------------------------------------------------

/// One DEK that could not be re-wrapped during a KEK rotation batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RotationFailure {
    pub id: DekId,
    pub error: String,
}

/// Outcome of a KEK rotation batch. Failures never abort the batch.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RotationReport {
    pub total: usize,
    pub success: usize,
    pub failures: Vec<RotationFailure>,
}
