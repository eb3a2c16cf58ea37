//! Durable store: where clients, DEKs, secrets, and folders live.
//!
//! Implement [`DurableStore`] for your infrastructure:
//! - `InMemoryStore` (testing, ephemeral)
//! - `FileStore` (development, one JSON document per record)
//! - Your relational database (production)

use crate::error::{ErrorKind, Result};
use crate::types::{ClientRecord, DekId, DekRecord, FolderRecord, SecretRecord};

use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Transactional CRUD over the four persisted tables.
///
/// Row updates are atomic per record: a writer either commits the full row
/// or nothing, which is what makes DEK and secret rotation cancellation-safe.
pub trait DurableStore: Send + Sync {
    // --- clients ---
    fn insert_client(&self, client: &ClientRecord) -> Result<()>;
    fn update_client(&self, client: &ClientRecord) -> Result<()>;
    fn get_client(&self, id: &Uuid) -> Result<Option<ClientRecord>>;
    fn find_client_by_name(&self, name: &str) -> Result<Option<ClientRecord>>;
    fn list_clients(&self) -> Result<Vec<ClientRecord>>;
    fn client_count(&self) -> Result<usize>;

    // --- deks ---
    /// Persist a new DEK row, assigning the next monotonic id.
    fn create_dek(&self, name: &str, wrapped_key: &[u8], kek_id: &str) -> Result<DekRecord>;
    fn update_dek(&self, dek: &DekRecord) -> Result<()>;
    fn get_dek(&self, id: DekId) -> Result<Option<DekRecord>>;
    /// All DEK rows, ordered by ascending id.
    fn list_deks(&self) -> Result<Vec<DekRecord>>;
    fn delete_dek(&self, id: DekId) -> Result<()>;

    // --- secrets ---
    fn insert_secret(&self, secret: &SecretRecord) -> Result<()>;
    fn update_secret(&self, secret: &SecretRecord) -> Result<()>;
    fn get_secret(&self, id: &Uuid) -> Result<Option<SecretRecord>>;
    fn find_secret_by_name(&self, name: &str) -> Result<Option<SecretRecord>>;
    fn list_secrets(&self) -> Result<Vec<SecretRecord>>;
    fn list_secrets_in_folder(&self, folder_id: &Uuid) -> Result<Vec<SecretRecord>>;
    fn delete_secret(&self, id: &Uuid) -> Result<()>;
    /// How many secrets still reference a DEK. Guards DEK deletion.
    fn count_secrets_for_dek(&self, dek_id: DekId) -> Result<usize>;

    // --- folders ---
    fn insert_folder(&self, folder: &FolderRecord) -> Result<()>;
    fn update_folder(&self, folder: &FolderRecord) -> Result<()>;
    fn get_folder(&self, id: &Uuid) -> Result<Option<FolderRecord>>;
    /// Lookup by `(name, parent_id)`, the per-parent uniqueness key.
    fn find_folder(&self, name: &str, parent_id: Option<&Uuid>) -> Result<Option<FolderRecord>>;
    fn list_folders(&self) -> Result<Vec<FolderRecord>>;
    fn list_child_folders(&self, parent_id: &Uuid) -> Result<Vec<FolderRecord>>;
    fn delete_folder(&self, id: &Uuid) -> Result<()>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Tables {
    clients: HashMap<Uuid, ClientRecord>,
    deks: BTreeMap<DekId, DekRecord>,
    secrets: HashMap<Uuid, SecretRecord>,
    folders: HashMap<Uuid, FolderRecord>,
}

/// In-memory storage (for testing and ephemeral use).
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStore for InMemoryStore {
    fn insert_client(&self, client: &ClientRecord) -> Result<()> {
        let mut t = self.tables.write().unwrap();
        if t.clients.values().any(|c| c.name == client.name) {
            return Err(ErrorKind::conflict(format!("client name '{}' already exists", client.name)));
        }
        t.clients.insert(client.id, client.clone());
        Ok(())
    }

    fn update_client(&self, client: &ClientRecord) -> Result<()> {
        let mut t = self.tables.write().unwrap();
        if !t.clients.contains_key(&client.id) {
            return Err(ErrorKind::not_found(format!("client {}", client.id)));
        }
        t.clients.insert(client.id, client.clone());
        Ok(())
    }

    fn get_client(&self, id: &Uuid) -> Result<Option<ClientRecord>> {
        Ok(self.tables.read().unwrap().clients.get(id).cloned())
    }

    fn find_client_by_name(&self, name: &str) -> Result<Option<ClientRecord>> {
        let t = self.tables.read().unwrap();
        Ok(t.clients.values().find(|c| c.name == name).cloned())
    }

    fn list_clients(&self) -> Result<Vec<ClientRecord>> {
        Ok(self.tables.read().unwrap().clients.values().cloned().collect())
    }

    fn client_count(&self) -> Result<usize> {
        Ok(self.tables.read().unwrap().clients.len())
    }

    fn create_dek(&self, name: &str, wrapped_key: &[u8], kek_id: &str) -> Result<DekRecord> {
        let mut t = self.tables.write().unwrap();
        if t.deks.values().any(|d| d.name == name) {
            return Err(ErrorKind::conflict(format!("dek name '{}' already exists", name)));
        }
        let id = t.deks.keys().next_back().copied().unwrap_or(0) + 1;
        let now = Utc::now();
        let dek = DekRecord {
            id,
            name: name.to_string(),
            wrapped_key: wrapped_key.to_vec(),
            kek_id: kek_id.to_string(),
            version: 1,
            active: true,
            created_at: now,
            updated_at: now,
        };
        t.deks.insert(id, dek.clone());
        Ok(dek)
    }

    fn update_dek(&self, dek: &DekRecord) -> Result<()> {
        let mut t = self.tables.write().unwrap();
        if !t.deks.contains_key(&dek.id) {
            return Err(ErrorKind::not_found(format!("dek {}", dek.id)));
        }
        t.deks.insert(dek.id, dek.clone());
        Ok(())
    }

    fn get_dek(&self, id: DekId) -> Result<Option<DekRecord>> {
        Ok(self.tables.read().unwrap().deks.get(&id).cloned())
    }

    fn list_deks(&self) -> Result<Vec<DekRecord>> {
        Ok(self.tables.read().unwrap().deks.values().cloned().collect())
    }

    fn delete_dek(&self, id: DekId) -> Result<()> {
        self.tables.write().unwrap().deks.remove(&id);
        Ok(())
    }

    fn insert_secret(&self, secret: &SecretRecord) -> Result<()> {
        let mut t = self.tables.write().unwrap();
        if t.secrets.values().any(|s| s.name == secret.name) {
            return Err(ErrorKind::conflict(format!("secret name '{}' already exists", secret.name)));
        }
        t.secrets.insert(secret.id, secret.clone());
        Ok(())
    }

    fn update_secret(&self, secret: &SecretRecord) -> Result<()> {
        let mut t = self.tables.write().unwrap();
        if !t.secrets.contains_key(&secret.id) {
            return Err(ErrorKind::not_found(format!("secret {}", secret.id)));
        }
        if t.secrets.values().any(|s| s.name == secret.name && s.id != secret.id) {
            return Err(ErrorKind::conflict(format!("secret name '{}' already exists", secret.name)));
        }
        t.secrets.insert(secret.id, secret.clone());
        Ok(())
    }

    fn get_secret(&self, id: &Uuid) -> Result<Option<SecretRecord>> {
        Ok(self.tables.read().unwrap().secrets.get(id).cloned())
    }

    fn find_secret_by_name(&self, name: &str) -> Result<Option<SecretRecord>> {
        let t = self.tables.read().unwrap();
        Ok(t.secrets.values().find(|s| s.name == name).cloned())
    }

    fn list_secrets(&self) -> Result<Vec<SecretRecord>> {
        Ok(self.tables.read().unwrap().secrets.values().cloned().collect())
    }

    fn list_secrets_in_folder(&self, folder_id: &Uuid) -> Result<Vec<SecretRecord>> {
        let t = self.tables.read().unwrap();
        Ok(t.secrets
            .values()
            .filter(|s| s.folder_id.as_ref() == Some(folder_id))
            .cloned()
            .collect())
    }

    fn delete_secret(&self, id: &Uuid) -> Result<()> {
        self.tables.write().unwrap().secrets.remove(id);
        Ok(())
    }

    fn count_secrets_for_dek(&self, dek_id: DekId) -> Result<usize> {
        let t = self.tables.read().unwrap();
        Ok(t.secrets.values().filter(|s| s.dek_id == dek_id).count())
    }

    fn insert_folder(&self, folder: &FolderRecord) -> Result<()> {
        let mut t = self.tables.write().unwrap();
        if t.folders
            .values()
            .any(|f| f.name == folder.name && f.parent_id == folder.parent_id)
        {
            return Err(ErrorKind::conflict(format!(
                "folder name '{}' already exists under this parent",
                folder.name
            )));
        }
        t.folders.insert(folder.id, folder.clone());
        Ok(())
    }

    fn update_folder(&self, folder: &FolderRecord) -> Result<()> {
        let mut t = self.tables.write().unwrap();
        if !t.folders.contains_key(&folder.id) {
            return Err(ErrorKind::not_found(format!("folder {}", folder.id)));
        }
        if t.folders
            .values()
            .any(|f| f.name == folder.name && f.parent_id == folder.parent_id && f.id != folder.id)
        {
            return Err(ErrorKind::conflict(format!(
                "folder name '{}' already exists under this parent",
                folder.name
            )));
        }
        t.folders.insert(folder.id, folder.clone());
        Ok(())
    }

    fn get_folder(&self, id: &Uuid) -> Result<Option<FolderRecord>> {
        Ok(self.tables.read().unwrap().folders.get(id).cloned())
    }

    fn find_folder(&self, name: &str, parent_id: Option<&Uuid>) -> Result<Option<FolderRecord>> {
        let t = self.tables.read().unwrap();
        Ok(t.folders
            .values()
            .find(|f| f.name == name && f.parent_id.as_ref() == parent_id)
            .cloned())
    }

    fn list_folders(&self) -> Result<Vec<FolderRecord>> {
        Ok(self.tables.read().unwrap().folders.values().cloned().collect())
    }

    fn list_child_folders(&self, parent_id: &Uuid) -> Result<Vec<FolderRecord>> {
        let t = self.tables.read().unwrap();
        Ok(t.folders
            .values()
            .filter(|f| f.parent_id.as_ref() == Some(parent_id))
            .cloned()
            .collect())
    }

    fn delete_folder(&self, id: &Uuid) -> Result<()> {
        self.tables.write().unwrap().folders.remove(id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File store
// ---------------------------------------------------------------------------

/// File-based storage (one JSON document per record).
///
/// Directory layout:
/// ```text
/// data/
///   clients/{uuid}.json
///   deks/{id}.json
///   secrets/{uuid}.json
///   folders/{uuid}.json
/// ```
pub struct FileStore {
    root: PathBuf,
    /// Serializes DEK id assignment.
    dek_create: Mutex<()>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for sub in ["clients", "deks", "secrets", "folders"] {
            std::fs::create_dir_all(root.join(sub))
                .map_err(|e| ErrorKind::storage(format!("create dir {}: {}", sub, e)))?;
        }
        Ok(Self {
            root,
            dek_create: Mutex::new(()),
        })
    }

    fn write_doc<T: serde::Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| ErrorKind::storage(format!("serialize: {}", e)))?;
        // Atomic write: write to temp, then rename
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &json).map_err(|e| ErrorKind::storage(format!("write: {}", e)))?;
        std::fs::rename(&tmp, path).map_err(|e| ErrorKind::storage(format!("rename: {}", e)))?;
        Ok(())
    }

    fn read_doc<T: serde::de::DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(path)
            .map_err(|e| ErrorKind::storage(format!("read: {}", e)))?;
        serde_json::from_str(&data)
            .map(Some)
            .map_err(|e| ErrorKind::storage(format!("parse {}: {}", path.display(), e)))
    }

    fn read_all<T: serde::de::DeserializeOwned>(&self, sub: &str) -> Result<Vec<T>> {
        let dir = self.root.join(sub);
        let mut out = Vec::new();
        let entries =
            std::fs::read_dir(&dir).map_err(|e| ErrorKind::storage(format!("readdir: {}", e)))?;
        for entry in entries {
            let entry = entry.map_err(|e| ErrorKind::storage(format!("entry: {}", e)))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(doc) = self.read_doc(&path)? {
                    out.push(doc);
                }
            }
        }
        Ok(out)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path).map_err(|e| ErrorKind::storage(format!("delete: {}", e)))?;
        }
        Ok(())
    }

    fn client_path(&self, id: &Uuid) -> PathBuf {
        self.root.join("clients").join(format!("{}.json", id))
    }

    fn dek_path(&self, id: DekId) -> PathBuf {
        self.root.join("deks").join(format!("{}.json", id))
    }

    fn secret_path(&self, id: &Uuid) -> PathBuf {
        self.root.join("secrets").join(format!("{}.json", id))
    }

    fn folder_path(&self, id: &Uuid) -> PathBuf {
        self.root.join("folders").join(format!("{}.json", id))
    }
}

impl DurableStore for FileStore {
    fn insert_client(&self, client: &ClientRecord) -> Result<()> {
        if self.find_client_by_name(&client.name)?.is_some() {
            return Err(ErrorKind::conflict(format!("client name '{}' already exists", client.name)));
        }
        self.write_doc(&self.client_path(&client.id), client)
    }

    fn update_client(&self, client: &ClientRecord) -> Result<()> {
        if !self.client_path(&client.id).exists() {
            return Err(ErrorKind::not_found(format!("client {}", client.id)));
        }
        self.write_doc(&self.client_path(&client.id), client)
    }

    fn get_client(&self, id: &Uuid) -> Result<Option<ClientRecord>> {
        self.read_doc(&self.client_path(id))
    }

    fn find_client_by_name(&self, name: &str) -> Result<Option<ClientRecord>> {
        Ok(self
            .read_all::<ClientRecord>("clients")?
            .into_iter()
            .find(|c| c.name == name))
    }

    fn list_clients(&self) -> Result<Vec<ClientRecord>> {
        self.read_all("clients")
    }

    fn client_count(&self) -> Result<usize> {
        Ok(self.read_all::<ClientRecord>("clients")?.len())
    }

    fn create_dek(&self, name: &str, wrapped_key: &[u8], kek_id: &str) -> Result<DekRecord> {
        let _guard = self.dek_create.lock().unwrap();
        let existing = self.list_deks()?;
        if existing.iter().any(|d| d.name == name) {
            return Err(ErrorKind::conflict(format!("dek name '{}' already exists", name)));
        }
        let id = existing.iter().map(|d| d.id).max().unwrap_or(0) + 1;
        let now = Utc::now();
        let dek = DekRecord {
            id,
            name: name.to_string(),
            wrapped_key: wrapped_key.to_vec(),
            kek_id: kek_id.to_string(),
            version: 1,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.write_doc(&self.dek_path(id), &dek)?;
        Ok(dek)
    }

    fn update_dek(&self, dek: &DekRecord) -> Result<()> {
        if !self.dek_path(dek.id).exists() {
            return Err(ErrorKind::not_found(format!("dek {}", dek.id)));
        }
        self.write_doc(&self.dek_path(dek.id), dek)
    }

    fn get_dek(&self, id: DekId) -> Result<Option<DekRecord>> {
        self.read_doc(&self.dek_path(id))
    }

    fn list_deks(&self) -> Result<Vec<DekRecord>> {
        let mut deks = self.read_all::<DekRecord>("deks")?;
        deks.sort_by_key(|d| d.id);
        Ok(deks)
    }

    fn delete_dek(&self, id: DekId) -> Result<()> {
        self.remove(&self.dek_path(id))
    }

    fn insert_secret(&self, secret: &SecretRecord) -> Result<()> {
        if self.find_secret_by_name(&secret.name)?.is_some() {
            return Err(ErrorKind::conflict(format!("secret name '{}' already exists", secret.name)));
        }
        self.write_doc(&self.secret_path(&secret.id), secret)
    }

    fn update_secret(&self, secret: &SecretRecord) -> Result<()> {
        if !self.secret_path(&secret.id).exists() {
            return Err(ErrorKind::not_found(format!("secret {}", secret.id)));
        }
        if let Some(other) = self.find_secret_by_name(&secret.name)? {
            if other.id != secret.id {
                return Err(ErrorKind::conflict(format!("secret name '{}' already exists", secret.name)));
            }
        }
        self.write_doc(&self.secret_path(&secret.id), secret)
    }

    fn get_secret(&self, id: &Uuid) -> Result<Option<SecretRecord>> {
        self.read_doc(&self.secret_path(id))
    }

    fn find_secret_by_name(&self, name: &str) -> Result<Option<SecretRecord>> {
        Ok(self
            .read_all::<SecretRecord>("secrets")?
            .into_iter()
            .find(|s| s.name == name))
    }

    fn list_secrets(&self) -> Result<Vec<SecretRecord>> {
        self.read_all("secrets")
    }

    fn list_secrets_in_folder(&self, folder_id: &Uuid) -> Result<Vec<SecretRecord>> {
        Ok(self
            .read_all::<SecretRecord>("secrets")?
            .into_iter()
            .filter(|s| s.folder_id.as_ref() == Some(folder_id))
            .collect())
    }

    fn delete_secret(&self, id: &Uuid) -> Result<()> {
        self.remove(&self.secret_path(id))
    }

    fn count_secrets_for_dek(&self, dek_id: DekId) -> Result<usize> {
        Ok(self
            .read_all::<SecretRecord>("secrets")?
            .iter()
            .filter(|s| s.dek_id == dek_id)
            .count())
    }

    fn insert_folder(&self, folder: &FolderRecord) -> Result<()> {
        if self.find_folder(&folder.name, folder.parent_id.as_ref())?.is_some() {
            return Err(ErrorKind::conflict(format!(
                "folder name '{}' already exists under this parent",
                folder.name
            )));
        }
        self.write_doc(&self.folder_path(&folder.id), folder)
    }

    fn update_folder(&self, folder: &FolderRecord) -> Result<()> {
        if !self.folder_path(&folder.id).exists() {
            return Err(ErrorKind::not_found(format!("folder {}", folder.id)));
        }
        if let Some(other) = self.find_folder(&folder.name, folder.parent_id.as_ref())? {
            if other.id != folder.id {
                return Err(ErrorKind::conflict(format!(
                    "folder name '{}' already exists under this parent",
                    folder.name
                )));
            }
        }
        self.write_doc(&self.folder_path(&folder.id), folder)
    }

    fn get_folder(&self, id: &Uuid) -> Result<Option<FolderRecord>> {
        self.read_doc(&self.folder_path(id))
    }

    fn find_folder(&self, name: &str, parent_id: Option<&Uuid>) -> Result<Option<FolderRecord>> {
        Ok(self
            .read_all::<FolderRecord>("folders")?
            .into_iter()
            .find(|f| f.name == name && f.parent_id.as_ref() == parent_id))
    }

    fn list_folders(&self) -> Result<Vec<FolderRecord>> {
        self.read_all("folders")
    }

    fn list_child_folders(&self, parent_id: &Uuid) -> Result<Vec<FolderRecord>> {
        Ok(self
            .read_all::<FolderRecord>("folders")?
            .into_iter()
            .filter(|f| f.parent_id.as_ref() == Some(parent_id))
            .collect())
    }

    fn delete_folder(&self, id: &Uuid) -> Result<()> {
        self.remove(&self.folder_path(id))
    }
}
