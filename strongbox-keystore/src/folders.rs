//! Folder tree CRUD. Names are unique per parent; deletion cascades
//! recursively through sub-folders and the secrets they contain.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{ErrorKind, Result};
use crate::storage::DurableStore;
use crate::types::FolderRecord;

pub struct FolderService {
    store: Arc<dyn DurableStore>,
}

impl FolderService {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }

    pub fn create(&self, name: &str, parent_id: Option<Uuid>) -> Result<FolderRecord> {
        if let Some(parent) = &parent_id {
            if self.store.get_folder(parent)?.is_none() {
                return Err(ErrorKind::not_found(format!("folder {}", parent)));
            }
        }
        let folder = FolderRecord::new(name, parent_id);
        self.store.insert_folder(&folder)?;
        Ok(folder)
    }

    pub fn get(&self, id: &Uuid) -> Result<FolderRecord> {
        self.store
            .get_folder(id)?
            .ok_or_else(|| ErrorKind::not_found(format!("folder {}", id)))
    }

    pub fn list(&self) -> Result<Vec<FolderRecord>> {
        self.store.list_folders()
    }

    /// Rename and/or move a folder. Re-parenting onto the folder itself
    /// or one of its descendants is refused, keeping the forest acyclic.
    pub fn update(
        &self,
        id: &Uuid,
        new_name: Option<&str>,
        new_parent: Option<Option<Uuid>>,
    ) -> Result<FolderRecord> {
        let mut folder = self.get(id)?;

        if let Some(parent_id) = &new_parent {
            if let Some(parent) = parent_id {
                if self.store.get_folder(parent)?.is_none() {
                    return Err(ErrorKind::not_found(format!("folder {}", parent)));
                }
                if parent == id || self.is_descendant(parent, id)? {
                    return Err(ErrorKind::validation(
                        "cannot move a folder into itself or a descendant",
                    ));
                }
            }
            folder.parent_id = *parent_id;
        }
        if let Some(name) = new_name {
            folder.name = name.to_string();
        }
        folder.updated_at = Utc::now();
        self.store.update_folder(&folder)?;
        Ok(folder)
    }

    /// Delete a folder, its sub-folders, and every secret inside them.
    pub fn delete(&self, id: &Uuid) -> Result<()> {
        self.get(id)?;
        self.delete_subtree(id)
    }

    fn delete_subtree(&self, id: &Uuid) -> Result<()> {
        for child in self.store.list_child_folders(id)? {
            self.delete_subtree(&child.id)?;
        }
        for secret in self.store.list_secrets_in_folder(id)? {
            self.store.delete_secret(&secret.id)?;
        }
        self.store.delete_folder(id)
    }

    /// Whether `candidate` sits anywhere below `ancestor`.
    fn is_descendant(&self, candidate: &Uuid, ancestor: &Uuid) -> Result<bool> {
        let mut cursor = self.store.get_folder(candidate)?.and_then(|f| f.parent_id);
        while let Some(parent) = cursor {
            if &parent == ancestor {
                return Ok(true);
            }
            cursor = self.store.get_folder(&parent)?.and_then(|f| f.parent_id);
        }
        Ok(false)
    }
}
