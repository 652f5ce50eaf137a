//! In-memory object store
//!
//! Ordered key map implementing [`ObjectStore`], usable wherever a real
//! bucket is not available.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::capability::object_store::ObjectStore;
use crate::error::StorageError;

/// In-memory object store.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects, markers included.
    pub fn len(&self) -> usize {
        self.objects.read().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<String, Vec<u8>>>, StorageError> {
        self.objects
            .read()
            .map_err(|_| StorageError::Transport("object map lock poisoned".into()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<String, Vec<u8>>>, StorageError> {
        self.objects
            .write()
            .map_err(|_| StorageError::Transport("object map lock poisoned".into()))
    }
}

impl ObjectStore for MemoryObjectStore {
    fn check(&self) -> Result<(), StorageError> {
        self.read().map(|_| ())
    }

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.read()?.contains_key(key))
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .read()?
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn size(&self, key: &str) -> Result<u64, StorageError> {
        self.read()?
            .get(key)
            .map(|data| data.len() as u64)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        self.write()?.insert(key.to_string(), data);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.read()?
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.write()?.remove(key);
        Ok(())
    }

    fn copy(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let mut objects = self.write()?;
        let data = objects
            .get(from)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(from.to_string()))?;
        objects.insert(to.to_string(), data);
        Ok(())
    }
}
