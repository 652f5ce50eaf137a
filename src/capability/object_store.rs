//! Object-store capability
//!
//! The minimal key/value surface the native object-store backend needs.
//! Keys never start with `/`; a key ending with `/` is a directory marker.

use crate::error::StorageError;

pub trait ObjectStore {
    /// Verifies the store (bucket) is reachable.
    fn check(&self) -> Result<(), StorageError>;

    /// True if an object with exactly this key exists.
    fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Every key below `prefix`, recursively, including markers.
    fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Size in bytes of the object at `key`.
    fn size(&self, key: &str) -> Result<u64, StorageError>;

    /// Stores `data` at `key`, replacing any previous object.
    fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError>;

    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Server-side copy of a single object.
    fn copy(&self, from: &str, to: &str) -> Result<(), StorageError>;
}
