//! Storage backends
//!
//! One operation set over three kinds of storage: a local directory tree, a
//! native S3 object store and an S3 store reached through an HTTP relay.

pub mod disk;
pub mod filesystem;
pub mod object;
pub mod relay;

use log::{debug, error};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::Path;

use crate::error::StorageError;

pub use disk::LocalDisk;
pub use object::NativeObjectStore;
pub use relay::RelayObjectStore;

/// Backend variant reported by [`StorageBackend::get_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Disk,
    S3Native,
    S3Relay,
}

impl StorageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageKind::Disk => "DISK",
            StorageKind::S3Native => "S3NATIVE",
            StorageKind::S3Relay => "S3RELAY",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a source is carried over to its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Move within the same parent directory.
    Rename,
    Move,
    Copy,
}

impl TransferMode {
    pub fn op_name(self) -> &'static str {
        match self {
            TransferMode::Rename => "rename",
            TransferMode::Move => "mv",
            TransferMode::Copy => "cp",
        }
    }

    /// True if the source is gone once the transfer succeeded.
    pub fn removes_source(self) -> bool {
        self != TransferMode::Copy
    }
}

/// The operation set every backend implements.
///
/// Paths are virtual: empty means the working directory, a leading `/`
/// anchors at the backend root, anything else is relative to the working
/// directory. No resolved path may leave the root.
pub trait StorageBackend {
    /// False if construction failed; every operation then fails with
    /// [`StorageError::NotReady`].
    fn initialized(&self) -> bool;

    fn get_type(&self) -> Result<StorageKind, StorageError>;

    /// Changes the working directory to an existing directory.
    fn navigate(&mut self, path: &str) -> Result<(), StorageError>;

    /// Current virtual working directory, `/` at the root.
    fn pwd(&self) -> Result<String, StorageError>;

    /// Names of the direct children of a directory, sorted.
    fn list(&self, path: &str) -> Result<Vec<String>, StorageError>;

    fn exists(&self, path: &str) -> Result<bool, StorageError>;

    fn make_dir(&self, path: &str) -> Result<(), StorageError>;

    /// Copies a local file into the backend.
    fn upload(&self, source: &Path, dest: &str) -> Result<(), StorageError>;

    /// Copies a backend file to a local path that must not exist yet.
    fn download(&self, source: &str, dest: &Path) -> Result<(), StorageError>;

    /// Deletes a file or, recursively, a directory.
    fn remove(&self, path: &str) -> Result<(), StorageError>;

    /// File size, or the recursive sum for a directory, in bytes.
    fn size(&self, path: &str) -> Result<u64, StorageError>;

    fn upload_bytes(&self, data: &[u8], path: &str) -> Result<(), StorageError>;

    fn download_bytes(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    fn rename(&self, source: &str, dest: &str) -> Result<(), StorageError>;

    fn move_path(&self, source: &str, dest: &str) -> Result<(), StorageError>;

    fn copy(&self, source: &str, dest: &str) -> Result<(), StorageError>;

    /// Appends `content` at the end of an existing file.
    fn append(&self, path: &str, content: &[u8]) -> Result<(), StorageError>;
}

/// Serialized in-memory values on top of any backend.
pub trait ValueStorage: StorageBackend {
    fn upload_value<T: Serialize>(&self, value: &T, path: &str) -> Result<(), StorageError> {
        let data = postcard::to_stdvec(value).map_err(|e| {
            error!("upload_value {} failed: {}", path, e);
            StorageError::from(e)
        })?;
        self.upload_bytes(&data, path)
    }

    fn download_value<T: DeserializeOwned>(&self, path: &str) -> Result<T, StorageError> {
        let data = self.download_bytes(path)?;
        postcard::from_bytes(&data).map_err(|e| {
            error!("download_value {} failed: {}", path, e);
            StorageError::from(e)
        })
    }
}

impl<B: StorageBackend + ?Sized> ValueStorage for B {}

/// Emits the per-operation diagnostic line and passes the result through.
pub(crate) fn logged<T>(
    op: &str,
    target: &str,
    result: Result<T, StorageError>,
) -> Result<T, StorageError> {
    match &result {
        Ok(_) => debug!("{} {}: ok", op, target),
        Err(e) => error!("{}", failure_line(op, target, e)),
    }
    result
}

/// Like [`logged`], also reporting the returned value.
pub(crate) fn logged_value<T: fmt::Debug>(
    op: &str,
    target: &str,
    result: Result<T, StorageError>,
) -> Result<T, StorageError> {
    match &result {
        Ok(value) => debug!("{} {}: {:?}", op, target, value),
        Err(e) => error!("{}", failure_line(op, target, e)),
    }
    result
}

/// `"<op> <path> failed: <cause>"`, or `"<op> failed: <cause>"` without a path.
fn failure_line(op: &str, target: &str, e: &StorageError) -> String {
    if target.is_empty() {
        format!("{} failed: {}", op, e)
    } else {
        format!("{} {} failed: {}", op, target, e)
    }
}

/// Rejects a destination equal to or nested inside its source.
pub(crate) fn check_not_nested(source: &str, dest: &str) -> Result<(), StorageError> {
    let nested = dest == source
        || dest
            .strip_prefix(source)
            .is_some_and(|rest| rest.starts_with('/'));
    if nested {
        return Err(StorageError::Path(format!(
            "cannot transfer {} into itself ({})",
            source, dest
        )));
    }
    Ok(())
}
