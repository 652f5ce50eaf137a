//! Native object-store backend
//!
//! Object stores have no directories. A directory exists when its zero-length
//! marker object (key ending in `/`) exists; its content is every key sharing
//! the marker as prefix.
//!
//! Multi-key transfers are best effort: every destination is checked first,
//! then every key is copied, and sources are deleted only after all copies
//! succeeded. A failure part-way leaves the keys copied so far in place.

use log::{debug, error};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::backend::{
    StorageBackend, StorageKind, TransferMode, check_not_nested, logged, logged_value,
};
use crate::capability::ObjectStore;
use crate::error::StorageError;
use crate::path::{PathKind, PathResolver, SanitizeMode};

/// Storage on an [`ObjectStore`] capability.
pub struct NativeObjectStore<S: ObjectStore> {
    store: S,
    resolver: Option<PathResolver>,
}

impl<S: ObjectStore> NativeObjectStore<S> {
    /// Opens the store under `root_path`.
    ///
    /// Never fails; if the root is malformed or the bucket cannot be reached
    /// the instance stays uninitialized.
    pub fn new(store: S, root_path: &str) -> Self {
        let resolver = PathResolver::new(root_path)
            .map_err(|e| StorageError::Initialization(e.to_string()))
            .and_then(|resolver| store.check().map(|_| resolver));

        match resolver {
            Ok(resolver) => {
                debug!("Storage S3NATIVE initialized at {}", resolver.root());
                Self {
                    store,
                    resolver: Some(resolver),
                }
            }
            Err(e) => {
                error!("{}", e);
                Self {
                    store,
                    resolver: None,
                }
            }
        }
    }

    /// The underlying capability.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn ready(&self) -> Result<&PathResolver, StorageError> {
        self.resolver.as_ref().ok_or(StorageError::NotReady)
    }

    fn virtual_of(&self, full: &str) -> String {
        self.resolver
            .as_ref()
            .map(|r| r.to_virtual(full))
            .unwrap_or_else(|| full.to_string())
    }

    /// The configured root always counts as an existing directory.
    fn dir_exists(&self, full: &str) -> Result<bool, StorageError> {
        if self.ready()?.is_root(full) {
            return Ok(true);
        }
        self.store
            .exists(&PathResolver::object_key(full, PathKind::Dir))
    }

    fn file_exists(&self, full: &str) -> Result<bool, StorageError> {
        let key = PathResolver::object_key(full, PathKind::File);
        if key.is_empty() {
            return Ok(false);
        }
        self.store.exists(&key)
    }

    fn any_exists(&self, full: &str) -> Result<bool, StorageError> {
        Ok(self.file_exists(full)? || self.dir_exists(full)?)
    }

    fn require_parent(&self, full: &str) -> Result<(), StorageError> {
        let parent = PathResolver::parent(full);
        if !self.dir_exists(&parent)? {
            return Err(StorageError::NotFound(format!(
                "parent folder not found: {}",
                self.virtual_of(&parent)
            )));
        }
        Ok(())
    }

    fn require_free(&self, full: &str) -> Result<(), StorageError> {
        if self.any_exists(full)? {
            return Err(StorageError::AlreadyExists(format!(
                "destination already exists: {}",
                self.virtual_of(full)
            )));
        }
        Ok(())
    }

    /// Every key of the directory at `prefix`, its marker included.
    fn tree_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = self.store.list(prefix)?;
        if !prefix.is_empty() && !keys.iter().any(|key| key == prefix) {
            keys.insert(0, prefix.to_string());
        }
        Ok(keys)
    }

    fn try_navigate(&mut self, path: &str) -> Result<(), StorageError> {
        let full = self.ready()?.resolve(path, PathKind::Dir)?;
        if !self.dir_exists(&full)? {
            return Err(StorageError::NotFound(format!(
                "directory not found: {}",
                self.virtual_of(&full)
            )));
        }
        let resolver = self.resolver.as_mut().ok_or(StorageError::NotReady)?;
        resolver.set_cwd(&full);
        Ok(())
    }

    fn try_list(&self, path: &str) -> Result<Vec<String>, StorageError> {
        let full = self.ready()?.resolve(path, PathKind::Dir)?;
        if !self.dir_exists(&full)? {
            return Err(StorageError::NotFound(format!(
                "folder not found: {}",
                self.virtual_of(&full)
            )));
        }
        let prefix = PathResolver::object_key(&full, PathKind::Dir);
        let children: BTreeSet<String> = self
            .store
            .list(&prefix)?
            .iter()
            .filter_map(|key| key.strip_prefix(prefix.as_str()))
            .filter_map(|rest| rest.split('/').next())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        Ok(children.into_iter().collect())
    }

    fn try_exists(&self, path: &str) -> Result<bool, StorageError> {
        let full = self.ready()?.resolve(path, PathKind::Dir)?;
        self.any_exists(&full)
    }

    fn try_make_dir(&self, path: &str) -> Result<(), StorageError> {
        let full = self.ready()?.resolve_folder(path, SanitizeMode::Object)?;
        if self.any_exists(&full)? {
            return Err(StorageError::AlreadyExists(format!(
                "directory already exists: {}",
                self.virtual_of(&full)
            )));
        }
        self.require_parent(&full)?;
        let key = PathResolver::object_key(&full, PathKind::Dir);
        self.store.put(&key, Vec::new())?;
        if !self.store.exists(&key)? {
            return Err(StorageError::Transport("directory check failed".into()));
        }
        Ok(())
    }

    fn store_new_file(&self, full: &str, data: Vec<u8>) -> Result<(), StorageError> {
        self.require_free(full)?;
        self.require_parent(full)?;
        let key = PathResolver::object_key(full, PathKind::File);
        self.store.put(&key, data)?;
        if !self.store.exists(&key)? {
            return Err(StorageError::Transport("destination file check failed".into()));
        }
        Ok(())
    }

    fn read_file(&self, full: &str) -> Result<Vec<u8>, StorageError> {
        if !self.file_exists(full)? {
            return Err(StorageError::NotFound(format!(
                "file not found: {}",
                self.virtual_of(full)
            )));
        }
        self.store
            .get(&PathResolver::object_key(full, PathKind::File))
    }

    fn try_upload(&self, source: &Path, dest: &str) -> Result<(), StorageError> {
        let full = self.ready()?.resolve_file(dest, SanitizeMode::Object)?;
        if !source.is_file() {
            return Err(StorageError::NotFound(format!(
                "source file not found: {}",
                source.display()
            )));
        }
        let data = fs::read(source)?;
        self.store_new_file(&full, data)
    }

    fn try_download(&self, source: &str, dest: &Path) -> Result<(), StorageError> {
        let full = self.ready()?.resolve_file(source, SanitizeMode::Object)?;
        if !self.file_exists(&full)? {
            return Err(StorageError::NotFound(format!(
                "source file not found: {}",
                self.virtual_of(&full)
            )));
        }
        if dest.exists() {
            return Err(StorageError::AlreadyExists(format!(
                "destination already exists: {}",
                dest.display()
            )));
        }
        let data = self.read_file(&full)?;
        fs::write(dest, data)?;
        if !dest.is_file() {
            return Err(StorageError::Transport("destination file check failed".into()));
        }
        Ok(())
    }

    fn try_remove(&self, path: &str) -> Result<(), StorageError> {
        let full = self.ready()?.resolve(path, PathKind::Dir)?;
        if self.ready()?.is_root(&full) {
            return Err(StorageError::Path("the root cannot be removed".into()));
        }
        let file_key = PathResolver::object_key(&full, PathKind::File);
        let dir_key = PathResolver::object_key(&full, PathKind::Dir);

        if self.store.exists(&file_key)? {
            self.store.delete(&file_key)?;
        } else if self.store.exists(&dir_key)? {
            for key in self.tree_keys(&dir_key)? {
                self.store.delete(&key)?;
            }
        } else {
            return Err(StorageError::NotFound(format!(
                "file/folder not found: {}",
                self.virtual_of(&full)
            )));
        }

        if self.any_exists(&full)? {
            return Err(StorageError::Transport("file/folder still exists".into()));
        }
        Ok(())
    }

    fn try_size(&self, path: &str) -> Result<u64, StorageError> {
        let full = self.ready()?.resolve(path, PathKind::Dir)?;
        if self.file_exists(&full)? {
            return self
                .store
                .size(&PathResolver::object_key(&full, PathKind::File));
        }
        if !self.dir_exists(&full)? {
            return Err(StorageError::NotFound(format!(
                "file/folder not found: {}",
                self.virtual_of(&full)
            )));
        }
        let mut total = 0;
        for key in self
            .store
            .list(&PathResolver::object_key(&full, PathKind::Dir))?
        {
            total += self.store.size(&key)?;
        }
        Ok(total)
    }

    fn try_transfer(&self, mode: TransferMode, source: &str, dest: &str) -> Result<(), StorageError> {
        let resolver = self.ready()?;
        let source_full = resolver.resolve(source, PathKind::Dir)?;
        let dest_full = resolver.resolve_file(dest, SanitizeMode::Object)?;

        if resolver.is_root(&source_full) {
            return Err(StorageError::Path("the root cannot be transferred".into()));
        }
        if mode == TransferMode::Rename
            && PathResolver::parent(&source_full) != PathResolver::parent(&dest_full)
        {
            return Err(StorageError::Path("different parent directories".into()));
        }
        check_not_nested(&source_full, &dest_full)?;

        let pairs = if self.file_exists(&source_full)? {
            vec![(
                PathResolver::object_key(&source_full, PathKind::File),
                PathResolver::object_key(&dest_full, PathKind::File),
            )]
        } else if self.dir_exists(&source_full)? {
            let source_prefix = PathResolver::object_key(&source_full, PathKind::Dir);
            let dest_prefix = PathResolver::object_key(&dest_full, PathKind::Dir);
            self.tree_keys(&source_prefix)?
                .into_iter()
                .filter_map(|key| {
                    let rest = key.strip_prefix(source_prefix.as_str())?.to_string();
                    Some((key, format!("{}{}", dest_prefix, rest)))
                })
                .collect()
        } else {
            return Err(StorageError::NotFound(format!(
                "source file/folder not found: {}",
                resolver.to_virtual(&source_full)
            )));
        };

        self.require_free(&dest_full)?;
        self.require_parent(&dest_full)?;
        for (_, to) in &pairs {
            if self.store.exists(to)? {
                return Err(StorageError::AlreadyExists(format!(
                    "destination already exists: {}",
                    to
                )));
            }
        }

        for (from, to) in &pairs {
            let copied = if to.ends_with('/') {
                self.store.put(to, Vec::new())
            } else {
                self.store.copy(from, to)
            };
            copied.map_err(|e| {
                StorageError::Transport(format!("copy {} -> {} failed: {}", from, to, e))
            })?;
        }
        if mode.removes_source() {
            for (from, _) in &pairs {
                self.store.delete(from).map_err(|e| {
                    StorageError::Transport(format!("delete {} failed: {}", from, e))
                })?;
            }
        }

        if !self.any_exists(&dest_full)? {
            return Err(StorageError::Transport("destination check failed".into()));
        }
        if self.any_exists(&source_full)? == mode.removes_source() {
            return Err(StorageError::Transport("source check failed".into()));
        }
        Ok(())
    }

    fn try_append(&self, path: &str, content: &[u8]) -> Result<(), StorageError> {
        let full = self.ready()?.resolve_file(path, SanitizeMode::Object)?;
        let mut data = self.read_file(&full)?;
        data.extend_from_slice(content);
        self.store
            .put(&PathResolver::object_key(&full, PathKind::File), data)
    }
}

impl<S: ObjectStore> StorageBackend for NativeObjectStore<S> {
    fn initialized(&self) -> bool {
        self.resolver.is_some()
    }

    fn get_type(&self) -> Result<StorageKind, StorageError> {
        let result = self.ready().map(|_| StorageKind::S3Native);
        logged_value("get_type", "", result)
    }

    fn navigate(&mut self, path: &str) -> Result<(), StorageError> {
        let result = self.try_navigate(path);
        logged("cd", path, result)
    }

    fn pwd(&self) -> Result<String, StorageError> {
        let result = self.ready().map(|r| r.cwd().to_string());
        logged_value("pwd", "", result)
    }

    fn list(&self, path: &str) -> Result<Vec<String>, StorageError> {
        logged_value("ls", path, self.try_list(path))
    }

    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        logged_value("exists", path, self.try_exists(path))
    }

    fn make_dir(&self, path: &str) -> Result<(), StorageError> {
        logged("mkdir", path, self.try_make_dir(path))
    }

    fn upload(&self, source: &Path, dest: &str) -> Result<(), StorageError> {
        logged("upload", dest, self.try_upload(source, dest))
    }

    fn download(&self, source: &str, dest: &Path) -> Result<(), StorageError> {
        logged("download", source, self.try_download(source, dest))
    }

    fn remove(&self, path: &str) -> Result<(), StorageError> {
        logged("rm", path, self.try_remove(path))
    }

    fn size(&self, path: &str) -> Result<u64, StorageError> {
        logged_value("size", path, self.try_size(path))
    }

    fn upload_bytes(&self, data: &[u8], path: &str) -> Result<(), StorageError> {
        let result = self
            .ready()
            .and_then(|r| r.resolve_file(path, SanitizeMode::Object))
            .and_then(|full| self.store_new_file(&full, data.to_vec()));
        logged("upload_from_memory", path, result)
    }

    fn download_bytes(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let result = self
            .ready()
            .and_then(|r| r.resolve_file(path, SanitizeMode::Object))
            .and_then(|full| self.read_file(&full));
        logged("download_to_memory", path, result)
    }

    fn rename(&self, source: &str, dest: &str) -> Result<(), StorageError> {
        let result = self.try_transfer(TransferMode::Rename, source, dest);
        logged(TransferMode::Rename.op_name(), &format!("{} --> {}", source, dest), result)
    }

    fn move_path(&self, source: &str, dest: &str) -> Result<(), StorageError> {
        let result = self.try_transfer(TransferMode::Move, source, dest);
        logged(TransferMode::Move.op_name(), &format!("{} --> {}", source, dest), result)
    }

    fn copy(&self, source: &str, dest: &str) -> Result<(), StorageError> {
        let result = self.try_transfer(TransferMode::Copy, source, dest);
        logged(TransferMode::Copy.op_name(), &format!("{} --> {}", source, dest), result)
    }

    fn append(&self, path: &str, content: &[u8]) -> Result<(), StorageError> {
        logged("append", path, self.try_append(path, content))
    }
}
