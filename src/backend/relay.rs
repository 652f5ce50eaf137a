//! Relay-backed object-store backend
//!
//! Every operation becomes one request to an HTTP relay that owns the bucket.
//! Keys follow the native backend's layout: no leading slash, directory
//! markers end with `/`. The relay answers `OK!` to mutations it performed.

use log::{debug, error};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::backend::{
    StorageBackend, StorageKind, TransferMode, check_not_nested, logged, logged_value,
};
use crate::capability::{RelayEndpoint, RelayTransport};
use crate::error::StorageError;
use crate::path::{PathKind, PathResolver, SanitizeMode};

const PROBE_OK: &str = "200";
const CALL_OK: &[u8] = b"OK!";

#[derive(Debug, Deserialize)]
struct Listing {
    ls: Vec<String>,
}

/// Storage on a bucket reached through a relay service.
pub struct RelayObjectStore<T: RelayTransport> {
    transport: T,
    secret_key: String,
    resolver: PathResolver,
}

impl<T: RelayTransport> RelayObjectStore<T> {
    /// Probes the relay and opens the store under `root_path`.
    ///
    /// Unlike the other backends this fails outright when the relay does not
    /// answer the probe with `200`.
    pub fn connect(transport: T, secret_key: &str, root_path: &str) -> Result<Self, StorageError> {
        let result = Self::init(transport, secret_key, root_path);
        match &result {
            Ok(store) => debug!("Storage S3RELAY initialized at {}", store.resolver.root()),
            Err(e) => error!("{}", e),
        }
        result
    }

    fn init(transport: T, secret_key: &str, root_path: &str) -> Result<Self, StorageError> {
        let resolver = PathResolver::new(root_path)
            .map_err(|e| StorageError::Initialization(e.to_string()))?;
        let body = transport
            .probe()
            .map_err(|e| StorageError::Initialization(format!("relay not reachable: {}", e)))?;
        if body.trim() != PROBE_OK {
            return Err(StorageError::Initialization(format!(
                "unexpected relay probe answer: {:?}",
                body
            )));
        }
        Ok(Self {
            transport,
            secret_key: secret_key.to_string(),
            resolver,
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn request(
        &self,
        endpoint: RelayEndpoint,
        fields: &[(&str, &str)],
        file: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, StorageError> {
        let mut form = Vec::with_capacity(fields.len() + 1);
        form.extend_from_slice(fields);
        form.push(("secret_key", self.secret_key.as_str()));
        self.transport.call(endpoint, &form, file)
    }

    /// Runs a mutating call and checks the relay confirmed it.
    fn mutate(
        &self,
        endpoint: RelayEndpoint,
        fields: &[(&str, &str)],
        file: Option<Vec<u8>>,
    ) -> Result<(), StorageError> {
        let body = self.request(endpoint, fields, file)?;
        if body != CALL_OK {
            return Err(StorageError::Transport(format!(
                "relay {} call failed: {}",
                endpoint.path(),
                String::from_utf8_lossy(&body)
            )));
        }
        Ok(())
    }

    fn key_exists(&self, key: &str) -> Result<bool, StorageError> {
        if key.is_empty() {
            return Ok(true);
        }
        let body = self.request(RelayEndpoint::Exists, &[("key", key)], None)?;
        match String::from_utf8_lossy(&body).trim() {
            "True" | "true" => Ok(true),
            "False" | "false" => Ok(false),
            other => Err(StorageError::Transport(format!(
                "unexpected exists answer: {:?}",
                other
            ))),
        }
    }

    fn file_exists(&self, full: &str) -> Result<bool, StorageError> {
        let key = PathResolver::object_key(full, PathKind::File);
        if key.is_empty() {
            return Ok(false);
        }
        self.key_exists(&key)
    }

    fn dir_exists(&self, full: &str) -> Result<bool, StorageError> {
        if self.resolver.is_root(full) {
            return Ok(true);
        }
        self.key_exists(&PathResolver::object_key(full, PathKind::Dir))
    }

    fn any_exists(&self, full: &str) -> Result<bool, StorageError> {
        Ok(self.file_exists(full)? || self.dir_exists(full)?)
    }

    fn require_parent(&self, full: &str) -> Result<(), StorageError> {
        let parent = PathResolver::parent(full);
        if !self.dir_exists(&parent)? {
            return Err(StorageError::NotFound(format!(
                "parent folder not found: {}",
                self.resolver.to_virtual(&parent)
            )));
        }
        Ok(())
    }

    /// Key of an existing file or directory, or `NotFound`.
    fn existing_key(&self, full: &str) -> Result<String, StorageError> {
        if self.file_exists(full)? {
            return Ok(PathResolver::object_key(full, PathKind::File));
        }
        if self.dir_exists(full)? {
            return Ok(PathResolver::object_key(full, PathKind::Dir));
        }
        Err(StorageError::NotFound(format!(
            "file/folder not found: {}",
            self.resolver.to_virtual(full)
        )))
    }

    fn try_navigate(&mut self, path: &str) -> Result<(), StorageError> {
        let full = self.resolver.resolve(path, PathKind::Dir)?;
        if !self.dir_exists(&full)? {
            return Err(StorageError::NotFound(format!(
                "directory not found: {}",
                self.resolver.to_virtual(&full)
            )));
        }
        self.resolver.set_cwd(&full);
        Ok(())
    }

    fn try_list(&self, path: &str) -> Result<Vec<String>, StorageError> {
        let full = self.resolver.resolve(path, PathKind::Dir)?;
        if !self.dir_exists(&full)? {
            return Err(StorageError::NotFound(format!(
                "folder not found: {}",
                self.resolver.to_virtual(&full)
            )));
        }
        let key = PathResolver::object_key(&full, PathKind::Dir);
        let body = self.request(RelayEndpoint::List, &[("key", key.as_str())], None)?;
        let listing: Listing = serde_json::from_slice(&body)?;

        let mut names: Vec<String> = listing
            .ls
            .iter()
            .map(|name| name.trim_matches('/').to_string())
            .filter(|name| !name.is_empty())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn try_exists(&self, path: &str) -> Result<bool, StorageError> {
        let full = self.resolver.resolve(path, PathKind::Dir)?;
        self.any_exists(&full)
    }

    fn try_make_dir(&self, path: &str) -> Result<(), StorageError> {
        let full = self.resolver.resolve_folder(path, SanitizeMode::Object)?;
        if self.any_exists(&full)? {
            return Err(StorageError::AlreadyExists(format!(
                "directory already exists: {}",
                self.resolver.to_virtual(&full)
            )));
        }
        self.require_parent(&full)?;
        let key = PathResolver::object_key(&full, PathKind::Dir);
        self.mutate(RelayEndpoint::MakeDir, &[("key", key.as_str())], None)?;
        if !self.key_exists(&key)? {
            return Err(StorageError::Transport("directory check failed".into()));
        }
        Ok(())
    }

    fn store_new_file(&self, full: &str, data: Vec<u8>) -> Result<(), StorageError> {
        if self.any_exists(full)? {
            return Err(StorageError::AlreadyExists(format!(
                "destination already exists: {}",
                self.resolver.to_virtual(full)
            )));
        }
        self.require_parent(full)?;
        let key = PathResolver::object_key(full, PathKind::File);
        self.mutate(RelayEndpoint::Upload, &[("key", key.as_str())], Some(data))?;
        if !self.key_exists(&key)? {
            return Err(StorageError::Transport("destination file check failed".into()));
        }
        Ok(())
    }

    fn fetch_file(&self, full: &str) -> Result<Vec<u8>, StorageError> {
        if !self.file_exists(full)? {
            return Err(StorageError::NotFound(format!(
                "file not found: {}",
                self.resolver.to_virtual(full)
            )));
        }
        let key = PathResolver::object_key(full, PathKind::File);
        self.request(RelayEndpoint::Download, &[("key", key.as_str())], None)
    }

    fn try_upload(&self, source: &Path, dest: &str) -> Result<(), StorageError> {
        let full = self.resolver.resolve_file(dest, SanitizeMode::Object)?;
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
        let full = self.resolver.resolve_file(source, SanitizeMode::Object)?;
        if dest.exists() {
            return Err(StorageError::AlreadyExists(format!(
                "destination already exists: {}",
                dest.display()
            )));
        }
        let data = self.fetch_file(&full)?;
        fs::write(dest, data)?;
        if !dest.is_file() {
            return Err(StorageError::Transport("destination file check failed".into()));
        }
        Ok(())
    }

    fn try_remove(&self, path: &str) -> Result<(), StorageError> {
        let full = self.resolver.resolve(path, PathKind::Dir)?;
        if self.resolver.is_root(&full) {
            return Err(StorageError::Path("the root cannot be removed".into()));
        }
        let key = self.existing_key(&full)?;
        self.mutate(RelayEndpoint::Remove, &[("key", key.as_str())], None)?;
        if self.any_exists(&full)? {
            return Err(StorageError::Transport("file/folder still exists".into()));
        }
        Ok(())
    }

    fn try_size(&self, path: &str) -> Result<u64, StorageError> {
        let full = self.resolver.resolve(path, PathKind::Dir)?;
        let key = self.existing_key(&full)?;
        let body = self.request(RelayEndpoint::Size, &[("key", key.as_str())], None)?;
        String::from_utf8_lossy(&body)
            .trim()
            .parse::<u64>()
            .map_err(|e| StorageError::Transport(format!("wrong size answer: {}", e)))
    }

    fn try_transfer(&self, mode: TransferMode, source: &str, dest: &str) -> Result<(), StorageError> {
        let source_full = self.resolver.resolve(source, PathKind::Dir)?;
        let dest_full = self.resolver.resolve_file(dest, SanitizeMode::Object)?;

        if self.resolver.is_root(&source_full) {
            return Err(StorageError::Path("the root cannot be transferred".into()));
        }
        if mode == TransferMode::Rename
            && PathResolver::parent(&source_full) != PathResolver::parent(&dest_full)
        {
            return Err(StorageError::Path("different parent directories".into()));
        }
        check_not_nested(&source_full, &dest_full)?;

        let key_old = self.existing_key(&source_full)?;
        if self.any_exists(&dest_full)? {
            return Err(StorageError::AlreadyExists(format!(
                "destination already exists: {}",
                self.resolver.to_virtual(&dest_full)
            )));
        }
        self.require_parent(&dest_full)?;

        let kind = if key_old.ends_with('/') {
            PathKind::Dir
        } else {
            PathKind::File
        };
        let key_new = PathResolver::object_key(&dest_full, kind);
        let endpoint = match mode {
            TransferMode::Rename => RelayEndpoint::Rename,
            TransferMode::Move => RelayEndpoint::Move,
            TransferMode::Copy => RelayEndpoint::Copy,
        };
        self.mutate(
            endpoint,
            &[("key_old", key_old.as_str()), ("key_new", key_new.as_str())],
            None,
        )?;

        if !self.any_exists(&dest_full)? {
            return Err(StorageError::Transport("destination check failed".into()));
        }
        if self.any_exists(&source_full)? == mode.removes_source() {
            return Err(StorageError::Transport("source check failed".into()));
        }
        Ok(())
    }
}

impl<T: RelayTransport> StorageBackend for RelayObjectStore<T> {
    fn initialized(&self) -> bool {
        true
    }

    fn get_type(&self) -> Result<StorageKind, StorageError> {
        logged_value("get_type", "", Ok(StorageKind::S3Relay))
    }

    fn navigate(&mut self, path: &str) -> Result<(), StorageError> {
        let result = self.try_navigate(path);
        logged("cd", path, result)
    }

    fn pwd(&self) -> Result<String, StorageError> {
        logged_value("pwd", "", Ok(self.resolver.cwd().to_string()))
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
            .resolver
            .resolve_file(path, SanitizeMode::Object)
            .and_then(|full| self.store_new_file(&full, data.to_vec()));
        logged("upload_from_memory", path, result)
    }

    fn download_bytes(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let result = self
            .resolver
            .resolve_file(path, SanitizeMode::Object)
            .and_then(|full| self.fetch_file(&full));
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

    fn append(&self, path: &str, _content: &[u8]) -> Result<(), StorageError> {
        logged("append", path, Err(StorageError::Unsupported("append")))
    }
}
