//! Local disk backend
//!
//! Real directories below an existing root. Paths are resolved lexically
//! first, then the closest existing ancestor is canonicalized and checked
//! again so symlinks cannot lead outside the root.

use log::{debug, error};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::backend::filesystem::{
    canonical_ancestor, copy_dir_recursive, directory_size, entry_exists,
};
use crate::backend::{
    StorageBackend, StorageKind, TransferMode, check_not_nested, logged, logged_value,
};
use crate::error::StorageError;
use crate::path::{PathKind, PathResolver, SanitizeMode};

/// Storage rooted at a local directory.
pub struct LocalDisk {
    resolver: Option<PathResolver>,
}

impl LocalDisk {
    /// Opens `root_path`, which must be absolute and an existing directory.
    ///
    /// Never fails; on a bad root the instance stays uninitialized and every
    /// operation returns [`StorageError::NotReady`].
    pub fn new(root_path: &str) -> Self {
        match Self::init(root_path) {
            Ok(resolver) => {
                debug!("Storage DISK initialized at {}", resolver.root());
                Self {
                    resolver: Some(resolver),
                }
            }
            Err(e) => {
                error!("{}", e);
                Self { resolver: None }
            }
        }
    }

    fn init(root_path: &str) -> Result<PathResolver, StorageError> {
        if !root_path.starts_with('/') {
            return Err(StorageError::Initialization(
                "root path should start with /".into(),
            ));
        }
        let canonical = Path::new(root_path).canonicalize().map_err(|e| {
            StorageError::Initialization(format!("root folder not found: {}: {}", root_path, e))
        })?;
        if !canonical.is_dir() {
            return Err(StorageError::Initialization(format!(
                "root is not a directory: {}",
                root_path
            )));
        }
        let root = canonical.to_str().ok_or_else(|| {
            StorageError::Initialization(format!("root path is not valid UTF-8: {:?}", canonical))
        })?;
        PathResolver::new(root).map_err(|e| StorageError::Initialization(e.to_string()))
    }

    fn ready(&self) -> Result<&PathResolver, StorageError> {
        self.resolver.as_ref().ok_or(StorageError::NotReady)
    }

    /// Turns a lexically contained path into a `PathBuf`, re-checking it
    /// against the canonical root.
    fn confine(&self, full: &str) -> Result<PathBuf, StorageError> {
        let resolver = self.ready()?;
        let path = PathBuf::from(full);
        let anchor = canonical_ancestor(&path)?;
        if !anchor.starts_with(resolver.root()) {
            return Err(StorageError::Path(format!(
                "impossible to go beyond the root path: {}",
                full
            )));
        }
        Ok(path)
    }

    /// Resolves a look-up path (unsanitized).
    fn locate(&self, path: &str) -> Result<(String, PathBuf), StorageError> {
        let full = self.ready()?.resolve(path, PathKind::Dir)?;
        let real = self.confine(&full)?;
        Ok((full, real))
    }

    /// Resolves a file path through the disk sanitizer.
    fn locate_file(&self, path: &str) -> Result<(String, PathBuf), StorageError> {
        let full = self.ready()?.resolve_file(path, SanitizeMode::Disk)?;
        let real = self.confine(&full)?;
        Ok((full, real))
    }

    fn virtual_of(&self, full: &str) -> String {
        self.resolver
            .as_ref()
            .map(|r| r.to_virtual(full))
            .unwrap_or_else(|| full.to_string())
    }

    fn try_navigate(&mut self, path: &str) -> Result<(), StorageError> {
        let (full, real) = self.locate(path)?;
        if !real.is_dir() {
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
        let (full, real) = self.locate(path)?;
        if !real.is_dir() {
            return Err(StorageError::NotFound(format!(
                "folder not found: {}",
                self.virtual_of(&full)
            )));
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&real)? {
            names.push(entry?.file_name().to_string_lossy().to_string());
        }
        names.sort();
        Ok(names)
    }

    fn try_exists(&self, path: &str) -> Result<bool, StorageError> {
        let (_, real) = self.locate(path)?;
        Ok(real.is_dir() || real.is_file())
    }

    fn try_make_dir(&self, path: &str) -> Result<(), StorageError> {
        let full = self.ready()?.resolve_folder(path, SanitizeMode::Disk)?;
        let real = self.confine(&full)?;
        if entry_exists(&real) {
            return Err(StorageError::AlreadyExists(format!(
                "directory already exists: {}",
                self.virtual_of(&full)
            )));
        }
        fs::create_dir_all(&real)?;
        if !real.is_dir() {
            return Err(StorageError::Transport("directory check failed".into()));
        }
        Ok(())
    }

    fn try_upload(&self, source: &Path, dest: &str) -> Result<(), StorageError> {
        let (full, real) = self.locate_file(dest)?;
        if !source.is_file() {
            return Err(StorageError::NotFound(format!(
                "source file not found: {}",
                source.display()
            )));
        }
        if entry_exists(&real) {
            return Err(StorageError::AlreadyExists(format!(
                "destination already exists: {}",
                self.virtual_of(&full)
            )));
        }
        fs::copy(source, &real)?;
        if !real.is_file() {
            return Err(StorageError::Transport("destination file check failed".into()));
        }
        Ok(())
    }

    fn try_download(&self, source: &str, dest: &Path) -> Result<(), StorageError> {
        let (full, real) = self.locate_file(source)?;
        if !real.is_file() {
            return Err(StorageError::NotFound(format!(
                "source file not found: {}",
                self.virtual_of(&full)
            )));
        }
        if entry_exists(dest) {
            return Err(StorageError::AlreadyExists(format!(
                "destination already exists: {}",
                dest.display()
            )));
        }
        fs::copy(&real, dest)?;
        if !dest.is_file() {
            return Err(StorageError::Transport("destination file check failed".into()));
        }
        Ok(())
    }

    fn try_remove(&self, path: &str) -> Result<(), StorageError> {
        let (full, real) = self.locate(path)?;
        if self.ready()?.is_root(&full) {
            return Err(StorageError::Path("the root cannot be removed".into()));
        }
        if !entry_exists(&real) {
            return Err(StorageError::NotFound(format!(
                "file/folder not found: {}",
                self.virtual_of(&full)
            )));
        }
        if real.is_dir() && !real.is_symlink() {
            fs::remove_dir_all(&real)?;
        } else {
            fs::remove_file(&real)?;
        }
        if entry_exists(&real) {
            return Err(StorageError::Transport("file/folder still exists".into()));
        }
        Ok(())
    }

    fn try_size(&self, path: &str) -> Result<u64, StorageError> {
        let (full, real) = self.locate(path)?;
        if real.is_file() {
            Ok(fs::metadata(&real)?.len())
        } else if real.is_dir() {
            Ok(directory_size(&real)?)
        } else {
            Err(StorageError::NotFound(format!(
                "file/folder not found: {}",
                self.virtual_of(&full)
            )))
        }
    }

    fn try_upload_bytes(&self, data: &[u8], path: &str) -> Result<(), StorageError> {
        let (full, real) = self.locate_file(path)?;
        if entry_exists(&real) {
            return Err(StorageError::AlreadyExists(format!(
                "destination already exists: {}",
                self.virtual_of(&full)
            )));
        }
        fs::write(&real, data)?;
        if !real.is_file() {
            return Err(StorageError::Transport("file check failed".into()));
        }
        Ok(())
    }

    fn try_download_bytes(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let (full, real) = self.locate_file(path)?;
        if !real.is_file() {
            return Err(StorageError::NotFound(format!(
                "file not found: {}",
                self.virtual_of(&full)
            )));
        }
        Ok(fs::read(&real)?)
    }

    fn try_transfer(&self, mode: TransferMode, source: &str, dest: &str) -> Result<(), StorageError> {
        let resolver = self.ready()?;
        let (source_full, source_real) = self.locate(source)?;
        let (dest_full, dest_real) = self.locate_file(dest)?;

        if resolver.is_root(&source_full) {
            return Err(StorageError::Path("the root cannot be transferred".into()));
        }
        check_not_nested(&source_full, &dest_full)?;

        if !entry_exists(&source_real) {
            return Err(StorageError::NotFound(format!(
                "source file/folder not found: {}",
                resolver.to_virtual(&source_full)
            )));
        }
        if entry_exists(&dest_real) {
            return Err(StorageError::AlreadyExists(format!(
                "destination already exists: {}",
                resolver.to_virtual(&dest_full)
            )));
        }

        match mode {
            TransferMode::Rename => fs::rename(&source_real, &dest_real)?,
            TransferMode::Move => {
                if let Err(e) = fs::rename(&source_real, &dest_real) {
                    // rename(2) cannot cross devices
                    debug!("rename failed ({}), falling back to copy", e);
                    copy_entry(&source_real, &dest_real)?;
                    if source_real.is_dir() {
                        fs::remove_dir_all(&source_real)?;
                    } else {
                        fs::remove_file(&source_real)?;
                    }
                }
            }
            TransferMode::Copy => copy_entry(&source_real, &dest_real)?,
        }

        if !entry_exists(&dest_real) {
            return Err(StorageError::Transport("destination check failed".into()));
        }
        if entry_exists(&source_real) != !mode.removes_source() {
            return Err(StorageError::Transport("source check failed".into()));
        }
        Ok(())
    }

    fn try_append(&self, path: &str, content: &[u8]) -> Result<(), StorageError> {
        let (full, real) = self.locate_file(path)?;
        if !real.is_file() {
            return Err(StorageError::NotFound(format!(
                "file not found: {}",
                self.virtual_of(&full)
            )));
        }
        let mut file = OpenOptions::new().append(true).open(&real)?;
        file.write_all(content)?;
        Ok(())
    }
}

fn copy_entry(source: &Path, dest: &Path) -> std::io::Result<()> {
    if source.is_dir() {
        copy_dir_recursive(source, dest)
    } else {
        fs::copy(source, dest).map(|_| ())
    }
}

impl StorageBackend for LocalDisk {
    fn initialized(&self) -> bool {
        self.resolver.is_some()
    }

    fn get_type(&self) -> Result<StorageKind, StorageError> {
        let result = self.ready().map(|_| StorageKind::Disk);
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
        logged("upload_from_memory", path, self.try_upload_bytes(data, path))
    }

    fn download_bytes(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        logged("download_to_memory", path, self.try_download_bytes(path))
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
