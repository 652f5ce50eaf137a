//! File system helpers
//!
//! Recursive copy and size walks, and symlink-aware confinement for the
//! local disk backend.

use std::fs;
use std::io::Result;
use std::path::{Path, PathBuf};

/// True if a file or directory (or a dangling link) sits at `path`.
pub fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Copy a directory tree. `dest` must not exist. Symlinks are not copied.
pub fn copy_dir_recursive(source: &Path, dest: &Path) -> Result<()> {
    fs::create_dir(dest)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_symlink() {
            continue;
        }
        if file_type.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Sum of the sizes of every regular file below `path`; symlinks are skipped.
pub fn directory_size(path: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_symlink() {
            continue;
        }
        if file_type.is_dir() {
            total += directory_size(&entry.path())?;
        } else {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

/// Canonical form of the closest existing ancestor of `path` (itself included).
/// A dangling symlink is passed over in favour of its parent.
pub fn canonical_ancestor(path: &Path) -> Result<PathBuf> {
    let mut current = path;
    loop {
        if entry_exists(current) {
            match current.canonicalize() {
                Ok(canonical) => return Ok(canonical),
                Err(e) if !fs::symlink_metadata(current)?.file_type().is_symlink() => {
                    return Err(e);
                }
                Err(_) => {}
            }
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return Path::new("/").canonicalize(),
        }
    }
}
