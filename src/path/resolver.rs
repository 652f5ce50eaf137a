//! Path resolution
//!
//! Expands virtual paths (empty, relative to the working directory, or
//! absolute from the root) into backend paths, and keeps them inside the
//! configured root.

use crate::error::StorageError;
use crate::path::sanitize::{
    SanitizeMode, sanitize_file, sanitize_folder, sanitize_name, split_parent,
};

/// Whether a path names a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Dir,
}

/// Collapses `.` and `..` segments of an absolute path without touching the
/// backend. Climbing above `/` is an error.
pub fn normalize(path: &str) -> Result<String, StorageError> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(StorageError::Path(format!(
                        "impossible to go beyond the root path: {}",
                        path
                    )));
                }
            }
            other => segments.push(other),
        }
    }
    Ok(format!("/{}", segments.join("/")))
}

/// Holds the immutable root and the mutable working directory of a backend.
///
/// The root is a normalized absolute path without trailing slash (except for
/// `/` itself). The working directory is virtual: always absolute, relative
/// to the root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: String,
    cwd: String,
}

impl PathResolver {
    /// Creates a resolver rooted at `root`, with the working directory at `/`.
    pub fn new(root: &str) -> Result<Self, StorageError> {
        if !root.starts_with('/') {
            return Err(StorageError::Path(format!(
                "root path should start with /: {:?}",
                root
            )));
        }
        Ok(Self {
            root: normalize(root)?,
            cwd: "/".to_string(),
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Returns the virtual working directory.
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    /// Maps a virtual absolute path onto the backend path below the root.
    fn absolute(&self, virtual_path: &str) -> String {
        if self.root == "/" {
            virtual_path.to_string()
        } else if virtual_path == "/" {
            self.root.clone()
        } else {
            format!("{}{}", self.root, virtual_path)
        }
    }

    /// Expands `path` into a normalized backend path.
    ///
    /// Empty input means the working directory and is rejected for files.
    /// Does not check containment; see [`PathResolver::check_containment`].
    pub fn expand(&self, path: &str, kind: PathKind) -> Result<String, StorageError> {
        if path.is_empty() {
            if kind == PathKind::File {
                return Err(StorageError::Path("not a file: empty path".into()));
            }
            return Ok(self.absolute(&self.cwd));
        }

        let base = if path.starts_with('/') {
            self.root.clone()
        } else {
            self.absolute(&self.cwd)
        };
        normalize(&format!("{}/{}", base, path))
    }

    /// Fails unless `full` is the root or one of its descendants.
    pub fn check_containment(&self, full: &str) -> Result<(), StorageError> {
        let contained = self.root == "/"
            || full == self.root
            || full
                .strip_prefix(self.root.as_str())
                .is_some_and(|rest| rest.starts_with('/'));
        if contained && full.starts_with('/') {
            Ok(())
        } else {
            Err(StorageError::Path(format!(
                "impossible to go beyond the root path: {}",
                full
            )))
        }
    }

    /// Expands and checks containment.
    pub fn resolve(&self, path: &str, kind: PathKind) -> Result<String, StorageError> {
        let full = self.expand(path, kind)?;
        self.check_containment(&full)?;
        Ok(full)
    }

    /// Sanitizes then resolves a path that names a file to be created or read.
    pub fn resolve_file(&self, path: &str, mode: SanitizeMode) -> Result<String, StorageError> {
        if path.is_empty() {
            return Err(StorageError::Path("not a file: empty path".into()));
        }
        let (_, raw_name) = split_parent(path);
        let name = sanitize_name(raw_name);
        if name.is_empty() || name == "." || name == ".." {
            return Err(StorageError::Path(format!("invalid file name: {:?}", path)));
        }
        self.resolve(&sanitize_file(path, mode), PathKind::File)
    }

    /// Sanitizes then resolves a folder path.
    pub fn resolve_folder(&self, path: &str, mode: SanitizeMode) -> Result<String, StorageError> {
        self.resolve(&sanitize_folder(path, mode), PathKind::Dir)
    }

    pub fn is_root(&self, full: &str) -> bool {
        full == self.root
    }

    /// Converts a backend path back into its virtual form.
    pub fn to_virtual(&self, full: &str) -> String {
        if self.root == "/" {
            return full.to_string();
        }
        match full.strip_prefix(self.root.as_str()) {
            Some("") | None => "/".to_string(),
            Some(rest) => rest.to_string(),
        }
    }

    /// Moves the working directory to the already resolved `full` path.
    pub fn set_cwd(&mut self, full: &str) {
        self.cwd = self.to_virtual(full);
    }

    /// Backend path of the parent directory of `full`.
    pub fn parent(full: &str) -> String {
        match full.rfind('/') {
            Some(0) | None => "/".to_string(),
            Some(idx) => full[..idx].to_string(),
        }
    }

    /// Object-store key of a backend path: no leading slash, and a trailing
    /// slash for directories. The bucket root directory has the empty key.
    pub fn object_key(full: &str, kind: PathKind) -> String {
        let key = full.trim_start_matches('/');
        match kind {
            PathKind::File => key.to_string(),
            PathKind::Dir if key.is_empty() => String::new(),
            PathKind::Dir => format!("{}/", key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> PathResolver {
        PathResolver::new("/data/store").unwrap()
    }

    #[test]
    fn test_root_must_be_absolute() {
        assert!(PathResolver::new("relative/root").is_err());
        assert!(PathResolver::new("").is_err());
        assert_eq!(PathResolver::new("/a/./b/../c/").unwrap().root(), "/a/c");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/a/./b/../c").unwrap(), "/a/c");
        assert_eq!(normalize("//a//b/").unwrap(), "/a/b");
        assert_eq!(normalize("/a/..").unwrap(), "/");
        assert!(normalize("/a/../..").is_err());
    }

    #[test]
    fn test_expand_empty() {
        let r = resolver();
        assert_eq!(r.expand("", PathKind::Dir).unwrap(), "/data/store");
        assert!(matches!(
            r.expand("", PathKind::File),
            Err(StorageError::Path(_))
        ));
    }

    #[test]
    fn test_expand_absolute_and_relative() {
        let mut r = resolver();
        r.set_cwd("/data/store/level1");
        assert_eq!(r.cwd(), "/level1");
        assert_eq!(r.expand("/x", PathKind::File).unwrap(), "/data/store/x");
        assert_eq!(r.expand("x", PathKind::File).unwrap(), "/data/store/level1/x");
        assert_eq!(r.expand("../x", PathKind::File).unwrap(), "/data/store/x");
        assert_eq!(r.expand("./a/./b/", PathKind::Dir).unwrap(), "/data/store/level1/a/b");
    }

    #[test]
    fn test_containment() {
        let r = resolver();
        assert!(r.resolve("../..", PathKind::Dir).is_err());
        assert!(r.resolve("/../store2", PathKind::Dir).is_err());
        assert!(r.check_containment("/data/store").is_ok());
        assert!(r.check_containment("/data/store/a").is_ok());
        assert!(r.check_containment("/data/storefront").is_err());
        assert!(r.check_containment("/data").is_err());
    }

    #[test]
    fn test_slash_root_never_escapes() {
        let r = PathResolver::new("/").unwrap();
        assert_eq!(r.resolve("a/b", PathKind::Dir).unwrap(), "/a/b");
        assert!(r.resolve("..", PathKind::Dir).is_err());
        assert_eq!(r.to_virtual("/a/b"), "/a/b");
    }

    #[test]
    fn test_to_virtual() {
        let r = resolver();
        assert_eq!(r.to_virtual("/data/store"), "/");
        assert_eq!(r.to_virtual("/data/store/a/b"), "/a/b");
    }

    #[test]
    fn test_resolve_file_rejects_bad_names() {
        let r = resolver();
        assert!(r.resolve_file("", SanitizeMode::Object).is_err());
        assert!(r.resolve_file("dir/$$$", SanitizeMode::Object).is_err());
        assert!(r.resolve_file("dir/..", SanitizeMode::Object).is_err());
        assert_eq!(
            r.resolve_file("dir/my file.txt", SanitizeMode::Object).unwrap(),
            "/data/store/dir/myfile.txt"
        );
    }

    #[test]
    fn test_disk_mode_anchors_bare_names_at_root() {
        let mut r = resolver();
        r.set_cwd("/data/store/level1");
        assert_eq!(r.resolve_file("v1", SanitizeMode::Disk).unwrap(), "/data/store/v1");
        assert_eq!(r.resolve_file("v1", SanitizeMode::Object).unwrap(), "/data/store/level1/v1");
    }

    #[test]
    fn test_object_key_and_parent() {
        assert_eq!(PathResolver::object_key("/a/b", PathKind::File), "a/b");
        assert_eq!(PathResolver::object_key("/a/b", PathKind::Dir), "a/b/");
        assert_eq!(PathResolver::object_key("/", PathKind::Dir), "");
        assert_eq!(PathResolver::parent("/a/b"), "/a");
        assert_eq!(PathResolver::parent("/a"), "/");
    }
}
