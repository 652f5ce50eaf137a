//! Virtual path handling
//!
//! Sanitization of caller supplied paths and their resolution against a
//! backend root and working directory.

pub mod resolver;
pub mod sanitize;

pub use resolver::{PathKind, PathResolver, normalize};
pub use sanitize::{SanitizeMode, sanitize_file, sanitize_folder};
