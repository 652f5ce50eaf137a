//! Path sanitization
//!
//! Strips user supplied folder and file paths down to a safe character set
//! before they are resolved against a backend.

/// Character policy applied by the sanitizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizeMode {
    /// Folders keep `[A-Za-z0-9-_/]` and always end with `/`.
    Disk,
    /// Folders also keep `.`; an empty folder stays empty.
    Object,
}

impl SanitizeMode {
    fn keeps_in_folder(self, c: char) -> bool {
        c.is_ascii_alphanumeric()
            || matches!(c, '-' | '_' | '/')
            || (self == SanitizeMode::Object && c == '.')
    }
}

fn keeps_in_name(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut previous_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !previous_slash {
                out.push(c);
            }
            previous_slash = true;
        } else {
            out.push(c);
            previous_slash = false;
        }
    }
    out
}

/// Sanitizes a folder path.
///
/// Removes every character outside the mode's charset, appends a single
/// trailing `/` and collapses runs of slashes. Idempotent.
pub fn sanitize_folder(path: &str, mode: SanitizeMode) -> String {
    let kept: String = path.chars().filter(|c| mode.keeps_in_folder(*c)).collect();
    if kept.is_empty() && mode == SanitizeMode::Object {
        return String::new();
    }
    collapse_slashes(&format!("{}/", kept))
}

/// Strips a single file name down to `[A-Za-z0-9-_.]`.
pub fn sanitize_name(name: &str) -> String {
    name.chars().filter(|c| keeps_in_name(*c)).collect()
}

/// Splits a path into its parent folder and final component.
///
/// A bare name has parent `.`; trailing slashes are ignored.
pub fn split_parent(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.starts_with('/') { ("/", "") } else { (".", "") };
    }

    match trimmed.rfind('/') {
        None => (".", trimmed),
        Some(idx) => {
            let parent = trimmed[..idx].trim_end_matches('/');
            let parent = if parent.is_empty() { "/" } else { parent };
            (parent, &trimmed[idx + 1..])
        }
    }
}

/// Sanitizes a file path: the parent goes through [`sanitize_folder`], the
/// name through [`sanitize_name`].
///
/// The file name may come out empty; rejecting that is up to the resolver.
pub fn sanitize_file(path: &str, mode: SanitizeMode) -> String {
    let (parent, name) = split_parent(path);
    format!("{}{}", sanitize_folder(parent, mode), sanitize_name(name))
}
