//! Request path validation and document-root resolution.
//!
//! Requested paths are untrusted. [`DocumentRoot::resolve`] is the only way to
//! obtain a [`ResolvedPath`], and it refuses any path that would leave the root
//! after normalization.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Reasons a requested path is refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("empty path")]
    Empty,

    #[error("path contains a NUL byte")]
    NulByte,

    #[error("path starts with a drive prefix")]
    DrivePrefix,

    #[error("path escapes the document root")]
    Traversal,
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

fn is_drive_prefix(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Normalizes a raw request path into a relative path.
///
/// `.` segments and repeated separators are dropped and `..` pops the previous
/// segment. Leading separators make the path root-relative, so a `..` at the
/// very top of an absolute path has nothing to pop and is ignored, while a
/// `..` that climbs above a relative path is an error.
pub fn normalize(raw: &str) -> Result<PathBuf, PathError> {
    if raw.contains('\0') {
        return Err(PathError::NulByte);
    }

    let absolute = raw.starts_with(is_separator);
    let mut segments: Vec<&str> = Vec::new();

    for segment in raw.split(is_separator) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() && !absolute {
                    return Err(PathError::Traversal);
                }
            }
            s => {
                if segments.is_empty() && is_drive_prefix(s) {
                    return Err(PathError::DrivePrefix);
                }
                segments.push(s);
            }
        }
    }

    Ok(segments.iter().collect())
}

/// A requested path joined onto the document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    full: PathBuf,
}

impl ResolvedPath {
    /// Absolute path of the candidate file.
    pub fn full(&self) -> &Path {
        &self.full
    }

    /// Directory holding the candidate file.
    pub fn parent(&self) -> &Path {
        self.full.parent().unwrap_or(&self.full)
    }
}

/// The configured base directory for local file serving.
#[derive(Debug, Clone)]
pub struct DocumentRoot {
    root: PathBuf,
}

impl DocumentRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Validates `raw` and joins it onto the root.
    pub fn resolve(&self, raw: &str) -> Result<ResolvedPath, PathError> {
        if raw.is_empty() {
            return Err(PathError::Empty);
        }
        let relative = normalize(raw)?;
        let full = self.root.join(&relative);

        // normalize() can only produce plain segments, but the join is checked
        // anyway so the invariant holds on every platform.
        if !full.starts_with(&self.root) {
            return Err(PathError::Traversal);
        }

        Ok(ResolvedPath { full })
    }
}
