//! Core domain types and collaborator traits for labelhost.
//!
//! This crate provides the types shared across the labelhost workspace:
//!
//! - [`User`], [`Project`] — Identities the handlers reason about
//! - [`StorageRoot`] — A local-storage connection scoped to a project
//! - [`Authenticator`], [`StorageRegistry`], [`PermissionOracle`] — Seams to
//!   the persistence layer
//! - [`RegistryError`] — Error type for collaborator lookups
//!
//! # Example
//!
//! ```rust
//! use labelhost_core::{ProjectId, StorageRoot};
//! use std::path::Path;
//!
//! let root = StorageRoot::new(1, "/data/projA", ProjectId(7));
//! assert!(root.contains(Path::new("/data/projA/images")));
//! assert!(!root.contains(Path::new("/data/projA2")));
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the persistence-backed collaborators.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The backing store could not be queried.
    #[error("registry query failed: {0}")]
    Query(String),

    /// The backing store is unavailable (e.g. a poisoned lock).
    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// Identifier of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Identifier of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub i64);

/// Identifier of an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrganizationId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    /// Organization the user is currently working in, if any.
    pub active_organization: Option<OrganizationId>,
    pub is_superuser: bool,
}

/// A labeling project owned by an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    pub organization: OrganizationId,
}

/// A local-storage connection: a filesystem root whose files belong to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageRoot {
    pub id: i64,
    /// Absolute filesystem path of the storage.
    pub path: PathBuf,
    /// Project that owns the files under `path`.
    pub project: ProjectId,
}

impl StorageRoot {
    /// Creates a storage root record.
    pub fn new(id: i64, path: impl Into<PathBuf>, project: ProjectId) -> Self {
        Self { id, path: path.into(), project }
    }

    /// Returns `true` if `dir` is this root or lies beneath it.
    ///
    /// Comparison is per path component, so `/data/proj` does not contain
    /// `/data/project2`.
    pub fn contains(&self, dir: &Path) -> bool {
        dir.starts_with(&self.path)
    }
}

/// Resolves request credentials to a user.
pub trait Authenticator: Send + Sync {
    /// Looks up the user owning an API token. `Ok(None)` means anonymous.
    fn user_for_token(&self, token: &str) -> Result<Option<User>, RegistryError>;
}

/// Read-only view over the configured local-storage connections.
pub trait StorageRegistry: Send + Sync {
    /// Returns every storage root that contains `dir`.
    fn roots_containing(&self, dir: &Path) -> Result<Vec<StorageRoot>, RegistryError>;
}

/// Answers per-project read permission questions.
pub trait PermissionOracle: Send + Sync {
    /// Returns `true` if `user` may read resources of `project`.
    fn can_read(&self, user: &User, project: ProjectId) -> Result<bool, RegistryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_matches_whole_components() {
        let root = StorageRoot::new(1, "/data/proj", ProjectId(1));
        assert!(root.contains(Path::new("/data/proj")));
        assert!(root.contains(Path::new("/data/proj/a/b")));
        assert!(!root.contains(Path::new("/data/project2")));
        assert!(!root.contains(Path::new("/data")));
    }

    #[test]
    fn contains_ignores_trailing_separator() {
        let root = StorageRoot::new(1, "/data/proj/", ProjectId(1));
        assert!(root.contains(Path::new("/data/proj/img")));
    }
}
