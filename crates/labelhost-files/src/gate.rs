//! Access control and delivery for files under local storage connections.

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use labelhost_config::LocalFilesConfig;
use labelhost_core::{PermissionOracle, StorageRegistry, User};
use mime_guess::Mime;
use thiserror::Error;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, info, warn};

use crate::path::{DocumentRoot, ResolvedPath};

/// Body of the 403 returned while local file serving is switched off.
pub const DISABLED_MESSAGE: &str = "Serving local files can be dangerous, so it's disabled by default. \
You can enable it with LOCAL_FILES_SERVING_ENABLED environment variable, \
please check docs: https://labelstud.io/guide/storage.html#Local-storage";

/// Why a local file request was refused.
///
/// `Unauthorized`, `Missing` and `Traversal` all render as the same empty 404.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("local file serving is disabled")]
    Disabled,

    #[error("no path requested")]
    NoPath,

    #[error("user is not authenticated")]
    Unauthenticated,

    #[error("no readable storage contains the path")]
    Unauthorized,

    #[error("file not found")]
    Missing,

    #[error("path escapes the document root")]
    Traversal,
}

impl GateError {
    pub fn status(&self) -> StatusCode {
        match self {
            GateError::Disabled | GateError::NoPath | GateError::Unauthenticated => {
                StatusCode::FORBIDDEN
            }
            GateError::Unauthorized | GateError::Missing | GateError::Traversal => {
                StatusCode::NOT_FOUND
            }
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        match self {
            GateError::Disabled => (self.status(), DISABLED_MESSAGE).into_response(),
            _ => self.status().into_response(),
        }
    }
}

/// A file the user may read, ready to be streamed.
#[derive(Debug, Clone)]
pub struct AuthorizedFile {
    path: PathBuf,
    mime: Mime,
}

impl AuthorizedFile {
    /// Canonical on-disk location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mime(&self) -> &Mime {
        &self.mime
    }
}

/// Decides whether a user may read a path under the document root and streams it.
#[derive(Clone)]
pub struct LocalFileGate {
    enabled: bool,
    root: DocumentRoot,
    registry: Arc<dyn StorageRegistry>,
    oracle: Arc<dyn PermissionOracle>,
}

impl LocalFileGate {
    pub fn new(
        config: &LocalFilesConfig,
        registry: Arc<dyn StorageRegistry>,
        oracle: Arc<dyn PermissionOracle>,
    ) -> Self {
        Self {
            enabled: config.serving_enabled,
            root: DocumentRoot::new(config.document_root.clone()),
            registry,
            oracle,
        }
    }

    /// Runs every check for a request and returns the file to stream.
    pub async fn authorize(
        &self,
        user: Option<&User>,
        raw_path: Option<&str>,
    ) -> Result<AuthorizedFile, GateError> {
        if !self.enabled {
            return Err(GateError::Disabled);
        }
        let raw_path = raw_path.filter(|p| !p.is_empty()).ok_or(GateError::NoPath)?;
        let user = user.ok_or(GateError::Unauthenticated)?;

        let resolved = self.root.resolve(raw_path).map_err(|e| {
            warn!(user = %user.id, path = %raw_path, "Rejected local file path: {}", e);
            GateError::Traversal
        })?;

        if !self.has_permission(user, resolved.parent()) {
            debug!(user = %user.id, path = %resolved.full().display(), "No readable storage for path");
            return Err(GateError::Unauthorized);
        }

        let (path, real) = self.locate(&resolved).await?;
        // A symlink may point at a file in another storage; the target must be
        // readable too.
        if real != resolved.full() {
            let real_dir = real.parent().unwrap_or(&real);
            if !self.has_permission(user, real_dir) {
                debug!(user = %user.id, target = %real.display(), "No readable storage for link target");
                return Err(GateError::Unauthorized);
            }
        }

        let mime = mime_guess::from_path(resolved.full()).first_or_octet_stream();
        Ok(AuthorizedFile { path, mime })
    }

    /// Authorizes the request and streams the file, honoring `Range` headers.
    pub async fn serve<B>(
        &self,
        user: Option<&User>,
        raw_path: Option<&str>,
        request: Request<B>,
    ) -> Response
    where
        B: Send + 'static,
    {
        let file = match self.authorize(user, raw_path).await {
            Ok(file) => file,
            Err(e) => return e.into_response(),
        };

        info!(path = %file.path.display(), mime = %file.mime, "Serving local file");
        let result: Result<_, Infallible> = ServeFile::new_with_mime(&file.path, &file.mime)
            .oneshot(request)
            .await;
        match result {
            Ok(response) => hide_server_errors(response.map(Body::new)),
            Err(never) => match never {},
        }
    }

    /// Fails closed: no matching storage, or a registry error, means no access.
    fn has_permission(&self, user: &User, dir: &Path) -> bool {
        let roots = match self.registry.roots_containing(dir) {
            Ok(roots) => roots,
            Err(e) => {
                warn!("Storage registry lookup failed: {}", e);
                return false;
            }
        };

        roots.iter().any(|root| match self.oracle.can_read(user, root.project) {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!(project = %root.project, "Permission check failed: {}", e);
                false
            }
        })
    }

    /// Confirms the candidate is a regular file whose real location is under the root.
    ///
    /// Returns the canonical path to open, and that same location expressed
    /// under the configured root so it can be matched against storage paths.
    async fn locate(&self, resolved: &ResolvedPath) -> Result<(PathBuf, PathBuf), GateError> {
        let missing = |e: std::io::Error| {
            debug!(path = %resolved.full().display(), "Local file unavailable: {}", e);
            GateError::Missing
        };

        let canonical_root = tokio::fs::canonicalize(self.root.path()).await.map_err(missing)?;
        let canonical = tokio::fs::canonicalize(resolved.full()).await.map_err(missing)?;
        let Ok(inside) = canonical.strip_prefix(&canonical_root) else {
            warn!(path = %resolved.full().display(), "Local file resolves outside document root");
            return Err(GateError::Traversal);
        };
        let real = self.root.path().join(inside);

        let metadata = tokio::fs::metadata(&canonical).await.map_err(missing)?;
        if !metadata.is_file() {
            return Err(GateError::Missing);
        }
        Ok((canonical, real))
    }
}

/// Open and read failures inside `ServeFile` surface as 5xx; they are reported
/// as a missing file instead.
fn hide_server_errors(response: Response) -> Response {
    if response.status().is_server_error() {
        debug!(status = %response.status(), "Local file stream failed");
        return GateError::Missing.into_response();
    }
    response
}
