//! SQLite persistence for users, projects and local storage connections.
//!
//! [`SqliteStore`] backs the [`Authenticator`], [`StorageRegistry`] and
//! [`PermissionOracle`] seams. The `create_*` helpers are the admin-side writes
//! used for provisioning and tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use labelhost_core::{
    Authenticator, OrganizationId, PermissionOracle, ProjectId, RegistryError, StorageRegistry,
    StorageRoot, User, UserId,
};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{error, info};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS organizations (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        active_organization_id INTEGER REFERENCES organizations(id),
        is_superuser INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE IF NOT EXISTS api_tokens (
        key TEXT PRIMARY KEY,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE TABLE IF NOT EXISTS projects (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        organization_id INTEGER NOT NULL REFERENCES organizations(id)
    );
    CREATE TABLE IF NOT EXISTS localfiles_import_storages (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL DEFAULT '',
        path TEXT NOT NULL,
        project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );";

/// Opens (or creates) the database file and applies the schema.
pub fn init_db(path: &str) -> Result<Connection> {
    if let Some(parent) = Path::new(path).parent() {
        fs::create_dir_all(parent).context("failed to create db directory")?;
    }
    let conn = Connection::open(path).context("failed to open database")?;
    conn.execute_batch(SCHEMA).context("failed to create tables")?;
    info!("Database initialized at {}", path);
    Ok(conn)
}

/// Thread-safe handle to the SQLite database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens the database at `path`.
    pub fn open(path: &str) -> Result<Self> {
        Ok(Self { conn: Mutex::new(init_db(path)?) })
    }

    /// Creates a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        conn.execute_batch(SCHEMA).context("failed to create tables")?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Acquires the connection lock, converting poison errors to RegistryError.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, RegistryError> {
        self.conn.lock().map_err(|e| {
            error!("DB lock poisoned: {}", e);
            RegistryError::Unavailable("database lock error".into())
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.lock().map_err(anyhow::Error::from)
    }

    pub fn create_organization(&self, title: &str) -> Result<OrganizationId> {
        let conn = self.connection()?;
        conn.execute("INSERT INTO organizations (title) VALUES (?1)", params![title])
            .context("failed to create organization")?;
        Ok(OrganizationId(conn.last_insert_rowid()))
    }

    pub fn create_user(
        &self,
        email: &str,
        active_organization: Option<OrganizationId>,
        is_superuser: bool,
    ) -> Result<UserId> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO users (email, active_organization_id, is_superuser) VALUES (?1, ?2, ?3)",
            params![email, active_organization.map(|o| o.0), is_superuser],
        )
        .context("failed to create user")?;
        Ok(UserId(conn.last_insert_rowid()))
    }

    pub fn create_token(&self, user: UserId, key: &str) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO api_tokens (key, user_id) VALUES (?1, ?2)",
            params![key, user.0],
        )
        .context("failed to create token")?;
        Ok(())
    }

    pub fn create_project(&self, title: &str, organization: OrganizationId) -> Result<ProjectId> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO projects (title, organization_id) VALUES (?1, ?2)",
            params![title, organization.0],
        )
        .context("failed to create project")?;
        Ok(ProjectId(conn.last_insert_rowid()))
    }

    /// Registers a local storage connection rooted at `path` for `project`.
    ///
    /// The path is stored in its component form, so repeated or trailing
    /// separators never reach the prefix match.
    pub fn add_local_storage(&self, path: &Path, project: ProjectId) -> Result<i64> {
        let path: PathBuf = path.components().collect();
        let path = path
            .to_str()
            .with_context(|| format!("storage path is not valid UTF-8: {}", path.display()))?;
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO localfiles_import_storages (path, project_id) VALUES (?1, ?2)",
            params![path, project.0],
        )
        .context("failed to create local storage")?;
        let id = conn.last_insert_rowid();
        info!("Added local storage {} for project {}: {}", id, project, path);
        Ok(id)
    }
}

fn query_error(e: rusqlite::Error) -> RegistryError {
    RegistryError::Query(e.to_string())
}

impl Authenticator for SqliteStore {
    fn user_for_token(&self, token: &str) -> Result<Option<User>, RegistryError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT u.id, u.email, u.active_organization_id, u.is_superuser
             FROM api_tokens t JOIN users u ON u.id = t.user_id
             WHERE t.key = ?1",
            params![token],
            |row| {
                Ok(User {
                    id: UserId(row.get(0)?),
                    email: row.get(1)?,
                    active_organization: row.get::<_, Option<i64>>(2)?.map(OrganizationId),
                    is_superuser: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(query_error)
    }
}

impl StorageRegistry for SqliteStore {
    fn roots_containing(&self, dir: &Path) -> Result<Vec<StorageRoot>, RegistryError> {
        // Non UTF-8 directories can never match a stored path.
        let Some(dir_str) = dir.to_str() else {
            return Ok(vec![]);
        };

        let conn = self.lock()?;
        // Textual prefix narrows the rows; StorageRoot::contains does the
        // component-wise check.
        let mut stmt = conn
            .prepare(
                "SELECT id, path, project_id FROM localfiles_import_storages
                 WHERE substr(?1, 1, length(rtrim(path, '/'))) = rtrim(path, '/')",
            )
            .map_err(query_error)?;
        let rows = stmt
            .query_map(params![dir_str], |row| {
                let path: String = row.get(1)?;
                Ok(StorageRoot::new(row.get(0)?, PathBuf::from(path), ProjectId(row.get(2)?)))
            })
            .map_err(query_error)?;

        let mut roots = Vec::new();
        for root in rows {
            let root = root.map_err(query_error)?;
            if root.contains(dir) {
                roots.push(root);
            }
        }
        Ok(roots)
    }
}

impl PermissionOracle for SqliteStore {
    fn can_read(&self, user: &User, project: ProjectId) -> Result<bool, RegistryError> {
        let conn = self.lock()?;
        let organization: Option<i64> = conn
            .query_row(
                "SELECT organization_id FROM projects WHERE id = ?1",
                params![project.0],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_error)?;

        Ok(match (organization, user.active_organization) {
            (Some(org), Some(active)) => active == OrganizationId(org),
            _ => false,
        })
    }
}
