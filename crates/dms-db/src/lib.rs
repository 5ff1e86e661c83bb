//! DMS Database - SQLite persistence for rules and their execution logs

pub mod logs;
pub mod rules;
pub mod schema;

use dms_core::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

pub use logs::LogsRepository;
pub use rules::RulesRepository;

/// Handle on the sensor store; clones share one pool
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the store at `path`, creating the file, its directory and the
    /// tables on first use
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| {
                Error::DbError(format!("cannot create store directory {}: {}", dir.display(), e))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| Error::DbError(format!("cannot open {}: {}", path.display(), e)))?;

        restrict_to_owner(path);

        // Every statement is IF NOT EXISTS, so reopening an old store is a no-op
        sqlx::query(schema::SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        info!("Rule store ready at {}", path.display());
        Ok(Self { pool })
    }

    pub fn rules(&self) -> RulesRepository {
        RulesRepository::new(self.pool.clone())
    }

    pub fn logs(&self) -> LogsRepository {
        LogsRepository::new(self.pool.clone())
    }

    /// Wait for in-flight queries, then release every connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Rule arguments are shell commands, so keep the store private to its owner
#[cfg(unix)]
fn restrict_to_owner(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        warn!("Could not restrict {} to its owner: {}", path.display(), e);
    }
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) {}

/// True when the database rejected a write because of a UNIQUE/PRIMARY KEY conflict
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
