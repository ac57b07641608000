// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;
use std::time::Duration;

use recall_config::model::StorageConfig;
use recall_core::RecallError;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

use crate::migrations;

/// Convert a tokio-rusqlite error into [`RecallError::Storage`].
pub fn map_tr_err<E>(e: tokio_rusqlite::Error<E>) -> RecallError
where
    E: std::error::Error + Send + Sync + 'static,
{
    RecallError::storage(e)
}

/// Handle to the single SQLite connection backing one memory store.
///
/// Every component (graph store, semantic index) shares one `Database`
/// behind an `Arc`, which makes it the single writer for the store.
pub struct Database {
    conn: Connection,
    path: String,
}

impl Database {
    /// Open (or create) the database at `path` with WAL enabled and run migrations.
    pub async fn open(path: &str) -> Result<Self, RecallError> {
        Self::open_with(path, true).await
    }

    /// Open the database described by a [`StorageConfig`].
    pub async fn from_config(config: &StorageConfig) -> Result<Self, RecallError> {
        Self::open_with(&config.database_path, config.wal_mode).await
    }

    /// Open a private in-memory database (tests and throwaway stores).
    pub async fn open_in_memory() -> Result<Self, RecallError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(RecallError::storage)?;
        let db = Self {
            conn,
            path: ":memory:".to_string(),
        };
        db.prepare(false).await?;
        Ok(db)
    }

    async fn open_with(path: &str, wal_mode: bool) -> Result<Self, RecallError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(RecallError::storage)?;
            }
        }

        let conn = Connection::open(path).await.map_err(RecallError::storage)?;
        let db = Self {
            conn,
            path: path.to_string(),
        };
        db.prepare(wal_mode).await?;
        info!(path = %db.path, wal_mode, "memory store opened");
        Ok(db)
    }

    /// Apply connection PRAGMAs and pending migrations.
    async fn prepare(&self, wal_mode: bool) -> Result<(), RecallError> {
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                if wal_mode {
                    let _mode: String = conn.pragma_update_and_check(
                        None,
                        "journal_mode",
                        "WAL",
                        |row| row.get(0),
                    )?;
                    conn.pragma_update(None, "synchronous", "NORMAL")?;
                }
                conn.pragma_update(None, "foreign_keys", "ON")?;
                conn.busy_timeout(Duration::from_secs(5))?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        self.conn
            .call(|conn| migrations::run_migrations(conn))
            .await
            .map_err(map_tr_err)?;
        debug!(path = %self.path, "migrations applied");
        Ok(())
    }

    /// The underlying connection. All query modules go through `call()`.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Path this database was opened from (`:memory:` for in-memory stores).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Checkpoint the WAL so the main database file is self-contained.
    pub async fn checkpoint(&self) -> Result<(), RecallError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
            })
            .await
            .map_err(map_tr_err)?;
        debug!(path = %self.path, "WAL checkpoint complete");
        Ok(())
    }
}
