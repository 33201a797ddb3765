// Librarium - Personal Book Catalogue
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Catalogue connection handle
//!
//! Opens (or creates) the SQLite catalogue file, applies connection pragmas and
//! brings the schema up to date.
//!
//! # Catalogue Location
//! - macOS: ~/Library/Application Support/Librarium/catalogue.db
//! - Linux: ~/.local/share/librarium/catalogue.db
//! - Windows: %APPDATA%/Librarium/catalogue.db
//!
//! # SQLite Configuration
//! - WAL journal
//! - Foreign keys enforced on every connection (the RESTRICT/CASCADE rules
//!   on the link tables depend on it)
//! - Normal synchronous mode

use crate::error::{CatalogError, Result};
use serde::Serialize;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous},
    ConnectOptions,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Open catalogue: a connection pool plus the file it points at
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    path: Option<PathBuf>, // None for in-memory catalogues
}

impl Database {
    /// Open the catalogue at `database_path`, creating it and its parent
    /// directory if needed, and run pending migrations.
    ///
    /// # Errors
    /// - `FileIoError` if the parent directory can't be created
    /// - `SqlxError` if the file can't be opened
    /// - `MigrationFailed` if the schema can't be brought up to date
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let path = database_path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CatalogError::FileIoError(format!(
                        "Failed to create catalogue directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let connect_opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30))
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(connect_opts)
            .await?;

        let db = Self {
            pool,
            path: Some(path.to_path_buf()),
        };
        db.migrate().await?;

        info!(path = %path.display(), "opened catalogue");
        Ok(db)
    }

    /// Create an in-memory catalogue for tests and scratch work
    ///
    /// Every `:memory:` connection is its own database, so the pool is capped
    /// at one connection. Code holding a transaction must not go back to the pool.
    pub async fn new_in_memory() -> Result<Self> {
        let connect_opts = SqliteConnectOptions::from_str("sqlite::memory:")?
            .foreign_keys(true)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_opts)
            .await?;

        let db = Self { pool, path: None };
        db.migrate().await?;

        debug!("opened in-memory catalogue");
        Ok(db)
    }

    /// Apply all pending migrations. Runs automatically on open.
    pub async fn migrate(&self) -> Result<()> {
        crate::storage::migrations::run_migrations(&self.pool)
            .await
            .map_err(|e| CatalogError::MigrationFailed(e.to_string()))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Catalogue file, `None` when in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Close the pool, waiting for checked-out connections to return
    pub async fn close(self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    /// Default catalogue file for the platform
    pub fn get_default_path() -> PathBuf {
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("Librarium")
                .join("catalogue.db")
        }

        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(appdata).join("Librarium").join("catalogue.db")
        }

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            let data_home = std::env::var("XDG_DATA_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                    PathBuf::from(home).join(".local").join("share")
                });
            data_home.join("librarium").join("catalogue.db")
        }
    }

    /// Page-level statistics for the catalogue file
    pub async fn get_stats(&self) -> Result<DatabaseStats> {
        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await?;

        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await?;

        let freelist_count: i64 = sqlx::query_scalar("PRAGMA freelist_count")
            .fetch_one(&self.pool)
            .await?;

        Ok(DatabaseStats {
            page_count: page_count.max(0) as u64,
            page_size: page_size.max(0) as u64,
            freelist_count: freelist_count.max(0) as u64,
        })
    }

    /// Run `PRAGMA integrity_check`; true when SQLite reports "ok"
    pub async fn check_integrity(&self) -> Result<bool> {
        let result: String = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_one(&self.pool)
            .await?;

        Ok(result == "ok")
    }

    /// Rows in link tables or books whose foreign keys point nowhere.
    /// Always zero while foreign keys are enforced.
    pub async fn foreign_key_violations(&self) -> Result<usize> {
        let rows = sqlx::query("PRAGMA foreign_key_check")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.len())
    }
}

/// File statistics
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub page_count: u64,
    /// Bytes per page
    pub page_size: u64,
    /// Pages on the free list
    pub freelist_count: u64,
}

impl DatabaseStats {
    pub fn total_size(&self) -> u64 {
        self.page_count * self.page_size
    }

    pub fn unused_size(&self) -> u64 {
        self.freelist_count * self.page_size
    }

    /// Get percentage of unused space
    pub fn unused_percentage(&self) -> f64 {
        if self.total_size() == 0 {
            0.0
        } else {
            (self.unused_size() as f64 / self.total_size() as f64) * 100.0
        }
    }
}
