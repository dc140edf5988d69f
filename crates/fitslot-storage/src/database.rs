// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;

use fitslot_config::model::StorageConfig;
use fitslot_core::FitslotError;
use tracing::{debug, info};

use crate::migrations;

/// Handle to the Fitslot SQLite database.
///
/// Cloning the inner connection is cheap and every clone talks to the same
/// background thread, so `Database` is the one writer for the process.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path` with default settings.
    pub async fn open(path: &str) -> Result<Self, FitslotError> {
        Self::open_with(path, &StorageConfig {
            database_path: path.to_string(),
            ..StorageConfig::default()
        })
        .await
    }

    /// Open the database at `path`, apply PRAGMAs from `config`, and run migrations.
    pub async fn open_with(path: &str, config: &StorageConfig) -> Result<Self, FitslotError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| FitslotError::Storage {
                    source: Box::new(e),
                })?;
            }
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| FitslotError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare(pragma_batch(config.wal_mode, config.busy_timeout_ms))
            .await?;
        info!(path, wal = config.wal_mode, "database opened");
        Ok(db)
    }

    /// Open a private in-memory database with the full schema.
    pub async fn open_in_memory() -> Result<Self, FitslotError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| FitslotError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare(pragma_batch(false, 0)).await?;
        Ok(db)
    }

    async fn prepare(&self, pragmas: String) -> Result<(), FitslotError> {
        self.conn
            .call(move |conn| -> Result<(), FitslotError> {
                conn.execute_batch(&pragmas).map_err(sql_err)?;
                migrations::run_migrations(conn)
            })
            .await
            .map_err(map_call_err)
    }

    /// The shared connection. Query modules call through `connection().call()`.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL so the main database file is self-contained.
    pub async fn close(&self) -> Result<(), FitslotError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

fn pragma_batch(wal_mode: bool, busy_timeout_ms: u32) -> String {
    let journal = if wal_mode { "WAL" } else { "DELETE" };
    format!(
        "PRAGMA journal_mode = {journal};
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = {busy_timeout_ms};"
    )
}

/// Convert a tokio-rusqlite error into `FitslotError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> FitslotError {
    FitslotError::Storage {
        source: Box::new(e),
    }
}

/// Unwrap a domain error raised inside a `call` closure.
pub fn map_call_err(e: tokio_rusqlite::Error<FitslotError>) -> FitslotError {
    match e {
        tokio_rusqlite::Error::Error(inner) => inner,
        other => FitslotError::Storage {
            source: format!("sqlite connection error: {other:?}").into(),
        },
    }
}

/// Wrap a rusqlite error raised inside a transaction closure.
pub(crate) fn sql_err(e: rusqlite::Error) -> FitslotError {
    FitslotError::Storage {
        source: Box::new(e),
    }
}

/// Message attached to a `RAISE(ABORT, ...)` or constraint failure, if any.
pub(crate) fn constraint_message(e: &rusqlite::Error) -> Option<&str> {
    match e {
        rusqlite::Error::SqliteFailure(err, msg)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Some(msg.as_deref().unwrap_or(""))
        }
        _ => None,
    }
}
