// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes; every
//! multi-statement read-modify-write runs inside one `call` closure, so
//! concurrent callers always observe clean before/after states.

use std::path::Path;
use std::time::Duration;

use solace_core::SolaceError;

use crate::migrations;

/// Handle to the single-writer SQLite database.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs, and run all
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, SolaceError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(SolaceError::storage)?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(SolaceError::storage)?;
        init_connection(&conn).await?;
        Ok(Self { conn })
    }

    /// Open an in-memory database. Test and tooling use only.
    pub async fn open_in_memory() -> Result<Self, SolaceError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(SolaceError::storage)?;
        init_connection(&conn).await?;
        Ok(Self { conn })
    }

    /// Access the underlying connection for query modules.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Close the connection, flushing WAL.
    pub async fn close(self) -> Result<(), SolaceError> {
        self.conn
            .close()
            .await
            .map_err(|e| SolaceError::Storage {
                source: Box::new(e),
            })
    }
}

async fn init_connection(conn: &tokio_rusqlite::Connection) -> Result<(), SolaceError> {
    conn.call(|conn| {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        migrations::run_migrations(conn)
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
        Ok(())
    })
    .await
    .map_err(map_tr_box_err)
}

/// Convert a tokio-rusqlite error into the engine error type.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> SolaceError {
    SolaceError::Storage {
        source: Box::new(e),
    }
}

/// Convert a tokio-rusqlite error whose in-closure error was boxed (e.g. a
/// serde_json or migration failure) into the engine error type.
pub fn map_tr_box_err(
    e: tokio_rusqlite::Error<Box<dyn std::error::Error + Send + Sync>>,
) -> SolaceError {
    let source: Box<dyn std::error::Error + Send + Sync> = match e {
        tokio_rusqlite::Error::Error(inner) => inner,
        tokio_rusqlite::Error::ConnectionClosed => "database connection closed".into(),
        tokio_rusqlite::Error::Close((_, err)) => Box::new(err),
        _ => "unknown storage error".into(),
    };
    SolaceError::Storage { source }
}

/// Current UTC timestamp in the canonical stored format.
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
