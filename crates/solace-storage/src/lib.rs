// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Solace engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, typed query
//! modules per table family, and storage-backed adapters for the audit and
//! notification collaborator traits.
//!
//! Every read-modify-write on conversation control state or read-state
//! bookkeeping runs inside one writer closure, which is what makes
//! concurrent toggles clean last-writer-wins transitions.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

#[cfg(test)]
pub(crate) mod test_support;

pub use adapter::{QueueDispatcher, SqliteAuditSink};
pub use database::{now_iso, Database};
pub use models::*;
