// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `solace serve` command implementation.
//!
//! Opens the database, wires the storage-backed audit sink and
//! notification queue behind their traits, assembles the engine, and
//! serves the polling/action surface.

use std::sync::Arc;

use solace_config::SolaceConfig;
use solace_core::SolaceError;
use solace_engine::Engine;
use solace_gateway::{start_server, ServerConfig};
use solace_storage::{Database, QueueDispatcher, SqliteAuditSink};
use tracing::info;

use crate::responder::UnconfiguredResponder;

pub async fn run(config: &SolaceConfig) -> Result<(), SolaceError> {
    let db = Arc::new(Database::open(&config.storage.database_path).await?);
    info!(path = config.storage.database_path.as_str(), "database ready");

    let audit = Arc::new(SqliteAuditSink::new(Arc::clone(&db)));
    let dispatcher = Arc::new(QueueDispatcher::new(Arc::clone(&db)));
    let responder = Arc::new(UnconfiguredResponder);

    let engine = Arc::new(Engine::new(db, responder, dispatcher, audit, config));

    let server_config = ServerConfig {
        host: config.gateway.host.clone(),
        port: config.gateway.port,
        bearer_token: config.gateway.bearer_token.clone(),
    };
    start_server(&server_config, engine).await
}
