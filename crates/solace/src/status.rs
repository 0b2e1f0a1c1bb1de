// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `solace status` command implementation.
//!
//! Opens the configured database read-side and prints conversation and
//! queue counts plus the audit chain verification result.

use solace_config::SolaceConfig;
use solace_core::SolaceError;
use solace_storage::queries::{audit, conversations, queue};
use solace_storage::Database;

pub async fn run(config: &SolaceConfig) -> Result<(), SolaceError> {
    let db = Database::open(&config.storage.database_path).await?;

    let all = conversations::all_conversations(&db).await?;
    let blocked = all.iter().filter(|c| c.blocked).count();
    let pending = queue::pending(&db, i64::MAX).await?;
    let chain = audit::verify_chain(&db).await?;

    println!("database: {}", config.storage.database_path);
    println!("conversations: {} ({blocked} blocked)", all.len());
    println!("pending notifications: {}", pending.len());
    match chain {
        None => println!("audit chain: intact"),
        Some(id) => println!("audit chain: BROKEN at entry {id}"),
    }

    db.close().await
}
