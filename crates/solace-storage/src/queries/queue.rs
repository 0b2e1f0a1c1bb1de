// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Crash-safe outbound notification queue.
//!
//! The engine enqueues; a delivery worker (email, push) drains `pending`
//! rows and marks them `sent` or `failed`. Rows survive restarts.

use rusqlite::params;
use solace_core::types::Notification;
use solace_core::SolaceError;

use crate::database::{map_tr_err, now_iso, Database};
use crate::models::{parse_enum, QueueState, QueuedNotification};

/// Enqueue one notification. Returns the queue row id.
pub async fn enqueue(db: &Database, notification: &Notification) -> Result<i64, SolaceError> {
    let n = notification.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO notification_queue
                 (kind, conversation_id, recipient_id, urgency, body, state, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6)",
                params![
                    n.kind.to_string(),
                    n.conversation_id,
                    n.recipient_id,
                    n.urgency.to_string(),
                    n.body,
                    now_iso(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Oldest pending rows, up to `limit`.
pub async fn pending(db: &Database, limit: i64) -> Result<Vec<QueuedNotification>, SolaceError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, kind, conversation_id, recipient_id, urgency, body, state, created_at
                 FROM notification_queue WHERE state = 'pending'
                 ORDER BY id ASC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(QueuedNotification {
                    id: row.get(0)?,
                    kind: parse_enum(row.get::<_, String>(1)?, 1)?,
                    conversation_id: row.get(2)?,
                    recipient_id: row.get(3)?,
                    urgency: parse_enum(row.get::<_, String>(4)?, 4)?,
                    body: row.get(5)?,
                    state: parse_enum(row.get::<_, String>(6)?, 6)?,
                    created_at: row.get(7)?,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a queue row delivered or failed.
pub async fn mark(db: &Database, id: i64, state: QueueState) -> Result<(), SolaceError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE notification_queue SET state = ?2 WHERE id = ?1",
                params![id, state.to_string()],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
