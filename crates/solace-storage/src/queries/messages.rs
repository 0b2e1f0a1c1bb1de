// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message rows: gated insert, ordered reads, soft edit/delete, and the
//! cheap poll probe.
//!
//! The lifecycle gate (closed/paused) and the insert run in one writer
//! closure, so a conversation cannot close between the check and the write.

use rusqlite::{params, OptionalExtension};
use solace_core::types::{AiTurn, SafetyAssessment, SenderRole};
use solace_core::SolaceError;

use crate::database::{map_tr_err, now_iso, Database};
use crate::models::{parse_enum, parse_json, Conversation, Message};
use crate::queries::conversations::read_conversation;

/// Outcome of a gated message insert.
#[derive(Debug)]
pub enum InsertOutcome {
    Inserted {
        message: Message,
        conversation: Box<Conversation>,
    },
    Closed,
    Paused,
    NotFound,
}

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_role, sender_id, body, safety, edited, deleted, created_at";

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_role: parse_enum(row.get::<_, String>(2)?, 2)?,
        sender_id: row.get(3)?,
        body: row.get(4)?,
        safety: parse_json(row.get::<_, Option<String>>(5)?, 5)?,
        edited: row.get(6)?,
        deleted: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Insert a message after checking the conversation lifecycle gate.
///
/// `reject_paused` is set for patient traffic only; therapists and the AI
/// may still write into a paused conversation. `closed` rejects everyone.
#[allow(clippy::too_many_arguments)]
pub async fn insert_message_gated(
    db: &Database,
    conversation_id: &str,
    sender_role: SenderRole,
    sender_id: Option<String>,
    body: String,
    safety: Option<SafetyAssessment>,
    reject_paused: bool,
) -> Result<InsertOutcome, SolaceError> {
    let conversation_id = conversation_id.to_string();
    let safety_json = safety
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(SolaceError::storage)?;
    db.connection()
        .call(move |conn| {
            let Some(conversation) = read_conversation(conn, &conversation_id)? else {
                return Ok(InsertOutcome::NotFound);
            };
            match conversation.status {
                solace_core::types::ConversationStatus::Closed => {
                    return Ok(InsertOutcome::Closed)
                }
                solace_core::types::ConversationStatus::Paused if reject_paused => {
                    return Ok(InsertOutcome::Paused)
                }
                _ => {}
            }

            let created_at = now_iso();
            conn.execute(
                "INSERT INTO messages
                 (conversation_id, sender_role, sender_id, body, safety, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    conversation_id,
                    sender_role.to_string(),
                    sender_id,
                    body,
                    safety_json,
                    created_at,
                ],
            )?;
            let id = conn.last_insert_rowid();
            Ok(InsertOutcome::Inserted {
                message: Message {
                    id,
                    conversation_id,
                    sender_role,
                    sender_id,
                    body,
                    safety,
                    edited: false,
                    deleted: false,
                    created_at,
                },
                conversation: Box::new(conversation),
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Messages for a conversation in id order, optionally after a cursor.
pub async fn get_messages(
    db: &Database,
    conversation_id: &str,
    after: Option<i64>,
    limit: Option<i64>,
) -> Result<Vec<Message>, SolaceError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE conversation_id = ?1 AND id > ?2
                 ORDER BY id ASC LIMIT ?3"
            ))?;
            let rows = stmt.query_map(
                params![conversation_id, after.unwrap_or(0), limit.unwrap_or(i64::MAX)],
                row_to_message,
            )?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

/// Look up one message.
pub async fn get_message(db: &Database, id: i64) -> Result<Option<Message>, SolaceError> {
    db.connection()
        .call(move |conn| {
            let msg = conn
                .query_row(
                    &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                    params![id],
                    row_to_message,
                )
                .optional()?;
            Ok(msg)
        })
        .await
        .map_err(map_tr_err)
}

/// The cheap poll probe: count of messages past the cursor and the latest
/// id, from one indexed scan. Never loads bodies.
pub async fn check_updates(
    db: &Database,
    conversation_id: &str,
    since: Option<i64>,
) -> Result<(i64, Option<i64>), SolaceError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let row = conn.query_row(
                "SELECT COUNT(*), MAX(id) FROM messages
                 WHERE conversation_id = ?1 AND id > ?2",
                params![conversation_id, since.unwrap_or(0)],
                |row| {
                    let count: i64 = row.get(0)?;
                    let latest: Option<i64> = row.get(1)?;
                    Ok((count, latest))
                },
            )?;
            Ok(row)
        })
        .await
        .map_err(map_tr_err)
}

/// Outcome of a soft edit/delete attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum AmendOutcome {
    /// Applied; carries the previous body for the audit entry.
    Applied { old_body: String },
    /// The message exists but the caller is not its therapist author, or it
    /// was already deleted.
    NotAmendable,
    NotFound,
}

fn amendable(conn: &rusqlite::Connection, id: i64, author_id: &str) -> rusqlite::Result<AmendOutcome> {
    let row = conn
        .query_row(
            "SELECT sender_role, sender_id, deleted, body FROM messages WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;
    Ok(match row {
        None => AmendOutcome::NotFound,
        Some((role, sender, deleted, body)) => {
            if role == "therapist" && sender.as_deref() == Some(author_id) && !deleted {
                AmendOutcome::Applied { old_body: body }
            } else {
                AmendOutcome::NotAmendable
            }
        }
    })
}

/// Soft-edit a therapist-authored message. Only the authoring therapist may
/// edit; the edited flag is set and the old body returned for auditing.
pub async fn edit_message(
    db: &Database,
    id: i64,
    author_id: &str,
    new_body: String,
) -> Result<AmendOutcome, SolaceError> {
    let author_id = author_id.to_string();
    db.connection()
        .call(move |conn| {
            let outcome = amendable(conn, id, &author_id)?;
            if let AmendOutcome::Applied { .. } = outcome {
                conn.execute(
                    "UPDATE messages SET body = ?2, edited = 1 WHERE id = ?1",
                    params![id, new_body],
                )?;
            }
            Ok(outcome)
        })
        .await
        .map_err(map_tr_err)
}

/// Soft-delete a therapist-authored message. The row remains as a deleted
/// placeholder, never purged.
pub async fn delete_message(
    db: &Database,
    id: i64,
    author_id: &str,
) -> Result<AmendOutcome, SolaceError> {
    let author_id = author_id.to_string();
    db.connection()
        .call(move |conn| {
            let outcome = amendable(conn, id, &author_id)?;
            if let AmendOutcome::Applied { .. } = outcome {
                conn.execute("UPDATE messages SET deleted = 1 WHERE id = ?1", params![id])?;
            }
            Ok(outcome)
        })
        .await
        .map_err(map_tr_err)
}

/// The last `limit` non-deleted conversational turns, oldest first, shaped
/// for an AI request. System messages are excluded.
pub async fn history_for_ai(
    db: &Database,
    conversation_id: &str,
    limit: usize,
) -> Result<Vec<AiTurn>, SolaceError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT sender_role, body FROM messages
                 WHERE conversation_id = ?1 AND deleted = 0 AND sender_role != 'system'
                 ORDER BY id DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![conversation_id, limit as i64], |row| {
                let role: SenderRole = parse_enum(row.get::<_, String>(0)?, 0)?;
                Ok(AiTurn {
                    role,
                    body: row.get(1)?,
                })
            })?;
            let mut turns = Vec::new();
            for row in rows {
                turns.push(row?);
            }
            turns.reverse();
            Ok(turns)
        })
        .await
        .map_err(map_tr_err)
}
