// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Draft rows with the regenerate undo stack.
//!
//! The undo stack is a JSON array column mutated only inside writer
//! closures, so push/pop never races with a concurrent edit.

use rusqlite::{params, OptionalExtension};
use solace_core::types::DraftState;
use solace_core::SolaceError;

use crate::database::{map_tr_box_err, map_tr_err, now_iso, Database};
use crate::models::{parse_enum, Draft};

const DRAFT_COLUMNS: &str =
    "id, conversation_id, therapist_id, state, body, undo_stack, created_at, updated_at";

fn row_to_draft(row: &rusqlite::Row<'_>) -> rusqlite::Result<Draft> {
    let undo_raw: String = row.get(5)?;
    let undo_stack: Vec<String> = serde_json::from_str(&undo_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Draft {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        therapist_id: row.get(2)?,
        state: parse_enum(row.get::<_, String>(3)?, 3)?,
        body: row.get(4)?,
        undo_stack,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn read_draft(conn: &rusqlite::Connection, id: i64) -> rusqlite::Result<Option<Draft>> {
    conn.query_row(
        &format!("SELECT {DRAFT_COLUMNS} FROM drafts WHERE id = ?1"),
        params![id],
        row_to_draft,
    )
    .optional()
}

/// Outcome of a guarded draft mutation.
#[derive(Debug)]
pub enum DraftOutcome {
    Applied(Box<Draft>),
    /// The draft is already `sent` or `discarded`.
    Terminal { state: DraftState },
    NotFound,
}

/// Insert a new draft in state `draft`.
pub async fn create_draft(
    db: &Database,
    conversation_id: &str,
    therapist_id: &str,
    body: String,
) -> Result<Draft, SolaceError> {
    let conversation_id = conversation_id.to_string();
    let therapist_id = therapist_id.to_string();
    db.connection()
        .call(move |conn| {
            let now = now_iso();
            conn.execute(
                "INSERT INTO drafts (conversation_id, therapist_id, state, body, undo_stack,
                                     created_at, updated_at)
                 VALUES (?1, ?2, 'draft', ?3, '[]', ?4, ?4)",
                params![conversation_id, therapist_id, body, now],
            )?;
            let id = conn.last_insert_rowid();
            Ok(Draft {
                id,
                conversation_id,
                therapist_id,
                state: DraftState::Draft,
                body,
                undo_stack: Vec::new(),
                created_at: now.clone(),
                updated_at: now,
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Look up one draft.
pub async fn get_draft(db: &Database, id: i64) -> Result<Option<Draft>, SolaceError> {
    db.connection()
        .call(move |conn| Ok(read_draft(conn, id)?))
        .await
        .map_err(map_tr_err)
}

/// A therapist's drafts for one conversation, newest first.
pub async fn drafts_for_conversation(
    db: &Database,
    conversation_id: &str,
    therapist_id: &str,
) -> Result<Vec<Draft>, SolaceError> {
    let conversation_id = conversation_id.to_string();
    let therapist_id = therapist_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DRAFT_COLUMNS} FROM drafts
                 WHERE conversation_id = ?1 AND therapist_id = ?2
                 ORDER BY id DESC"
            ))?;
            let rows = stmt.query_map(params![conversation_id, therapist_id], row_to_draft)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Apply a guarded mutation to a draft that must still be in state `draft`.
async fn mutate<F>(db: &Database, id: i64, apply: F) -> Result<DraftOutcome, SolaceError>
where
    F: FnOnce(&mut Draft) + Send + 'static,
{
    db.connection()
        .call(move |conn| {
            let Some(mut draft) = read_draft(conn, id)? else {
                return Ok(DraftOutcome::NotFound);
            };
            if draft.state != DraftState::Draft {
                return Ok(DraftOutcome::Terminal { state: draft.state });
            }
            apply(&mut draft);
            draft.updated_at = now_iso();
            let undo_json = serde_json::to_string(&draft.undo_stack).map_err(|e| {
                Box::new(e) as Box<dyn std::error::Error + Send + Sync>
            })?;
            conn.execute(
                "UPDATE drafts SET state = ?2, body = ?3, undo_stack = ?4, updated_at = ?5
                 WHERE id = ?1",
                params![
                    id,
                    draft.state.to_string(),
                    draft.body,
                    undo_json,
                    draft.updated_at,
                ],
            )?;
            Ok(DraftOutcome::Applied(Box::new(draft)))
        })
        .await
        .map_err(map_tr_box_err)
}

/// Replace the draft text. Allowed only while `draft`.
pub async fn update_body(db: &Database, id: i64, body: String) -> Result<DraftOutcome, SolaceError> {
    mutate(db, id, move |draft| {
        draft.body = body;
    })
    .await
}

/// Push the current text onto the undo stack and replace it with freshly
/// generated text.
pub async fn regenerate(
    db: &Database,
    id: i64,
    new_body: String,
) -> Result<DraftOutcome, SolaceError> {
    mutate(db, id, move |draft| {
        let previous = std::mem::replace(&mut draft.body, new_body);
        draft.undo_stack.push(previous);
    })
    .await
}

/// Pop the undo stack. An empty stack is a no-op, not an error.
pub async fn undo(db: &Database, id: i64) -> Result<DraftOutcome, SolaceError> {
    mutate(db, id, move |draft| {
        if let Some(previous) = draft.undo_stack.pop() {
            draft.body = previous;
        }
    })
    .await
}

/// Outcome of the atomic send.
#[derive(Debug)]
pub enum SendOutcome {
    Sent {
        draft: Box<Draft>,
        message: Box<crate::models::Message>,
    },
    Terminal { state: DraftState },
    ConversationClosed,
    NotFound,
}

/// Send a draft: flip it to `sent`, emit the patient-visible therapist
/// message, and create the patient's recipient row, all in one transaction.
/// A failure anywhere leaves the draft unsent.
pub async fn send(db: &Database, id: i64) -> Result<SendOutcome, SolaceError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(draft) = tx
                .query_row(
                    &format!("SELECT {DRAFT_COLUMNS} FROM drafts WHERE id = ?1"),
                    params![id],
                    row_to_draft,
                )
                .optional()?
            else {
                return Ok(SendOutcome::NotFound);
            };
            if draft.state != DraftState::Draft {
                return Ok(SendOutcome::Terminal { state: draft.state });
            }

            let conversation =
                crate::queries::conversations::read_conversation(&tx, &draft.conversation_id)?;
            let Some(conversation) = conversation else {
                return Ok(SendOutcome::NotFound);
            };
            if conversation.status == solace_core::types::ConversationStatus::Closed {
                return Ok(SendOutcome::ConversationClosed);
            }

            let now = now_iso();
            tx.execute(
                "INSERT INTO messages (conversation_id, sender_role, sender_id, body, created_at)
                 VALUES (?1, 'therapist', ?2, ?3, ?4)",
                params![draft.conversation_id, draft.therapist_id, draft.body, now],
            )?;
            let message_id = tx.last_insert_rowid();
            tx.execute(
                "INSERT OR IGNORE INTO message_recipients (message_id, user_id, read)
                 VALUES (?1, ?2, 0)",
                params![message_id, conversation.patient_id],
            )?;
            tx.execute(
                "UPDATE drafts SET state = 'sent', updated_at = ?2 WHERE id = ?1",
                params![id, now],
            )?;
            tx.commit()?;

            let message = crate::models::Message {
                id: message_id,
                conversation_id: draft.conversation_id.clone(),
                sender_role: solace_core::types::SenderRole::Therapist,
                sender_id: Some(draft.therapist_id.clone()),
                body: draft.body.clone(),
                safety: None,
                edited: false,
                deleted: false,
                created_at: now.clone(),
            };
            let mut sent = draft;
            sent.state = DraftState::Sent;
            sent.updated_at = now;
            Ok(SendOutcome::Sent {
                draft: Box::new(sent),
                message: Box::new(message),
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Move a draft to a terminal state (`sent` or `discarded`).
pub async fn finalize(
    db: &Database,
    id: i64,
    to: DraftState,
) -> Result<DraftOutcome, SolaceError> {
    debug_assert!(matches!(to, DraftState::Sent | DraftState::Discarded));
    mutate(db, id, move |draft| {
        draft.state = to;
    })
    .await
}
