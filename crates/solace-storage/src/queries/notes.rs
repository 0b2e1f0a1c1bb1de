// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Clinical note rows. Soft-deletable, last editor tracked.

use rusqlite::{params, OptionalExtension};
use solace_core::types::NoteKind;
use solace_core::SolaceError;

use crate::database::{map_tr_err, now_iso, Database};
use crate::models::{parse_enum, Note};

const NOTE_COLUMNS: &str =
    "id, conversation_id, author_id, kind, body, deleted, last_edited_by, created_at, updated_at";

fn row_to_note(row: &rusqlite::Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        author_id: row.get(2)?,
        kind: parse_enum(row.get::<_, String>(3)?, 3)?,
        body: row.get(4)?,
        deleted: row.get(5)?,
        last_edited_by: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Insert a new note.
pub async fn create_note(
    db: &Database,
    conversation_id: &str,
    author_id: &str,
    kind: NoteKind,
    body: String,
) -> Result<Note, SolaceError> {
    let conversation_id = conversation_id.to_string();
    let author_id = author_id.to_string();
    db.connection()
        .call(move |conn| {
            let now = now_iso();
            conn.execute(
                "INSERT INTO notes (conversation_id, author_id, kind, body, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![conversation_id, author_id, kind.to_string(), body, now],
            )?;
            let id = conn.last_insert_rowid();
            Ok(Note {
                id,
                conversation_id,
                author_id,
                kind,
                body,
                deleted: false,
                last_edited_by: None,
                created_at: now.clone(),
                updated_at: now,
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Look up one note.
pub async fn get_note(db: &Database, id: i64) -> Result<Option<Note>, SolaceError> {
    db.connection()
        .call(move |conn| {
            let note = conn
                .query_row(
                    &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"),
                    params![id],
                    row_to_note,
                )
                .optional()?;
            Ok(note)
        })
        .await
        .map_err(map_tr_err)
}

/// Update a note's body and record the editor. Deleted notes are immutable.
/// Returns false when the note is missing or deleted.
pub async fn update_note(
    db: &Database,
    id: i64,
    editor_id: &str,
    body: String,
) -> Result<bool, SolaceError> {
    let editor_id = editor_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE notes SET body = ?2, last_edited_by = ?3, updated_at = ?4
                 WHERE id = ?1 AND deleted = 0",
                params![id, body, editor_id, now_iso()],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Soft-delete a note. Returns false when missing or already deleted.
pub async fn delete_note(db: &Database, id: i64, editor_id: &str) -> Result<bool, SolaceError> {
    let editor_id = editor_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE notes SET deleted = 1, last_edited_by = ?2, updated_at = ?3
                 WHERE id = ?1 AND deleted = 0",
                params![id, editor_id, now_iso()],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Non-deleted notes for a conversation, oldest first.
pub async fn notes_for_conversation(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<Note>, SolaceError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTE_COLUMNS} FROM notes
                 WHERE conversation_id = ?1 AND deleted = 0 ORDER BY id ASC"
            ))?;
            let rows = stmt.query_map(params![conversation_id], row_to_note)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}
