// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Clinical notes on a conversation, independent of the message stream.

use std::sync::Arc;

use solace_core::traits::AuditSink;
use solace_core::types::{AuditEntry, Caller, NoteKind};
use solace_core::SolaceError;
use solace_storage::queries::notes;
use solace_storage::{Database, Note};
use tracing::warn;

use crate::access::AccessGuard;

pub struct NoteService {
    db: Arc<Database>,
    access: Arc<AccessGuard>,
    audit: Arc<dyn AuditSink>,
}

impl NoteService {
    pub fn new(db: Arc<Database>, access: Arc<AccessGuard>, audit: Arc<dyn AuditSink>) -> Self {
        Self { db, access, audit }
    }

    pub async fn add(
        &self,
        caller: &Caller,
        conversation_id: &str,
        kind: NoteKind,
        body: String,
    ) -> Result<Note, SolaceError> {
        if body.trim().is_empty() {
            return Err(SolaceError::Validation("note body is empty".to_string()));
        }
        self.access.require_clinician(caller)?;
        self.access.require_conversation(caller, conversation_id).await?;

        let note = notes::create_note(&self.db, conversation_id, &caller.user_id, kind, body).await?;
        self.record(caller, conversation_id, "note.created", &note).await;
        Ok(note)
    }

    pub async fn edit(
        &self,
        caller: &Caller,
        note_id: i64,
        body: String,
    ) -> Result<Note, SolaceError> {
        if body.trim().is_empty() {
            return Err(SolaceError::Validation("note body is empty".to_string()));
        }
        let note = self.accessible_note(caller, note_id).await?;
        if !notes::update_note(&self.db, note_id, &caller.user_id, body).await? {
            return Err(SolaceError::InvalidTransition(format!(
                "note {note_id} is deleted"
            )));
        }
        let updated = notes::get_note(&self.db, note_id).await?.ok_or(SolaceError::NotFound {
            entity: "note",
            id: note_id.to_string(),
        })?;
        self.record(caller, &note.conversation_id, "note.edited", &updated).await;
        Ok(updated)
    }

    pub async fn remove(&self, caller: &Caller, note_id: i64) -> Result<(), SolaceError> {
        let note = self.accessible_note(caller, note_id).await?;
        if !notes::delete_note(&self.db, note_id, &caller.user_id).await? {
            return Err(SolaceError::InvalidTransition(format!(
                "note {note_id} is already deleted"
            )));
        }
        self.record(caller, &note.conversation_id, "note.deleted", &note).await;
        Ok(())
    }

    pub async fn list(
        &self,
        caller: &Caller,
        conversation_id: &str,
    ) -> Result<Vec<Note>, SolaceError> {
        self.access.require_clinician(caller)?;
        self.access.require_conversation(caller, conversation_id).await?;
        notes::notes_for_conversation(&self.db, conversation_id).await
    }

    async fn accessible_note(&self, caller: &Caller, note_id: i64) -> Result<Note, SolaceError> {
        self.access.require_clinician(caller)?;
        let note = notes::get_note(&self.db, note_id).await?.ok_or(SolaceError::NotFound {
            entity: "note",
            id: note_id.to_string(),
        })?;
        self.access
            .require_conversation(caller, &note.conversation_id)
            .await?;
        Ok(note)
    }

    async fn record(&self, caller: &Caller, conversation_id: &str, action: &str, note: &Note) {
        let entry = AuditEntry {
            actor_id: caller.user_id.clone(),
            actor_role: caller.role,
            action: action.to_string(),
            conversation_id: Some(conversation_id.to_string()),
            detail: serde_json::json!({ "note_id": note.id, "kind": note.kind, "body": note.body }),
        };
        if let Err(e) = self.audit.record(entry).await {
            warn!(conversation_id, action, error = %e, "note audit write failed");
        }
    }
}
