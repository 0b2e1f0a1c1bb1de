// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI-assisted therapist drafts: generate, edit, regenerate, undo, send,
//! discard.
//!
//! Drafts never enter the patient-visible stream until sent. Every
//! transition audits the full text, so there is a complete record of what
//! was (or nearly was) sent to a vulnerable patient.

use std::sync::Arc;

use solace_core::traits::{AiResponder, AuditSink, NotificationDispatcher};
use solace_core::types::{
    AiRequest, AuditEntry, Caller, DraftState, Notification, NotificationKind,
    NotificationUrgency,
};
use solace_core::SolaceError;
use solace_storage::queries::drafts::{self, DraftOutcome, SendOutcome};
use solace_storage::queries::messages;
use solace_storage::{Database, Draft, Message};
use tracing::{info, warn};

use crate::access::AccessGuard;

/// A draft operation result with degraded-success notes.
#[derive(Debug)]
pub struct DraftChange {
    pub draft: Draft,
    pub warnings: Vec<String>,
}

/// Result of sending a draft: the terminal draft and the emitted message.
#[derive(Debug)]
pub struct DraftSent {
    pub draft: Draft,
    pub message: Message,
    pub warnings: Vec<String>,
}

pub struct DraftWorkflow {
    db: Arc<Database>,
    access: Arc<AccessGuard>,
    responder: Arc<dyn AiResponder>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    audit: Arc<dyn AuditSink>,
    instruction: String,
    history_limit: usize,
}

impl DraftWorkflow {
    pub fn new(
        db: Arc<Database>,
        access: Arc<AccessGuard>,
        responder: Arc<dyn AiResponder>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        audit: Arc<dyn AuditSink>,
        instruction: String,
        history_limit: usize,
    ) -> Self {
        Self {
            db,
            access,
            responder,
            dispatcher,
            audit,
            instruction,
            history_limit,
        }
    }

    /// Generate a new draft from conversation history plus the configured
    /// instruction block. A responder failure persists nothing; the caller
    /// retries.
    pub async fn create(
        &self,
        caller: &Caller,
        conversation_id: &str,
    ) -> Result<DraftChange, SolaceError> {
        self.access.require_clinician(caller)?;
        self.access.require_conversation(caller, conversation_id).await?;

        let history =
            messages::history_for_ai(&self.db, conversation_id, self.history_limit).await?;
        let request = AiRequest {
            conversation_id: conversation_id.to_string(),
            history,
            instruction: Some(self.instruction.clone()),
        };
        let reply = self.responder.reply(request.clone()).await?;

        let draft =
            drafts::create_draft(&self.db, conversation_id, &caller.user_id, reply.text.clone())
                .await?;
        info!(conversation_id, draft_id = draft.id, "draft generated");

        let mut warnings = Vec::new();
        // Audit-trail copy of the generation exchange, outside the
        // patient-visible stream. Best-effort relative to the draft itself.
        self.record(
            caller,
            conversation_id,
            "draft.generated",
            serde_json::json!({
                "draft_id": draft.id,
                "instruction": request.instruction,
                "history_turns": request.history.len(),
                "response_text": reply.text,
            }),
            &mut warnings,
        )
        .await;

        Ok(DraftChange { draft, warnings })
    }

    /// Replace the draft text by hand. Allowed only while `draft`.
    pub async fn edit(
        &self,
        caller: &Caller,
        draft_id: i64,
        text: String,
    ) -> Result<DraftChange, SolaceError> {
        if text.trim().is_empty() {
            return Err(SolaceError::Validation("draft body is empty".to_string()));
        }
        let draft = self.owned_draft(caller, draft_id).await?;
        let outcome = drafts::update_body(&self.db, draft_id, text.clone()).await?;
        let updated = self.unwrap_outcome(outcome, draft_id)?;

        let mut warnings = Vec::new();
        self.record(
            caller,
            &draft.conversation_id,
            "draft.edited",
            serde_json::json!({ "draft_id": draft_id, "old_text": draft.body, "new_text": text }),
            &mut warnings,
        )
        .await;
        Ok(DraftChange {
            draft: updated,
            warnings,
        })
    }

    /// Push the current text onto the undo stack and regenerate from the AI.
    pub async fn regenerate(
        &self,
        caller: &Caller,
        draft_id: i64,
    ) -> Result<DraftChange, SolaceError> {
        let draft = self.owned_draft(caller, draft_id).await?;

        let history =
            messages::history_for_ai(&self.db, &draft.conversation_id, self.history_limit).await?;
        let reply = self
            .responder
            .reply(AiRequest {
                conversation_id: draft.conversation_id.clone(),
                history,
                instruction: Some(self.instruction.clone()),
            })
            .await?;

        let outcome = drafts::regenerate(&self.db, draft_id, reply.text.clone()).await?;
        let updated = self.unwrap_outcome(outcome, draft_id)?;

        let mut warnings = Vec::new();
        self.record(
            caller,
            &draft.conversation_id,
            "draft.regenerated",
            serde_json::json!({
                "draft_id": draft_id,
                "previous_text": draft.body,
                "new_text": reply.text,
            }),
            &mut warnings,
        )
        .await;
        Ok(DraftChange {
            draft: updated,
            warnings,
        })
    }

    /// Pop the undo stack. An empty stack is a no-op, not an error.
    pub async fn undo(&self, caller: &Caller, draft_id: i64) -> Result<DraftChange, SolaceError> {
        let draft = self.owned_draft(caller, draft_id).await?;
        let outcome = drafts::undo(&self.db, draft_id).await?;
        let updated = self.unwrap_outcome(outcome, draft_id)?;

        let mut warnings = Vec::new();
        self.record(
            caller,
            &draft.conversation_id,
            "draft.undone",
            serde_json::json!({
                "draft_id": draft_id,
                "old_text": draft.body,
                "restored_text": updated.body,
            }),
            &mut warnings,
        )
        .await;
        Ok(DraftChange {
            draft: updated,
            warnings,
        })
    }

    /// Send: flip to `sent`, emit the patient-visible message, notify the
    /// patient. The storage layer makes the flip-and-emit atomic.
    pub async fn send(&self, caller: &Caller, draft_id: i64) -> Result<DraftSent, SolaceError> {
        let draft = self.owned_draft(caller, draft_id).await?;

        let (sent, message) = match drafts::send(&self.db, draft_id).await? {
            SendOutcome::Sent { draft, message } => (*draft, *message),
            SendOutcome::Terminal { state } => {
                return Err(SolaceError::InvalidTransition(format!(
                    "draft {draft_id} is already {state}"
                )))
            }
            SendOutcome::ConversationClosed => {
                return Err(SolaceError::ConversationClosed {
                    conversation_id: draft.conversation_id,
                })
            }
            SendOutcome::NotFound => {
                return Err(SolaceError::NotFound {
                    entity: "draft",
                    id: draft_id.to_string(),
                })
            }
        };
        info!(
            conversation_id = sent.conversation_id.as_str(),
            draft_id,
            message_id = message.id,
            "draft sent"
        );

        let mut warnings = Vec::new();
        let conversation =
            solace_storage::queries::conversations::get_conversation(&self.db, &sent.conversation_id)
                .await?;
        if let Some(conversation) = conversation {
            let notification = Notification {
                kind: NotificationKind::PatientReply,
                conversation_id: sent.conversation_id.clone(),
                recipient_id: conversation.patient_id,
                urgency: NotificationUrgency::Normal,
                body: "Your care team sent you a new message.".to_string(),
            };
            if let Err(e) = self.dispatcher.dispatch(notification).await {
                warn!(draft_id, error = %e, "patient notification enqueue failed");
                warnings.push(format!("patient notification failed: {e}"));
            }
        }

        self.record(
            caller,
            &sent.conversation_id,
            "draft.sent",
            serde_json::json!({
                "draft_id": draft_id,
                "message_id": message.id,
                "text": message.body,
            }),
            &mut warnings,
        )
        .await;

        Ok(DraftSent {
            draft: sent,
            message,
            warnings,
        })
    }

    /// Discard: terminal, no patient-visible effect.
    pub async fn discard(
        &self,
        caller: &Caller,
        draft_id: i64,
    ) -> Result<DraftChange, SolaceError> {
        let draft = self.owned_draft(caller, draft_id).await?;
        let outcome = drafts::finalize(&self.db, draft_id, DraftState::Discarded).await?;
        let updated = self.unwrap_outcome(outcome, draft_id)?;

        let mut warnings = Vec::new();
        self.record(
            caller,
            &draft.conversation_id,
            "draft.discarded",
            serde_json::json!({ "draft_id": draft_id, "text": draft.body }),
            &mut warnings,
        )
        .await;
        Ok(DraftChange {
            draft: updated,
            warnings,
        })
    }

    /// A therapist's drafts for one conversation.
    pub async fn list(
        &self,
        caller: &Caller,
        conversation_id: &str,
    ) -> Result<Vec<Draft>, SolaceError> {
        self.access.require_clinician(caller)?;
        self.access.require_conversation(caller, conversation_id).await?;
        drafts::drafts_for_conversation(&self.db, conversation_id, &caller.user_id).await
    }

    /// Load a draft and require that the caller is its authoring therapist
    /// with access to the conversation.
    async fn owned_draft(&self, caller: &Caller, draft_id: i64) -> Result<Draft, SolaceError> {
        self.access.require_clinician(caller)?;
        let draft = drafts::get_draft(&self.db, draft_id)
            .await?
            .ok_or(SolaceError::NotFound {
                entity: "draft",
                id: draft_id.to_string(),
            })?;
        self.access
            .require_conversation(caller, &draft.conversation_id)
            .await?;
        if draft.therapist_id != caller.user_id {
            return Err(SolaceError::AccessDenied {
                user_id: caller.user_id.clone(),
                conversation_id: draft.conversation_id,
            });
        }
        Ok(draft)
    }

    fn unwrap_outcome(&self, outcome: DraftOutcome, draft_id: i64) -> Result<Draft, SolaceError> {
        match outcome {
            DraftOutcome::Applied(draft) => Ok(*draft),
            DraftOutcome::Terminal { state } => Err(SolaceError::InvalidTransition(format!(
                "draft {draft_id} is already {state}"
            ))),
            DraftOutcome::NotFound => Err(SolaceError::NotFound {
                entity: "draft",
                id: draft_id.to_string(),
            }),
        }
    }

    async fn record(
        &self,
        caller: &Caller,
        conversation_id: &str,
        action: &str,
        detail: serde_json::Value,
        warnings: &mut Vec<String>,
    ) {
        let entry = AuditEntry {
            actor_id: caller.user_id.clone(),
            actor_role: caller.role,
            action: action.to_string(),
            conversation_id: Some(conversation_id.to_string()),
            detail,
        };
        if let Err(e) = self.audit.record(entry).await {
            warn!(conversation_id, action, error = %e, "draft audit write failed");
            warnings.push(format!("audit write failed: {e}"));
        }
    }
}
