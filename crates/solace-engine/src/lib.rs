// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation orchestration and safety-escalation core.
//!
//! For every inbound message the engine decides who sees it, whether the AI
//! may answer, whether the conversation must be locked down, and how
//! per-user read state and the audit trail stay consistent under concurrent
//! polling and editing.
//!
//! The engine is explicit composition, not inheritance: each component
//! (access guard, conversation state, router, safety pipeline, drafts,
//! unread tracker) is a small struct wired up in [`Engine::new`], and the
//! external collaborators (LLM, notification delivery, audit trail) are
//! injected behind the traits in `solace-core`.

pub mod access;
pub mod drafts;
pub mod export;
pub mod mention;
pub mod notes;
pub mod router;
pub mod safety;
pub mod state;
pub mod unread;

use std::sync::Arc;

use solace_config::SolaceConfig;
use solace_core::traits::{AiResponder, AuditSink, NotificationDispatcher};
use solace_core::types::{
    ActorRole, AuditEntry, Caller, ConversationMode, ConversationStatus, RiskLevel,
};
use solace_core::SolaceError;
use solace_storage::queries::{conversations, users};
use solace_storage::{Conversation, Database, Message};
use tracing::warn;

pub use access::AccessGuard;
pub use drafts::DraftWorkflow;
pub use export::{Exporter, ExportScope};
pub use mention::{DirectedAt, MentionResolver, RoutingDecision};
pub use notes::NoteService;
pub use router::{AiDisposition, MessageRouter, SubmitOutcome};
pub use safety::{EscalationResult, SafetyPipeline};
pub use state::{ConversationState, StateChange};
pub use unread::{UnreadCounts, UnreadTracker, UpdateProbe};

/// The assembled orchestration core.
pub struct Engine {
    pub db: Arc<Database>,
    pub access: Arc<AccessGuard>,
    pub state: Arc<ConversationState>,
    pub safety: Arc<SafetyPipeline>,
    pub router: MessageRouter,
    pub drafts: DraftWorkflow,
    pub unread: UnreadTracker,
    pub notes: NoteService,
    pub exporter: Exporter,
    audit: Arc<dyn AuditSink>,
    /// Patient-facing notices for paused/blocked conversations.
    pub paused_notice: String,
    pub blocked_notice: String,
}

impl Engine {
    pub fn new(
        db: Arc<Database>,
        responder: Arc<dyn AiResponder>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        audit: Arc<dyn AuditSink>,
        config: &SolaceConfig,
    ) -> Self {
        let access = Arc::new(AccessGuard::new(Arc::clone(&db)));
        let state = Arc::new(ConversationState::new(Arc::clone(&db), Arc::clone(&audit)));
        let safety = Arc::new(SafetyPipeline::new(
            Arc::clone(&db),
            Arc::clone(&state),
            Arc::clone(&dispatcher),
            Arc::clone(&audit),
            config.safety.danger_terms.clone(),
            config.safety.extra_alert_recipients.clone(),
        ));
        let router = MessageRouter::new(
            Arc::clone(&db),
            Arc::clone(&access),
            MentionResolver::new(config.topics.tags.clone()),
            Arc::clone(&responder),
            Arc::clone(&safety),
            Arc::clone(&dispatcher),
            Arc::clone(&audit),
            config.ai.history_limit,
        );
        let drafts = DraftWorkflow::new(
            Arc::clone(&db),
            Arc::clone(&access),
            Arc::clone(&responder),
            Arc::clone(&dispatcher),
            Arc::clone(&audit),
            config.ai.draft_instruction.clone(),
            config.ai.history_limit,
        );
        let unread = UnreadTracker::new(Arc::clone(&db), Arc::clone(&access));
        let notes = NoteService::new(Arc::clone(&db), Arc::clone(&access), Arc::clone(&audit));
        let exporter = Exporter::new(Arc::clone(&db), Arc::clone(&access));

        Self {
            db,
            access,
            state,
            safety,
            router,
            drafts,
            unread,
            notes,
            exporter,
            audit,
            paused_notice: config.safety.paused_notice.clone(),
            blocked_notice: config.safety.blocked_notice.clone(),
        }
    }

    /// Open a conversation for a patient: on their first interaction, or
    /// pre-created by an assigned therapist or admin. Returns the existing
    /// open conversation instead of creating a duplicate thread.
    pub async fn open_conversation(
        &self,
        caller: &Caller,
        patient_id: &str,
    ) -> Result<Conversation, SolaceError> {
        let patient = users::get_user(&self.db, patient_id)
            .await?
            .ok_or(SolaceError::NotFound {
                entity: "user",
                id: patient_id.to_string(),
            })?;
        if patient.role != ActorRole::Patient {
            return Err(SolaceError::Validation(format!(
                "user {patient_id} is not a patient"
            )));
        }
        let group_id = patient.group_id.ok_or_else(|| {
            SolaceError::Validation(format!("patient {patient_id} has no care group"))
        })?;

        match caller.role {
            ActorRole::Patient if caller.user_id == patient_id => {}
            ActorRole::Admin => {}
            ActorRole::Therapist => {
                if !users::is_assigned(&self.db, &caller.user_id, &group_id).await? {
                    return Err(SolaceError::AccessDenied {
                        user_id: caller.user_id.clone(),
                        conversation_id: format!("patient:{patient_id}"),
                    });
                }
            }
            _ => {
                return Err(SolaceError::AccessDenied {
                    user_id: caller.user_id.clone(),
                    conversation_id: format!("patient:{patient_id}"),
                })
            }
        }

        if let Some(existing) =
            conversations::active_conversation_for_patient(&self.db, patient_id).await?
        {
            return Ok(existing);
        }

        let now = solace_storage::now_iso();
        let conversation = Conversation {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id: patient_id.to_string(),
            group_id,
            mode: ConversationMode::AiHybrid,
            status: ConversationStatus::Active,
            risk_level: RiskLevel::Low,
            ai_enabled: true,
            blocked: false,
            patient_last_seen_at: None,
            therapist_last_seen_at: None,
            created_at: now.clone(),
            updated_at: now,
        };
        conversations::create_conversation(&self.db, &conversation).await?;

        let entry = AuditEntry {
            actor_id: caller.user_id.clone(),
            actor_role: caller.role,
            action: "conversation.opened".to_string(),
            conversation_id: Some(conversation.id.clone()),
            detail: serde_json::json!({ "patient_id": patient_id }),
        };
        if let Err(e) = self.audit.record(entry).await {
            warn!(conversation_id = conversation.id.as_str(), error = %e,
                "open audit write failed");
        }
        Ok(conversation)
    }

    /// Conversation metadata, access-guarded.
    pub async fn get_conversation(
        &self,
        caller: &Caller,
        conversation_id: &str,
    ) -> Result<Conversation, SolaceError> {
        self.access.require_conversation(caller, conversation_id).await
    }

    /// Fetch ordered messages and mark exactly the returned rows read for
    /// the caller. A message landing concurrently with this fetch has a
    /// higher id than anything returned and stays unread.
    pub async fn fetch_messages(
        &self,
        caller: &Caller,
        conversation_id: &str,
        after: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<Message>, SolaceError> {
        self.access.require_conversation(caller, conversation_id).await?;
        let messages = solace_storage::queries::messages::get_messages(
            &self.db,
            conversation_id,
            after,
            limit,
        )
        .await?;
        if let Some(last) = messages.last() {
            self.unread
                .mark_read(caller, conversation_id, Some(last.id))
                .await?;
        }
        Ok(messages)
    }
}
