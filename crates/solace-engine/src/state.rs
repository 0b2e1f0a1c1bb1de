// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation control-state transitions with auditing.
//!
//! Wraps the storage transition primitives, maps their outcomes onto the
//! error taxonomy, and writes one audit entry per applied transition.
//! Transitions are single atomic writes: on failure the caller observes an
//! error and the conversation keeps its prior state; nothing is retried.

use std::sync::Arc;

use solace_core::traits::AuditSink;
use solace_core::types::{AuditEntry, Caller, ConversationMode, ConversationStatus, RiskLevel};
use solace_core::SolaceError;
use solace_storage::queries::conversations::{self, TransitionResult};
use solace_storage::{Conversation, Database};
use tracing::{info, warn};

/// A successfully applied transition.
///
/// `warning` is set when the secondary audit write failed; the primary
/// state change has still committed.
#[derive(Debug)]
pub struct StateChange {
    pub conversation: Conversation,
    pub warning: Option<String>,
}

pub struct ConversationState {
    db: Arc<Database>,
    audit: Arc<dyn AuditSink>,
}

impl ConversationState {
    pub fn new(db: Arc<Database>, audit: Arc<dyn AuditSink>) -> Self {
        Self { db, audit }
    }

    pub async fn set_mode(
        &self,
        caller: &Caller,
        conversation_id: &str,
        mode: ConversationMode,
    ) -> Result<StateChange, SolaceError> {
        let result = conversations::set_mode(&self.db, conversation_id, mode).await?;
        self.finish(caller, conversation_id, "conversation.set_mode", result)
            .await
    }

    pub async fn set_status(
        &self,
        caller: &Caller,
        conversation_id: &str,
        status: ConversationStatus,
    ) -> Result<StateChange, SolaceError> {
        let result = conversations::set_status(&self.db, conversation_id, status).await?;
        self.finish(caller, conversation_id, "conversation.set_status", result)
            .await
    }

    pub async fn set_risk_level(
        &self,
        caller: &Caller,
        conversation_id: &str,
        risk: RiskLevel,
    ) -> Result<StateChange, SolaceError> {
        let result = conversations::set_risk_level(&self.db, conversation_id, risk).await?;
        self.finish(caller, conversation_id, "conversation.set_risk_level", result)
            .await
    }

    /// Suggest risk upward to `critical`; never lowers a therapist-set value.
    pub async fn escalate_risk(
        &self,
        caller: &Caller,
        conversation_id: &str,
    ) -> Result<StateChange, SolaceError> {
        let result = conversations::escalate_risk(&self.db, conversation_id).await?;
        self.finish(caller, conversation_id, "conversation.escalate_risk", result)
            .await
    }

    /// Toggle the AI. Enabling always clears a block; disabling leaves any
    /// block in place.
    pub async fn set_ai_enabled(
        &self,
        caller: &Caller,
        conversation_id: &str,
        enabled: bool,
    ) -> Result<StateChange, SolaceError> {
        let result = conversations::set_ai_enabled(&self.db, conversation_id, enabled).await?;
        self.finish(caller, conversation_id, "conversation.set_ai_enabled", result)
            .await
    }

    /// Lock down: AI off, blocked on, status untouched. Idempotent.
    pub async fn block(
        &self,
        caller: &Caller,
        conversation_id: &str,
    ) -> Result<StateChange, SolaceError> {
        let result = conversations::block(&self.db, conversation_id).await?;
        self.finish(caller, conversation_id, "conversation.block", result)
            .await
    }

    /// Clear a block and re-enable the AI: the single restore-service action.
    pub async fn unblock(
        &self,
        caller: &Caller,
        conversation_id: &str,
    ) -> Result<StateChange, SolaceError> {
        let result = conversations::unblock(&self.db, conversation_id).await?;
        self.finish(caller, conversation_id, "conversation.unblock", result)
            .await
    }

    async fn finish(
        &self,
        caller: &Caller,
        conversation_id: &str,
        action: &str,
        result: TransitionResult,
    ) -> Result<StateChange, SolaceError> {
        match result {
            TransitionResult::NotFound => Err(SolaceError::NotFound {
                entity: "conversation",
                id: conversation_id.to_string(),
            }),
            TransitionResult::Rejected { current } => Err(SolaceError::InvalidTransition(
                format!("{action} rejected in status {}", current.status),
            )),
            TransitionResult::Applied { old, new } => {
                debug_assert!(!(new.blocked && new.ai_enabled));
                info!(
                    conversation_id,
                    action,
                    actor = caller.user_id.as_str(),
                    "conversation transition applied"
                );
                let entry = AuditEntry {
                    actor_id: caller.user_id.clone(),
                    actor_role: caller.role,
                    action: action.to_string(),
                    conversation_id: Some(conversation_id.to_string()),
                    detail: serde_json::json!({
                        "old": {
                            "mode": old.mode,
                            "status": old.status,
                            "risk_level": old.risk_level,
                            "ai_enabled": old.ai_enabled,
                            "blocked": old.blocked,
                        },
                        "new": {
                            "mode": new.mode,
                            "status": new.status,
                            "risk_level": new.risk_level,
                            "ai_enabled": new.ai_enabled,
                            "blocked": new.blocked,
                        },
                    }),
                };
                let warning = match self.audit.record(entry).await {
                    Ok(()) => None,
                    Err(e) => {
                        warn!(conversation_id, action, error = %e, "audit write failed");
                        Some(format!("audit write failed: {e}"))
                    }
                };
                Ok(StateChange {
                    conversation: *new,
                    warning,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solace_storage::queries::audit;
    use solace_test_utils::TestHarness;

    fn state(h: &TestHarness) -> ConversationState {
        ConversationState::new(h.db.clone(), h.audit.clone())
    }

    #[tokio::test]
    async fn every_transition_writes_one_audit_entry() {
        let h = TestHarness::new().await;
        let state = state(&h);
        let t1 = h.therapist("t-1");

        state
            .set_status(&t1, "c-1", ConversationStatus::Paused)
            .await
            .unwrap();
        state.set_risk_level(&t1, "c-1", RiskLevel::High).await.unwrap();
        state.block(&t1, "c-1").await.unwrap();

        let entries = audit::entries_for_conversation(&h.db, "c-1").await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].action, "conversation.set_status");
        assert_eq!(entries[2].action, "conversation.block");
        assert_eq!(entries[1].detail["new"]["risk_level"], "high");
    }

    #[tokio::test]
    async fn blocked_implies_ai_disabled_after_every_transition() {
        let h = TestHarness::new().await;
        let state = state(&h);
        let t1 = h.therapist("t-1");

        let change = state.block(&t1, "c-1").await.unwrap();
        assert!(change.conversation.blocked && !change.conversation.ai_enabled);

        let change = state.set_ai_enabled(&t1, "c-1", false).await.unwrap();
        assert!(!change.conversation.ai_enabled);

        let change = state.unblock(&t1, "c-1").await.unwrap();
        assert!(!change.conversation.blocked && change.conversation.ai_enabled);
    }

    #[tokio::test]
    async fn closed_transition_is_invalid_and_leaves_state_alone() {
        let h = TestHarness::new().await;
        let state = state(&h);
        let t1 = h.therapist("t-1");

        state
            .set_status(&t1, "c-1", ConversationStatus::Closed)
            .await
            .unwrap();
        let err = state
            .set_status(&t1, "c-1", ConversationStatus::Active)
            .await
            .unwrap_err();
        assert!(matches!(err, SolaceError::InvalidTransition(_)));

        let conv = solace_storage::queries::conversations::get_conversation(&h.db, "c-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conv.status, ConversationStatus::Closed);
    }

    #[tokio::test]
    async fn escalate_never_lowers_manual_risk() {
        let h = TestHarness::new().await;
        let state = state(&h);
        let t1 = h.therapist("t-1");

        state.escalate_risk(&Caller::system(), "c-1").await.unwrap();
        let conv = state
            .set_risk_level(&t1, "c-1", RiskLevel::Medium)
            .await
            .unwrap()
            .conversation;
        assert_eq!(conv.risk_level, RiskLevel::Medium);

        // A later escalation raises it again; the therapist can still win.
        let conv = state
            .escalate_risk(&Caller::system(), "c-1")
            .await
            .unwrap()
            .conversation;
        assert_eq!(conv.risk_level, RiskLevel::Critical);
    }
}
