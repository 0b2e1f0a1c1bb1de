// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message routing: who sees each message, and whether the AI answers.
//!
//! Patient traffic flows persist -> resolve mentions -> fan out -> maybe
//! invoke AI -> safety-evaluate the reply. The patient's message is always
//! persisted before the AI is involved, so an upstream failure can never
//! lose it; it is re-routed to the therapist roster instead.

use std::sync::Arc;

use metrics::counter;
use solace_core::traits::{AiResponder, AuditSink, NotificationDispatcher};
use solace_core::types::{
    AiRequest, AlertKind, AlertSeverity, AuditEntry, Caller, Notification, NotificationKind,
    NotificationUrgency, SenderRole,
};
use solace_core::SolaceError;
use solace_storage::queries::messages::{self, AmendOutcome, InsertOutcome};
use solace_storage::queries::{alerts, recipients, users};
use solace_storage::{Conversation, Database, Message};
use tracing::{error, info, warn};

use crate::access::AccessGuard;
use crate::mention::{DirectedAt, MentionResolver, RoutingDecision};
use crate::safety::SafetyPipeline;

/// What happened on the AI leg of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiDisposition {
    /// The AI replied; the reply is persisted.
    Replied { message_id: i64, escalated: bool },
    /// Directed message: the AI was bypassed by design.
    SkippedDirected,
    /// AI disabled, blocked, or human-only mode.
    SkippedUnavailable,
    /// The responder failed; the patient message was re-routed to the
    /// roster and the caller may retry.
    Failed { error: String },
    /// Not an AI-serviced submission (therapist traffic).
    NotApplicable,
}

/// Outcome of a message submission.
#[derive(Debug)]
pub struct SubmitOutcome {
    pub message: Message,
    pub decision: RoutingDecision,
    /// Users a delivery/read record was created for.
    pub recipients: Vec<String>,
    pub ai: AiDisposition,
    /// Degraded-success notes (failed audit copy, failed notification).
    pub warnings: Vec<String>,
}

pub struct MessageRouter {
    db: Arc<Database>,
    access: Arc<AccessGuard>,
    resolver: MentionResolver,
    responder: Arc<dyn AiResponder>,
    safety: Arc<SafetyPipeline>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    audit: Arc<dyn AuditSink>,
    history_limit: usize,
}

impl MessageRouter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<Database>,
        access: Arc<AccessGuard>,
        resolver: MentionResolver,
        responder: Arc<dyn AiResponder>,
        safety: Arc<SafetyPipeline>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        audit: Arc<dyn AuditSink>,
        history_limit: usize,
    ) -> Self {
        Self {
            db,
            access,
            resolver,
            responder,
            safety,
            dispatcher,
            audit,
            history_limit,
        }
    }

    /// Submit a patient message and route it.
    pub async fn submit_patient_message(
        &self,
        caller: &Caller,
        conversation_id: &str,
        text: &str,
    ) -> Result<SubmitOutcome, SolaceError> {
        if text.trim().is_empty() {
            return Err(SolaceError::Validation("message body is empty".to_string()));
        }
        self.access.require_conversation(caller, conversation_id).await?;

        let outcome = messages::insert_message_gated(
            &self.db,
            conversation_id,
            SenderRole::Patient,
            Some(caller.user_id.clone()),
            text.to_string(),
            None,
            true,
        )
        .await?;
        let (message, conversation) = match outcome {
            InsertOutcome::Inserted {
                message,
                conversation,
            } => (message, conversation),
            InsertOutcome::Closed => {
                return Err(SolaceError::ConversationClosed {
                    conversation_id: conversation_id.to_string(),
                })
            }
            InsertOutcome::Paused => {
                return Err(SolaceError::ConversationPaused {
                    conversation_id: conversation_id.to_string(),
                })
            }
            InsertOutcome::NotFound => {
                return Err(SolaceError::NotFound {
                    entity: "conversation",
                    id: conversation_id.to_string(),
                })
            }
        };
        counter!("solace_messages_routed_total").increment(1);

        let roster = users::assigned_therapists(&self.db, &conversation.group_id).await?;
        let decision = self.resolver.resolve(text, &roster);
        let ai_available = conversation.ai_available();
        let mut warnings = Vec::new();

        // Recipient fan-out. Ordinary AI-serviced traffic creates no
        // therapist rows at all, which is what keeps unread counts
        // meaningful.
        let targets: Vec<String> = match (&decision.directed_at, ai_available) {
            (DirectedAt::Therapists(ids), _) => ids.clone(),
            (DirectedAt::AllAssigned, _) | (DirectedAt::Nobody, false) => {
                roster.iter().map(|u| u.id.clone()).collect()
            }
            (DirectedAt::Nobody, true) => Vec::new(),
        };
        recipients::add_recipients(&self.db, message.id, targets.clone()).await?;

        if decision.is_tagged() {
            self.raise_tag_alerts(&message, &decision).await?;
        }
        if decision.is_tagged() || !ai_available {
            self.notify_attention(&conversation, &targets, &mut warnings).await;
        }

        let ai = if decision.is_tagged() {
            AiDisposition::SkippedDirected
        } else if !ai_available {
            AiDisposition::SkippedUnavailable
        } else {
            self.invoke_ai(&conversation, &message, &roster, &mut warnings).await?
        };

        self.best_effort_audit(
            caller,
            AuditEntry {
                actor_id: caller.user_id.clone(),
                actor_role: caller.role,
                action: "message.patient_submitted".to_string(),
                conversation_id: Some(conversation_id.to_string()),
                detail: serde_json::json!({
                    "message_id": message.id,
                    "directed": decision.is_tagged(),
                    "topics": decision.topics,
                    "recipients": targets,
                }),
            },
            &mut warnings,
        )
        .await;

        Ok(SubmitOutcome {
            message,
            decision,
            recipients: targets,
            ai,
            warnings,
        })
    }

    /// Submit a therapist reply. Allowed while paused, rejected when closed.
    pub async fn submit_therapist_message(
        &self,
        caller: &Caller,
        conversation_id: &str,
        text: &str,
    ) -> Result<SubmitOutcome, SolaceError> {
        if text.trim().is_empty() {
            return Err(SolaceError::Validation("message body is empty".to_string()));
        }
        self.access.require_clinician(caller)?;
        self.access.require_conversation(caller, conversation_id).await?;

        let outcome = messages::insert_message_gated(
            &self.db,
            conversation_id,
            SenderRole::Therapist,
            Some(caller.user_id.clone()),
            text.to_string(),
            None,
            false,
        )
        .await?;
        let (message, conversation) = match outcome {
            InsertOutcome::Inserted {
                message,
                conversation,
            } => (message, conversation),
            InsertOutcome::Closed | InsertOutcome::Paused => {
                return Err(SolaceError::ConversationClosed {
                    conversation_id: conversation_id.to_string(),
                })
            }
            InsertOutcome::NotFound => {
                return Err(SolaceError::NotFound {
                    entity: "conversation",
                    id: conversation_id.to_string(),
                })
            }
        };
        counter!("solace_messages_routed_total").increment(1);

        let targets = vec![conversation.patient_id.clone()];
        recipients::add_recipients(&self.db, message.id, targets.clone()).await?;

        let mut warnings = Vec::new();
        let notification = Notification {
            kind: NotificationKind::PatientReply,
            conversation_id: conversation_id.to_string(),
            recipient_id: conversation.patient_id.clone(),
            urgency: NotificationUrgency::Normal,
            body: "Your care team sent you a new message.".to_string(),
        };
        if let Err(e) = self.dispatcher.dispatch(notification).await {
            warn!(conversation_id, error = %e, "patient notification enqueue failed");
            warnings.push(format!("patient notification failed: {e}"));
        }

        self.best_effort_audit(
            caller,
            AuditEntry {
                actor_id: caller.user_id.clone(),
                actor_role: caller.role,
                action: "message.therapist_submitted".to_string(),
                conversation_id: Some(conversation_id.to_string()),
                detail: serde_json::json!({ "message_id": message.id }),
            },
            &mut warnings,
        )
        .await;

        Ok(SubmitOutcome {
            message,
            decision: RoutingDecision {
                directed_at: DirectedAt::Nobody,
                topics: Vec::new(),
            },
            recipients: targets,
            ai: AiDisposition::NotApplicable,
            warnings,
        })
    }

    /// Soft-edit a therapist message. Restricted to the authoring therapist.
    pub async fn edit_message(
        &self,
        caller: &Caller,
        message_id: i64,
        new_body: String,
    ) -> Result<Message, SolaceError> {
        if new_body.trim().is_empty() {
            return Err(SolaceError::Validation("message body is empty".to_string()));
        }
        self.access.require_clinician(caller)?;
        let message = self.load_message(caller, message_id).await?;

        match messages::edit_message(&self.db, message_id, &caller.user_id, new_body.clone())
            .await?
        {
            AmendOutcome::Applied { old_body } => {
                self.record_amendment(caller, &message, "message.edit", &old_body, Some(&new_body))
                    .await;
                messages::get_message(&self.db, message_id)
                    .await?
                    .ok_or(SolaceError::NotFound {
                        entity: "message",
                        id: message_id.to_string(),
                    })
            }
            AmendOutcome::NotAmendable => Err(SolaceError::AccessDenied {
                user_id: caller.user_id.clone(),
                conversation_id: message.conversation_id,
            }),
            AmendOutcome::NotFound => Err(SolaceError::NotFound {
                entity: "message",
                id: message_id.to_string(),
            }),
        }
    }

    /// Soft-delete a therapist message; the row stays as a placeholder.
    pub async fn delete_message(
        &self,
        caller: &Caller,
        message_id: i64,
    ) -> Result<Message, SolaceError> {
        self.access.require_clinician(caller)?;
        let message = self.load_message(caller, message_id).await?;

        match messages::delete_message(&self.db, message_id, &caller.user_id).await? {
            AmendOutcome::Applied { old_body } => {
                self.record_amendment(caller, &message, "message.delete", &old_body, None)
                    .await;
                messages::get_message(&self.db, message_id)
                    .await?
                    .ok_or(SolaceError::NotFound {
                        entity: "message",
                        id: message_id.to_string(),
                    })
            }
            AmendOutcome::NotAmendable => Err(SolaceError::AccessDenied {
                user_id: caller.user_id.clone(),
                conversation_id: message.conversation_id,
            }),
            AmendOutcome::NotFound => Err(SolaceError::NotFound {
                entity: "message",
                id: message_id.to_string(),
            }),
        }
    }

    async fn load_message(
        &self,
        caller: &Caller,
        message_id: i64,
    ) -> Result<Message, SolaceError> {
        let message = messages::get_message(&self.db, message_id)
            .await?
            .ok_or(SolaceError::NotFound {
                entity: "message",
                id: message_id.to_string(),
            })?;
        self.access
            .require_conversation(caller, &message.conversation_id)
            .await?;
        Ok(message)
    }

    async fn record_amendment(
        &self,
        caller: &Caller,
        message: &Message,
        action: &str,
        old_body: &str,
        new_body: Option<&str>,
    ) {
        let entry = AuditEntry {
            actor_id: caller.user_id.clone(),
            actor_role: caller.role,
            action: action.to_string(),
            conversation_id: Some(message.conversation_id.clone()),
            detail: serde_json::json!({
                "message_id": message.id,
                "old_body": old_body,
                "new_body": new_body,
            }),
        };
        if let Err(e) = self.audit.record(entry).await {
            warn!(message_id = message.id, action, error = %e, "amendment audit write failed");
        }
    }

    /// One `tag_received` alert per triggering event: a single broadcast row
    /// for "all assigned", or one row per specifically named therapist.
    async fn raise_tag_alerts(
        &self,
        message: &Message,
        decision: &RoutingDecision,
    ) -> Result<(), SolaceError> {
        let metadata = serde_json::json!({ "message_id": message.id, "topics": decision.topics });
        match &decision.directed_at {
            DirectedAt::AllAssigned => {
                alerts::insert_alert(
                    &self.db,
                    &message.conversation_id,
                    None,
                    AlertKind::TagReceived,
                    AlertSeverity::Info,
                    "patient asked for a therapist".to_string(),
                    Some(metadata),
                )
                .await?;
            }
            DirectedAt::Therapists(ids) => {
                for id in ids {
                    alerts::insert_alert(
                        &self.db,
                        &message.conversation_id,
                        Some(id.clone()),
                        AlertKind::TagReceived,
                        AlertSeverity::Info,
                        "patient asked for you directly".to_string(),
                        Some(metadata.clone()),
                    )
                    .await?;
                }
            }
            DirectedAt::Nobody => {}
        }
        Ok(())
    }

    async fn notify_attention(
        &self,
        conversation: &Conversation,
        targets: &[String],
        warnings: &mut Vec<String>,
    ) {
        for recipient_id in targets {
            let notification = Notification {
                kind: NotificationKind::TherapistAttention,
                conversation_id: conversation.id.clone(),
                recipient_id: recipient_id.clone(),
                urgency: NotificationUrgency::Normal,
                body: "A patient message needs your attention.".to_string(),
            };
            if let Err(e) = self.dispatcher.dispatch(notification).await {
                warn!(
                    conversation_id = conversation.id.as_str(),
                    recipient = recipient_id.as_str(),
                    error = %e,
                    "attention notification enqueue failed"
                );
                warnings.push(format!("notification to {recipient_id} failed: {e}"));
            }
        }
    }

    /// Request an AI reply, persist it, and safety-evaluate. A responder
    /// failure re-routes the already-persisted patient message to the
    /// roster so it is never lost.
    async fn invoke_ai(
        &self,
        conversation: &Conversation,
        message: &Message,
        roster: &[solace_storage::User],
        warnings: &mut Vec<String>,
    ) -> Result<AiDisposition, SolaceError> {
        let history =
            messages::history_for_ai(&self.db, &conversation.id, self.history_limit).await?;
        let request = AiRequest {
            conversation_id: conversation.id.clone(),
            history,
            instruction: None,
        };

        let reply = match self.responder.reply(request).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(
                    conversation_id = conversation.id.as_str(),
                    error = %e,
                    "AI responder failed; re-routing to therapists"
                );
                let roster_ids: Vec<String> = roster.iter().map(|u| u.id.clone()).collect();
                recipients::add_recipients(&self.db, message.id, roster_ids.clone()).await?;
                self.notify_attention(conversation, &roster_ids, warnings).await;
                return Ok(AiDisposition::Failed {
                    error: e.to_string(),
                });
            }
        };

        let outcome = messages::insert_message_gated(
            &self.db,
            &conversation.id,
            SenderRole::Ai,
            None,
            reply.text.clone(),
            reply.safety.clone(),
            false,
        )
        .await?;
        let reply_message = match outcome {
            InsertOutcome::Inserted { message, .. } => message,
            _ => {
                // Conversation closed mid-flight; the reply is dropped but
                // the patient message stands.
                warnings.push("conversation closed before the AI reply landed".to_string());
                return Ok(AiDisposition::Failed {
                    error: "conversation closed before the AI reply landed".to_string(),
                });
            }
        };

        let evaluation = self.safety.evaluate(message, reply.safety.as_ref()).await?;
        if evaluation.escalated {
            // The dangerous patient message becomes therapist-visible.
            let roster_ids: Vec<String> = roster.iter().map(|u| u.id.clone()).collect();
            recipients::add_recipients(&self.db, message.id, roster_ids).await?;
        }

        info!(
            conversation_id = conversation.id.as_str(),
            reply_id = reply_message.id,
            escalated = evaluation.escalated,
            "AI reply routed"
        );
        Ok(AiDisposition::Replied {
            message_id: reply_message.id,
            escalated: evaluation.escalated,
        })
    }

    async fn best_effort_audit(
        &self,
        caller: &Caller,
        entry: AuditEntry,
        warnings: &mut Vec<String>,
    ) {
        let action = entry.action.clone();
        if let Err(e) = self.audit.record(entry).await {
            warn!(actor = caller.user_id.as_str(), action = action.as_str(), error = %e,
                "audit write failed");
            warnings.push(format!("audit write failed: {e}"));
        }
    }
}
