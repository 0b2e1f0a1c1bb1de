// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Safety evaluation and the deterministic escalation sequence.
//!
//! Two detection layers: the structured assessment from the AI reply, then
//! a keyword scan of the patient's text when no assessment is present.
//! An escalating result blocks the conversation, raises risk to critical,
//! creates one alert per event, and enqueues urgent notifications. Repeat
//! escalations on an already-blocked conversation do not re-block but
//! still raise a new alert each time: the audit timeline stays complete.

use std::collections::HashSet;
use std::sync::Arc;

use metrics::counter;
use solace_core::traits::{AuditSink, NotificationDispatcher};
use solace_core::types::{
    AlertKind, AlertSeverity, AuditEntry, Caller, DangerLevel, Notification, NotificationKind,
    NotificationUrgency, SafetyAssessment,
};
use solace_core::SolaceError;
use solace_storage::queries::{alerts, users};
use solace_storage::{Database, Message};
use tracing::{error, info, warn};

use crate::state::ConversationState;

/// Which layer produced the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionSource {
    Structured,
    Keyword,
}

/// Result of one safety evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationResult {
    pub danger: DangerLevel,
    pub escalated: bool,
    pub source: Option<DetectionSource>,
    /// The alert raised for this event, when escalating.
    pub alert_id: Option<i64>,
}

impl EscalationResult {
    fn calm() -> Self {
        Self {
            danger: DangerLevel::None,
            escalated: false,
            source: None,
            alert_id: None,
        }
    }
}

pub struct SafetyPipeline {
    db: Arc<Database>,
    state: Arc<ConversationState>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    audit: Arc<dyn AuditSink>,
    danger_terms: Vec<String>,
    extra_recipients: Vec<String>,
}

impl SafetyPipeline {
    pub fn new(
        db: Arc<Database>,
        state: Arc<ConversationState>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        audit: Arc<dyn AuditSink>,
        danger_terms: Vec<String>,
        extra_recipients: Vec<String>,
    ) -> Self {
        Self {
            db,
            state,
            dispatcher,
            audit,
            danger_terms,
            extra_recipients,
        }
    }

    /// Evaluate a patient message against the structured assessment (when
    /// present) or the keyword fallback, and run the escalation sequence on
    /// an escalating verdict.
    pub async fn evaluate(
        &self,
        message: &Message,
        assessment: Option<&SafetyAssessment>,
    ) -> Result<EscalationResult, SolaceError> {
        let (danger, source, matched_term) = match assessment {
            Some(assessment) => (assessment.danger, DetectionSource::Structured, None),
            None => match self.scan_keywords(&message.body) {
                Some(term) => (DangerLevel::Critical, DetectionSource::Keyword, Some(term)),
                None => return Ok(EscalationResult::calm()),
            },
        };

        if danger == DangerLevel::None {
            return Ok(EscalationResult::calm());
        }
        if !danger.is_escalating() {
            info!(
                conversation_id = message.conversation_id.as_str(),
                message_id = message.id,
                danger = %danger,
                "non-escalating safety warning"
            );
            return Ok(EscalationResult {
                danger,
                escalated: false,
                source: Some(source),
                alert_id: None,
            });
        }

        let alert_id = self
            .escalate(message, danger, source, matched_term.as_deref())
            .await?;
        Ok(EscalationResult {
            danger,
            escalated: true,
            source: Some(source),
            alert_id: Some(alert_id),
        })
    }

    /// Case-insensitive substring scan. Returns the first matched term.
    fn scan_keywords(&self, text: &str) -> Option<String> {
        let lowered = text.to_lowercase();
        self.danger_terms
            .iter()
            .find(|term| lowered.contains(&term.to_lowercase()))
            .cloned()
    }

    /// The escalation sequence: block, raise risk, alert, notify.
    ///
    /// Block and risk are idempotent; the alert is raised per event. The
    /// notification enqueue is isolated: its failure never rolls back the
    /// committed lockdown, it is recorded for operator visibility instead.
    async fn escalate(
        &self,
        message: &Message,
        danger: DangerLevel,
        source: DetectionSource,
        matched_term: Option<&str>,
    ) -> Result<i64, SolaceError> {
        let conversation_id = message.conversation_id.as_str();
        let system = Caller::system();

        let change = self.state.block(&system, conversation_id).await?;
        self.state.escalate_risk(&system, conversation_id).await?;

        let severity = AlertSeverity::from(danger);
        let source_label = match source {
            DetectionSource::Structured => "structured",
            DetectionSource::Keyword => "keyword",
        };
        let alert = alerts::insert_alert(
            &self.db,
            conversation_id,
            None,
            AlertKind::DangerDetected,
            severity,
            "dangerous content detected; conversation locked down".to_string(),
            Some(serde_json::json!({
                "message_id": message.id,
                "danger": danger,
                "source": source_label,
                "matched_term": matched_term,
            })),
        )
        .await?;

        counter!("solace_escalations_total").increment(1);
        info!(
            conversation_id,
            message_id = message.id,
            danger = %danger,
            source = source_label,
            alert_id = alert.id,
            "conversation escalated"
        );

        // One urgent notification per recipient: assigned roster plus
        // configured extras, deduplicated.
        let roster = users::assigned_therapists(&self.db, &change.conversation.group_id).await?;
        let mut seen = HashSet::new();
        let mut recipients = Vec::new();
        for id in roster
            .iter()
            .map(|u| u.id.as_str())
            .chain(self.extra_recipients.iter().map(String::as_str))
        {
            if seen.insert(id.to_string()) {
                recipients.push(id.to_string());
            }
        }
        for recipient_id in recipients {
            let notification = Notification {
                kind: NotificationKind::UrgentEscalation,
                conversation_id: conversation_id.to_string(),
                recipient_id,
                urgency: NotificationUrgency::Urgent,
                body: "Dangerous content was detected and the conversation has been locked. \
                       Please review immediately."
                    .to_string(),
            };
            if let Err(e) = self.dispatcher.dispatch(notification).await {
                error!(conversation_id, error = %e, "escalation notification enqueue failed");
            }
        }

        let entry = AuditEntry {
            actor_id: system.user_id.clone(),
            actor_role: system.role,
            action: "safety.escalation".to_string(),
            conversation_id: Some(conversation_id.to_string()),
            detail: serde_json::json!({
                "message_id": message.id,
                "danger": danger,
                "source": source_label,
                "alert_id": alert.id,
            }),
        };
        if let Err(e) = self.audit.record(entry).await {
            warn!(conversation_id, error = %e, "escalation audit write failed");
        }

        Ok(alert.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solace_core::types::{ConversationStatus, RiskLevel, SenderRole};
    use solace_storage::queries::conversations;
    use solace_storage::queries::messages::{insert_message_gated, InsertOutcome};
    use solace_test_utils::TestHarness;

    fn pipeline(h: &TestHarness) -> SafetyPipeline {
        let state = Arc::new(ConversationState::new(h.db.clone(), h.audit.clone()));
        SafetyPipeline::new(
            h.db.clone(),
            state,
            h.dispatcher.clone(),
            h.audit.clone(),
            h.config.safety.danger_terms.clone(),
            h.config.safety.extra_alert_recipients.clone(),
        )
    }

    async fn patient_message(h: &TestHarness, body: &str) -> Message {
        match insert_message_gated(
            &h.db,
            "c-1",
            SenderRole::Patient,
            Some("p-1".to_string()),
            body.to_string(),
            None,
            true,
        )
        .await
        .unwrap()
        {
            InsertOutcome::Inserted { message, .. } => message,
            other => panic!("expected insert, got {other:?}"),
        }
    }

    fn assessment(danger: DangerLevel) -> SafetyAssessment {
        SafetyAssessment {
            danger,
            reason: None,
        }
    }

    #[tokio::test]
    async fn benign_assessment_does_nothing() {
        let h = TestHarness::new().await;
        let p = pipeline(&h);
        let msg = patient_message(&h, "feeling a bit better today").await;

        let result = p.evaluate(&msg, Some(&assessment(DangerLevel::None))).await.unwrap();
        assert!(!result.escalated);
        assert!(h.dispatcher.sent().await.is_empty());
        assert!(alerts::alerts_for_conversation(&h.db, "c-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn warning_is_logged_but_not_escalating() {
        let h = TestHarness::new().await;
        let p = pipeline(&h);
        let msg = patient_message(&h, "rough week").await;

        let result = p
            .evaluate(&msg, Some(&assessment(DangerLevel::Warning)))
            .await
            .unwrap();
        assert!(!result.escalated);
        assert_eq!(result.danger, DangerLevel::Warning);

        let conv = conversations::get_conversation(&h.db, "c-1").await.unwrap().unwrap();
        assert!(!conv.blocked);
        assert_eq!(conv.risk_level, RiskLevel::Low);
    }

    #[tokio::test]
    async fn critical_assessment_runs_the_full_sequence() {
        let h = TestHarness::new().await;
        let p = pipeline(&h);
        let msg = patient_message(&h, "it is all too much").await;

        let result = p
            .evaluate(&msg, Some(&assessment(DangerLevel::Critical)))
            .await
            .unwrap();
        assert!(result.escalated);
        assert_eq!(result.source, Some(DetectionSource::Structured));

        let conv = conversations::get_conversation(&h.db, "c-1").await.unwrap().unwrap();
        assert!(conv.blocked);
        assert!(!conv.ai_enabled);
        assert_eq!(conv.risk_level, RiskLevel::Critical);
        assert_eq!(conv.status, ConversationStatus::Active); // status untouched

        let raised = alerts::alerts_for_conversation(&h.db, "c-1").await.unwrap();
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].kind, AlertKind::DangerDetected);
        assert_eq!(raised[0].severity, AlertSeverity::Critical);
        assert!(raised[0].target_therapist_id.is_none());

        // Assigned roster (t-1, t-2) plus the configured extra, exactly once each.
        let sent = h.dispatcher.sent().await;
        let mut recipients: Vec<_> = sent.iter().map(|n| n.recipient_id.clone()).collect();
        recipients.sort();
        assert_eq!(recipients, vec!["oncall-1", "t-1", "t-2"]);
        assert!(sent
            .iter()
            .all(|n| n.kind == NotificationKind::UrgentEscalation));
    }

    #[tokio::test]
    async fn keyword_fallback_escalates_at_critical() {
        let h = TestHarness::new().await;
        let p = pipeline(&h);
        let msg = patient_message(&h, "I want to end it").await;

        let result = p.evaluate(&msg, None).await.unwrap();
        assert!(result.escalated);
        assert_eq!(result.danger, DangerLevel::Critical);
        assert_eq!(result.source, Some(DetectionSource::Keyword));

        let raised = alerts::alerts_for_conversation(&h.db, "c-1").await.unwrap();
        assert_eq!(raised[0].metadata.as_ref().unwrap()["matched_term"], "end it");
    }

    #[tokio::test]
    async fn no_payload_and_no_keyword_is_calm() {
        let h = TestHarness::new().await;
        let p = pipeline(&h);
        let msg = patient_message(&h, "slept okay").await;

        let result = p.evaluate(&msg, None).await.unwrap();
        assert!(!result.escalated);
        assert_eq!(result.danger, DangerLevel::None);
    }

    #[tokio::test]
    async fn repeat_escalations_alert_every_time_without_reblocking() {
        let h = TestHarness::new().await;
        let p = pipeline(&h);
        let msg = patient_message(&h, "I want to end it").await;

        p.evaluate(&msg, None).await.unwrap();
        let msg2 = patient_message(&h, "I still want to end it").await;
        // Second evaluation on an already-blocked conversation.
        let result = p.evaluate(&msg2, None).await.unwrap();
        assert!(result.escalated);

        let raised = alerts::alerts_for_conversation(&h.db, "c-1").await.unwrap();
        assert_eq!(raised.len(), 2, "one alert per escalating event");

        let conv = conversations::get_conversation(&h.db, "c-1").await.unwrap().unwrap();
        assert!(conv.blocked && !conv.ai_enabled);
        assert_eq!(conv.risk_level, RiskLevel::Critical);
    }

    #[tokio::test]
    async fn notification_failure_never_rolls_back_the_lockdown() {
        let h = TestHarness::new().await;
        let p = pipeline(&h);
        h.dispatcher.set_failing(true);
        let msg = patient_message(&h, "I want to end it").await;

        let result = p.evaluate(&msg, None).await.unwrap();
        assert!(result.escalated);

        let conv = conversations::get_conversation(&h.db, "c-1").await.unwrap().unwrap();
        assert!(conv.blocked);
        assert_eq!(
            alerts::alerts_for_conversation(&h.db, "c-1").await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn emergency_severity_is_preserved_on_the_alert() {
        let h = TestHarness::new().await;
        let p = pipeline(&h);
        let msg = patient_message(&h, "please help now").await;

        p.evaluate(&msg, Some(&assessment(DangerLevel::Emergency)))
            .await
            .unwrap();
        let raised = alerts::alerts_for_conversation(&h.db, "c-1").await.unwrap();
        assert_eq!(raised[0].severity, AlertSeverity::Emergency);
    }
}
