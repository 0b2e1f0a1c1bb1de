// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end flows through the assembled engine: routing, escalation,
//! drafts, and polling, with mock AI and notification collaborators.

use std::sync::Arc;

use solace_core::types::{
    AlertKind, ConversationMode, ConversationStatus, DangerLevel, NotificationKind, RiskLevel,
    SenderRole,
};
use solace_core::SolaceError;
use solace_engine::{AiDisposition, DirectedAt, Engine, ExportScope};
use solace_storage::queries::{alerts, conversations, messages, recipients};
use solace_test_utils::{MockResponder, TestHarness};

fn engine(h: &TestHarness) -> Engine {
    Engine::new(
        h.db.clone(),
        h.responder.clone(),
        h.dispatcher.clone(),
        h.audit.clone(),
        &h.config,
    )
}

#[tokio::test]
async fn ordinary_ai_traffic_creates_no_therapist_recipients() {
    let h = TestHarness::new().await;
    let engine = engine(&h);
    h.responder
        .push_reply(MockResponder::benign("I hear you. How did today go?"))
        .await;

    let outcome = engine
        .router
        .submit_patient_message(&h.patient("p-1"), "c-1", "today was hard")
        .await
        .unwrap();

    assert_eq!(outcome.decision.directed_at, DirectedAt::Nobody);
    assert!(outcome.recipients.is_empty());
    let AiDisposition::Replied {
        message_id,
        escalated,
    } = outcome.ai
    else {
        panic!("expected AI reply, got {:?}", outcome.ai)
    };
    assert!(!escalated);

    // Patient message has no recipient rows at all; the reply is persisted.
    assert!(recipients::recipients_for_message(&h.db, outcome.message.id)
        .await
        .unwrap()
        .is_empty());
    let reply = messages::get_message(&h.db, message_id).await.unwrap().unwrap();
    assert_eq!(reply.sender_role, SenderRole::Ai);
    assert_eq!(reply.body, "I hear you. How did today go?");
    assert!(h.dispatcher.sent().await.is_empty());
}

#[tokio::test]
async fn directed_message_bypasses_ai_and_reaches_the_roster() {
    let h = TestHarness::new().await;
    let engine = engine(&h);

    let outcome = engine
        .router
        .submit_patient_message(&h.patient("p-1"), "c-1", "@therapist I need to talk")
        .await
        .unwrap();

    assert_eq!(outcome.decision.directed_at, DirectedAt::AllAssigned);
    assert!(outcome.decision.is_tagged());
    assert_eq!(outcome.ai, AiDisposition::SkippedDirected);
    assert_eq!(h.responder.request_count().await, 0, "AI must not be invoked");

    let rows = recipients::recipients_for_message(&h.db, outcome.message.id)
        .await
        .unwrap();
    let ids: Vec<_> = rows.iter().map(|r| r.user_id.as_str()).collect();
    assert_eq!(ids, vec!["t-1", "t-2"]);

    let raised = alerts::alerts_for_conversation(&h.db, "c-1").await.unwrap();
    assert_eq!(raised.len(), 1);
    assert_eq!(raised[0].kind, AlertKind::TagReceived);

    let sent = h.dispatcher.sent().await;
    assert_eq!(sent.len(), 2);
    assert!(sent
        .iter()
        .all(|n| n.kind == NotificationKind::TherapistAttention));
}

#[tokio::test]
async fn keyword_fallback_locks_the_conversation_down() {
    let h = TestHarness::new().await;
    let engine = engine(&h);
    // The reply carries no structured assessment, forcing the keyword scan
    // of the patient's text ("end it" is a configured danger term).
    h.responder
        .push_reply(MockResponder::unassessed("please hold on"))
        .await;

    let outcome = engine
        .router
        .submit_patient_message(&h.patient("p-1"), "c-1", "I want to end it")
        .await
        .unwrap();

    let AiDisposition::Replied { escalated, .. } = outcome.ai else {
        panic!("expected AI reply, got {:?}", outcome.ai)
    };
    assert!(escalated);

    let conv = conversations::get_conversation(&h.db, "c-1").await.unwrap().unwrap();
    assert!(conv.blocked);
    assert!(!conv.ai_enabled);
    assert_eq!(conv.risk_level, RiskLevel::Critical);

    let raised = alerts::alerts_for_conversation(&h.db, "c-1").await.unwrap();
    assert_eq!(raised.len(), 1);
    assert_eq!(raised[0].kind, AlertKind::DangerDetected);

    // The dangerous patient message became therapist-visible.
    let rows = recipients::recipients_for_message(&h.db, outcome.message.id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);

    // Urgent notification per assigned therapist plus the configured extra.
    let sent = h.dispatcher.sent().await;
    let mut urgent: Vec<_> = sent
        .iter()
        .filter(|n| n.kind == NotificationKind::UrgentEscalation)
        .map(|n| n.recipient_id.clone())
        .collect();
    urgent.sort();
    assert_eq!(urgent, vec!["oncall-1", "t-1", "t-2"]);
}

#[tokio::test]
async fn structured_emergency_assessment_escalates() {
    let h = TestHarness::new().await;
    let engine = engine(&h);
    h.responder
        .push_reply(MockResponder::assessed(
            "I'm very concerned about you",
            DangerLevel::Emergency,
        ))
        .await;

    engine
        .router
        .submit_patient_message(&h.patient("p-1"), "c-1", "goodbye")
        .await
        .unwrap();

    let conv = conversations::get_conversation(&h.db, "c-1").await.unwrap().unwrap();
    assert!(conv.blocked);

    // Follow-up traffic goes straight to therapists, AI stays out.
    let outcome = engine
        .router
        .submit_patient_message(&h.patient("p-1"), "c-1", "are you there?")
        .await
        .unwrap();
    assert_eq!(outcome.ai, AiDisposition::SkippedUnavailable);
    assert_eq!(outcome.recipients, vec!["t-1".to_string(), "t-2".to_string()]);
    assert_eq!(h.responder.request_count().await, 1, "only the first message hit the AI");
}

#[tokio::test]
async fn paused_conversation_rejects_patient_messages_without_a_row() {
    let h = TestHarness::new().await;
    let engine = engine(&h);
    engine
        .state
        .set_status(&h.therapist("t-1"), "c-1", ConversationStatus::Paused)
        .await
        .unwrap();

    let err = engine
        .router
        .submit_patient_message(&h.patient("p-1"), "c-1", "hello?")
        .await
        .unwrap_err();
    assert!(matches!(err, SolaceError::ConversationPaused { .. }));
    assert!(messages::get_messages(&h.db, "c-1", None, None)
        .await
        .unwrap()
        .is_empty());

    // Therapists can still write while paused.
    engine
        .router
        .submit_therapist_message(&h.therapist("t-1"), "c-1", "we're here")
        .await
        .unwrap();
}

#[tokio::test]
async fn ai_failure_reroutes_the_persisted_message_to_therapists() {
    let h = TestHarness::new().await;
    let engine = engine(&h);
    h.responder.fail_next();

    let outcome = engine
        .router
        .submit_patient_message(&h.patient("p-1"), "c-1", "anyone there?")
        .await
        .unwrap();

    let AiDisposition::Failed { error } = &outcome.ai else {
        panic!("expected failure, got {:?}", outcome.ai)
    };
    assert!(error.contains("unavailable"));

    // The message is persisted and therapist-visible.
    let stored = messages::get_messages(&h.db, "c-1", None, None).await.unwrap();
    assert_eq!(stored.len(), 1);
    let rows = recipients::recipients_for_message(&h.db, outcome.message.id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert!(h
        .dispatcher
        .sent()
        .await
        .iter()
        .all(|n| n.kind == NotificationKind::TherapistAttention));
}

#[tokio::test]
async fn human_only_mode_never_invokes_the_ai() {
    let h = TestHarness::new().await;
    let engine = engine(&h);
    engine
        .state
        .set_mode(&h.therapist("t-1"), "c-1", ConversationMode::HumanOnly)
        .await
        .unwrap();

    let outcome = engine
        .router
        .submit_patient_message(&h.patient("p-1"), "c-1", "checking in")
        .await
        .unwrap();
    assert_eq!(outcome.ai, AiDisposition::SkippedUnavailable);
    assert_eq!(outcome.recipients.len(), 2);
    assert_eq!(h.responder.request_count().await, 0);
}

#[tokio::test]
async fn draft_regenerate_then_send_ships_the_regenerated_text() {
    let h = TestHarness::new().await;
    let engine = engine(&h);
    h.responder
        .push_reply(MockResponder::benign("first draft"))
        .await;
    h.responder
        .push_reply(MockResponder::benign("second draft"))
        .await;

    let t1 = h.therapist("t-1");
    let change = engine.drafts.create(&t1, "c-1").await.unwrap();
    assert_eq!(change.draft.body, "first draft");

    let change = engine.drafts.regenerate(&t1, change.draft.id).await.unwrap();
    assert_eq!(change.draft.body, "second draft");

    let sent = engine.drafts.send(&t1, change.draft.id).await.unwrap();
    assert_eq!(sent.message.body, "second draft");
    assert_eq!(sent.message.sender_role, SenderRole::Therapist);
    assert_eq!(sent.draft.state, solace_core::types::DraftState::Sent);

    // The patient has exactly one unread message and was notified.
    let rows = recipients::recipients_for_message(&h.db, sent.message.id)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].user_id, "p-1");
    assert!(h
        .dispatcher
        .sent()
        .await
        .iter()
        .any(|n| n.kind == NotificationKind::PatientReply && n.recipient_id == "p-1"));

    // No further edits after send.
    let err = engine
        .drafts
        .edit(&t1, sent.draft.id, "too late".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, SolaceError::InvalidTransition(_)));
}

#[tokio::test]
async fn draft_undo_round_trips_and_drafts_stay_invisible() {
    let h = TestHarness::new().await;
    let engine = engine(&h);
    h.responder.push_reply(MockResponder::benign("attempt one")).await;
    h.responder.push_reply(MockResponder::benign("attempt two")).await;

    let t1 = h.therapist("t-1");
    let draft = engine.drafts.create(&t1, "c-1").await.unwrap().draft;
    engine.drafts.regenerate(&t1, draft.id).await.unwrap();
    let restored = engine.drafts.undo(&t1, draft.id).await.unwrap().draft;
    assert_eq!(restored.body, "attempt one");

    // Undo on the now-empty stack: no-op, never an error.
    let unchanged = engine.drafts.undo(&t1, draft.id).await.unwrap().draft;
    assert_eq!(unchanged.body, "attempt one");

    // Nothing draft-related entered the patient-visible stream.
    assert!(messages::get_messages(&h.db, "c-1", None, None)
        .await
        .unwrap()
        .is_empty());

    engine.drafts.discard(&t1, draft.id).await.unwrap();
    assert!(messages::get_messages(&h.db, "c-1", None, None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn only_the_author_operates_a_draft() {
    let h = TestHarness::new().await;
    let engine = engine(&h);
    let draft = engine
        .drafts
        .create(&h.therapist("t-1"), "c-1")
        .await
        .unwrap()
        .draft;

    let err = engine
        .drafts
        .edit(&h.therapist("t-2"), draft.id, "mine now".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, SolaceError::AccessDenied { .. }));
}

#[tokio::test]
async fn two_phase_polling_marks_only_fetched_rows() {
    let h = TestHarness::new().await;
    let engine = engine(&h);
    let t1 = h.therapist("t-1");

    engine
        .router
        .submit_patient_message(&h.patient("p-1"), "c-1", "@therapist ping")
        .await
        .unwrap();

    let probe = engine.unread.check_updates(&t1, "c-1", None).await.unwrap();
    assert_eq!(probe.unread_count, 1);
    let latest = probe.latest_message_id.unwrap();

    // Full fetch marks the returned rows read.
    let fetched = engine.fetch_messages(&t1, "c-1", None, None).await.unwrap();
    assert_eq!(fetched.len(), 1);
    let counts = engine.unread.unread_counts(&t1).await.unwrap();
    assert_eq!(counts.total_messages, 0);

    // A message that lands after the fetch stays unread for the therapist.
    engine
        .router
        .submit_patient_message(&h.patient("p-1"), "c-1", "@therapist again")
        .await
        .unwrap();
    let probe = engine.unread.check_updates(&t1, "c-1", Some(latest)).await.unwrap();
    assert_eq!(probe.unread_count, 1);
    let counts = engine.unread.unread_counts(&t1).await.unwrap();
    assert_eq!(counts.total_messages, 1);
}

#[tokio::test]
async fn open_conversation_is_idempotent_per_patient() {
    let h = TestHarness::new().await;
    let engine = engine(&h);

    // p-1 already has the seeded active conversation.
    let existing = engine
        .open_conversation(&h.patient("p-1"), "p-1")
        .await
        .unwrap();
    assert_eq!(existing.id, "c-1");

    // p-2 has none; a therapist outside their group may not pre-create one.
    let err = engine
        .open_conversation(&h.therapist("t-1"), "p-2")
        .await
        .unwrap_err();
    assert!(matches!(err, SolaceError::AccessDenied { .. }));

    let created = engine
        .open_conversation(&h.patient("p-2"), "p-2")
        .await
        .unwrap();
    assert_eq!(created.patient_id, "p-2");
    assert_eq!(created.group_id, "grp-b");
    assert_eq!(created.status, ConversationStatus::Active);
}

#[tokio::test]
async fn specific_mention_reaches_only_that_therapist() {
    let h = TestHarness::new().await;
    let engine = engine(&h);

    // Roster names come from the harness seed: Dana Whitfield is t-1.
    let outcome = engine
        .router
        .submit_patient_message(&h.patient("p-1"), "c-1", "@dana can we talk")
        .await
        .unwrap();

    assert_eq!(
        outcome.decision.directed_at,
        DirectedAt::Therapists(vec!["t-1".to_string()])
    );
    assert_eq!(outcome.recipients, vec!["t-1".to_string()]);

    let raised = alerts::alerts_for_conversation(&h.db, "c-1").await.unwrap();
    assert_eq!(raised.len(), 1);
    assert_eq!(raised[0].target_therapist_id.as_deref(), Some("t-1"));
}

#[tokio::test]
async fn export_reflects_routed_history() {
    let h = TestHarness::new().await;
    let engine = engine(&h);
    h.responder
        .push_reply(MockResponder::benign("thanks for sharing"))
        .await;

    engine
        .router
        .submit_patient_message(&h.patient("p-1"), "c-1", "slept badly")
        .await
        .unwrap();

    let bytes = engine
        .exporter
        .export_csv(&h.therapist("t-1"), ExportScope::Group("grp-a".to_string()))
        .await
        .unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("slept badly"));
    assert!(text.contains("thanks for sharing"));
}
