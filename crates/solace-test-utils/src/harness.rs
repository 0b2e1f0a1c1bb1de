// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared test fixture: an in-memory database with a seeded care group,
//! mock collaborators, and a test configuration.
//!
//! Seeded principals: patient `p-1` (group `grp-a`, active conversation
//! `c-1`), patient `p-2` (group `grp-b`, no conversation), therapists
//! `t-1` and `t-2` assigned to `grp-a`, therapist `t-9` assigned to
//! `grp-z`, and admin `adm-1`.

use std::sync::Arc;

use solace_config::SolaceConfig;
use solace_core::types::{ActorRole, Caller, ConversationMode, ConversationStatus, RiskLevel};
use solace_storage::queries::{conversations, users};
use solace_storage::{Conversation, Database, SqliteAuditSink, User};

use crate::mock_dispatcher::RecordingDispatcher;
use crate::mock_responder::MockResponder;

pub struct TestHarness {
    pub db: Arc<Database>,
    pub responder: Arc<MockResponder>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub audit: Arc<SqliteAuditSink>,
    pub config: SolaceConfig,
}

impl TestHarness {
    pub async fn new() -> Self {
        let db = Arc::new(Database::open_in_memory().await.expect("open db"));
        seed(&db).await;

        let mut config = SolaceConfig::default();
        config.safety.danger_terms = vec![
            "end it".to_string(),
            "end my life".to_string(),
            "hurt myself".to_string(),
        ];
        config.safety.extra_alert_recipients = vec!["oncall-1".to_string()];
        config.topics.tags = vec!["sleep".to_string(), "mood".to_string()];

        Self {
            audit: Arc::new(SqliteAuditSink::new(Arc::clone(&db))),
            responder: Arc::new(MockResponder::new()),
            dispatcher: Arc::new(RecordingDispatcher::new()),
            config,
            db,
        }
    }

    pub fn patient(&self, id: &str) -> Caller {
        Caller::new(id, ActorRole::Patient)
    }

    pub fn therapist(&self, id: &str) -> Caller {
        Caller::new(id, ActorRole::Therapist)
    }

    pub fn admin(&self) -> Caller {
        Caller::new("adm-1", ActorRole::Admin)
    }
}

fn user(id: &str, name: &str, role: ActorRole, group_id: Option<&str>) -> User {
    User {
        id: id.to_string(),
        display_name: name.to_string(),
        role,
        group_id: group_id.map(str::to_string),
        created_at: solace_storage::now_iso(),
    }
}

/// An active AI-hybrid conversation fixture.
pub fn conversation(id: &str, patient_id: &str, group_id: &str) -> Conversation {
    Conversation {
        id: id.to_string(),
        patient_id: patient_id.to_string(),
        group_id: group_id.to_string(),
        mode: ConversationMode::AiHybrid,
        status: ConversationStatus::Active,
        risk_level: RiskLevel::Low,
        ai_enabled: true,
        blocked: false,
        patient_last_seen_at: None,
        therapist_last_seen_at: None,
        created_at: solace_storage::now_iso(),
        updated_at: solace_storage::now_iso(),
    }
}

async fn seed(db: &Database) {
    for u in [
        user("p-1", "Alex Rivera", ActorRole::Patient, Some("grp-a")),
        user("p-2", "Sam Okafor", ActorRole::Patient, Some("grp-b")),
        user("t-1", "Dana Whitfield", ActorRole::Therapist, None),
        user("t-2", "Priya Raman", ActorRole::Therapist, None),
        user("t-9", "Jordan Liu", ActorRole::Therapist, None),
        user("adm-1", "Admin", ActorRole::Admin, None),
        user("oncall-1", "On-call Clinician", ActorRole::Therapist, None),
    ] {
        users::create_user(db, &u).await.expect("seed user");
    }
    users::assign_therapist(db, "t-1", "grp-a").await.unwrap();
    users::assign_therapist(db, "t-2", "grp-a").await.unwrap();
    users::assign_therapist(db, "t-9", "grp-z").await.unwrap();

    conversations::create_conversation(db, &conversation("c-1", "p-1", "grp-a"))
        .await
        .expect("seed conversation");
}
