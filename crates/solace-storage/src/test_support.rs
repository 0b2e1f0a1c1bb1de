// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared fixtures for storage tests.

use solace_core::types::{ActorRole, ConversationMode, ConversationStatus, RiskLevel};

use crate::database::{now_iso, Database};
use crate::models::{Conversation, User};
use crate::queries::{conversations, users};

pub(crate) async fn test_db() -> (Database, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("test.db").to_str().unwrap())
        .await
        .unwrap();
    (db, dir)
}

pub(crate) fn make_user(id: &str, role: ActorRole, group_id: Option<&str>) -> User {
    User {
        id: id.to_string(),
        display_name: format!("User {id}"),
        role,
        group_id: group_id.map(str::to_string),
        created_at: now_iso(),
    }
}

pub(crate) fn make_conversation(id: &str, patient_id: &str, group_id: &str) -> Conversation {
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
        created_at: now_iso(),
        updated_at: now_iso(),
    }
}

/// Seed one patient (`p-1` in `grp-a`), two assigned therapists (`t-1`,
/// `t-2`), one outside therapist (`t-9`), an admin (`adm-1`), and an active
/// conversation `c-1`.
pub(crate) async fn seed_basic(db: &Database) {
    users::create_user(db, &make_user("p-1", ActorRole::Patient, Some("grp-a")))
        .await
        .unwrap();
    users::create_user(db, &make_user("t-1", ActorRole::Therapist, None))
        .await
        .unwrap();
    users::create_user(db, &make_user("t-2", ActorRole::Therapist, None))
        .await
        .unwrap();
    users::create_user(db, &make_user("t-9", ActorRole::Therapist, None))
        .await
        .unwrap();
    users::create_user(db, &make_user("adm-1", ActorRole::Admin, None))
        .await
        .unwrap();
    users::assign_therapist(db, "t-1", "grp-a").await.unwrap();
    users::assign_therapist(db, "t-2", "grp-a").await.unwrap();
    users::assign_therapist(db, "t-9", "grp-z").await.unwrap();
    conversations::create_conversation(db, &make_conversation("c-1", "p-1", "grp-a"))
        .await
        .unwrap();
}
