// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation rows and control-attribute transitions.
//!
//! Every transition is a single read-validate-update sequence inside one
//! writer-thread closure, so concurrent callers get clean last-writer-wins
//! semantics, never a partial write. State-machine guards (terminal
//! `closed`, blocked forces AI off) are enforced here; the engine's
//! `ConversationState` is the only caller and owns audit + error mapping.

use rusqlite::{params, Connection, OptionalExtension};
use solace_core::types::{ConversationMode, ConversationStatus, RiskLevel};
use solace_core::SolaceError;

use crate::database::{map_tr_err, now_iso, Database};
use crate::models::{parse_enum, Conversation};

/// Outcome of a guarded transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// The update was applied (or was already in the target state).
    Applied {
        old: Box<Conversation>,
        new: Box<Conversation>,
    },
    /// The state machine rejected the transition.
    Rejected { current: Box<Conversation> },
    /// No such conversation.
    NotFound,
}

pub(crate) fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        group_id: row.get(2)?,
        mode: parse_enum(row.get::<_, String>(3)?, 3)?,
        status: parse_enum(row.get::<_, String>(4)?, 4)?,
        risk_level: parse_enum(row.get::<_, String>(5)?, 5)?,
        ai_enabled: row.get(6)?,
        blocked: row.get(7)?,
        patient_last_seen_at: row.get(8)?,
        therapist_last_seen_at: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

pub(crate) const CONVERSATION_COLUMNS: &str = "id, patient_id, group_id, mode, status, \
     risk_level, ai_enabled, blocked, patient_last_seen_at, therapist_last_seen_at, \
     created_at, updated_at";

pub(crate) fn read_conversation(
    conn: &Connection,
    id: &str,
) -> rusqlite::Result<Option<Conversation>> {
    conn.query_row(
        &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
        params![id],
        row_to_conversation,
    )
    .optional()
}

/// Insert a new conversation.
pub async fn create_conversation(
    db: &Database,
    conversation: &Conversation,
) -> Result<(), SolaceError> {
    let c = conversation.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conversations
                 (id, patient_id, group_id, mode, status, risk_level, ai_enabled, blocked,
                  patient_last_seen_at, therapist_last_seen_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    c.id,
                    c.patient_id,
                    c.group_id,
                    c.mode.to_string(),
                    c.status.to_string(),
                    c.risk_level.to_string(),
                    c.ai_enabled,
                    c.blocked,
                    c.patient_last_seen_at,
                    c.therapist_last_seen_at,
                    c.created_at,
                    c.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a conversation by id.
pub async fn get_conversation(
    db: &Database,
    id: &str,
) -> Result<Option<Conversation>, SolaceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| Ok(read_conversation(conn, &id)?))
        .await
        .map_err(map_tr_err)
}

/// The patient's active conversation, if any. Used when a patient sends
/// without naming a thread.
pub async fn active_conversation_for_patient(
    db: &Database,
    patient_id: &str,
) -> Result<Option<Conversation>, SolaceError> {
    let patient_id = patient_id.to_string();
    db.connection()
        .call(move |conn| {
            let conv = conn
                .query_row(
                    &format!(
                        "SELECT {CONVERSATION_COLUMNS} FROM conversations
                         WHERE patient_id = ?1 AND status != 'closed'
                         ORDER BY created_at DESC LIMIT 1"
                    ),
                    params![patient_id],
                    row_to_conversation,
                )
                .optional()?;
            Ok(conv)
        })
        .await
        .map_err(map_tr_err)
}

/// All conversations in the given groups, for therapist dashboards and export.
pub async fn conversations_in_groups(
    db: &Database,
    group_ids: &[String],
) -> Result<Vec<Conversation>, SolaceError> {
    if group_ids.is_empty() {
        return Ok(Vec::new());
    }
    let group_ids = group_ids.to_vec();
    db.connection()
        .call(move |conn| {
            let placeholders = (1..=group_ids.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE group_id IN ({placeholders}) ORDER BY created_at"
            ))?;
            let rows = stmt.query_map(
                rusqlite::params_from_iter(group_ids.iter()),
                row_to_conversation,
            )?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// All conversations for one patient, including closed ones. Export use.
pub async fn conversations_for_patient(
    db: &Database,
    patient_id: &str,
) -> Result<Vec<Conversation>, SolaceError> {
    let patient_id = patient_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations
                 WHERE patient_id = ?1 ORDER BY created_at"
            ))?;
            let rows = stmt.query_map(params![patient_id], row_to_conversation)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Every conversation in the store. Admin export use.
pub async fn all_conversations(db: &Database) -> Result<Vec<Conversation>, SolaceError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CONVERSATION_COLUMNS} FROM conversations ORDER BY created_at"
            ))?;
            let rows = stmt.query_map([], row_to_conversation)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Apply a transition: read, validate, mutate, snapshot. Runs entirely on
/// the writer thread.
async fn transition<F>(db: &Database, id: &str, apply: F) -> Result<TransitionResult, SolaceError>
where
    F: FnOnce(&Conversation) -> Result<Option<Conversation>, ()> + Send + 'static,
{
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let Some(old) = read_conversation(conn, &id)? else {
                return Ok(TransitionResult::NotFound);
            };
            match apply(&old) {
                Err(()) => Ok(TransitionResult::Rejected {
                    current: Box::new(old),
                }),
                Ok(None) => {
                    // Already in the target state; clean no-op.
                    let new = old.clone();
                    Ok(TransitionResult::Applied {
                        old: Box::new(old),
                        new: Box::new(new),
                    })
                }
                Ok(Some(mut new)) => {
                    new.updated_at = now_iso();
                    conn.execute(
                        "UPDATE conversations
                         SET mode = ?2, status = ?3, risk_level = ?4, ai_enabled = ?5,
                             blocked = ?6, updated_at = ?7
                         WHERE id = ?1",
                        params![
                            id,
                            new.mode.to_string(),
                            new.status.to_string(),
                            new.risk_level.to_string(),
                            new.ai_enabled,
                            new.blocked,
                            new.updated_at,
                        ],
                    )?;
                    Ok(TransitionResult::Applied {
                        old: Box::new(old),
                        new: Box::new(new),
                    })
                }
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Change the servicing mode. Always allowed while the conversation exists.
pub async fn set_mode(
    db: &Database,
    id: &str,
    mode: ConversationMode,
) -> Result<TransitionResult, SolaceError> {
    transition(db, id, move |old| {
        if old.mode == mode {
            return Ok(None);
        }
        let mut new = old.clone();
        new.mode = mode;
        Ok(Some(new))
    })
    .await
}

/// Change lifecycle status. `active ↔ paused`, `active|paused → closed`;
/// `closed` is terminal.
pub async fn set_status(
    db: &Database,
    id: &str,
    status: ConversationStatus,
) -> Result<TransitionResult, SolaceError> {
    transition(db, id, move |old| {
        if old.status == status {
            return Ok(None);
        }
        if old.status == ConversationStatus::Closed {
            return Err(());
        }
        let mut new = old.clone();
        new.status = status;
        Ok(Some(new))
    })
    .await
}

/// Set risk level to any value. Clinical judgment is authoritative; no
/// monotonicity is enforced here.
pub async fn set_risk_level(
    db: &Database,
    id: &str,
    risk: RiskLevel,
) -> Result<TransitionResult, SolaceError> {
    transition(db, id, move |old| {
        if old.risk_level == risk {
            return Ok(None);
        }
        let mut new = old.clone();
        new.risk_level = risk;
        Ok(Some(new))
    })
    .await
}

/// Suggest risk upward to `critical`. No-op when already at or above.
pub async fn escalate_risk(db: &Database, id: &str) -> Result<TransitionResult, SolaceError> {
    transition(db, id, move |old| {
        if old.risk_level >= RiskLevel::Critical {
            return Ok(None);
        }
        let mut new = old.clone();
        new.risk_level = RiskLevel::Critical;
        Ok(Some(new))
    })
    .await
}

/// Toggle the AI. Re-enabling always clears a block, so therapists have one
/// action to restore full service; disabling leaves any block in place.
pub async fn set_ai_enabled(
    db: &Database,
    id: &str,
    enabled: bool,
) -> Result<TransitionResult, SolaceError> {
    transition(db, id, move |old| {
        if enabled {
            if old.ai_enabled && !old.blocked {
                return Ok(None);
            }
            let mut new = old.clone();
            new.ai_enabled = true;
            new.blocked = false;
            Ok(Some(new))
        } else {
            if !old.ai_enabled {
                return Ok(None);
            }
            let mut new = old.clone();
            new.ai_enabled = false;
            Ok(Some(new))
        }
    })
    .await
}

/// Lock the conversation down: AI off, blocked on, status untouched.
/// Idempotent when already blocked.
pub async fn block(db: &Database, id: &str) -> Result<TransitionResult, SolaceError> {
    transition(db, id, move |old| {
        if old.blocked && !old.ai_enabled {
            return Ok(None);
        }
        let mut new = old.clone();
        new.blocked = true;
        new.ai_enabled = false;
        Ok(Some(new))
    })
    .await
}

/// Clear a block and re-enable the AI.
pub async fn unblock(db: &Database, id: &str) -> Result<TransitionResult, SolaceError> {
    set_ai_enabled(db, id, true).await
}

/// Which side's last-seen stamp to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeenSide {
    Patient,
    Therapist,
}

/// Record that one side has seen the conversation just now.
pub async fn touch_last_seen(
    db: &Database,
    id: &str,
    side: SeenSide,
) -> Result<(), SolaceError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let column = match side {
                SeenSide::Patient => "patient_last_seen_at",
                SeenSide::Therapist => "therapist_last_seen_at",
            };
            conn.execute(
                &format!("UPDATE conversations SET {column} = ?2 WHERE id = ?1"),
                params![id, now_iso()],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_basic, test_db};

    async fn setup() -> (Database, tempfile::TempDir) {
        let (db, dir) = test_db().await;
        seed_basic(&db).await;
        (db, dir)
    }

    fn applied(result: TransitionResult) -> (Conversation, Conversation) {
        match result {
            TransitionResult::Applied { old, new } => (*old, *new),
            other => panic!("expected Applied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn closed_is_terminal() {
        let (db, _dir) = setup().await;

        applied(set_status(&db, "c-1", ConversationStatus::Paused).await.unwrap());
        applied(set_status(&db, "c-1", ConversationStatus::Active).await.unwrap());
        applied(set_status(&db, "c-1", ConversationStatus::Closed).await.unwrap());

        let result = set_status(&db, "c-1", ConversationStatus::Active).await.unwrap();
        assert!(matches!(result, TransitionResult::Rejected { .. }));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn block_forces_ai_off_and_is_idempotent() {
        let (db, _dir) = setup().await;

        let (old, new) = applied(block(&db, "c-1").await.unwrap());
        assert!(old.ai_enabled && !old.blocked);
        assert!(new.blocked && !new.ai_enabled);

        // Second block: clean no-op, state unchanged.
        let (old2, new2) = applied(block(&db, "c-1").await.unwrap());
        assert_eq!(old2, new2);
        assert!(new2.blocked && !new2.ai_enabled);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reenabling_ai_clears_block() {
        let (db, _dir) = setup().await;

        applied(block(&db, "c-1").await.unwrap());
        let (_, new) = applied(set_ai_enabled(&db, "c-1", true).await.unwrap());
        assert!(new.ai_enabled && !new.blocked);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn disabling_ai_leaves_block_alone() {
        let (db, _dir) = setup().await;

        applied(block(&db, "c-1").await.unwrap());
        let (_, new) = applied(set_ai_enabled(&db, "c-1", false).await.unwrap());
        assert!(new.blocked && !new.ai_enabled);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn escalate_risk_is_upward_only() {
        let (db, _dir) = setup().await;

        let (_, new) = applied(escalate_risk(&db, "c-1").await.unwrap());
        assert_eq!(new.risk_level, RiskLevel::Critical);

        // Therapist may lower it manually afterwards.
        let (_, new) = applied(set_risk_level(&db, "c-1", RiskLevel::Medium).await.unwrap());
        assert_eq!(new.risk_level, RiskLevel::Medium);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn transition_on_missing_conversation_is_not_found() {
        let (db, _dir) = setup().await;
        let result = set_mode(&db, "nope", ConversationMode::HumanOnly).await.unwrap();
        assert_eq!(result, TransitionResult::NotFound);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn last_seen_stamps_per_side() {
        let (db, _dir) = setup().await;

        touch_last_seen(&db, "c-1", SeenSide::Patient).await.unwrap();
        let conv = get_conversation(&db, "c-1").await.unwrap().unwrap();
        assert!(conv.patient_last_seen_at.is_some());
        assert!(conv.therapist_last_seen_at.is_none());

        db.close().await.unwrap();
    }
}
