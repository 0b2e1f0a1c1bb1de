// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recipient fan-out and read-state bookkeeping.
//!
//! One row per (message, intended reader). Therapist rows exist only for
//! intentionally therapist-directed traffic or when AI is off for the
//! conversation, so therapist unread counts stay meaningful.

use rusqlite::params;
use solace_core::SolaceError;

use crate::database::{map_tr_err, now_iso, Database};
use crate::models::MessageRecipient;
use crate::queries::conversations::SeenSide;

/// Fan a message out to its intended readers. `INSERT OR IGNORE` keeps the
/// at-most-once-per-(message, user) invariant under replays.
pub async fn add_recipients(
    db: &Database,
    message_id: i64,
    user_ids: Vec<String>,
) -> Result<usize, SolaceError> {
    if user_ids.is_empty() {
        return Ok(0);
    }
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let mut added = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO message_recipients (message_id, user_id, read)
                     VALUES (?1, ?2, 0)",
                )?;
                for user_id in &user_ids {
                    added += stmt.execute(params![message_id, user_id])?;
                }
            }
            tx.commit()?;
            Ok(added)
        })
        .await
        .map_err(map_tr_err)
}

/// Recipient rows for a message, ordered by user id. Test and audit use.
pub async fn recipients_for_message(
    db: &Database,
    message_id: i64,
) -> Result<Vec<MessageRecipient>, SolaceError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT message_id, user_id, read, read_at FROM message_recipients
                 WHERE message_id = ?1 ORDER BY user_id",
            )?;
            let rows = stmt.query_map(params![message_id], |row| {
                Ok(MessageRecipient {
                    message_id: row.get(0)?,
                    user_id: row.get(1)?,
                    read: row.get(2)?,
                    read_at: row.get(3)?,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a user's recipient rows read within one conversation, bounded by
/// `up_to` (inclusive). The bound is what the caller actually fetched:
/// a message that arrives concurrently with the poll has a higher id and is
/// never marked. Also stamps the conversation's last-seen column for the
/// caller's side, in the same writer closure.
pub async fn mark_read(
    db: &Database,
    conversation_id: &str,
    user_id: &str,
    up_to: Option<i64>,
    side: SeenSide,
) -> Result<usize, SolaceError> {
    let conversation_id = conversation_id.to_string();
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let now = now_iso();
            let flipped = tx.execute(
                "UPDATE message_recipients SET read = 1, read_at = ?3
                 WHERE user_id = ?2 AND read = 0
                   AND message_id IN (
                       SELECT id FROM messages
                       WHERE conversation_id = ?1 AND id <= ?4
                   )",
                params![conversation_id, user_id, now, up_to.unwrap_or(i64::MAX)],
            )?;
            let column = match side {
                SeenSide::Patient => "patient_last_seen_at",
                SeenSide::Therapist => "therapist_last_seen_at",
            };
            tx.execute(
                &format!("UPDATE conversations SET {column} = ?2 WHERE id = ?1"),
                params![conversation_id, now],
            )?;
            tx.commit()?;
            Ok(flipped)
        })
        .await
        .map_err(map_tr_err)
}

/// Per-conversation unread message counts for one user.
///
/// AI-authored and deleted messages are excluded; ordinary AI-serviced
/// traffic never fans out to therapists in the first place, and this query
/// enforces the same property defensively at read time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationUnread {
    pub conversation_id: String,
    pub patient_id: String,
    pub group_id: String,
    pub unread_messages: i64,
}

pub async fn unread_by_conversation(
    db: &Database,
    user_id: &str,
) -> Result<Vec<ConversationUnread>, SolaceError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.patient_id, c.group_id, COUNT(*)
                 FROM message_recipients mr
                 JOIN messages m ON m.id = mr.message_id
                 JOIN conversations c ON c.id = m.conversation_id
                 WHERE mr.user_id = ?1 AND mr.read = 0
                   AND m.deleted = 0 AND m.sender_role != 'ai'
                 GROUP BY c.id
                 ORDER BY c.id",
            )?;
            let rows = stmt.query_map(params![user_id], |row| {
                Ok(ConversationUnread {
                    conversation_id: row.get(0)?,
                    patient_id: row.get(1)?,
                    group_id: row.get(2)?,
                    unread_messages: row.get(3)?,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::messages::{insert_message_gated, InsertOutcome};
    use crate::test_support::{seed_basic, test_db};
    use solace_core::types::SenderRole;

    async fn insert(db: &Database, role: SenderRole, sender: Option<&str>, body: &str) -> i64 {
        match insert_message_gated(
            db,
            "c-1",
            role,
            sender.map(str::to_string),
            body.to_string(),
            None,
            false,
        )
        .await
        .unwrap()
        {
            InsertOutcome::Inserted { message, .. } => message.id,
            other => panic!("expected insert, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fan_out_is_at_most_once_per_pair() {
        let (db, _dir) = test_db().await;
        seed_basic(&db).await;

        let id = insert(&db, SenderRole::Patient, Some("p-1"), "@team help").await;
        let added = add_recipients(&db, id, vec!["t-1".to_string(), "t-2".to_string()])
            .await
            .unwrap();
        assert_eq!(added, 2);

        // Replay adds nothing.
        let added = add_recipients(&db, id, vec!["t-1".to_string()]).await.unwrap();
        assert_eq!(added, 0);
        assert_eq!(recipients_for_message(&db, id).await.unwrap().len(), 2);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn mark_read_respects_the_bound() {
        let (db, _dir) = test_db().await;
        seed_basic(&db).await;

        let m1 = insert(&db, SenderRole::Patient, Some("p-1"), "one").await;
        add_recipients(&db, m1, vec!["t-1".to_string()]).await.unwrap();
        let m2 = insert(&db, SenderRole::Patient, Some("p-1"), "two").await;
        add_recipients(&db, m2, vec!["t-1".to_string()]).await.unwrap();

        // Poll fetched only up to m1; the concurrent m2 stays unread.
        let flipped = mark_read(&db, "c-1", "t-1", Some(m1), SeenSide::Therapist)
            .await
            .unwrap();
        assert_eq!(flipped, 1);

        let unread = unread_by_conversation(&db, "t-1").await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].unread_messages, 1);

        let conv = crate::queries::conversations::get_conversation(&db, "c-1")
            .await
            .unwrap()
            .unwrap();
        assert!(conv.therapist_last_seen_at.is_some());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unread_counts_exclude_ai_traffic() {
        let (db, _dir) = test_db().await;
        seed_basic(&db).await;

        let m1 = insert(&db, SenderRole::Patient, Some("p-1"), "tagged").await;
        add_recipients(&db, m1, vec!["t-1".to_string()]).await.unwrap();
        // An AI row should never be counted even if a fan-out bug created one.
        let m2 = insert(&db, SenderRole::Ai, None, "ai reply").await;
        add_recipients(&db, m2, vec!["t-1".to_string()]).await.unwrap();

        let unread = unread_by_conversation(&db, "t-1").await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].unread_messages, 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn mark_read_twice_is_a_no_op() {
        let (db, _dir) = test_db().await;
        seed_basic(&db).await;

        let m1 = insert(&db, SenderRole::Patient, Some("p-1"), "one").await;
        add_recipients(&db, m1, vec!["t-1".to_string()]).await.unwrap();

        let first = mark_read(&db, "c-1", "t-1", None, SeenSide::Therapist).await.unwrap();
        assert_eq!(first, 1);
        let second = mark_read(&db, "c-1", "t-1", None, SeenSide::Therapist).await.unwrap();
        assert_eq!(second, 0);

        db.close().await.unwrap();
    }
}
