// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Alert rows. Created once per triggering event, marked read individually
//! or in bulk, never deleted.

use rusqlite::params;
use solace_core::types::{AlertKind, AlertSeverity};
use solace_core::SolaceError;

use crate::database::{map_tr_err, now_iso, Database};
use crate::models::{parse_enum, parse_json, Alert};

const ALERT_COLUMNS: &str =
    "id, conversation_id, target_therapist_id, kind, severity, summary, metadata, read, created_at";

fn row_to_alert(row: &rusqlite::Row<'_>) -> rusqlite::Result<Alert> {
    Ok(Alert {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        target_therapist_id: row.get(2)?,
        kind: parse_enum(row.get::<_, String>(3)?, 3)?,
        severity: parse_enum(row.get::<_, String>(4)?, 4)?,
        summary: row.get(5)?,
        metadata: parse_json(row.get::<_, Option<String>>(6)?, 6)?,
        read: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Insert a new alert. `target_therapist_id = None` broadcasts to all
/// therapists assigned to the conversation's group.
pub async fn insert_alert(
    db: &Database,
    conversation_id: &str,
    target_therapist_id: Option<String>,
    kind: AlertKind,
    severity: AlertSeverity,
    summary: String,
    metadata: Option<serde_json::Value>,
) -> Result<Alert, SolaceError> {
    let conversation_id = conversation_id.to_string();
    let metadata_json = metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(SolaceError::storage)?;
    db.connection()
        .call(move |conn| {
            let created_at = now_iso();
            conn.execute(
                "INSERT INTO alerts
                 (conversation_id, target_therapist_id, kind, severity, summary, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    conversation_id,
                    target_therapist_id,
                    kind.to_string(),
                    severity.to_string(),
                    summary,
                    metadata_json,
                    created_at,
                ],
            )?;
            let id = conn.last_insert_rowid();
            Ok(Alert {
                id,
                conversation_id,
                target_therapist_id,
                kind,
                severity,
                summary,
                metadata,
                read: false,
                created_at,
            })
        })
        .await
        .map_err(map_tr_err)
}

/// All alerts for a conversation, oldest first.
pub async fn alerts_for_conversation(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<Alert>, SolaceError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ALERT_COLUMNS} FROM alerts
                 WHERE conversation_id = ?1 ORDER BY id ASC"
            ))?;
            let rows = stmt.query_map(params![conversation_id], row_to_alert)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

// Visibility rule shared by the count and the bulk flip: an alert belongs
// to a therapist when targeted at them, or broadcast within a group they
// are assigned to.
const VISIBLE_TO: &str = "(a.target_therapist_id = ?1
     OR (a.target_therapist_id IS NULL AND EXISTS (
         SELECT 1 FROM therapist_assignments ta
         JOIN conversations c ON c.id = a.conversation_id
         WHERE ta.therapist_id = ?1 AND ta.group_id = c.group_id)))";

/// Unread alert count per conversation for one therapist.
pub async fn unread_alerts_by_conversation(
    db: &Database,
    therapist_id: &str,
) -> Result<Vec<(String, i64)>, SolaceError> {
    let therapist_id = therapist_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT a.conversation_id, COUNT(*) FROM alerts a
                 WHERE a.read = 0 AND {VISIBLE_TO}
                 GROUP BY a.conversation_id ORDER BY a.conversation_id"
            ))?;
            let rows = stmt.query_map(params![therapist_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
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

/// Bulk-dismiss: flip all of a therapist's unread alerts, optionally scoped
/// to one conversation. Returns rows flipped; a second call flips zero.
pub async fn mark_all_read(
    db: &Database,
    therapist_id: &str,
    conversation_id: Option<&str>,
) -> Result<usize, SolaceError> {
    let therapist_id = therapist_id.to_string();
    let conversation_id = conversation_id.map(str::to_string);
    db.connection()
        .call(move |conn| {
            let flipped = conn.execute(
                &format!(
                    "UPDATE alerts SET read = 1 WHERE id IN (
                         SELECT a.id FROM alerts a
                         WHERE a.read = 0 AND {VISIBLE_TO}
                           AND (?2 IS NULL OR a.conversation_id = ?2)
                     )"
                ),
                params![therapist_id, conversation_id],
            )?;
            Ok(flipped)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{make_conversation, seed_basic, test_db};

    async fn raise(db: &Database, conversation: &str, target: Option<&str>) -> Alert {
        insert_alert(
            db,
            conversation,
            target.map(str::to_string),
            AlertKind::DangerDetected,
            AlertSeverity::Critical,
            "danger detected".to_string(),
            Some(serde_json::json!({"source": "test"})),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn broadcast_alerts_reach_assigned_therapists_only() {
        let (db, _dir) = test_db().await;
        seed_basic(&db).await;

        raise(&db, "c-1", None).await;

        let counts = unread_alerts_by_conversation(&db, "t-1").await.unwrap();
        assert_eq!(counts, vec![("c-1".to_string(), 1)]);

        // t-9 is assigned to a different group; nothing visible.
        assert!(unread_alerts_by_conversation(&db, "t-9").await.unwrap().is_empty());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn targeted_alerts_do_not_leak_to_the_roster() {
        let (db, _dir) = test_db().await;
        seed_basic(&db).await;

        raise(&db, "c-1", Some("t-2")).await;

        assert!(unread_alerts_by_conversation(&db, "t-1").await.unwrap().is_empty());
        assert_eq!(
            unread_alerts_by_conversation(&db, "t-2").await.unwrap(),
            vec![("c-1".to_string(), 1)]
        );

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn dismiss_all_is_idempotent() {
        let (db, _dir) = test_db().await;
        seed_basic(&db).await;

        raise(&db, "c-1", None).await;
        raise(&db, "c-1", None).await;

        let flipped = mark_all_read(&db, "t-1", None).await.unwrap();
        assert_eq!(flipped, 2);
        let again = mark_all_read(&db, "t-1", None).await.unwrap();
        assert_eq!(again, 0);
        assert!(unread_alerts_by_conversation(&db, "t-1").await.unwrap().is_empty());

        // Broadcast alerts carry one shared read flag: a bulk dismiss
        // clears the banner for the whole roster.
        assert!(unread_alerts_by_conversation(&db, "t-2").await.unwrap().is_empty());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn dismiss_scoped_to_one_conversation() {
        let (db, _dir) = test_db().await;
        seed_basic(&db).await;
        crate::queries::conversations::create_conversation(
            &db,
            &make_conversation("c-2", "p-1", "grp-a"),
        )
        .await
        .unwrap();

        raise(&db, "c-1", None).await;
        raise(&db, "c-2", None).await;

        let flipped = mark_all_read(&db, "t-1", Some("c-1")).await.unwrap();
        assert_eq!(flipped, 1);
        let counts = unread_alerts_by_conversation(&db, "t-1").await.unwrap();
        assert_eq!(counts, vec![("c-2".to_string(), 1)]);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn alerts_are_never_deleted_by_dismissal() {
        let (db, _dir) = test_db().await;
        seed_basic(&db).await;

        raise(&db, "c-1", None).await;
        mark_all_read(&db, "t-1", None).await.unwrap();

        let all = alerts_for_conversation(&db, "c-1").await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].read);

        db.close().await.unwrap();
    }
}
