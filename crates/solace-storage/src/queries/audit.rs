// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tamper-evident hash-chain audit trail.
//!
//! Each entry's hash covers the previous entry's hash plus its own
//! canonical fields, so any retroactive edit breaks the chain from that
//! point on. Entries are append-only; there is no update or delete path.

use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};
use solace_core::types::AuditEntry;
use solace_core::SolaceError;

use crate::database::{map_tr_box_err, map_tr_err, now_iso, Database};
use crate::models::{parse_enum, AuditRow};

/// Hash seed for the first entry in the chain.
const GENESIS: &str = "genesis";

const AUDIT_COLUMNS: &str = "id, actor_id, actor_role, action, conversation_id, detail, \
     prev_hash, entry_hash, created_at";

fn row_to_audit(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditRow> {
    let detail_raw: String = row.get(5)?;
    let detail = serde_json::from_str(&detail_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(AuditRow {
        id: row.get(0)?,
        actor_id: row.get(1)?,
        actor_role: parse_enum(row.get::<_, String>(2)?, 2)?,
        action: row.get(3)?,
        conversation_id: row.get(4)?,
        detail,
        prev_hash: row.get(6)?,
        entry_hash: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn compute_hash(
    prev_hash: &str,
    actor_id: &str,
    actor_role: &str,
    action: &str,
    conversation_id: Option<&str>,
    detail_json: &str,
    created_at: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(b"|");
    hasher.update(actor_id.as_bytes());
    hasher.update(b"|");
    hasher.update(actor_role.as_bytes());
    hasher.update(b"|");
    hasher.update(action.as_bytes());
    hasher.update(b"|");
    hasher.update(conversation_id.unwrap_or("-").as_bytes());
    hasher.update(b"|");
    hasher.update(detail_json.as_bytes());
    hasher.update(b"|");
    hasher.update(created_at.as_bytes());
    hex::encode(hasher.finalize())
}

/// Append one entry to the chain.
pub async fn append(db: &Database, entry: AuditEntry) -> Result<AuditRow, SolaceError> {
    let detail_json = serde_json::to_string(&entry.detail).map_err(SolaceError::storage)?;
    db.connection()
        .call(move |conn| {
            let prev_hash: String = conn
                .query_row(
                    "SELECT entry_hash FROM audit_log ORDER BY id DESC LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()?
                .unwrap_or_else(|| GENESIS.to_string());

            let created_at = now_iso();
            let actor_role = entry.actor_role.to_string();
            let entry_hash = compute_hash(
                &prev_hash,
                &entry.actor_id,
                &actor_role,
                &entry.action,
                entry.conversation_id.as_deref(),
                &detail_json,
                &created_at,
            );
            conn.execute(
                "INSERT INTO audit_log
                 (actor_id, actor_role, action, conversation_id, detail, prev_hash,
                  entry_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    entry.actor_id,
                    actor_role,
                    entry.action,
                    entry.conversation_id,
                    detail_json,
                    prev_hash,
                    entry_hash,
                    created_at,
                ],
            )?;
            let id = conn.last_insert_rowid();
            Ok(AuditRow {
                id,
                actor_id: entry.actor_id,
                actor_role: entry.actor_role,
                action: entry.action,
                conversation_id: entry.conversation_id,
                detail: entry.detail,
                prev_hash,
                entry_hash,
                created_at,
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Walk the whole chain and recompute every hash. Returns the id of the
/// first broken entry, or None when the chain is intact.
pub async fn verify_chain(db: &Database) -> Result<Option<i64>, SolaceError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {AUDIT_COLUMNS} FROM audit_log ORDER BY id ASC"
            ))?;
            let rows = stmt.query_map([], row_to_audit)?;
            let mut expected_prev = GENESIS.to_string();
            for row in rows {
                let row = row?;
                let detail_json = serde_json::to_string(&row.detail)
                    .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
                let recomputed = compute_hash(
                    &row.prev_hash,
                    &row.actor_id,
                    &row.actor_role.to_string(),
                    &row.action,
                    row.conversation_id.as_deref(),
                    &detail_json,
                    &row.created_at,
                );
                if row.prev_hash != expected_prev || recomputed != row.entry_hash {
                    return Ok(Some(row.id));
                }
                expected_prev = row.entry_hash;
            }
            Ok(None)
        })
        .await
        .map_err(map_tr_box_err)
}

/// Entries touching one conversation, oldest first.
pub async fn entries_for_conversation(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<AuditRow>, SolaceError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {AUDIT_COLUMNS} FROM audit_log
                 WHERE conversation_id = ?1 ORDER BY id ASC"
            ))?;
            let rows = stmt.query_map(params![conversation_id], row_to_audit)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// The most recent entries, newest first. Operator tooling.
pub async fn recent(db: &Database, limit: i64) -> Result<Vec<AuditRow>, SolaceError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {AUDIT_COLUMNS} FROM audit_log ORDER BY id DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], row_to_audit)?;
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
    use crate::test_support::test_db;
    use solace_core::types::ActorRole;

    fn entry(action: &str, conversation: Option<&str>) -> AuditEntry {
        AuditEntry {
            actor_id: "t-1".to_string(),
            actor_role: ActorRole::Therapist,
            action: action.to_string(),
            conversation_id: conversation.map(str::to_string),
            detail: serde_json::json!({"old": "low", "new": "critical"}),
        }
    }

    #[tokio::test]
    async fn chain_links_and_verifies() {
        let (db, _dir) = test_db().await;

        let first = append(&db, entry("conversation.set_risk_level", Some("c-1")))
            .await
            .unwrap();
        assert_eq!(first.prev_hash, GENESIS);

        let second = append(&db, entry("conversation.block", Some("c-1"))).await.unwrap();
        assert_eq!(second.prev_hash, first.entry_hash);

        assert_eq!(verify_chain(&db).await.unwrap(), None);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn tampering_breaks_the_chain() {
        let (db, _dir) = test_db().await;

        append(&db, entry("draft.send", Some("c-1"))).await.unwrap();
        let victim = append(&db, entry("draft.edit", Some("c-1"))).await.unwrap();
        append(&db, entry("draft.discard", Some("c-1"))).await.unwrap();

        db.connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE audit_log SET detail = '{\"old\":\"forged\"}' WHERE id = ?1",
                    params![victim.id],
                )?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();

        assert_eq!(verify_chain(&db).await.unwrap(), Some(victim.id));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn conversation_filter_and_recent_ordering() {
        let (db, _dir) = test_db().await;

        append(&db, entry("a", Some("c-1"))).await.unwrap();
        append(&db, entry("b", Some("c-2"))).await.unwrap();
        append(&db, entry("c", Some("c-1"))).await.unwrap();

        let for_c1 = entries_for_conversation(&db, "c-1").await.unwrap();
        assert_eq!(for_c1.len(), 2);
        assert_eq!(for_c1[0].action, "a");

        let latest = recent(&db, 2).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].action, "c");

        db.close().await.unwrap();
    }
}
