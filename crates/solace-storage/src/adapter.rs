// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage-backed adapters for the engine's collaborator traits.

use std::sync::Arc;

use async_trait::async_trait;
use solace_core::traits::{AuditSink, NotificationDispatcher};
use solace_core::types::{AuditEntry, Notification};
use solace_core::SolaceError;
use tracing::debug;

use crate::database::Database;
use crate::queries::{audit, queue};

/// [`AuditSink`] backed by the hash-chained `audit_log` table.
pub struct SqliteAuditSink {
    db: Arc<Database>,
}

impl SqliteAuditSink {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), SolaceError> {
        let row = audit::append(&self.db, entry).await?;
        debug!(id = row.id, action = row.action.as_str(), "audit entry recorded");
        Ok(())
    }
}

/// [`NotificationDispatcher`] backed by the crash-safe notification queue.
///
/// Delivery workers drain the queue out of band; enqueueing is the whole
/// contract here.
pub struct QueueDispatcher {
    db: Arc<Database>,
}

impl QueueDispatcher {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationDispatcher for QueueDispatcher {
    async fn dispatch(&self, notification: Notification) -> Result<(), SolaceError> {
        let id = queue::enqueue(&self.db, &notification).await?;
        debug!(
            id,
            kind = %notification.kind,
            recipient = notification.recipient_id.as_str(),
            "notification queued"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solace_core::types::{ActorRole, NotificationKind, NotificationUrgency};

    #[tokio::test]
    async fn adapters_write_through_to_their_tables() {
        let db = Arc::new(Database::open_in_memory().await.unwrap());

        let sink = SqliteAuditSink::new(Arc::clone(&db));
        sink.record(AuditEntry {
            actor_id: "adm-1".to_string(),
            actor_role: ActorRole::Admin,
            action: "conversation.set_mode".to_string(),
            conversation_id: Some("c-1".to_string()),
            detail: serde_json::json!({}),
        })
        .await
        .unwrap();
        assert_eq!(crate::queries::audit::recent(&db, 10).await.unwrap().len(), 1);

        let dispatcher = QueueDispatcher::new(Arc::clone(&db));
        dispatcher
            .dispatch(Notification {
                kind: NotificationKind::PatientReply,
                conversation_id: "c-1".to_string(),
                recipient_id: "p-1".to_string(),
                urgency: NotificationUrgency::Normal,
                body: "your therapist replied".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(crate::queries::queue::pending(&db, 10).await.unwrap().len(), 1);
    }
}
