// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unread/read bookkeeping and the two-phase polling probe.
//!
//! `check_updates` is the cheap "did anything change" probe; clients fetch
//! full history only when it reports change. Read-marking is an explicit
//! step bounded by what the client actually fetched.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use solace_core::types::{ActorRole, Caller};
use solace_core::SolaceError;
use solace_storage::queries::conversations::SeenSide;
use solace_storage::queries::{alerts, messages, recipients};
use solace_storage::Database;

use crate::access::AccessGuard;

/// Probe result: a count and the latest id, nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateProbe {
    pub unread_count: i64,
    pub latest_message_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationCounts {
    pub conversation_id: String,
    pub patient_id: String,
    pub group_id: String,
    pub unread_messages: i64,
    pub unread_alerts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCounts {
    pub group_id: String,
    pub unread_messages: i64,
    pub unread_alerts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnreadCounts {
    pub per_conversation: Vec<ConversationCounts>,
    pub per_group: Vec<GroupCounts>,
    pub total_messages: i64,
    pub total_alerts: i64,
}

pub struct UnreadTracker {
    db: Arc<Database>,
    access: Arc<AccessGuard>,
}

impl UnreadTracker {
    pub fn new(db: Arc<Database>, access: Arc<AccessGuard>) -> Self {
        Self { db, access }
    }

    /// The lightweight probe: one indexed COUNT/MAX, no message bodies.
    pub async fn check_updates(
        &self,
        caller: &Caller,
        conversation_id: &str,
        since: Option<i64>,
    ) -> Result<UpdateProbe, SolaceError> {
        self.access.require_conversation(caller, conversation_id).await?;
        let (unread_count, latest_message_id) =
            messages::check_updates(&self.db, conversation_id, since).await?;
        Ok(UpdateProbe {
            unread_count,
            latest_message_id,
        })
    }

    /// Per-patient, per-group, and total unread message and alert counts.
    ///
    /// AI-authored traffic never appears in these counts: it is not fanned
    /// out to therapists, and the count query excludes the role outright.
    pub async fn unread_counts(&self, caller: &Caller) -> Result<UnreadCounts, SolaceError> {
        let message_rows = recipients::unread_by_conversation(&self.db, &caller.user_id).await?;
        let alert_rows = if caller.role == ActorRole::Therapist {
            alerts::unread_alerts_by_conversation(&self.db, &caller.user_id).await?
        } else {
            Vec::new()
        };

        let mut by_conversation: BTreeMap<String, ConversationCounts> = BTreeMap::new();
        for row in message_rows {
            by_conversation.insert(
                row.conversation_id.clone(),
                ConversationCounts {
                    conversation_id: row.conversation_id,
                    patient_id: row.patient_id,
                    group_id: row.group_id,
                    unread_messages: row.unread_messages,
                    unread_alerts: 0,
                },
            );
        }
        for (conversation_id, count) in alert_rows {
            if let Some(entry) = by_conversation.get_mut(&conversation_id) {
                entry.unread_alerts = count;
            } else {
                // Alert-only conversation: look the metadata up so the
                // group aggregation still works.
                let conv = solace_storage::queries::conversations::get_conversation(
                    &self.db,
                    &conversation_id,
                )
                .await?;
                if let Some(conv) = conv {
                    by_conversation.insert(
                        conversation_id.clone(),
                        ConversationCounts {
                            conversation_id,
                            patient_id: conv.patient_id,
                            group_id: conv.group_id,
                            unread_messages: 0,
                            unread_alerts: count,
                        },
                    );
                }
            }
        }

        let mut per_group: BTreeMap<String, GroupCounts> = BTreeMap::new();
        let mut total_messages = 0;
        let mut total_alerts = 0;
        for counts in by_conversation.values() {
            total_messages += counts.unread_messages;
            total_alerts += counts.unread_alerts;
            let entry = per_group
                .entry(counts.group_id.clone())
                .or_insert_with(|| GroupCounts {
                    group_id: counts.group_id.clone(),
                    unread_messages: 0,
                    unread_alerts: 0,
                });
            entry.unread_messages += counts.unread_messages;
            entry.unread_alerts += counts.unread_alerts;
        }

        Ok(UnreadCounts {
            per_conversation: by_conversation.into_values().collect(),
            per_group: per_group.into_values().collect(),
            total_messages,
            total_alerts,
        })
    }

    /// Explicitly mark messages read, bounded by `up_to` (inclusive): the
    /// caller never marks what it has not fetched. Stamps the caller side's
    /// last-seen column.
    pub async fn mark_read(
        &self,
        caller: &Caller,
        conversation_id: &str,
        up_to: Option<i64>,
    ) -> Result<usize, SolaceError> {
        self.access.require_conversation(caller, conversation_id).await?;
        let side = match caller.role {
            ActorRole::Patient => SeenSide::Patient,
            _ => SeenSide::Therapist,
        };
        recipients::mark_read(&self.db, conversation_id, &caller.user_id, up_to, side).await
    }

    /// Bulk-dismiss alerts, optionally scoped to one conversation.
    /// Idempotent: the second call flips zero rows and is not an error.
    pub async fn mark_all_alerts_read(
        &self,
        caller: &Caller,
        conversation_id: Option<&str>,
    ) -> Result<usize, SolaceError> {
        self.access.require_clinician(caller)?;
        if let Some(conversation_id) = conversation_id {
            self.access.require_conversation(caller, conversation_id).await?;
        }
        alerts::mark_all_read(&self.db, &caller.user_id, conversation_id).await
    }
}
