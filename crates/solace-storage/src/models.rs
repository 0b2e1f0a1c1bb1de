// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for storage entities.
//!
//! Control-state columns hold the closed enumerations from
//! `solace-core::types`; conversion to/from their TEXT representation
//! happens at the SQL boundary via [`parse_enum`].

use serde::{Deserialize, Serialize};
use solace_core::types::{
    ActorRole, AlertKind, AlertSeverity, ConversationMode, ConversationStatus, DraftState,
    NoteKind, NotificationKind, NotificationUrgency, RiskLevel, SafetyAssessment, SenderRole,
};
use strum::{Display, EnumString};

/// Parse a TEXT column into a closed enumeration, mapping failures to a
/// column-level conversion error instead of a panic.
pub(crate) fn parse_enum<T>(value: String, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

/// Parse a nullable JSON TEXT column.
pub(crate) fn parse_json<T>(value: Option<String>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: serde::de::DeserializeOwned,
{
    match value {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            }),
    }
}

/// A principal: patient, therapist, or admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub role: ActorRole,
    /// For patients: the owning care group. Therapists are mapped to groups
    /// via `therapist_assignments` instead.
    pub group_id: Option<String>,
    pub created_at: String,
}

/// One patient-initiated conversation thread with its control attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub patient_id: String,
    pub group_id: String,
    pub mode: ConversationMode,
    pub status: ConversationStatus,
    pub risk_level: RiskLevel,
    pub ai_enabled: bool,
    pub blocked: bool,
    pub patient_last_seen_at: Option<String>,
    pub therapist_last_seen_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Conversation {
    /// Whether the AI may answer ordinary traffic right now.
    pub fn ai_available(&self) -> bool {
        self.ai_enabled && !self.blocked && self.mode == ConversationMode::AiHybrid
    }
}

/// An immutable message, soft-editable/deletable for therapist authors only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: String,
    pub sender_role: SenderRole,
    pub sender_id: Option<String>,
    pub body: String,
    pub safety: Option<SafetyAssessment>,
    pub edited: bool,
    pub deleted: bool,
    pub created_at: String,
}

/// Per-(message, user) delivery/read record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecipient {
    pub message_id: i64,
    pub user_id: String,
    pub read: bool,
    pub read_at: Option<String>,
}

/// A therapist-facing alert. Never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub conversation_id: String,
    /// None = broadcast to all assigned therapists.
    pub target_therapist_id: Option<String>,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub summary: String,
    pub metadata: Option<serde_json::Value>,
    pub read: bool,
    pub created_at: String,
}

/// A therapist-authored clinical annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub conversation_id: String,
    pub author_id: String,
    pub kind: NoteKind,
    pub body: String,
    pub deleted: bool,
    pub last_edited_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// An AI-assisted reply under construction, invisible to the patient until
/// sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub id: i64,
    pub conversation_id: String,
    pub therapist_id: String,
    pub state: DraftState,
    pub body: String,
    /// Previous texts pushed on regenerate, newest last.
    pub undo_stack: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One hash-chained audit trail row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRow {
    pub id: i64,
    pub actor_id: String,
    pub actor_role: ActorRole,
    pub action: String,
    pub conversation_id: Option<String>,
    pub detail: serde_json::Value,
    pub prev_hash: String,
    pub entry_hash: String,
    pub created_at: String,
}

/// Delivery state of a queued notification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    Pending,
    Sent,
    Failed,
}

/// One queued outbound notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedNotification {
    pub id: i64,
    pub kind: NotificationKind,
    pub conversation_id: String,
    pub recipient_id: String,
    pub urgency: NotificationUrgency,
    pub body: String,
    pub state: QueueState,
    pub created_at: String,
}
