// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared vocabulary types for the Solace engine.
//!
//! Every status/type/severity field that ends up in a TEXT column is a
//! closed enumeration with `strum` round-tripping, never free text.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Role a principal plays in the system.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Patient,
    Therapist,
    Admin,
    /// Automated actor for engine-initiated transitions (escalation).
    System,
}

/// The identity on whose behalf an operation runs.
///
/// Threaded explicitly through every engine operation; there is no ambient
/// session user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: String,
    pub role: ActorRole,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }

    /// The automated engine actor used for escalation transitions.
    pub fn system() -> Self {
        Self {
            user_id: "system".to_string(),
            role: ActorRole::System,
        }
    }
}

/// Conversation servicing mode.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConversationMode {
    /// AI answers by default; therapists step in on demand.
    AiHybrid,
    /// All traffic goes to therapists; the AI never answers.
    HumanOnly,
}

/// Conversation lifecycle status. `Closed` is terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Paused,
    Closed,
}

/// Clinical risk level. Ordered: escalation only ever suggests upward,
/// therapists may set any value.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Who authored a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SenderRole {
    Patient,
    Ai,
    Therapist,
    System,
}

/// Danger level of a structured safety assessment.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DangerLevel {
    None,
    Warning,
    Critical,
    Emergency,
}

impl DangerLevel {
    /// Whether this level triggers the escalation sequence.
    /// `Warning` is logged but never escalates.
    pub fn is_escalating(self) -> bool {
        matches!(self, DangerLevel::Critical | DangerLevel::Emergency)
    }
}

/// Structured safety assessment attached to an AI reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyAssessment {
    pub danger: DangerLevel,
    /// Free-text rationale from the assessor, if any.
    #[serde(default)]
    pub reason: Option<String>,
}

/// What kind of alert was raised for therapists.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    DangerDetected,
    TagReceived,
}

/// Alert severity shown in the therapist inbox.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
    Emergency,
}

impl From<DangerLevel> for AlertSeverity {
    fn from(level: DangerLevel) -> Self {
        match level {
            DangerLevel::None => AlertSeverity::Info,
            DangerLevel::Warning => AlertSeverity::Warning,
            DangerLevel::Critical => AlertSeverity::Critical,
            DangerLevel::Emergency => AlertSeverity::Emergency,
        }
    }
}

/// Kind of clinical note.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    Manual,
    AiSummary,
}

/// Lifecycle of an AI-assisted therapist draft. `Sent` and `Discarded`
/// are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DraftState {
    Draft,
    Sent,
    Discarded,
}

/// Why a notification is being dispatched.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A patient message needs a therapist's eyes (tag, AI off, AI failure).
    TherapistAttention,
    /// Dangerous content detected; conversation locked down.
    UrgentEscalation,
    /// A therapist replied; the patient should be told.
    PatientReply,
}

/// Delivery urgency hint for the dispatcher.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationUrgency {
    Normal,
    Urgent,
}

/// A single outbound notification. The engine decides *that* and *what*
/// to notify; delivery mechanics live behind [`crate::NotificationDispatcher`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub conversation_id: String,
    pub recipient_id: String,
    pub urgency: NotificationUrgency,
    pub body: String,
}

/// One append-only audit trail entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor_id: String,
    pub actor_role: ActorRole,
    /// Machine-readable action name, e.g. `conversation.set_risk_level`.
    pub action: String,
    pub conversation_id: Option<String>,
    /// Structured old/new values, full draft text, and similar context.
    pub detail: serde_json::Value,
}

/// One conversation turn handed to the AI responder as history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiTurn {
    pub role: SenderRole,
    pub body: String,
}

/// A request to the AI collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiRequest {
    pub conversation_id: String,
    /// Chronological history, oldest first.
    pub history: Vec<AiTurn>,
    /// Extra instruction block, e.g. the draft-generation preamble.
    #[serde(default)]
    pub instruction: Option<String>,
}

/// The AI collaborator's reply: text plus an optional structured safety
/// assessment. A missing assessment makes the engine fall back to keyword
/// scanning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiReply {
    pub text: String,
    #[serde(default)]
    pub safety: Option<SafetyAssessment>,
}
