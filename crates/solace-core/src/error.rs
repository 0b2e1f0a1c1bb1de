// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error taxonomy for the Solace engine.

use thiserror::Error;

/// The primary error type used across all Solace crates.
///
/// Access and validation failures are rejected synchronously to the caller.
/// Notification failures never roll back the primary state change they
/// accompany; they are recorded and surfaced as degraded success.
#[derive(Debug, Error)]
pub enum SolaceError {
    /// The caller may not operate on this conversation. Always fails closed:
    /// lookup errors deny rather than grant.
    #[error("access denied for user {user_id} on conversation {conversation_id}")]
    AccessDenied {
        user_id: String,
        conversation_id: String,
    },

    /// The conversation is closed; no further messages are accepted.
    #[error("conversation {conversation_id} is closed")]
    ConversationClosed { conversation_id: String },

    /// The conversation is paused; patient messages are rejected with this
    /// distinguished state so the client can show the configured notice.
    #[error("conversation {conversation_id} is paused")]
    ConversationPaused { conversation_id: String },

    /// A state machine transition that is not allowed, e.g. editing a draft
    /// that was already sent.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// The AI collaborator failed or timed out. The inbound message is
    /// already persisted and queued for therapist visibility; the caller may
    /// retry.
    #[error("upstream AI responder unavailable: {message}")]
    UpstreamUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Malformed input, e.g. an empty message body.
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Storage backend errors (connection, query, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Notification enqueue/delivery failure. Non-fatal by policy.
    #[error("notification delivery failure: {0}")]
    Notification(String),

    /// Configuration errors surfaced outside the config crate's diagnostics.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SolaceError {
    /// Wrap any error as a storage failure.
    pub fn storage<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SolaceError::Storage {
            source: Box::new(source),
        }
    }

    /// Whether the caller can usefully retry the operation as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SolaceError::UpstreamUnavailable { .. } | SolaceError::Storage { .. }
        )
    }
}
