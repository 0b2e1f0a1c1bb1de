// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access control: who may operate on which conversation.
//!
//! Fails closed: a lookup error denies, never grants.

use std::sync::Arc;

use solace_core::types::{ActorRole, Caller};
use solace_core::SolaceError;
use solace_storage::queries::{conversations, users};
use solace_storage::{Conversation, Database};
use tracing::warn;

/// Resolves whether an actor may operate on a conversation.
///
/// Admins pass unconditionally. Therapists pass iff assigned to the
/// conversation's owning group. Patients pass only for their own
/// conversation. Every therapist-facing mutating operation calls
/// [`AccessGuard::require_conversation`] first.
pub struct AccessGuard {
    db: Arc<Database>,
}

impl AccessGuard {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Whether the caller may operate on the given conversation.
    pub async fn can_access(
        &self,
        caller: &Caller,
        conversation: &Conversation,
    ) -> Result<bool, SolaceError> {
        match caller.role {
            ActorRole::Admin | ActorRole::System => Ok(true),
            ActorRole::Patient => Ok(conversation.patient_id == caller.user_id),
            ActorRole::Therapist => {
                users::is_assigned(&self.db, &caller.user_id, &conversation.group_id).await
            }
        }
    }

    /// Load the conversation and require access, failing closed.
    ///
    /// A storage error during the assignment lookup is logged and surfaced
    /// as `AccessDenied`, not as a grant and not as a raw storage error.
    pub async fn require_conversation(
        &self,
        caller: &Caller,
        conversation_id: &str,
    ) -> Result<Conversation, SolaceError> {
        let conversation = conversations::get_conversation(&self.db, conversation_id)
            .await?
            .ok_or_else(|| SolaceError::NotFound {
                entity: "conversation",
                id: conversation_id.to_string(),
            })?;
        match self.can_access(caller, &conversation).await {
            Ok(true) => Ok(conversation),
            Ok(false) => Err(SolaceError::AccessDenied {
                user_id: caller.user_id.clone(),
                conversation_id: conversation_id.to_string(),
            }),
            Err(e) => {
                warn!(
                    user_id = caller.user_id.as_str(),
                    conversation_id,
                    error = %e,
                    "access lookup failed; denying"
                );
                Err(SolaceError::AccessDenied {
                    user_id: caller.user_id.clone(),
                    conversation_id: conversation_id.to_string(),
                })
            }
        }
    }

    /// Require that the caller is a therapist or admin before any
    /// therapist-facing operation.
    pub fn require_clinician(&self, caller: &Caller) -> Result<(), SolaceError> {
        match caller.role {
            ActorRole::Therapist | ActorRole::Admin => Ok(()),
            _ => Err(SolaceError::Validation(format!(
                "operation requires a therapist or admin caller, got {}",
                caller.role
            ))),
        }
    }
}
