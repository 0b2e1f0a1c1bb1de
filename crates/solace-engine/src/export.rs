// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CSV export of conversation history, filtered by what the caller may see.

use std::sync::Arc;

use serde::Serialize;
use solace_core::types::{ActorRole, Caller};
use solace_core::SolaceError;
use solace_storage::queries::{conversations, messages, users};
use solace_storage::{Conversation, Database};

use crate::access::AccessGuard;

/// What to export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportScope {
    /// One patient's conversations.
    Patient(String),
    /// Every conversation in one group.
    Group(String),
    /// Everything the caller can access.
    All,
}

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    conversation_id: &'a str,
    group_id: &'a str,
    patient_id: &'a str,
    message_id: i64,
    created_at: &'a str,
    sender_role: String,
    sender_id: &'a str,
    body: &'a str,
    edited: bool,
    deleted: bool,
}

pub struct Exporter {
    db: Arc<Database>,
    access: Arc<AccessGuard>,
}

impl Exporter {
    pub fn new(db: Arc<Database>, access: Arc<AccessGuard>) -> Self {
        Self { db, access }
    }

    /// Export conversation history as CSV bytes.
    ///
    /// Therapists see only conversations in their assigned groups; a scope
    /// outside those groups is denied, not silently emptied.
    pub async fn export_csv(
        &self,
        caller: &Caller,
        scope: ExportScope,
    ) -> Result<Vec<u8>, SolaceError> {
        self.access.require_clinician(caller)?;
        let conversations = self.scoped_conversations(caller, &scope).await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        for conversation in &conversations {
            let history = messages::get_messages(&self.db, &conversation.id, None, None).await?;
            for message in &history {
                writer
                    .serialize(ExportRow {
                        conversation_id: &conversation.id,
                        group_id: &conversation.group_id,
                        patient_id: &conversation.patient_id,
                        message_id: message.id,
                        created_at: &message.created_at,
                        sender_role: message.sender_role.to_string(),
                        sender_id: message.sender_id.as_deref().unwrap_or(""),
                        body: &message.body,
                        edited: message.edited,
                        deleted: message.deleted,
                    })
                    .map_err(SolaceError::storage)?;
            }
        }
        writer
            .into_inner()
            .map_err(|e| SolaceError::Internal(format!("csv flush failed: {e}")))
    }

    async fn scoped_conversations(
        &self,
        caller: &Caller,
        scope: &ExportScope,
    ) -> Result<Vec<Conversation>, SolaceError> {
        let allowed_groups = match caller.role {
            ActorRole::Admin => None,
            _ => Some(users::therapist_groups(&self.db, &caller.user_id).await?),
        };
        let permitted = |group_id: &str| match &allowed_groups {
            None => true,
            Some(groups) => groups.iter().any(|g| g == group_id),
        };

        match scope {
            ExportScope::All => match &allowed_groups {
                None => conversations::all_conversations(&self.db).await,
                Some(groups) => conversations::conversations_in_groups(&self.db, groups).await,
            },
            ExportScope::Group(group_id) => {
                if !permitted(group_id) {
                    return Err(SolaceError::AccessDenied {
                        user_id: caller.user_id.clone(),
                        conversation_id: format!("group:{group_id}"),
                    });
                }
                conversations::conversations_in_groups(&self.db, &[group_id.clone()]).await
            }
            ExportScope::Patient(patient_id) => {
                let all = conversations::conversations_for_patient(&self.db, patient_id).await?;
                if let Some(denied) = all.iter().find(|c| !permitted(&c.group_id)) {
                    return Err(SolaceError::AccessDenied {
                        user_id: caller.user_id.clone(),
                        conversation_id: denied.id.clone(),
                    });
                }
                Ok(all)
            }
        }
    }
}
