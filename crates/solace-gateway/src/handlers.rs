// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request handlers for the polling/action surface.
//!
//! Caller identity arrives in the `x-solace-user` header and is resolved
//! against the user table; it is threaded into every engine call as an
//! explicit parameter. Patients get the configured explanatory notice for
//! paused and blocked conversations instead of a generic error.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use solace_core::types::{
    Caller, ConversationStatus, NoteKind, RiskLevel,
};
use solace_core::SolaceError;
use solace_engine::{AiDisposition, ExportScope};
use solace_storage::queries::users;
use solace_storage::{Conversation, Draft, Message, Note};

use crate::extract::QueryOrForm;
use crate::server::GatewayState;

/// Error body shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Distinguished conversation state, when applicable (`paused`, `closed`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Patient-facing explanatory notice for the distinguished state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

fn error_response(state: &GatewayState, err: SolaceError) -> Response {
    let (status, conversation_state, notice) = match &err {
        SolaceError::AccessDenied { .. } => (StatusCode::FORBIDDEN, None, None),
        SolaceError::NotFound { .. } => (StatusCode::NOT_FOUND, None, None),
        SolaceError::Validation(_) => (StatusCode::BAD_REQUEST, None, None),
        SolaceError::ConversationPaused { .. } => (
            StatusCode::CONFLICT,
            Some("paused".to_string()),
            Some(state.engine.paused_notice.clone()),
        ),
        SolaceError::ConversationClosed { .. } => {
            (StatusCode::CONFLICT, Some("closed".to_string()), None)
        }
        SolaceError::InvalidTransition(_) => (StatusCode::CONFLICT, None, None),
        SolaceError::UpstreamUnavailable { .. } => (StatusCode::BAD_GATEWAY, None, None),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, None, None),
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            state: conversation_state,
            notice,
        }),
    )
        .into_response()
}

/// Resolve the caller from the `x-solace-user` header. Unknown or missing
/// identity is a 401, before any engine logic runs.
async fn resolve_caller(state: &GatewayState, headers: &HeaderMap) -> Result<Caller, Response> {
    let user_id = headers
        .get("x-solace-user")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "missing x-solace-user header".to_string(),
                    state: None,
                    notice: None,
                }),
            )
                .into_response()
        })?;

    match users::get_user(&state.engine.db, user_id).await {
        Ok(Some(user)) => Ok(Caller::new(user.id, user.role)),
        Ok(None) => Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: format!("unknown user {user_id}"),
                state: None,
                notice: None,
            }),
        )
            .into_response()),
        Err(e) => Err(error_response(state, e)),
    }
}

// --- health ---

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /health (unauthenticated).
pub async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// --- conversation metadata ---

#[derive(Debug, Deserialize)]
pub struct ConversationParams {
    pub conversation_id: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub conversation: Conversation,
    /// Patient-facing notice while paused or blocked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

fn conversation_response(state: &GatewayState, conversation: Conversation) -> ConversationResponse {
    let notice = if conversation.blocked {
        Some(state.engine.blocked_notice.clone())
    } else if conversation.status == ConversationStatus::Paused {
        Some(state.engine.paused_notice.clone())
    } else {
        None
    };
    ConversationResponse {
        conversation,
        notice,
        warnings: Vec::new(),
    }
}

/// `get_conversation`: full control metadata.
pub async fn get_conversation(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    QueryOrForm(params): QueryOrForm<ConversationParams>,
) -> Response {
    let caller = match resolve_caller(&state, &headers).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    match state
        .engine
        .get_conversation(&caller, &params.conversation_id)
        .await
    {
        Ok(conversation) => Json(conversation_response(&state, conversation)).into_response(),
        Err(e) => error_response(&state, e),
    }
}

#[derive(Debug, Deserialize)]
pub struct OpenConversationParams {
    pub patient_id: String,
}

/// `open_conversation`: first patient interaction, or therapist pre-create.
pub async fn open_conversation(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    QueryOrForm(params): QueryOrForm<OpenConversationParams>,
) -> Response {
    let caller = match resolve_caller(&state, &headers).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    match state
        .engine
        .open_conversation(&caller, &params.patient_id)
        .await
    {
        Ok(conversation) => Json(conversation_response(&state, conversation)).into_response(),
        Err(e) => error_response(&state, e),
    }
}

// --- polling ---

#[derive(Debug, Deserialize)]
pub struct CheckUpdatesParams {
    pub conversation_id: String,
    /// Last-known message id.
    pub since: Option<i64>,
}

/// `check_updates`: the cheap probe.
pub async fn check_updates(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    QueryOrForm(params): QueryOrForm<CheckUpdatesParams>,
) -> Response {
    let caller = match resolve_caller(&state, &headers).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    match state
        .engine
        .unread
        .check_updates(&caller, &params.conversation_id, params.since)
        .await
    {
        Ok(probe) => Json(probe).into_response(),
        Err(e) => error_response(&state, e),
    }
}

#[derive(Debug, Deserialize)]
pub struct GetMessagesParams {
    pub conversation_id: String,
    /// Pagination cursor: return messages with a higher id.
    pub after: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

/// `get_messages`: ordered history; marks exactly the returned rows read.
pub async fn get_messages(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    QueryOrForm(params): QueryOrForm<GetMessagesParams>,
) -> Response {
    let caller = match resolve_caller(&state, &headers).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    match state
        .engine
        .fetch_messages(&caller, &params.conversation_id, params.after, params.limit)
        .await
    {
        Ok(messages) => Json(MessagesResponse { messages }).into_response(),
        Err(e) => error_response(&state, e),
    }
}

/// `get_unread_counts`: per-patient/per-group/total unread + alert counts.
pub async fn get_unread_counts(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Response {
    let caller = match resolve_caller(&state, &headers).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    match state.engine.unread.unread_counts(&caller).await {
        Ok(counts) => Json(counts).into_response(),
        Err(e) => error_response(&state, e),
    }
}

// --- messages ---

#[derive(Debug, Deserialize)]
pub struct SendMessageParams {
    pub conversation_id: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message: Message,
    pub directed: bool,
    pub topics: Vec<String>,
    pub recipients: Vec<String>,
    pub ai_status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_message_id: Option<i64>,
    pub escalated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// `send_message`: patient traffic routes through the full pipeline,
/// therapist traffic goes straight to the patient.
pub async fn send_message(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    QueryOrForm(params): QueryOrForm<SendMessageParams>,
) -> Response {
    let caller = match resolve_caller(&state, &headers).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    let result = match caller.role {
        solace_core::types::ActorRole::Patient => {
            state
                .engine
                .router
                .submit_patient_message(&caller, &params.conversation_id, &params.text)
                .await
        }
        _ => {
            state
                .engine
                .router
                .submit_therapist_message(&caller, &params.conversation_id, &params.text)
                .await
        }
    };
    match result {
        Ok(outcome) => {
            let (ai_status, ai_message_id, escalated, ai_error) = match &outcome.ai {
                AiDisposition::Replied {
                    message_id,
                    escalated,
                } => ("replied", Some(*message_id), *escalated, None),
                AiDisposition::SkippedDirected => ("skipped_directed", None, false, None),
                AiDisposition::SkippedUnavailable => ("skipped_unavailable", None, false, None),
                AiDisposition::Failed { error } => ("failed", None, false, Some(error.clone())),
                AiDisposition::NotApplicable => ("not_applicable", None, false, None),
            };
            Json(SendMessageResponse {
                directed: outcome.decision.is_tagged(),
                topics: outcome.decision.topics.clone(),
                recipients: outcome.recipients,
                message: outcome.message,
                ai_status,
                ai_message_id,
                escalated,
                ai_error,
                warnings: outcome.warnings,
            })
            .into_response()
        }
        Err(e) => error_response(&state, e),
    }
}

#[derive(Debug, Deserialize)]
pub struct EditMessageParams {
    pub message_id: i64,
    pub text: String,
}

/// `edit_message`: soft edit, authoring therapist only.
pub async fn edit_message(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    QueryOrForm(params): QueryOrForm<EditMessageParams>,
) -> Response {
    let caller = match resolve_caller(&state, &headers).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    match state
        .engine
        .router
        .edit_message(&caller, params.message_id, params.text)
        .await
    {
        Ok(message) => Json(message).into_response(),
        Err(e) => error_response(&state, e),
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteMessageParams {
    pub message_id: i64,
}

/// `delete_message`: soft delete; the placeholder row remains.
pub async fn delete_message(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    QueryOrForm(params): QueryOrForm<DeleteMessageParams>,
) -> Response {
    let caller = match resolve_caller(&state, &headers).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    match state
        .engine
        .router
        .delete_message(&caller, params.message_id)
        .await
    {
        Ok(message) => Json(message).into_response(),
        Err(e) => error_response(&state, e),
    }
}

// --- conversation control ---

#[derive(Debug, Deserialize)]
pub struct SetRiskParams {
    pub conversation_id: String,
    pub risk_level: RiskLevel,
}

/// `set_risk_level`: therapist judgment is authoritative, any value goes.
pub async fn set_risk_level(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    QueryOrForm(params): QueryOrForm<SetRiskParams>,
) -> Response {
    let engine = state.engine.clone();
    let conversation_id = params.conversation_id.clone();
    let risk_level = params.risk_level;
    clinician_transition(&state, &headers, &params.conversation_id, move |caller| async move {
        engine
            .state
            .set_risk_level(&caller, &conversation_id, risk_level)
            .await
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct SetStatusParams {
    pub conversation_id: String,
    pub status: ConversationStatus,
}

/// `set_status`: `active ↔ paused`, `→ closed` terminal.
pub async fn set_status(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    QueryOrForm(params): QueryOrForm<SetStatusParams>,
) -> Response {
    let engine = state.engine.clone();
    let conversation_id = params.conversation_id.clone();
    let status = params.status;
    clinician_transition(&state, &headers, &params.conversation_id, move |caller| async move {
        engine.state.set_status(&caller, &conversation_id, status).await
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct ToggleAiParams {
    pub conversation_id: String,
    pub enabled: bool,
}

/// `toggle_ai`: enabling always clears a block.
pub async fn toggle_ai(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    QueryOrForm(params): QueryOrForm<ToggleAiParams>,
) -> Response {
    let engine = state.engine.clone();
    let conversation_id = params.conversation_id.clone();
    let enabled = params.enabled;
    clinician_transition(&state, &headers, &params.conversation_id, move |caller| async move {
        engine
            .state
            .set_ai_enabled(&caller, &conversation_id, enabled)
            .await
    })
    .await
}

async fn clinician_transition<F, Fut>(
    state: &GatewayState,
    headers: &HeaderMap,
    conversation_id: &str,
    transition: F,
) -> Response
where
    F: FnOnce(Caller) -> Fut,
    Fut: Future<Output = Result<solace_engine::StateChange, SolaceError>>,
{
    let caller = match resolve_caller(state, headers).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    if let Err(e) = state.engine.access.require_clinician(&caller) {
        return error_response(state, e);
    }
    if let Err(e) = state
        .engine
        .access
        .require_conversation(&caller, conversation_id)
        .await
    {
        return error_response(state, e);
    }
    match transition(caller).await {
        Ok(change) => {
            let mut response = conversation_response(state, change.conversation);
            response.warnings.extend(change.warning);
            Json(response).into_response()
        }
        Err(e) => error_response(state, e),
    }
}

// --- drafts ---

#[derive(Debug, Deserialize)]
pub struct CreateDraftParams {
    pub conversation_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DraftIdParams {
    pub draft_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct EditDraftParams {
    pub draft_id: i64,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct DraftResponse {
    pub draft: Draft,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DraftSentResponse {
    pub draft: Draft,
    pub message: Message,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// `create_draft`: AI-generated reply for therapist review.
pub async fn create_draft(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    QueryOrForm(params): QueryOrForm<CreateDraftParams>,
) -> Response {
    let caller = match resolve_caller(&state, &headers).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    match state
        .engine
        .drafts
        .create(&caller, &params.conversation_id)
        .await
    {
        Ok(change) => Json(DraftResponse {
            draft: change.draft,
            warnings: change.warnings,
        })
        .into_response(),
        Err(e) => error_response(&state, e),
    }
}

/// `edit_draft`: manual text replacement while still a draft.
pub async fn edit_draft(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    QueryOrForm(params): QueryOrForm<EditDraftParams>,
) -> Response {
    let caller = match resolve_caller(&state, &headers).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    match state
        .engine
        .drafts
        .edit(&caller, params.draft_id, params.text)
        .await
    {
        Ok(change) => Json(DraftResponse {
            draft: change.draft,
            warnings: change.warnings,
        })
        .into_response(),
        Err(e) => error_response(&state, e),
    }
}

/// `regenerate_draft`: push current text to the undo stack, ask the AI again.
pub async fn regenerate_draft(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    QueryOrForm(params): QueryOrForm<DraftIdParams>,
) -> Response {
    let caller = match resolve_caller(&state, &headers).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    match state.engine.drafts.regenerate(&caller, params.draft_id).await {
        Ok(change) => Json(DraftResponse {
            draft: change.draft,
            warnings: change.warnings,
        })
        .into_response(),
        Err(e) => error_response(&state, e),
    }
}

/// `undo_draft`: pop the undo stack; empty stack is a no-op.
pub async fn undo_draft(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    QueryOrForm(params): QueryOrForm<DraftIdParams>,
) -> Response {
    let caller = match resolve_caller(&state, &headers).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    match state.engine.drafts.undo(&caller, params.draft_id).await {
        Ok(change) => Json(DraftResponse {
            draft: change.draft,
            warnings: change.warnings,
        })
        .into_response(),
        Err(e) => error_response(&state, e),
    }
}

/// `send_draft`: terminal; emits the patient-visible message.
pub async fn send_draft(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    QueryOrForm(params): QueryOrForm<DraftIdParams>,
) -> Response {
    let caller = match resolve_caller(&state, &headers).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    match state.engine.drafts.send(&caller, params.draft_id).await {
        Ok(sent) => Json(DraftSentResponse {
            draft: sent.draft,
            message: sent.message,
            warnings: sent.warnings,
        })
        .into_response(),
        Err(e) => error_response(&state, e),
    }
}

/// `discard_draft`: terminal; no patient-visible effect.
pub async fn discard_draft(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    QueryOrForm(params): QueryOrForm<DraftIdParams>,
) -> Response {
    let caller = match resolve_caller(&state, &headers).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    match state.engine.drafts.discard(&caller, params.draft_id).await {
        Ok(change) => Json(DraftResponse {
            draft: change.draft,
            warnings: change.warnings,
        })
        .into_response(),
        Err(e) => error_response(&state, e),
    }
}

// --- read state ---

#[derive(Debug, Deserialize)]
pub struct MarkMessagesReadParams {
    pub conversation_id: String,
    /// Highest message id the client has actually displayed.
    pub up_to: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub marked: usize,
    pub counts: solace_engine::UnreadCounts,
}

/// `mark_messages_read`: explicit read-marking, bounded by what the client
/// has seen.
pub async fn mark_messages_read(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    QueryOrForm(params): QueryOrForm<MarkMessagesReadParams>,
) -> Response {
    let caller = match resolve_caller(&state, &headers).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    let marked = match state
        .engine
        .unread
        .mark_read(&caller, &params.conversation_id, params.up_to)
        .await
    {
        Ok(marked) => marked,
        Err(e) => return error_response(&state, e),
    };
    match state.engine.unread.unread_counts(&caller).await {
        Ok(counts) => Json(MarkReadResponse { marked, counts }).into_response(),
        Err(e) => error_response(&state, e),
    }
}

#[derive(Debug, Deserialize)]
pub struct MarkAlertsParams {
    /// Omit to dismiss across all accessible conversations.
    pub conversation_id: Option<String>,
}

/// `mark_all_alerts_read`: bulk dismiss, idempotent.
pub async fn mark_all_alerts_read(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    QueryOrForm(params): QueryOrForm<MarkAlertsParams>,
) -> Response {
    let caller = match resolve_caller(&state, &headers).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    let marked = match state
        .engine
        .unread
        .mark_all_alerts_read(&caller, params.conversation_id.as_deref())
        .await
    {
        Ok(marked) => marked,
        Err(e) => return error_response(&state, e),
    };
    match state.engine.unread.unread_counts(&caller).await {
        Ok(counts) => Json(MarkReadResponse { marked, counts }).into_response(),
        Err(e) => error_response(&state, e),
    }
}

// --- notes ---

#[derive(Debug, Deserialize)]
pub struct AddNoteParams {
    pub conversation_id: String,
    pub body: String,
    pub kind: Option<NoteKind>,
}

#[derive(Debug, Serialize)]
pub struct NotesResponse {
    pub notes: Vec<Note>,
}

/// `add_note`: clinical annotation outside the message stream.
pub async fn add_note(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    QueryOrForm(params): QueryOrForm<AddNoteParams>,
) -> Response {
    let caller = match resolve_caller(&state, &headers).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    match state
        .engine
        .notes
        .add(
            &caller,
            &params.conversation_id,
            params.kind.unwrap_or(NoteKind::Manual),
            params.body,
        )
        .await
    {
        Ok(note) => Json(note).into_response(),
        Err(e) => error_response(&state, e),
    }
}

/// `list_notes`: non-deleted notes for one conversation.
pub async fn list_notes(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    QueryOrForm(params): QueryOrForm<ConversationParams>,
) -> Response {
    let caller = match resolve_caller(&state, &headers).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    match state
        .engine
        .notes
        .list(&caller, &params.conversation_id)
        .await
    {
        Ok(notes) => Json(NotesResponse { notes }).into_response(),
        Err(e) => error_response(&state, e),
    }
}

// --- export ---

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    /// `patient`, `group`, or `all`.
    pub scope: String,
    pub patient_id: Option<String>,
    pub group_id: Option<String>,
}

/// `export_csv`: delimited conversation history for the caller's scope.
pub async fn export_csv(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    QueryOrForm(params): QueryOrForm<ExportParams>,
) -> Response {
    let caller = match resolve_caller(&state, &headers).await {
        Ok(c) => c,
        Err(r) => return r,
    };
    let scope = match (params.scope.as_str(), params.patient_id, params.group_id) {
        ("patient", Some(patient_id), _) => ExportScope::Patient(patient_id),
        ("group", _, Some(group_id)) => ExportScope::Group(group_id),
        ("all", _, _) => ExportScope::All,
        _ => {
            return error_response(
                &state,
                SolaceError::Validation(
                    "scope must be patient (with patient_id), group (with group_id), or all"
                        .to_string(),
                ),
            )
        }
    };
    match state.engine.exporter.export_csv(&caller, scope).await {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"solace-export.csv\"",
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => error_response(&state, e),
    }
}
