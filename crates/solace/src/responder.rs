// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Default AI responder for deployments without an LLM adapter wired in.
//!
//! The LLM is an external collaborator behind the `AiResponder` trait; the
//! hosting application supplies a real adapter. Until one is configured,
//! every request fails as `UpstreamUnavailable`, which the router turns
//! into therapist-directed fan-out -- patients are never left unanswered,
//! their messages land in front of a human instead.

use async_trait::async_trait;
use solace_core::traits::AiResponder;
use solace_core::types::{AiReply, AiRequest};
use solace_core::SolaceError;
use tracing::warn;

pub struct UnconfiguredResponder;

#[async_trait]
impl AiResponder for UnconfiguredResponder {
    async fn reply(&self, request: AiRequest) -> Result<AiReply, SolaceError> {
        warn!(
            conversation_id = request.conversation_id.as_str(),
            "no AI responder configured; routing to therapists"
        );
        Err(SolaceError::UpstreamUnavailable {
            message: "no AI responder configured".to_string(),
            source: None,
        })
    }
}
