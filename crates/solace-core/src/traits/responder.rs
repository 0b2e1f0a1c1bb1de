// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI responder trait: the LLM invocation as a black box.

use async_trait::async_trait;

use crate::error::SolaceError;
use crate::types::{AiReply, AiRequest};

/// Produces AI replies for a conversation.
///
/// The adapter owns its own timeout; the engine never blocks indefinitely on
/// it. A failure here must leave the inbound message already persisted --
/// the router guarantees that ordering.
#[async_trait]
pub trait AiResponder: Send + Sync {
    /// Generate a reply from conversation history plus an optional
    /// instruction block. Returns text and, when the model supplies one, a
    /// structured safety assessment.
    async fn reply(&self, request: AiRequest) -> Result<AiReply, SolaceError>;
}
