// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock AI responder with pre-configured replies.
//!
//! Replies are popped from a FIFO queue. When the queue is empty, a default
//! benign reply is returned. Every request is recorded for assertions.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use solace_core::traits::AiResponder;
use solace_core::types::{AiReply, AiRequest, DangerLevel, SafetyAssessment};
use solace_core::SolaceError;

/// A mock AI responder that returns pre-configured replies.
pub struct MockResponder {
    replies: Mutex<VecDeque<AiReply>>,
    requests: Mutex<Vec<AiRequest>>,
    fail_next: AtomicBool,
}

impl MockResponder {
    /// Create a mock responder with an empty reply queue.
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            fail_next: AtomicBool::new(false),
        }
    }

    /// A benign reply carrying a `none` structured assessment.
    pub fn benign(text: &str) -> AiReply {
        AiReply {
            text: text.to_string(),
            safety: Some(SafetyAssessment {
                danger: DangerLevel::None,
                reason: None,
            }),
        }
    }

    /// A reply at the given danger level.
    pub fn assessed(text: &str, danger: DangerLevel) -> AiReply {
        AiReply {
            text: text.to_string(),
            safety: Some(SafetyAssessment {
                danger,
                reason: Some("mock assessment".to_string()),
            }),
        }
    }

    /// A reply with no structured assessment, forcing the keyword fallback.
    pub fn unassessed(text: &str) -> AiReply {
        AiReply {
            text: text.to_string(),
            safety: None,
        }
    }

    /// Queue a reply.
    pub async fn push_reply(&self, reply: AiReply) {
        self.replies.lock().await.push_back(reply);
    }

    /// Make the next `reply` call fail with `UpstreamUnavailable`.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// All requests seen so far.
    pub async fn requests(&self) -> Vec<AiRequest> {
        self.requests.lock().await.clone()
    }

    /// Number of requests seen so far.
    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

impl Default for MockResponder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiResponder for MockResponder {
    async fn reply(&self, request: AiRequest) -> Result<AiReply, SolaceError> {
        self.requests.lock().await.push(request);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(SolaceError::UpstreamUnavailable {
                message: "mock responder failure".to_string(),
                source: None,
            });
        }
        Ok(self
            .replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Self::benign("mock reply")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AiRequest {
        AiRequest {
            conversation_id: "c-1".to_string(),
            history: vec![],
            instruction: None,
        }
    }

    #[tokio::test]
    async fn replies_pop_in_order_then_default() {
        let responder = MockResponder::new();
        responder.push_reply(MockResponder::benign("first")).await;
        responder.push_reply(MockResponder::benign("second")).await;

        assert_eq!(responder.reply(request()).await.unwrap().text, "first");
        assert_eq!(responder.reply(request()).await.unwrap().text, "second");
        assert_eq!(responder.reply(request()).await.unwrap().text, "mock reply");
        assert_eq!(responder.request_count().await, 3);
    }

    #[tokio::test]
    async fn fail_next_fails_exactly_once() {
        let responder = MockResponder::new();
        responder.fail_next();
        assert!(responder.reply(request()).await.is_err());
        assert!(responder.reply(request()).await.is_ok());
    }
}
