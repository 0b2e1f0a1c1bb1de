// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording notification dispatcher.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use solace_core::traits::NotificationDispatcher;
use solace_core::types::Notification;
use solace_core::SolaceError;

/// A dispatcher that records every notification instead of delivering it.
pub struct RecordingDispatcher {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent dispatch fail, for isolation tests.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All notifications dispatched so far.
    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }

    /// Clear recorded notifications.
    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }
}

impl Default for RecordingDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn dispatch(&self, notification: Notification) -> Result<(), SolaceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SolaceError::Notification(
                "recording dispatcher set to fail".to_string(),
            ));
        }
        self.sent.lock().await.push(notification);
        Ok(())
    }
}
