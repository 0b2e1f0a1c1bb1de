// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification dispatcher trait.

use async_trait::async_trait;

use crate::error::SolaceError;
use crate::types::Notification;

/// Queues outbound notifications (email, push, ...).
///
/// The engine decides *that* and *what* to notify; delivery mechanics live
/// entirely in the adapter. Dispatch failures are non-fatal: callers log
/// them and never roll back the primary state change.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: Notification) -> Result<(), SolaceError>;
}
