// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits the engine depends on.
//!
//! The orchestration core never calls an LLM, sends an email, or formats an
//! audit row itself. It depends on these interfaces; the hosting application
//! supplies concrete adapters (dependency injection instead of implicit
//! framework callbacks).

pub mod audit;
pub mod notify;
pub mod responder;

pub use audit::AuditSink;
pub use notify::NotificationDispatcher;
pub use responder::AiResponder;
