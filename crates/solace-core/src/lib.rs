// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core types and collaborator traits for the Solace conversation engine.
//!
//! Solace mediates a three-party conversation (patient, AI assistant, one or
//! more therapists). This crate holds the vocabulary shared by every other
//! crate: closed enumerations for conversation control state, the error
//! taxonomy, and the traits behind which external collaborators (the LLM,
//! outbound notification delivery, the audit trail) are injected.

pub mod error;
pub mod traits;
pub mod types;

pub use error::SolaceError;
pub use traits::{AiResponder, AuditSink, NotificationDispatcher};
