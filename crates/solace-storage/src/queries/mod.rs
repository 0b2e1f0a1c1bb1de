// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules, one per table family. All functions accept
//! `&Database` and run on the single writer thread.

pub mod alerts;
pub mod audit;
pub mod conversations;
pub mod drafts;
pub mod messages;
pub mod notes;
pub mod queue;
pub mod recipients;
pub mod users;
