// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock collaborators and shared fixtures for fast, CI-runnable tests
//! without external API calls or delivery side effects.

pub mod harness;
pub mod mock_dispatcher;
pub mod mock_responder;

pub use harness::TestHarness;
pub use mock_dispatcher::RecordingDispatcher;
pub use mock_responder::MockResponder;
