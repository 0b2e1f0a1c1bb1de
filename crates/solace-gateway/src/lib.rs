// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP polling/action surface for the Solace engine.
//!
//! Clients poll `check_updates` on an interval and fetch full history only
//! when the probe reports change (two-phase polling). All actions accept
//! both query-string and form-encoded invocation.

pub mod auth;
pub mod extract;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use server::{build_router, start_server, GatewayState, ServerConfig};
