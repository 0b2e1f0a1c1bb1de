// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Every action is registered for both GET (query string) and POST
//! (form-encoded body) so web and native polling clients share one surface.

use std::sync::Arc;

use axum::{middleware as axum_middleware, routing::get, Router};
use solace_core::SolaceError;
use solace_engine::Engine;
use tower_http::cors::CorsLayer;

use crate::auth::{auth_middleware, AuthConfig};
use crate::handlers;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub engine: Arc<Engine>,
    pub auth: AuthConfig,
}

/// Gateway server configuration (mirrors `GatewayConfig` from solace-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub bearer_token: Option<String>,
}

/// Build the full application router.
pub fn build_router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route(
            "/api/check_updates",
            get(handlers::check_updates).post(handlers::check_updates),
        )
        .route(
            "/api/get_conversation",
            get(handlers::get_conversation).post(handlers::get_conversation),
        )
        .route(
            "/api/open_conversation",
            get(handlers::open_conversation).post(handlers::open_conversation),
        )
        .route(
            "/api/get_messages",
            get(handlers::get_messages).post(handlers::get_messages),
        )
        .route(
            "/api/get_unread_counts",
            get(handlers::get_unread_counts).post(handlers::get_unread_counts),
        )
        .route(
            "/api/send_message",
            get(handlers::send_message).post(handlers::send_message),
        )
        .route(
            "/api/edit_message",
            get(handlers::edit_message).post(handlers::edit_message),
        )
        .route(
            "/api/delete_message",
            get(handlers::delete_message).post(handlers::delete_message),
        )
        .route(
            "/api/set_risk_level",
            get(handlers::set_risk_level).post(handlers::set_risk_level),
        )
        .route(
            "/api/set_status",
            get(handlers::set_status).post(handlers::set_status),
        )
        .route(
            "/api/toggle_ai",
            get(handlers::toggle_ai).post(handlers::toggle_ai),
        )
        .route(
            "/api/create_draft",
            get(handlers::create_draft).post(handlers::create_draft),
        )
        .route(
            "/api/edit_draft",
            get(handlers::edit_draft).post(handlers::edit_draft),
        )
        .route(
            "/api/regenerate_draft",
            get(handlers::regenerate_draft).post(handlers::regenerate_draft),
        )
        .route(
            "/api/undo_draft",
            get(handlers::undo_draft).post(handlers::undo_draft),
        )
        .route(
            "/api/send_draft",
            get(handlers::send_draft).post(handlers::send_draft),
        )
        .route(
            "/api/discard_draft",
            get(handlers::discard_draft).post(handlers::discard_draft),
        )
        .route(
            "/api/mark_messages_read",
            get(handlers::mark_messages_read).post(handlers::mark_messages_read),
        )
        .route(
            "/api/mark_all_alerts_read",
            get(handlers::mark_all_alerts_read).post(handlers::mark_all_alerts_read),
        )
        .route(
            "/api/add_note",
            get(handlers::add_note).post(handlers::add_note),
        )
        .route(
            "/api/list_notes",
            get(handlers::list_notes).post(handlers::list_notes),
        )
        .route(
            "/api/export_csv",
            get(handlers::export_csv).post(handlers::export_csv),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(CorsLayer::permissive())
}

/// Bind and serve until the process exits.
pub async fn start_server(config: &ServerConfig, engine: Arc<Engine>) -> Result<(), SolaceError> {
    if config.bearer_token.is_none() {
        tracing::warn!("gateway auth is DISABLED (no bearer token configured)");
    }
    let state = GatewayState {
        engine,
        auth: AuthConfig {
            bearer_token: config.bearer_token.clone(),
        },
    };
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SolaceError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| SolaceError::Internal(format!("gateway server error: {e}")))
}
