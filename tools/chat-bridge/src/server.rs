// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP/WebSocket listener.

use std::sync::Arc;

use axum::{
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::hub::ConnectionHub;
use crate::session::run_session;

/// Shared application state
pub struct AppState {
    pub hub: Arc<ConnectionHub>,
    pub max_clients: usize,
}

impl AppState {
    pub fn new(hub: Arc<ConnectionHub>, max_clients: usize) -> Self {
        Self { hub, max_clients }
    }

    fn can_accept_client(&self) -> bool {
        self.hub.connection_count() < self.max_clients
    }
}

/// Routes: WebSocket upgrades on `/` and `/ws`, status on `/health`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if !state.can_accept_client() {
        warn!("Connection rejected: max clients reached");
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
    }

    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| run_session(socket, hub))
        .into_response()
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(HealthReport::collect(&state))
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    pub bus: &'static str,
    pub domain: Option<u32>,
    pub writer: bool,
    pub subscribed: bool,
    pub clients: usize,
    pub open_clients: usize,
    pub max_clients: usize,
}

impl HealthReport {
    fn collect(state: &AppState) -> Self {
        let bus = state.hub.bus();
        Self {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            bus: bus.state().as_str(),
            domain: bus.domain_id(),
            writer: bus.has_writer(),
            subscribed: bus.has_subscription(),
            clients: state.hub.connection_count(),
            open_clients: state.hub.open_connection_count(),
            max_clients: state.max_clients,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus_client::BusClient;
    use crate::hub::test_support::RecordingConnection;
    use crate::hub::ConnectionState;

    fn state(max_clients: usize) -> AppState {
        let hub = Arc::new(ConnectionHub::new(Arc::new(BusClient::new())));
        AppState::new(hub, max_clients)
    }

    #[test]
    fn test_health_report() {
        let state = state(10);
        state
            .hub
            .register(RecordingConnection::new(ConnectionState::Open));
        state
            .hub
            .register(RecordingConnection::new(ConnectionState::Closing));

        let report = serde_json::to_value(HealthReport::collect(&state)).expect("serialize");
        assert_eq!(report["status"], "ok");
        assert_eq!(report["bus"], "uninitialized");
        assert!(report["domain"].is_null());
        assert_eq!(report["clients"], 2);
        assert_eq!(report["open_clients"], 1);
        assert_eq!(report["max_clients"], 10);
    }

    #[test]
    fn test_client_limit() {
        let state = state(1);
        assert!(state.can_accept_client());
        state
            .hub
            .register(RecordingConnection::new(ConnectionState::Open));
        assert!(!state.can_accept_client());
    }

    #[test]
    fn test_router_builds() {
        let _router = router(Arc::new(state(1)));
    }
}
