// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WebSocket client sessions.
//!
//! Each accepted socket becomes a [`WsConnection`] registered with the hub.
//! Outbound text goes through a bounded queue drained by a forwarding task,
//! so the bus side never waits on a slow client.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::hub::{short_id, Connection, ConnectionHub, ConnectionState};

/// Outbound frames buffered per client before new ones are dropped.
pub const OUTBOUND_QUEUE_DEPTH: usize = 256;

/// Hub-facing half of a WebSocket session.
pub struct WsConnection {
    id: Uuid,
    state: AtomicU8,
    tx: mpsc::Sender<String>,
}

impl WsConnection {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: AtomicU8::new(encode_state(ConnectionState::Connecting)),
            tx,
        }
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.state.store(encode_state(state), Ordering::Release);
    }
}

impl Connection for WsConnection {
    fn id(&self) -> Uuid {
        self.id
    }

    fn state(&self) -> ConnectionState {
        decode_state(self.state.load(Ordering::Acquire))
    }

    fn send_text(&self, text: &str) -> bool {
        match self.tx.try_send(text.to_string()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("[{}] Outbound queue full, dropping frame", short_id(self.id));
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("[{}] Outbound queue closed", short_id(self.id));
                false
            }
        }
    }
}

fn encode_state(state: ConnectionState) -> u8 {
    match state {
        ConnectionState::Connecting => 0,
        ConnectionState::Open => 1,
        ConnectionState::Closing => 2,
        ConnectionState::Closed => 3,
    }
}

fn decode_state(raw: u8) -> ConnectionState {
    match raw {
        0 => ConnectionState::Connecting,
        1 => ConnectionState::Open,
        2 => ConnectionState::Closing,
        _ => ConnectionState::Closed,
    }
}

/// Run one client session until the socket closes.
pub async fn run_session(socket: WebSocket, hub: Arc<ConnectionHub>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_DEPTH);

    let connection = Arc::new(WsConnection::new(tx));
    let id = connection.id();
    let tag = short_id(id);

    // Forward queued frames to the socket
    let forward_tag = tag.clone();
    let ws_forward = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if ws_tx.send(Message::Text(text)).await.is_err() {
                debug!("[{}] WebSocket send failed, closing", forward_tag);
                break;
            }
        }
    });

    connection.set_state(ConnectionState::Open);
    hub.register(connection.clone());

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                hub.on_receive(id, &text);
            }
            Ok(Message::Binary(data)) => {
                let text = String::from_utf8_lossy(&data);
                hub.on_receive(id, &text);
            }
            Ok(Message::Close(_)) => {
                info!("[{}] Client closed connection", tag);
                connection.set_state(ConnectionState::Closing);
                break;
            }
            Ok(Message::Ping(_)) => {
                // Axum handles pong automatically
            }
            Ok(Message::Pong(_)) => {
                debug!("[{}] Pong received", tag);
            }
            Err(e) => {
                error!("[{}] WebSocket error: {}", tag, e);
                break;
            }
        }
    }

    // Cleanup
    connection.set_state(ConnectionState::Closed);
    hub.unregister(id);
    ws_forward.abort();
    info!("[{}] Session ended", tag);
}
