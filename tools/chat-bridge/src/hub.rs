// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Live client connections and the relay between them and the bus.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::bus_client::BusClient;
use crate::message::UserMessage;

/// Transport-level state of a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// One client connection as seen by the hub.
pub trait Connection: Send + Sync {
    fn id(&self) -> Uuid;

    fn state(&self) -> ConnectionState;

    /// Queue a text frame. Must not wait; returns `false` if the frame was
    /// not accepted.
    fn send_text(&self, text: &str) -> bool;
}

/// Set of connected clients, keyed by connection id.
pub struct ConnectionHub {
    bus: Arc<BusClient>,
    connections: DashMap<Uuid, Arc<dyn Connection>>,
}

impl ConnectionHub {
    pub fn new(bus: Arc<BusClient>) -> Self {
        Self {
            bus,
            connections: DashMap::new(),
        }
    }

    pub fn register(&self, connection: Arc<dyn Connection>) {
        let id = connection.id();
        self.connections.insert(id, connection);
        info!(
            "[{}] Client registered. Total: {}",
            short_id(id),
            self.connections.len()
        );
    }

    pub fn unregister(&self, id: Uuid) -> bool {
        let removed = self.connections.remove(&id).is_some();
        if removed {
            info!(
                "[{}] Client unregistered. Total: {}",
                short_id(id),
                self.connections.len()
            );
        }
        removed
    }

    /// Send `payload` to every open connection. Returns how many accepted it.
    pub fn broadcast(&self, payload: &str) -> usize {
        // snapshot first so no shard lock is held while sending
        let targets: Vec<Arc<dyn Connection>> = self
            .connections
            .iter()
            .filter(|entry| entry.value().state() == ConnectionState::Open)
            .map(|entry| entry.value().clone())
            .collect();

        let sent = targets
            .iter()
            .filter(|connection| connection.send_text(payload))
            .count();
        trace!(
            "Broadcast to {}/{} connection(s)",
            sent,
            self.connections.len()
        );
        sent
    }

    /// Inbound frame from a client: publish it on the bus.
    pub fn on_receive(&self, connection_id: Uuid, payload: &str) -> bool {
        debug!("[{}] Received {} bytes", short_id(connection_id), payload.len());
        self.bus.publish(&UserMessage::new(payload))
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn open_connection_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.value().state() == ConnectionState::Open)
            .count()
    }

    pub fn bus(&self) -> &Arc<BusClient> {
        &self.bus
    }
}

impl fmt::Debug for ConnectionHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHub")
            .field("connections", &self.connections.len())
            .field("bus", &self.bus)
            .finish()
    }
}

/// First 8 characters of a connection id, for log lines.
pub(crate) fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use parking_lot::Mutex;

    /// Connection that records what it was sent.
    pub struct RecordingConnection {
        id: Uuid,
        state: Mutex<ConnectionState>,
        pub sent: Mutex<Vec<String>>,
    }

    impl RecordingConnection {
        pub fn new(state: ConnectionState) -> Arc<Self> {
            Arc::new(Self {
                id: Uuid::new_v4(),
                state: Mutex::new(state),
                sent: Mutex::new(Vec::new()),
            })
        }

        pub fn set_state(&self, state: ConnectionState) {
            *self.state.lock() = state;
        }

        pub fn received(&self) -> Vec<String> {
            self.sent.lock().clone()
        }
    }

    impl Connection for RecordingConnection {
        fn id(&self) -> Uuid {
            self.id
        }

        fn state(&self) -> ConnectionState {
            *self.state.lock()
        }

        fn send_text(&self, text: &str) -> bool {
            self.sent.lock().push(text.to_string());
            true
        }
    }
}
