// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Chat bridge: relays chat messages between the `"User Messages"` bus topic
//! and WebSocket clients.
//!
//! - [`BusClient`] owns the bus participant, writer and reader.
//! - [`ConnectionHub`] tracks connected clients, broadcasts bus messages to
//!   them and publishes what they send.
//! - [`LifecycleController`] tears the bus client down exactly once, on a
//!   signal or on normal exit.
//!
//! ```no_run
//! use std::sync::Arc;
//! use chat_bridge::{BusClient, ConnectionHub, LifecycleController, CHAT_DOMAIN_ID};
//!
//! # async fn run() -> Result<(), chat_bridge::InitError> {
//! let bus = Arc::new(BusClient::new());
//! bus.initialize(CHAT_DOMAIN_ID, std::iter::empty::<&str>())?;
//! let hub = Arc::new(ConnectionHub::new(bus.clone()));
//! let lifecycle = LifecycleController::new(bus.clone());
//!
//! let relay = hub.clone();
//! bus.subscribe(move |msg| {
//!     relay.broadcast(msg.message());
//! });
//!
//! let trigger = lifecycle.wait_for_signal().await;
//! lifecycle.shutdown(trigger);
//! # Ok(())
//! # }
//! ```

pub mod bus_client;
pub mod config;
pub mod error;
pub mod hub;
pub mod lifecycle;
pub mod message;
pub mod server;
pub mod session;

pub use bus_client::{BusClient, BusState};
pub use config::{ChatRoot, CHAT_ROOT_VAR};
pub use error::{InitError, Result};
pub use hub::{Connection, ConnectionHub, ConnectionState};
pub use lifecycle::{LifecycleController, ShutdownTrigger};
pub use message::{UserMessage, CHAT_DOMAIN_ID, USER_MESSAGES_TOPIC, USER_MESSAGE_TYPE};
pub use server::{router, AppState, HealthReport};
pub use session::WsConnection;
