// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Chat bridge - relay chat messages between the bus and WebSocket clients.
//!
//! Every text frame a client sends is published on the `"User Messages"`
//! topic; every message seen on that topic is sent to all connected clients,
//! including the one that sent it.
//!
//! # Usage
//!
//! ```bash
//! # CHAT_ROOT must contain idl/Chat.idl
//! export CHAT_ROOT=/opt/chat
//!
//! # Listen on the default port 7000
//! chat-bridge
//!
//! # Custom port, bus transport arguments after --
//! chat-bridge --port 8080 -- -DCPSConfigFile bus.toml
//! ```

use std::future::IntoFuture;
use std::sync::Arc;

use chat_bridge::{
    router, AppState, BusClient, ConnectionHub, LifecycleController, ShutdownTrigger,
    CHAT_DOMAIN_ID,
};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Chat bridge
#[derive(Parser, Debug, Clone)]
#[command(name = "chat-bridge")]
#[command(about = "Relay chat messages between the bus and WebSocket clients")]
#[command(version)]
struct Args {
    /// WebSocket server port
    #[arg(short, long, default_value = "7000")]
    port: u16,

    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Bus domain ID
    #[arg(short, long, default_value_t = CHAT_DOMAIN_ID)]
    domain: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Maximum concurrent WebSocket connections
    #[arg(long, default_value = "100")]
    max_clients: usize,

    /// Bus transport arguments (-DCPSConfigFile <path>, -DCPSTransport <mode>, ...)
    #[arg(last = true)]
    transport_args: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("Chat bridge v{}", env!("CARGO_PKG_VERSION"));

    let bus = Arc::new(BusClient::new());
    bus.initialize(args.domain, &args.transport_args)?;

    let hub = Arc::new(ConnectionHub::new(bus.clone()));
    let lifecycle = LifecycleController::new(bus.clone());

    let relay = hub.clone();
    if !bus.subscribe(move |msg| {
        relay.broadcast(msg.message());
    }) {
        error!("Subscription failed, clients will not receive bus messages");
    }

    let addr = format!("{}:{}", args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let app = router(Arc::new(AppState::new(hub, args.max_clients)));

    info!("WebSocket endpoint: ws://{}/ws", addr);
    info!("Domain ID: {}", args.domain);

    let trigger = tokio::select! {
        result = axum::serve(listener, app).into_future() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
            ShutdownTrigger::NormalExit
        }
        trigger = lifecycle.wait_for_signal() => trigger,
    };

    if let Some(code) = lifecycle.shutdown(trigger) {
        std::process::exit(code);
    }
    Ok(())
}
