// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process shutdown: the single hook that tears the bus client down.
//!
//! The controller is created once by the program that owns the
//! [`BusClient`]. Whatever happens first (Ctrl+C, SIGTERM, or the
//! controller going out of scope on a normal exit) runs
//! [`BusClient::teardown`]; every later trigger is ignored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::bus_client::BusClient;

/// What caused the shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// SIGINT / Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
    NormalExit,
}

impl ShutdownTrigger {
    /// Process exit code the caller should use, if it must exit now.
    pub fn exit_code(self) -> Option<i32> {
        match self {
            ShutdownTrigger::Interrupt | ShutdownTrigger::Terminate => Some(0),
            ShutdownTrigger::NormalExit => None,
        }
    }
}

pub struct LifecycleController {
    bus: Arc<BusClient>,
    fired: AtomicBool,
}

impl LifecycleController {
    pub fn new(bus: Arc<BusClient>) -> Self {
        debug!("Shutdown hook registered");
        Self {
            bus,
            fired: AtomicBool::new(false),
        }
    }

    /// Wait for SIGINT or (on unix) SIGTERM.
    pub async fn wait_for_signal(&self) -> ShutdownTrigger {
        let interrupt = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        let trigger = tokio::select! {
            () = interrupt => ShutdownTrigger::Interrupt,
            () = terminate => ShutdownTrigger::Terminate,
        };
        info!("Received {:?}", trigger);
        trigger
    }

    /// Run the teardown if no earlier trigger did.
    ///
    /// Returns the exit code for signal triggers and `None` for a normal exit.
    pub fn shutdown(&self, trigger: ShutdownTrigger) -> Option<i32> {
        if self.fired.swap(true, Ordering::AcqRel) {
            debug!("Shutdown already done, ignoring {:?}", trigger);
        } else {
            info!("Shutting down ({:?})", trigger);
            self.bus.teardown();
        }
        trigger.exit_code()
    }

    pub fn has_shut_down(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

impl Drop for LifecycleController {
    fn drop(&mut self) {
        self.shutdown(ShutdownTrigger::NormalExit);
    }
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("fired", &self.has_shut_down())
            .finish()
    }
}
