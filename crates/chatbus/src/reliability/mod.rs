// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reliable delivery over lossy transports.
//!
//! - Writer side: [`HistoryCache`] keeps the last `depth` samples so NACKed
//!   sequence numbers can be re-sent (or declared lost with a `Gap`).
//! - Reader side: [`RemoteWriterProxy`] tracks one remote writer, releases
//!   samples in sequence order and computes the missing set from heartbeats.

mod history_cache;
mod writer_proxy;

pub use history_cache::{CacheEntry, HistoryCache};
pub use writer_proxy::{HeartbeatOutcome, RemoteWriterProxy, MAX_NACK_PER_HEARTBEAT};
