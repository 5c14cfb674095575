// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! History cache for writer-side retransmission
//!
//! Ring buffer of recently written payloads with KEEP_LAST style FIFO
//! eviction.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

/// Cache entry for a single written sample.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub seq: u64,
    pub payload: Arc<[u8]>,
    pub ts_ns: u64,
}

/// History cache for writer-side retransmission.
#[derive(Debug)]
pub struct HistoryCache {
    ring: Mutex<VecDeque<CacheEntry>>,
    depth: usize,
}

impl HistoryCache {
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            ring: Mutex::new(VecDeque::with_capacity(depth)),
            depth,
        }
    }

    /// Insert a sample, evicting the oldest one when full.
    ///
    /// Sequence numbers are expected in increasing order.
    pub fn insert(&self, seq: u64, payload: Arc<[u8]>, ts_ns: u64) {
        let mut ring = self.ring.lock();
        if ring.len() == self.depth {
            if let Some(evicted) = ring.pop_front() {
                log::trace!("[HistoryCache] evicted seq={}", evicted.seq);
            }
        }
        ring.push_back(CacheEntry {
            seq,
            payload,
            ts_ns,
        });
    }

    pub fn get(&self, seq: u64) -> Option<CacheEntry> {
        let ring = self.ring.lock();
        let first = ring.front()?.seq;
        let idx = usize::try_from(seq.checked_sub(first)?).ok()?;
        ring.get(idx).filter(|e| e.seq == seq).cloned()
    }

    /// `(first, last)` sequence numbers still available.
    pub fn range(&self) -> Option<(u64, u64)> {
        let ring = self.ring.lock();
        Some((ring.front()?.seq, ring.back()?.seq))
    }

    pub fn len(&self) -> usize {
        self.ring.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.lock().is_empty()
    }
}
