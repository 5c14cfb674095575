// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reader-side state for one remote writer.
//!
//! # Algorithm
//!
//! - The first frame seen from a writer sets the baseline: a `Data(seq)`
//!   starts delivery at `seq`, a `Heartbeat(first, last)` starts at `last + 1`
//!   (samples written before we joined are not requested).
//! - `Data(seq)` with `seq == next_expected` is released along with any
//!   buffered successors; higher sequence numbers are buffered.
//! - In best-effort mode holes are skipped instead of waited for.
//! - `Heartbeat(first, last)` yields the missing set in
//!   `[next_expected, last]`; anything below `first` is gone for good and is
//!   skipped.
//! - `Gap(seqs)` marks sequence numbers as irrelevant.

use std::collections::BTreeMap;

/// Upper bound on sequence numbers requested per heartbeat.
pub const MAX_NACK_PER_HEARTBEAT: usize = 256;

/// Result of processing a heartbeat.
#[derive(Debug)]
pub struct HeartbeatOutcome<T> {
    /// Samples released because the writer no longer has their predecessors.
    pub released: Vec<T>,
    /// Sequence numbers to NACK.
    pub missing: Vec<u64>,
}

#[derive(Debug)]
pub struct RemoteWriterProxy<T> {
    /// 0 until the first frame from the writer.
    next_expected: u64,
    /// `None` marks a sequence number the writer declared irrelevant.
    pending: BTreeMap<u64, Option<T>>,
}

impl<T> Default for RemoteWriterProxy<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RemoteWriterProxy<T> {
    pub fn new() -> Self {
        Self {
            next_expected: 0,
            pending: BTreeMap::new(),
        }
    }

    pub fn next_expected(&self) -> u64 {
        self.next_expected
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Process a data sample. Returns the samples now deliverable, in order.
    pub fn on_data(&mut self, seq: u64, item: T, reliable: bool) -> Vec<T> {
        if seq == 0 {
            return Vec::new();
        }
        if seq == u64::MAX {
            // the cursor could not move past it
            log::debug!("[WriterProxy] dropping sample with seq={}", seq);
            return Vec::new();
        }
        if self.next_expected == 0 {
            self.next_expected = seq;
        }
        if seq < self.next_expected {
            log::trace!("[WriterProxy] duplicate seq={}", seq);
            return Vec::new();
        }

        self.pending.insert(seq, Some(item));

        if reliable {
            self.drain_contiguous()
        } else {
            // Best effort: everything up to and including `seq` goes now.
            let mut out = self.release_below(seq + 1);
            out.extend(self.drain_contiguous());
            out
        }
    }

    /// Process a heartbeat announcing `[first, last]` available at the writer.
    pub fn on_heartbeat(&mut self, first: u64, last: u64) -> HeartbeatOutcome<T> {
        if self.next_expected == 0 {
            self.next_expected = last.saturating_add(1).max(1);
            return HeartbeatOutcome {
                released: Vec::new(),
                missing: Vec::new(),
            };
        }

        let mut released = Vec::new();
        if first > self.next_expected {
            log::debug!(
                "[WriterProxy] writer history starts at {}, skipping {}..{}",
                first,
                self.next_expected,
                first
            );
            released = self.release_below(first);
            released.extend(self.drain_contiguous());
        }

        let missing = (self.next_expected..=last)
            .filter(|seq| !self.pending.contains_key(seq))
            .take(MAX_NACK_PER_HEARTBEAT)
            .collect();

        HeartbeatOutcome { released, missing }
    }

    /// Process a gap: `seqs` will never be sent.
    pub fn on_gap(&mut self, seqs: &[u64]) -> Vec<T> {
        for &seq in seqs {
            if seq >= self.next_expected && self.next_expected != 0 && seq != u64::MAX {
                self.pending.entry(seq).or_insert(None);
            }
        }
        self.drain_contiguous()
    }

    fn drain_contiguous(&mut self) -> Vec<T> {
        let mut out = Vec::new();
        while let Some(slot) = self.pending.remove(&self.next_expected) {
            out.extend(slot);
            match self.next_expected.checked_add(1) {
                Some(next) => self.next_expected = next,
                None => break,
            }
        }
        out
    }

    /// Release every buffered sample below `bound` and move the cursor there.
    fn release_below(&mut self, bound: u64) -> Vec<T> {
        let rest = self.pending.split_off(&bound);
        let below = std::mem::replace(&mut self.pending, rest);
        self.next_expected = self.next_expected.max(bound);
        below.into_values().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_order_delivery() {
        let mut proxy = RemoteWriterProxy::new();
        assert_eq!(proxy.on_data(5, "a", true), vec!["a"]);
        assert_eq!(proxy.on_data(6, "b", true), vec!["b"]);
        assert_eq!(proxy.next_expected(), 7);
    }

    #[test]
    fn test_out_of_order_is_buffered() {
        let mut proxy = RemoteWriterProxy::new();
        assert_eq!(proxy.on_data(1, 1, true), vec![1]);
        assert!(proxy.on_data(3, 3, true).is_empty());
        assert!(proxy.on_data(4, 4, true).is_empty());
        assert_eq!(proxy.pending_len(), 2);

        let hb = proxy.on_heartbeat(1, 4);
        assert_eq!(hb.missing, vec![2]);
        assert!(hb.released.is_empty());

        assert_eq!(proxy.on_data(2, 2, true), vec![2, 3, 4]);
        assert_eq!(proxy.pending_len(), 0);
    }

    #[test]
    fn test_duplicates_dropped() {
        let mut proxy = RemoteWriterProxy::new();
        proxy.on_data(1, 'x', true);
        assert!(proxy.on_data(1, 'x', true).is_empty());
    }

    #[test]
    fn test_best_effort_skips_holes() {
        let mut proxy = RemoteWriterProxy::new();
        assert_eq!(proxy.on_data(1, 1, false), vec![1]);
        assert_eq!(proxy.on_data(4, 4, false), vec![4]);
        assert_eq!(proxy.next_expected(), 5);
        assert!(proxy.on_data(3, 3, false).is_empty());
    }

    #[test]
    fn test_late_joiner_baseline_from_heartbeat() {
        let mut proxy: RemoteWriterProxy<u32> = RemoteWriterProxy::new();
        let hb = proxy.on_heartbeat(1, 40);
        assert!(hb.missing.is_empty());
        assert_eq!(proxy.next_expected(), 41);
    }

    #[test]
    fn test_gap_unblocks_delivery() {
        let mut proxy = RemoteWriterProxy::new();
        proxy.on_data(1, 1, true);
        assert!(proxy.on_data(4, 4, true).is_empty());
        assert_eq!(proxy.on_gap(&[2, 3]), vec![4]);
        assert_eq!(proxy.next_expected(), 5);
    }

    #[test]
    fn test_heartbeat_past_evicted_history() {
        let mut proxy = RemoteWriterProxy::new();
        proxy.on_data(1, 1, true);
        proxy.on_data(12, 12, true);

        // writer only keeps 10..=12 now
        let hb = proxy.on_heartbeat(10, 12);
        assert!(hb.released.is_empty());
        assert_eq!(hb.missing, vec![10, 11]);
        assert_eq!(proxy.next_expected(), 10);
    }

    #[test]
    fn test_nack_is_capped() {
        let mut proxy: RemoteWriterProxy<u8> = RemoteWriterProxy::new();
        proxy.on_data(1, 0, true);
        let hb = proxy.on_heartbeat(1, 10_000);
        assert_eq!(hb.missing.len(), MAX_NACK_PER_HEARTBEAT);
        assert_eq!(hb.missing[0], 2);
    }

    #[test]
    fn test_last_sequence_number_is_dropped() {
        let mut reliable = RemoteWriterProxy::new();
        assert!(reliable.on_data(u64::MAX, 1u8, true).is_empty());
        assert_eq!(reliable.next_expected(), 0);
        assert_eq!(reliable.on_data(7, 2u8, true), vec![2]);

        let mut best_effort = RemoteWriterProxy::new();
        assert_eq!(best_effort.on_data(3, 1u8, false), vec![1]);
        assert!(best_effort.on_data(u64::MAX, 2u8, false).is_empty());
        assert_eq!(best_effort.next_expected(), 4);
        assert_eq!(best_effort.pending_len(), 0);
    }

    #[test]
    fn test_cursor_at_end_of_range() {
        let mut proxy: RemoteWriterProxy<u8> = RemoteWriterProxy::new();
        proxy.on_heartbeat(1, u64::MAX - 1);
        assert_eq!(proxy.next_expected(), u64::MAX);
        assert!(proxy.on_gap(&[u64::MAX]).is_empty());
        assert!(proxy.on_data(u64::MAX, 9, true).is_empty());
        assert_eq!(proxy.pending_len(), 0);
    }
}
