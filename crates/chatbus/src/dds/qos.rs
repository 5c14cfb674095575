// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reliability and history policies.

/// Default history depth for `QoS::reliable()` / `QoS::best_effort()`.
pub const DEFAULT_HISTORY_DEPTH: u32 = 64;

/// Delivery guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reliability {
    /// Samples may be dropped under congestion or loss.
    BestEffort,
    /// Samples are queued without loss and repaired on the wire.
    Reliable,
}

/// How many samples an endpoint keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum History {
    KeepLast(u32),
    KeepAll,
}

impl History {
    /// Queue bound for this policy, `None` when unbounded.
    pub fn depth(&self) -> Option<usize> {
        match self {
            History::KeepLast(n) => Some((*n).max(1) as usize),
            History::KeepAll => None,
        }
    }
}

/// Endpoint QoS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QoS {
    pub reliability: Reliability,
    pub history: History,
}

impl QoS {
    pub fn reliable() -> Self {
        Self {
            reliability: Reliability::Reliable,
            history: History::KeepLast(DEFAULT_HISTORY_DEPTH),
        }
    }

    pub fn best_effort() -> Self {
        Self {
            reliability: Reliability::BestEffort,
            history: History::KeepLast(DEFAULT_HISTORY_DEPTH),
        }
    }

    pub fn keep_last(mut self, depth: u32) -> Self {
        self.history = History::KeepLast(depth);
        self
    }

    pub fn keep_all(mut self) -> Self {
        self.history = History::KeepAll;
        self
    }

    pub fn is_reliable(&self) -> bool {
        self.reliability == Reliability::Reliable
    }
}

impl Default for QoS {
    fn default() -> Self {
        Self::best_effort()
    }
}

/// Offered (writer) vs requested (reader) reliability.
///
/// - Reliable writer -> any reader: compatible
/// - BestEffort writer + BestEffort reader: compatible
/// - BestEffort writer + Reliable reader: INCOMPATIBLE
pub fn qos_compatible(writer: Reliability, reader: Reliability) -> bool {
    match (writer, reader) {
        (Reliability::Reliable, _) => true,
        (Reliability::BestEffort, Reliability::BestEffort) => true,
        (Reliability::BestEffort, Reliability::Reliable) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let qos = QoS::reliable().keep_last(5);
        assert!(qos.is_reliable());
        assert_eq!(qos.history.depth(), Some(5));

        let qos = QoS::best_effort().keep_all();
        assert!(!qos.is_reliable());
        assert_eq!(qos.history.depth(), None);
        assert_eq!(History::KeepLast(0).depth(), Some(1));
    }

    #[test]
    fn test_request_offered_rule() {
        assert!(qos_compatible(Reliability::Reliable, Reliability::Reliable));
        assert!(qos_compatible(Reliability::Reliable, Reliability::BestEffort));
        assert!(qos_compatible(
            Reliability::BestEffort,
            Reliability::BestEffort
        ));
        assert!(!qos_compatible(
            Reliability::BestEffort,
            Reliability::Reliable
        ));
    }
}
