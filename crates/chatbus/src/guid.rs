// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint identifiers.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// 16-byte endpoint identifier.
///
/// - Prefix: 12 bytes, unique per participant
/// - Entity ID: 4 bytes, unique per endpoint within the participant
///
/// Displayed as dotted hex: `"01.0f.ac.10.00.00.00.00.00.00.00.01.00.00.01.c1"`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Guid {
    pub prefix: [u8; 12],
    pub entity_id: [u8; 4],
}

/// Entity kind byte for participants (last byte of the entity id).
pub const ENTITY_KIND_PARTICIPANT: u8 = 0xc1;
/// Entity kind byte for writers.
pub const ENTITY_KIND_WRITER: u8 = 0x02;
/// Entity kind byte for readers.
pub const ENTITY_KIND_READER: u8 = 0x07;

impl Guid {
    pub fn new(prefix: [u8; 12], entity_id: [u8; 4]) -> Self {
        Self { prefix, entity_id }
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        let mut prefix = [0u8; 12];
        let mut entity_id = [0u8; 4];
        prefix.copy_from_slice(&bytes[0..12]);
        entity_id.copy_from_slice(&bytes[12..16]);
        Self { prefix, entity_id }
    }

    pub fn as_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[0..12].copy_from_slice(&self.prefix);
        bytes[12..16].copy_from_slice(&self.entity_id);
        bytes
    }

    pub fn zero() -> Self {
        Self {
            prefix: [0; 12],
            entity_id: [0; 4],
        }
    }

    pub fn is_zero(&self) -> bool {
        self.prefix.iter().all(|&b| b == 0) && self.entity_id.iter().all(|&b| b == 0)
    }

    /// Build an endpoint GUID under `prefix` from a 24-bit key and a kind byte.
    pub fn endpoint(prefix: [u8; 12], key: u32, kind: u8) -> Self {
        let k = key.to_be_bytes();
        Self {
            prefix,
            entity_id: [k[1], k[2], k[3], kind],
        }
    }

    /// Generate a process-unique participant prefix.
    ///
    /// Layout: host-ish bytes from the pid (4), a wall-clock stamp (4) and a
    /// per-process counter (4), so participants created in the same process
    /// never collide and restarts rarely do.
    pub fn generate_prefix() -> [u8; 12] {
        static COUNTER: AtomicU32 = AtomicU32::new(1);

        let pid = std::process::id();
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos() ^ (d.as_secs() as u32))
            .unwrap_or(0);
        let counter = COUNTER.fetch_add(1, Ordering::Relaxed);

        let mut prefix = [0u8; 12];
        prefix[0..4].copy_from_slice(&pid.to_be_bytes());
        prefix[4..8].copy_from_slice(&stamp.to_be_bytes());
        prefix[8..12].copy_from_slice(&counter.to_be_bytes());
        prefix
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_format() {
        let guid = Guid::from_bytes([1, 15, 172, 16, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 1, 193]);
        assert_eq!(
            guid.to_string(),
            "01.0f.ac.10.00.00.00.00.00.00.00.01.00.00.01.c1"
        );
    }

    #[test]
    fn test_generated_prefixes_differ() {
        let a = Guid::generate_prefix();
        let b = Guid::generate_prefix();
        assert_ne!(a, b);
    }

    #[test]
    fn test_endpoint_guid() {
        let prefix = [7u8; 12];
        let guid = Guid::endpoint(prefix, 0x0001_0203, ENTITY_KIND_WRITER);
        assert_eq!(guid.prefix, prefix);
        assert_eq!(guid.entity_id, [0x01, 0x02, 0x03, ENTITY_KIND_WRITER]);
        assert!(!guid.is_zero());
        assert!(Guid::zero().is_zero());
    }
}
