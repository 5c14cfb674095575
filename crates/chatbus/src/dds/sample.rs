// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Samples and their metadata.

use std::sync::Arc;
use std::time::SystemTime;

use crate::guid::Guid;

/// Lifecycle state of the (single, unkeyed) instance a sample refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceState {
    Alive,
    /// The writer disposed the instance.
    NotAliveDisposed,
    /// No live writer is left for the instance.
    NotAliveNoWriters,
}

impl InstanceState {
    pub fn as_u8(self) -> u8 {
        match self {
            InstanceState::Alive => 1,
            InstanceState::NotAliveDisposed => 2,
            InstanceState::NotAliveNoWriters => 4,
        }
    }
}

/// Metadata delivered with every sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleInfo {
    /// `false` for lifecycle notifications that carry no data.
    pub valid_data: bool,
    pub instance_state: InstanceState,
    pub writer_guid: Guid,
    /// 0 for notifications.
    pub sequence_number: u64,
    pub source_timestamp: SystemTime,
    pub reception_timestamp: SystemTime,
}

impl SampleInfo {
    pub(crate) fn data(writer_guid: Guid, sequence_number: u64, source: SystemTime) -> Self {
        Self {
            valid_data: true,
            instance_state: InstanceState::Alive,
            writer_guid,
            sequence_number,
            source_timestamp: source,
            reception_timestamp: source,
        }
    }

    pub(crate) fn notification(
        writer_guid: Guid,
        instance_state: InstanceState,
        source: SystemTime,
    ) -> Self {
        Self {
            valid_data: false,
            instance_state,
            writer_guid,
            sequence_number: 0,
            source_timestamp: source,
            reception_timestamp: source,
        }
    }
}

/// Untyped sample as moved between endpoints.
#[derive(Debug, Clone)]
pub struct RawSample {
    pub info: SampleInfo,
    /// CDR payload; `None` for notifications.
    pub payload: Option<Arc<[u8]>>,
}

/// Typed sample handed to the application.
#[derive(Debug, Clone)]
pub struct Sample<T> {
    pub info: SampleInfo,
    data: Option<T>,
}

impl<T> Sample<T> {
    pub(crate) fn new(info: SampleInfo, data: Option<T>) -> Self {
        Self { info, data }
    }

    /// Payload, present only when `info.valid_data` is set.
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    /// Carries data for a live instance (the usual application filter).
    pub fn is_alive_data(&self) -> bool {
        self.info.valid_data
            && self.info.instance_state == InstanceState::Alive
            && self.data.is_some()
    }
}
