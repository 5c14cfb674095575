// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Bus Core API
//!
//! Entry points, from the outside in:
//!
//! - **DomainParticipantFactory**: parses transport arguments, owns every
//!   participant it creates and deletes them all on `finalize`
//! - **Participant**: membership in one domain, registry of known types,
//!   factory for writers and readers
//! - **DataWriter/DataReader**: typed endpoints matched by `(topic, type)`
//! - **QoS**: reliability and history policies
//!
//! ## Entity Hierarchy
//!
//! ```text
//! DomainParticipantFactory
//! +-- Participant (domain_id)
//!     +-- DataWriter<T>  ------> (topic, type)
//!     +-- DataReader<T>  <------ (topic, type)
//! ```

mod config;
mod domain_registry;
mod factory;
mod participant;
/// QoS policy definitions.
pub mod qos;
mod reader;
mod sample;
mod writer;

pub use config::{FactoryConfig, HistoryConfig, TransportArgs, TransportConfig, TransportMode};
pub use domain_registry::{
    BindToken, DomainId, DomainRegistry, DomainState, EndpointKind, MatchKey, TypeId,
};
pub use factory::DomainParticipantFactory;
pub use participant::{Participant, ParticipantBuilder};
pub use qos::{History, QoS, Reliability};
pub use reader::{DataReader, SampleStream};
pub use sample::{InstanceState, RawSample, Sample, SampleInfo};
pub use writer::DataWriter;

use crate::cdr::CdrWriter;
use crate::types::TypeDescriptor;

/// Highest valid domain id.
pub const MAX_DOMAIN_ID: u32 = 232;

/// Errors returned by bus operations.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Transport arguments or configuration values are invalid.
    InvalidConfig(String),
    /// Configuration file not found at specified path.
    ConfigFileNotFound(String),

    // ========================================================================
    // Entity Errors
    // ========================================================================
    /// Domain ID out of range (0-232).
    InvalidDomainId(u32),
    /// Participant does not belong to this factory (or was already deleted).
    ParticipantNotFound,
    /// Invalid state for the requested operation.
    InvalidState(String),

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// I/O error with underlying cause.
    IoError(std::io::Error),
    /// Failed to bind socket to address.
    BindFailed(String),
    /// Failed to join multicast group.
    MulticastJoinFailed(String),
    /// Send operation failed.
    SendFailed(String),

    // ========================================================================
    // Data Errors
    // ========================================================================
    /// Type was never registered on the participant.
    TypeNotRegistered(String),
    /// Registered type and Rust type describe different structures.
    TypeMismatch,
    /// QoS policies are incompatible between endpoints.
    QosIncompatible,
    /// CDR serialization failed (encoding error, invalid data).
    SerializationError,
    /// Buffer too small for decoding.
    BufferTooSmall,

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// Operation would block but non-blocking mode requested.
    WouldBlock,
    /// Requested feature or operation is not supported.
    Unsupported(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::ConfigFileNotFound(path) => write!(f, "Config file not found: {}", path),
            Error::InvalidDomainId(id) => {
                write!(f, "Invalid domain_id: {} (must be 0-{})", id, MAX_DOMAIN_ID)
            }
            Error::ParticipantNotFound => write!(f, "Participant not found"),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::BindFailed(msg) => write!(f, "Bind failed: {}", msg),
            Error::MulticastJoinFailed(msg) => write!(f, "Multicast join failed: {}", msg),
            Error::SendFailed(msg) => write!(f, "Send failed: {}", msg),
            Error::TypeNotRegistered(name) => write!(f, "Type not registered: {}", name),
            Error::TypeMismatch => write!(f, "Type mismatch"),
            Error::QosIncompatible => write!(f, "QoS incompatible"),
            Error::SerializationError => write!(f, "CDR serialization failed"),
            Error::BufferTooSmall => write!(f, "Buffer too small"),
            Error::WouldBlock => write!(f, "Operation would block"),
            Error::Unsupported(msg) => write!(f, "Unsupported operation: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::WouldBlock {
            Error::WouldBlock
        } else {
            Error::IoError(e)
        }
    }
}

/// Convenient alias for API results using the public `Error` type.
pub type Result<T> = core::result::Result<T, Error>;

/// Encode/decode contract for topic types.
pub trait DDS: Sized + Send + Sync + 'static {
    /// Structural description; must match the descriptor registered on the
    /// participant under the same type name.
    fn type_descriptor() -> &'static TypeDescriptor;

    /// Encode as little-endian CDR.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a field cannot be represented (e.g. oversized string).
    fn encode_cdr2(&self, writer: &mut CdrWriter) -> Result<()>;

    /// Decode from little-endian CDR.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the buffer is truncated or contains invalid data.
    fn decode_cdr2(buf: &[u8]) -> Result<Self>;
}
