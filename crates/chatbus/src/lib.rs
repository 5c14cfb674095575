// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # chatbus
//!
//! A small domain-based publish/subscribe runtime with DDS-style entities:
//! a participant factory, participants bound to a domain, typed data writers
//! and readers matched by `(topic, type)` and governed by QoS.
//!
//! Two transports are available:
//!
//! - **Intra-process** (default): endpoints in the same process are matched
//!   through a process-wide domain registry; samples are handed over without
//!   touching the network.
//! - **UDP multicast**: samples are framed and sent to a per-domain multicast
//!   group, with heartbeat/NACK repair for reliable readers.
//!
//! ```rust,no_run
//! use chatbus::{DomainParticipantFactory, QoS};
//! # use chatbus::{CdrReader, CdrWriter, TypeDescriptor, DDS};
//! # struct Note { text: String }
//! # impl DDS for Note {
//! #     fn type_descriptor() -> &'static TypeDescriptor { unimplemented!() }
//! #     fn encode_cdr2(&self, w: &mut CdrWriter) -> chatbus::Result<()> { w.write_string(&self.text) }
//! #     fn decode_cdr2(buf: &[u8]) -> chatbus::Result<Self> {
//! #         Ok(Self { text: CdrReader::new(buf).read_string()? })
//! #     }
//! # }
//!
//! let factory = DomainParticipantFactory::initialize(std::iter::empty::<String>())?;
//! let participant = factory.create_participant(0)?;
//! participant.register_type(Note::type_descriptor().clone())?;
//!
//! let writer = participant.create_writer::<Note>("notes", QoS::reliable())?;
//! let reader = participant.create_reader::<Note>("notes", QoS::reliable())?;
//! writer.write(&Note { text: "hello".into() })?;
//! if let Some(sample) = reader.try_take()? {
//!     println!("{}", sample.data().map(|n| n.text.as_str()).unwrap_or("<no data>"));
//! }
//! # Ok::<(), chatbus::Error>(())
//! ```

pub mod cdr;
pub mod dds;
pub mod guid;
pub mod reliability;
pub mod transport;
pub mod types;

pub use cdr::{CdrReader, CdrWriter};
pub use dds::{
    DataReader, DataWriter, DomainParticipantFactory, Error, FactoryConfig, History,
    InstanceState, Participant, ParticipantBuilder, QoS, Reliability, Result, Sample, SampleInfo,
    SampleStream, TransportMode, DDS,
};
pub use guid::Guid;
pub use types::{
    compute_type_id, FieldKind, MemberDescriptor, TypeDescriptor, TypeSupportError,
    TypeSupportLibrary,
};
