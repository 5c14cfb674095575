// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire frames exchanged by the UDP transport.
//!
//! ```text
//! 0        4        5      6       7          8            12                28
//! +--------+--------+------+-------+----------+------------+-----------------+
//! | "CHBS" | ver(1) | kind | flags | reserved | domain u32 | writer GUID(16) |
//! +--------+--------+------+-------+----------+------------+-----------------+
//! | topic (CDR string) | type name (CDR string) | kind-specific body ...     |
//! +--------------------------------------------------------------------------+
//! ```
//!
//! All integers are little endian with CDR alignment relative to the start
//! of the frame. `flags` bit 0 is set when the writer is reliable.

use crate::cdr::{CdrReader, CdrWriter};
use crate::dds::{Error, Result};
use crate::guid::Guid;

pub const MAGIC: [u8; 4] = *b"CHBS";
pub const VERSION: u8 = 1;

const FLAG_RELIABLE: u8 = 0x01;

/// Largest datagram the transport sends or accepts.
pub const MAX_FRAME_SIZE: usize = 65_507;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    Data = 1,
    Heartbeat = 2,
    AckNack = 3,
    Gap = 4,
    Dispose = 5,
    Unregister = 6,
}

impl TryFrom<u8> for FrameKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            1 => FrameKind::Data,
            2 => FrameKind::Heartbeat,
            3 => FrameKind::AckNack,
            4 => FrameKind::Gap,
            5 => FrameKind::Dispose,
            6 => FrameKind::Unregister,
            _ => return Err(Error::SerializationError),
        })
    }
}

/// Fields common to every frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub domain_id: u32,
    /// Writer the frame is about (for `AckNack`, the writer being NACKed).
    pub writer: Guid,
    pub reliable: bool,
    pub topic: String,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameBody {
    Data {
        seq: u64,
        ts_ns: u64,
        payload: Vec<u8>,
    },
    Heartbeat {
        first: u64,
        last: u64,
    },
    AckNack {
        reader: Guid,
        missing: Vec<u64>,
    },
    Gap {
        seqs: Vec<u64>,
    },
    Dispose {
        ts_ns: u64,
    },
    Unregister {
        ts_ns: u64,
    },
}

impl FrameBody {
    pub fn kind(&self) -> FrameKind {
        match self {
            FrameBody::Data { .. } => FrameKind::Data,
            FrameBody::Heartbeat { .. } => FrameKind::Heartbeat,
            FrameBody::AckNack { .. } => FrameKind::AckNack,
            FrameBody::Gap { .. } => FrameKind::Gap,
            FrameBody::Dispose { .. } => FrameKind::Dispose,
            FrameBody::Unregister { .. } => FrameKind::Unregister,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub body: FrameBody,
}

fn write_seq_list(w: &mut CdrWriter, seqs: &[u64]) -> Result<()> {
    let count = u32::try_from(seqs.len()).map_err(|_| Error::SerializationError)?;
    w.write_u32(count);
    for seq in seqs {
        w.write_u64(*seq);
    }
    Ok(())
}

fn read_seq_list(r: &mut CdrReader<'_>) -> Result<Vec<u64>> {
    let count = r.read_u32()? as usize;
    // each entry needs 8 bytes; reject counts the buffer cannot hold
    if count > r.remaining() / 8 {
        return Err(Error::BufferTooSmall);
    }
    (0..count).map(|_| r.read_u64()).collect()
}

impl Frame {
    pub fn new(header: FrameHeader, body: FrameBody) -> Self {
        Self { header, body }
    }

    pub fn kind(&self) -> FrameKind {
        self.body.kind()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut w = CdrWriter::with_capacity(128);
        w.write_raw(&MAGIC);
        w.write_u8(VERSION);
        w.write_u8(self.kind() as u8);
        w.write_u8(if self.header.reliable { FLAG_RELIABLE } else { 0 });
        w.write_u8(0);
        w.write_u32(self.header.domain_id);
        w.write_raw(&self.header.writer.as_bytes());
        w.write_string(&self.header.topic)?;
        w.write_string(&self.header.type_name)?;

        match &self.body {
            FrameBody::Data {
                seq,
                ts_ns,
                payload,
            } => {
                w.write_u64(*seq);
                w.write_u64(*ts_ns);
                w.write_bytes(payload)?;
            }
            FrameBody::Heartbeat { first, last } => {
                w.write_u64(*first);
                w.write_u64(*last);
            }
            FrameBody::AckNack { reader, missing } => {
                w.write_raw(&reader.as_bytes());
                write_seq_list(&mut w, missing)?;
            }
            FrameBody::Gap { seqs } => write_seq_list(&mut w, seqs)?,
            FrameBody::Dispose { ts_ns } | FrameBody::Unregister { ts_ns } => {
                w.write_u64(*ts_ns);
            }
        }

        if w.len() > MAX_FRAME_SIZE {
            return Err(Error::SendFailed(format!(
                "frame of {} bytes exceeds datagram limit",
                w.len()
            )));
        }
        Ok(w.into_bytes())
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = CdrReader::new(buf);
        if r.read_raw(4)? != MAGIC {
            return Err(Error::SerializationError);
        }
        if r.read_u8()? != VERSION {
            return Err(Error::Unsupported("frame version".into()));
        }
        let kind = FrameKind::try_from(r.read_u8()?)?;
        let flags = r.read_u8()?;
        let _reserved = r.read_u8()?;
        let domain_id = r.read_u32()?;
        let writer = read_guid(&mut r)?;
        let topic = r.read_string()?;
        let type_name = r.read_string()?;

        let body = match kind {
            FrameKind::Data => {
                let seq = r.read_u64()?;
                let ts_ns = r.read_u64()?;
                let payload = r.read_bytes()?.to_vec();
                FrameBody::Data {
                    seq,
                    ts_ns,
                    payload,
                }
            }
            FrameKind::Heartbeat => {
                let first = r.read_u64()?;
                let last = r.read_u64()?;
                if first > last {
                    return Err(Error::SerializationError);
                }
                FrameBody::Heartbeat { first, last }
            }
            FrameKind::AckNack => {
                let reader = read_guid(&mut r)?;
                let missing = read_seq_list(&mut r)?;
                FrameBody::AckNack { reader, missing }
            }
            FrameKind::Gap => FrameBody::Gap {
                seqs: read_seq_list(&mut r)?,
            },
            FrameKind::Dispose => FrameBody::Dispose {
                ts_ns: r.read_u64()?,
            },
            FrameKind::Unregister => FrameBody::Unregister {
                ts_ns: r.read_u64()?,
            },
        };

        Ok(Self {
            header: FrameHeader {
                domain_id,
                writer,
                reliable: flags & FLAG_RELIABLE != 0,
                topic,
                type_name,
            },
            body,
        })
    }
}

fn read_guid(r: &mut CdrReader<'_>) -> Result<Guid> {
    let raw = r.read_raw(16)?;
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(raw);
    Ok(Guid::from_bytes(bytes))
}
