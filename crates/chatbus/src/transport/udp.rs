// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP multicast transport.
//!
//! One instance per participant:
//!
//! - a multicast socket bound (with address reuse) to the domain's data port
//!   and joined to the configured group; multicast loop is on so local
//!   readers also see local writers
//! - an ephemeral unicast socket used to send every frame, receive NACKs and
//!   receive repairs
//! - background tasks: one receive loop per socket and a heartbeat ticker
//!
//! Sends are non-blocking (`try_send_to`); a send that would block fails
//! immediately instead of waiting.

use std::collections::HashMap;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use super::frame::{Frame, FrameBody, FrameHeader, MAX_FRAME_SIZE};
use super::PortMapping;
use crate::dds::{
    DomainState, Error, FactoryConfig, InstanceState, MatchKey, RawSample, Reliability, Result,
    SampleInfo,
};
use crate::guid::{Guid, ENTITY_KIND_PARTICIPANT};
use crate::reliability::{HistoryCache, RemoteWriterProxy};

/// Local writer announced on the wire.
#[derive(Debug)]
struct LocalWriter {
    topic: Arc<str>,
    type_name: Arc<str>,
    reliability: Reliability,
    history: HistoryCache,
}

pub struct UdpTransport {
    domain_id: u32,
    participant: Guid,
    group: SocketAddr,
    unicast: Arc<UdpSocket>,
    /// Readers of the owning participant.
    local: Arc<DomainState>,
    writers: DashMap<Guid, LocalWriter>,
    /// Receive-side state per remote (or looped-back local) writer.
    remotes: Mutex<HashMap<Guid, RemoteWriterProxy<RawSample>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    history_depth: usize,
}

/// Pause after a failed receive before trying again.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);

pub(crate) fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

fn ns_to_time(ns: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_nanos(ns)
}

fn multicast_socket(group: Ipv4Addr, port: u16) -> Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    socket.set_reuse_port(true)?;

    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    socket
        .bind(&bind_addr.into())
        .map_err(|e| Error::BindFailed(format!("{}: {}", bind_addr, e)))?;
    socket
        .join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)
        .map_err(|e| Error::MulticastJoinFailed(format!("{}: {}", group, e)))?;
    socket.set_multicast_loop_v4(true)?;
    socket.set_nonblocking(true)?;

    log::debug!("[UDP] joined {} on port {}", group, port);
    Ok(socket.into())
}

fn unicast_socket() -> Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);
    socket
        .bind(&bind_addr.into())
        .map_err(|e| Error::BindFailed(format!("{}: {}", bind_addr, e)))?;
    socket.set_multicast_loop_v4(true)?;
    if let Err(e) = socket.set_multicast_ttl_v4(1) {
        log::debug!("[UDP] multicast TTL not set: {}", e);
    }
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

impl UdpTransport {
    /// Open sockets and start the background tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        domain_id: u32,
        prefix: [u8; 12],
        config: &FactoryConfig,
        local: Arc<DomainState>,
    ) -> Result<Arc<Self>> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            Error::Unsupported("UDP transport requires a running tokio runtime".into())
        })?;

        let ports = PortMapping::for_domain(&config.transport, domain_id)?;
        let group_ip = config.transport.multicast_group;
        let mcast_std = multicast_socket(group_ip, ports.multicast)?;
        let unicast_std = unicast_socket()?;

        let _guard = handle.enter();
        let mcast = UdpSocket::from_std(mcast_std)?;
        let unicast = Arc::new(UdpSocket::from_std(unicast_std)?);

        let transport = Arc::new(Self {
            domain_id,
            participant: Guid::endpoint(prefix, 0x0000_0001, ENTITY_KIND_PARTICIPANT),
            group: SocketAddr::V4(SocketAddrV4::new(group_ip, ports.multicast)),
            unicast: unicast.clone(),
            local,
            writers: DashMap::new(),
            remotes: Mutex::new(HashMap::new()),
            tasks: Mutex::new(Vec::new()),
            history_depth: config.history.depth as usize,
        });

        let period = Duration::from_millis(config.transport.heartbeat_period_ms);
        let weak = Arc::downgrade(&transport);
        let tasks = vec![
            handle.spawn(recv_loop(Arc::new(mcast), weak.clone())),
            handle.spawn(recv_loop(unicast, weak.clone())),
            handle.spawn(heartbeat_loop(weak, period)),
        ];
        *transport.tasks.lock() = tasks;

        log::info!(
            "[UDP] transport up domain={} group={} participant={}",
            domain_id,
            transport.group,
            transport.participant
        );
        Ok(transport)
    }

    pub fn group_addr(&self) -> SocketAddr {
        self.group
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.unicast.local_addr()
    }

    fn header(&self, writer: Guid, entry: &LocalWriter) -> FrameHeader {
        FrameHeader {
            domain_id: self.domain_id,
            writer,
            reliable: entry.reliability == Reliability::Reliable,
            topic: entry.topic.to_string(),
            type_name: entry.type_name.to_string(),
        }
    }

    fn send_frame(&self, frame: &Frame, dest: SocketAddr) -> Result<()> {
        let bytes = frame.encode()?;
        match self.unicast.try_send_to(&bytes, dest) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(Error::WouldBlock),
            Err(e) => Err(Error::SendFailed(format!("{}: {}", dest, e))),
        }
    }

    pub fn register_writer(
        &self,
        guid: Guid,
        topic: &str,
        type_name: &str,
        reliability: Reliability,
    ) {
        self.writers.insert(
            guid,
            LocalWriter {
                topic: Arc::from(topic),
                type_name: Arc::from(type_name),
                reliability,
                history: HistoryCache::new(self.history_depth),
            },
        );
    }

    /// Forget a writer and tell remote readers it is gone.
    pub fn unregister_writer(&self, guid: Guid) {
        if let Some((_, entry)) = self.writers.remove(&guid) {
            let frame = Frame::new(
                self.header(guid, &entry),
                FrameBody::Unregister { ts_ns: now_ns() },
            );
            if let Err(e) = self.send_frame(&frame, self.group) {
                log::debug!("[UDP] unregister of {} not sent: {}", guid, e);
            }
        }
    }

    pub fn send_data(&self, guid: Guid, seq: u64, payload: Arc<[u8]>, ts_ns: u64) -> Result<()> {
        let entry = self
            .writers
            .get(&guid)
            .ok_or_else(|| Error::InvalidState(format!("writer {} not registered", guid)))?;

        if entry.reliability == Reliability::Reliable {
            entry.history.insert(seq, payload.clone(), ts_ns);
        }
        let frame = Frame::new(
            self.header(guid, &entry),
            FrameBody::Data {
                seq,
                ts_ns,
                payload: payload.to_vec(),
            },
        );
        drop(entry);
        self.send_frame(&frame, self.group)
    }

    pub fn send_dispose(&self, guid: Guid, ts_ns: u64) -> Result<()> {
        let frame = {
            let entry = self
                .writers
                .get(&guid)
                .ok_or_else(|| Error::InvalidState(format!("writer {} not registered", guid)))?;
            Frame::new(self.header(guid, &entry), FrameBody::Dispose { ts_ns })
        };
        self.send_frame(&frame, self.group)
    }

    fn send_heartbeats(&self) {
        let frames: Vec<Frame> = self
            .writers
            .iter()
            .filter(|e| e.reliability == Reliability::Reliable)
            .filter_map(|e| {
                let (first, last) = e.history.range()?;
                Some(Frame::new(
                    self.header(*e.key(), e.value()),
                    FrameBody::Heartbeat { first, last },
                ))
            })
            .collect();

        for frame in frames {
            if let Err(e) = self.send_frame(&frame, self.group) {
                log::debug!("[UDP] heartbeat not sent: {}", e);
            }
        }
    }

    fn handle_datagram(&self, buf: &[u8], src: SocketAddr) {
        let frame = match Frame::decode(buf) {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("[UDP] dropping malformed frame from {}: {}", src, e);
                return;
            }
        };
        if frame.header.domain_id != self.domain_id {
            log::debug!(
                "[UDP] dropping frame for domain {} (local domain {})",
                frame.header.domain_id,
                self.domain_id
            );
            return;
        }

        let header = frame.header;
        match frame.body {
            FrameBody::AckNack { reader, missing } => {
                self.on_acknack(header.writer, reader, &missing, src)
            }
            body => self.on_writer_frame(header, body, src),
        }
    }

    /// A remote reader NACKed some of our writer's samples.
    fn on_acknack(&self, writer: Guid, reader: Guid, missing: &[u64], src: SocketAddr) {
        let Some(entry) = self.writers.get(&writer) else {
            return;
        };

        let mut repairs = Vec::new();
        let mut lost = Vec::new();
        for &seq in missing {
            match entry.history.get(seq) {
                Some(cached) => repairs.push(Frame::new(
                    self.header(writer, &entry),
                    FrameBody::Data {
                        seq,
                        ts_ns: cached.ts_ns,
                        payload: cached.payload.to_vec(),
                    },
                )),
                None => lost.push(seq),
            }
        }
        let gap = (!lost.is_empty())
            .then(|| Frame::new(self.header(writer, &entry), FrameBody::Gap { seqs: lost }));
        drop(entry);

        log::debug!(
            "[UDP] NACK from {} for writer {}: {} repair(s)",
            reader,
            writer,
            repairs.len()
        );
        for frame in repairs.iter().chain(gap.iter()) {
            if let Err(e) = self.send_frame(frame, src) {
                log::debug!("[UDP] repair to {} not sent: {}", src, e);
            }
        }
    }

    /// Data, heartbeat, gap and lifecycle frames from a (possibly local) writer.
    fn on_writer_frame(&self, header: FrameHeader, body: FrameBody, src: SocketAddr) {
        let key = MatchKey::from_names(&header.topic, &header.type_name);
        let writer_reliability = if header.reliable {
            Reliability::Reliable
        } else {
            Reliability::BestEffort
        };

        if !self.local.has_readers(&key) {
            return;
        }

        match body {
            FrameBody::Dispose { .. } => {
                self.local.notify(
                    &key,
                    header.writer,
                    writer_reliability,
                    InstanceState::NotAliveDisposed,
                );
                return;
            }
            FrameBody::Unregister { .. } => {
                self.remotes.lock().remove(&header.writer);
                self.local.notify(
                    &key,
                    header.writer,
                    writer_reliability,
                    InstanceState::NotAliveNoWriters,
                );
                return;
            }
            _ => {}
        }

        // Only wait for holes when someone asked for reliability.
        let reliable = header.reliable && self.local.has_reliable_reader(&key);

        let mut nack = Vec::new();
        let deliverable = {
            let mut remotes = self.remotes.lock();
            let proxy = remotes.entry(header.writer).or_default();
            match body {
                FrameBody::Data {
                    seq,
                    ts_ns,
                    payload,
                } => {
                    let sample = RawSample {
                        info: SampleInfo::data(header.writer, seq, ns_to_time(ts_ns)),
                        payload: Some(Arc::from(payload)),
                    };
                    proxy.on_data(seq, sample, reliable)
                }
                FrameBody::Heartbeat { first, last } => {
                    let outcome = proxy.on_heartbeat(first, last);
                    if reliable {
                        nack = outcome.missing;
                    }
                    outcome.released
                }
                FrameBody::Gap { seqs } => proxy.on_gap(&seqs),
                _ => Vec::new(),
            }
        };

        for sample in deliverable {
            self.local.deliver(&key, writer_reliability, sample);
        }

        if !nack.is_empty() {
            let frame = Frame::new(
                header,
                FrameBody::AckNack {
                    reader: self.participant,
                    missing: nack,
                },
            );
            if let Err(e) = self.send_frame(&frame, src) {
                log::debug!("[UDP] NACK to {} not sent: {}", src, e);
            }
        }
    }

    /// Stop background tasks. Never waits for them.
    pub fn shutdown(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in &tasks {
            task.abort();
        }
        if !tasks.is_empty() {
            log::debug!("[UDP] transport for domain {} stopped", self.domain_id);
        }
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("domain_id", &self.domain_id)
            .field("group", &self.group)
            .field("writers", &self.writers.len())
            .finish()
    }
}

async fn recv_loop(socket: Arc<UdpSocket>, transport: Weak<UdpTransport>) {
    let mut buf = vec![0u8; MAX_FRAME_SIZE];
    loop {
        let (len, src) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                if transport.strong_count() == 0 {
                    break;
                }
                log::debug!("[UDP] recv error: {}", e);
                tokio::time::sleep(RECV_ERROR_BACKOFF).await;
                continue;
            }
        };
        let Some(transport) = transport.upgrade() else {
            break;
        };
        transport.handle_datagram(&buf[..len], src);
    }
}

async fn heartbeat_loop(transport: Weak<UdpTransport>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let Some(transport) = transport.upgrade() else {
            break;
        };
        transport.send_heartbeats();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_requires_runtime() {
        let local = Arc::new(DomainState::new(3));
        let err = UdpTransport::open(3, [1; 12], &FactoryConfig::default(), local)
            .expect_err("no runtime");
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_recv_loop_exits_once_transport_is_gone() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind");
        let addr = socket.local_addr().expect("addr");
        let sender = UdpSocket::bind("127.0.0.1:0").await.expect("bind sender");
        sender.send_to(b"junk", addr).await.expect("send");

        let ended = tokio::time::timeout(
            Duration::from_secs(1),
            recv_loop(Arc::new(socket), Weak::new()),
        )
        .await;
        assert!(ended.is_ok());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_recv_loop_does_not_spin_on_socket_errors() {
        // a connected socket reports the ICMP refusal on its next receive
        let closed = std::net::UdpSocket::bind("127.0.0.1:0").expect("bind");
        let target = closed.local_addr().expect("addr");
        drop(closed);
        let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind");
        socket.connect(target).await.expect("connect");
        socket.send(b"x").await.expect("send");

        let ended = tokio::time::timeout(
            Duration::from_secs(1),
            recv_loop(Arc::new(socket), Weak::new()),
        )
        .await;
        assert!(ended.is_ok());
    }

    #[test]
    fn test_ns_roundtrip() {
        let ns = 1_700_000_000_123_456_789u64;
        let t = ns_to_time(ns);
        assert_eq!(
            t.duration_since(UNIX_EPOCH).expect("after epoch").as_nanos() as u64,
            ns
        );
    }
}
