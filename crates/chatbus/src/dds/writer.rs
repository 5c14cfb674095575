// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed data writer.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use super::domain_registry::{BindToken, DomainState, MatchKey};
use super::participant::Participant;
use super::qos::QoS;
use super::sample::{InstanceState, RawSample, SampleInfo};
use super::{Result, DDS};
use crate::cdr::CdrWriter;
use crate::guid::Guid;
use crate::transport::{now_ns, UdpTransport};

enum WriterRoute {
    /// Matched local readers, delivered at write time.
    Intra {
        domain: Arc<DomainState>,
        _token: BindToken,
    },
    Udp(Arc<UdpTransport>),
}

/// Publishes samples of `T` on one topic.
///
/// Dropping the writer unregisters it; readers see a `NotAliveNoWriters`
/// notification once no writer is left.
pub struct DataWriter<T: DDS> {
    topic: String,
    guid: Guid,
    qos: QoS,
    key: MatchKey,
    next_seq: AtomicU64,
    route: WriterRoute,
    participant: Arc<Participant>,
    _marker: PhantomData<fn(&T)>,
}

impl<T: DDS> DataWriter<T> {
    pub(super) fn new(participant: Arc<Participant>, topic: &str, qos: QoS, guid: Guid) -> Self {
        let type_name = &T::type_descriptor().type_name;
        let key = MatchKey::from_names(topic, type_name);

        let route = match participant.udp() {
            Some(udp) => {
                udp.register_writer(guid, topic, type_name, qos.reliability);
                WriterRoute::Udp(udp.clone())
            }
            None => {
                let domain = participant.domain_state().clone();
                let token = domain.register_writer(key.clone(), guid, qos.reliability);
                WriterRoute::Intra {
                    domain,
                    _token: token,
                }
            }
        };

        log::debug!(
            "[DataWriter] created {} on '{}' ({:?})",
            guid,
            topic,
            qos.reliability
        );

        Self {
            topic: topic.to_string(),
            guid,
            qos,
            key,
            next_seq: AtomicU64::new(1),
            route,
            participant,
            _marker: PhantomData,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn qos(&self) -> &QoS {
        &self.qos
    }

    /// Publish one sample. Returns its sequence number.
    ///
    /// Never waits: local readers are fed through their queues and network
    /// sends fail with `WouldBlock` rather than block.
    pub fn write(&self, sample: &T) -> Result<u64> {
        self.participant.ensure_active()?;

        let mut buf = CdrWriter::with_capacity(64);
        sample.encode_cdr2(&mut buf)?;
        let payload: Arc<[u8]> = Arc::from(buf.into_bytes());
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);

        match &self.route {
            WriterRoute::Intra { domain, .. } => {
                let raw = RawSample {
                    info: SampleInfo::data(self.guid, seq, SystemTime::now()),
                    payload: Some(payload),
                };
                let delivered = domain.deliver(&self.key, self.qos.reliability, raw);
                log::trace!(
                    "[DataWriter] {} seq={} delivered to {} reader(s)",
                    self.guid,
                    seq,
                    delivered
                );
            }
            WriterRoute::Udp(udp) => udp.send_data(self.guid, seq, payload, now_ns())?,
        }
        Ok(seq)
    }

    /// Dispose the instance; readers get a `NotAliveDisposed` notification.
    pub fn dispose(&self) -> Result<()> {
        self.participant.ensure_active()?;
        match &self.route {
            WriterRoute::Intra { domain, .. } => {
                domain.notify(
                    &self.key,
                    self.guid,
                    self.qos.reliability,
                    InstanceState::NotAliveDisposed,
                );
                Ok(())
            }
            WriterRoute::Udp(udp) => udp.send_dispose(self.guid, now_ns()),
        }
    }
}

impl<T: DDS> Drop for DataWriter<T> {
    fn drop(&mut self) {
        if let WriterRoute::Udp(udp) = &self.route {
            udp.unregister_writer(self.guid);
        }
        log::debug!("[DataWriter] {} on '{}' dropped", self.guid, self.topic);
    }
}

impl<T: DDS> std::fmt::Debug for DataWriter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataWriter")
            .field("topic", &self.topic)
            .field("guid", &self.guid)
            .field("qos", &self.qos)
            .finish()
    }
}
