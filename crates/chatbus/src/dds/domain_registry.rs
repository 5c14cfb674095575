// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Domain Registry for Intra-Process Matching
//!
//! Endpoints that share a domain and a `(topic, type_id)` are matched here.
//! Writers deliver straight into the inbox of every QoS-compatible reader at
//! write time.
//!
//! # Architecture
//!
//! ```text
//! DomainRegistry (static global)
//! +-- domains: Mutex<HashMap<DomainId, Weak<DomainState>>>
//!
//! DomainState (one per domain, per process)
//! +-- domain_id: u32
//! +-- endpoints: RwLock<HashMap<MatchKey, Vec<LocalEndpointEntry>>>
//! +-- [strong ref held by Participant]
//!
//! MatchKey
//! +-- topic_name: Arc<str>
//! +-- type_id: TypeId  (FNV-1a of the type name)
//! ```
//!
//! UDP participants keep a private `DomainState` (not in the global
//! registry) that only holds their own readers; the transport's receive path
//! delivers into it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::SystemTime;

use tokio::sync::mpsc;

use super::qos::{qos_compatible, Reliability};
use super::sample::{InstanceState, RawSample, SampleInfo};
use crate::guid::Guid;
use crate::types::compute_type_id;

/// Domain ID type (0-232)
pub type DomainId = u32;

/// Type identifier for matching endpoints.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    pub fn from_type_name(type_name: &str) -> Self {
        Self(compute_type_id(type_name))
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Debug for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TypeId({:08x})", self.0)
    }
}

/// Match key for endpoint lookup
///
/// Two endpoints match if they have the same (topic_name, type_id).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct MatchKey {
    pub topic_name: Arc<str>,
    pub type_id: TypeId,
}

impl MatchKey {
    pub fn from_names(topic_name: &str, type_name: &str) -> Self {
        Self {
            topic_name: Arc::from(topic_name),
            type_id: TypeId::from_type_name(type_name),
        }
    }
}

impl std::fmt::Debug for MatchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchKey")
            .field("topic", &self.topic_name)
            .field("type_id", &self.type_id)
            .finish()
    }
}

/// Kind of local endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Reader,
    Writer,
}

/// Sending half of a reader's sample queue.
///
/// Reliable readers never lose a sample, so their queue is unbounded.
/// Best-effort readers hold at most their history depth and drop the rest.
#[derive(Debug, Clone)]
pub(crate) enum ReaderInbox {
    Unbounded(mpsc::UnboundedSender<RawSample>),
    Bounded(mpsc::Sender<RawSample>),
}

impl ReaderInbox {
    /// Enqueue without waiting. Returns `false` when the sample was dropped.
    fn push(&self, sample: RawSample) -> bool {
        match self {
            ReaderInbox::Unbounded(tx) => tx.send(sample).is_ok(),
            ReaderInbox::Bounded(tx) => match tx.try_send(sample) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::debug!("[DomainRegistry] best-effort reader queue full, sample dropped");
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            },
        }
    }
}

struct LocalEndpointEntry {
    guid: Guid,
    kind: EndpointKind,
    reliability: Reliability,
    /// Readers only.
    inbox: Option<ReaderInbox>,
}

impl std::fmt::Debug for LocalEndpointEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEndpointEntry")
            .field("guid", &self.guid)
            .field("kind", &self.kind)
            .field("reliability", &self.reliability)
            .finish()
    }
}

/// Token returned when registering an endpoint
///
/// When dropped, automatically unregisters the endpoint from the domain.
pub struct BindToken {
    domain: Weak<DomainState>,
    key: MatchKey,
    guid: Guid,
}

impl BindToken {
    fn new(domain: &Arc<DomainState>, key: MatchKey, guid: Guid) -> Self {
        Self {
            domain: Arc::downgrade(domain),
            key,
            guid,
        }
    }
}

impl Drop for BindToken {
    fn drop(&mut self) {
        if let Some(domain) = self.domain.upgrade() {
            domain.unregister(&self.key, self.guid);
        }
    }
}

impl std::fmt::Debug for BindToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindToken")
            .field("key", &self.key)
            .field("guid", &self.guid)
            .finish()
    }
}

/// Domain state - holds all local endpoints for a single domain
pub struct DomainState {
    pub domain_id: DomainId,
    endpoints: RwLock<HashMap<MatchKey, Vec<LocalEndpointEntry>>>,
}

impl DomainState {
    pub fn new(domain_id: DomainId) -> Self {
        Self {
            domain_id,
            endpoints: RwLock::new(HashMap::new()),
        }
    }

    /// Register a writer endpoint. Returns a BindToken that unregisters on drop.
    pub fn register_writer(
        self: &Arc<Self>,
        key: MatchKey,
        guid: Guid,
        reliability: Reliability,
    ) -> BindToken {
        let mut endpoints = self.endpoints.write().unwrap_or_else(|e| e.into_inner());
        let entries = endpoints.entry(key.clone()).or_default();

        let matched = entries
            .iter()
            .filter(|e| e.kind == EndpointKind::Reader)
            .filter(|e| {
                let ok = qos_compatible(reliability, e.reliability);
                if !ok {
                    log::debug!(
                        "[DomainRegistry] Skipping match: writer {:?} incompatible with reader {} ({:?})",
                        reliability,
                        e.guid,
                        e.reliability
                    );
                }
                ok
            })
            .count();

        entries.push(LocalEndpointEntry {
            guid,
            kind: EndpointKind::Writer,
            reliability,
            inbox: None,
        });

        log::debug!(
            "[DomainRegistry] Writer {} on '{}' matched {} reader(s)",
            guid,
            key.topic_name,
            matched
        );

        BindToken::new(self, key, guid)
    }

    /// Register a reader endpoint. Returns a BindToken that unregisters on drop.
    pub(crate) fn register_reader(
        self: &Arc<Self>,
        key: MatchKey,
        guid: Guid,
        reliability: Reliability,
        inbox: ReaderInbox,
    ) -> BindToken {
        let mut endpoints = self.endpoints.write().unwrap_or_else(|e| e.into_inner());
        let entries = endpoints.entry(key.clone()).or_default();

        let matched = entries
            .iter()
            .filter(|e| e.kind == EndpointKind::Writer && qos_compatible(e.reliability, reliability))
            .count();

        entries.push(LocalEndpointEntry {
            guid,
            kind: EndpointKind::Reader,
            reliability,
            inbox: Some(inbox),
        });

        log::debug!(
            "[DomainRegistry] Reader {} on '{}' matched {} writer(s)",
            guid,
            key.topic_name,
            matched
        );

        BindToken::new(self, key, guid)
    }

    /// Unregister an endpoint (called by BindToken::drop).
    ///
    /// Removing the last writer of a key tells the remaining readers that the
    /// instance has no writers.
    fn unregister(&self, key: &MatchKey, guid: Guid) {
        let notify = {
            let mut endpoints = self.endpoints.write().unwrap_or_else(|e| e.into_inner());
            let mut notify = Vec::new();

            if let Some(entries) = endpoints.get_mut(key) {
                let removed = entries
                    .iter()
                    .position(|e| e.guid == guid)
                    .map(|idx| entries.remove(idx));

                if let Some(removed) = removed {
                    let last_writer = removed.kind == EndpointKind::Writer
                        && !entries.iter().any(|e| e.kind == EndpointKind::Writer);
                    if last_writer {
                        notify = Self::compatible_inboxes(entries, removed.reliability);
                    }
                }

                if entries.is_empty() {
                    endpoints.remove(key);
                }
            }
            notify
        };

        if !notify.is_empty() {
            let info = SampleInfo::notification(
                guid,
                InstanceState::NotAliveNoWriters,
                SystemTime::now(),
            );
            for inbox in notify {
                inbox.push(RawSample {
                    info,
                    payload: None,
                });
            }
        }

        log::debug!(
            "[DomainRegistry] Unregistered endpoint {} from topic '{}'",
            guid,
            key.topic_name
        );
    }

    fn compatible_inboxes(
        entries: &[LocalEndpointEntry],
        writer_reliability: Reliability,
    ) -> Vec<ReaderInbox> {
        entries
            .iter()
            .filter(|e| e.kind == EndpointKind::Reader)
            .filter(|e| qos_compatible(writer_reliability, e.reliability))
            .filter_map(|e| e.inbox.clone())
            .collect()
    }

    /// Hand a sample to every matching reader. Returns how many accepted it.
    pub fn deliver(
        &self,
        key: &MatchKey,
        writer_reliability: Reliability,
        mut sample: RawSample,
    ) -> usize {
        let inboxes = {
            let endpoints = self.endpoints.read().unwrap_or_else(|e| e.into_inner());
            match endpoints.get(key) {
                Some(entries) => Self::compatible_inboxes(entries, writer_reliability),
                None => return 0,
            }
        };

        sample.info.reception_timestamp = SystemTime::now();
        inboxes
            .iter()
            .filter(|inbox| inbox.push(sample.clone()))
            .count()
    }

    /// Deliver a data-less lifecycle notification from `writer_guid`.
    pub fn notify(
        &self,
        key: &MatchKey,
        writer_guid: Guid,
        writer_reliability: Reliability,
        state: InstanceState,
    ) -> usize {
        let info = SampleInfo::notification(writer_guid, state, SystemTime::now());
        self.deliver(
            key,
            writer_reliability,
            RawSample {
                info,
                payload: None,
            },
        )
    }

    /// Whether any reader on `key` requested reliable delivery.
    pub fn has_reliable_reader(&self, key: &MatchKey) -> bool {
        let endpoints = self.endpoints.read().unwrap_or_else(|e| e.into_inner());
        endpoints.get(key).is_some_and(|entries| {
            entries
                .iter()
                .any(|e| e.kind == EndpointKind::Reader && e.reliability == Reliability::Reliable)
        })
    }

    pub fn has_readers(&self, key: &MatchKey) -> bool {
        self.count_for_key(key, EndpointKind::Reader) > 0
    }

    pub fn count_for_key(&self, key: &MatchKey, kind: EndpointKind) -> usize {
        let endpoints = self.endpoints.read().unwrap_or_else(|e| e.into_inner());
        endpoints
            .get(key)
            .map(|entries| entries.iter().filter(|e| e.kind == kind).count())
            .unwrap_or(0)
    }

    pub fn endpoint_count(&self) -> usize {
        let endpoints = self.endpoints.read().unwrap_or_else(|e| e.into_inner());
        endpoints.values().map(|v| v.len()).sum()
    }
}

impl std::fmt::Debug for DomainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainState")
            .field("domain_id", &self.domain_id)
            .field("endpoint_count", &self.endpoint_count())
            .finish()
    }
}

/// Global domain registry (singleton)
pub struct DomainRegistry {
    domains: Mutex<HashMap<DomainId, Weak<DomainState>>>,
}

impl DomainRegistry {
    fn new() -> Self {
        Self {
            domains: Mutex::new(HashMap::new()),
        }
    }

    pub fn global() -> &'static DomainRegistry {
        use std::sync::OnceLock;
        static REGISTRY: OnceLock<DomainRegistry> = OnceLock::new();
        REGISTRY.get_or_init(DomainRegistry::new)
    }

    /// Get or create domain state for a domain ID
    ///
    /// The caller (Participant) holds the returned Arc to keep the domain alive.
    pub fn get_or_create(&self, domain_id: DomainId) -> Arc<DomainState> {
        let mut domains = self.domains.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(strong) = domains.get(&domain_id).and_then(Weak::upgrade) {
            return strong;
        }

        let state = Arc::new(DomainState::new(domain_id));
        domains.insert(domain_id, Arc::downgrade(&state));

        log::info!(
            "[DomainRegistry] Created domain state for domain_id={}",
            domain_id
        );

        state
    }

    pub fn get(&self, domain_id: DomainId) -> Option<Arc<DomainState>> {
        let domains = self.domains.lock().unwrap_or_else(|e| e.into_inner());
        domains.get(&domain_id).and_then(Weak::upgrade)
    }

    /// Get count of active domains (for testing)
    pub fn active_domain_count(&self) -> usize {
        let domains = self.domains.lock().unwrap_or_else(|e| e.into_inner());
        domains.values().filter(|w| w.strong_count() > 0).count()
    }
}
