// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Domain participant: membership in one domain and factory for endpoints.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::config::{FactoryConfig, TransportMode};
use super::domain_registry::{DomainRegistry, DomainState};
use super::qos::QoS;
use super::reader::DataReader;
use super::writer::DataWriter;
use super::{Error, Result, DDS, MAX_DOMAIN_ID};
use crate::guid::{Guid, ENTITY_KIND_PARTICIPANT, ENTITY_KIND_READER, ENTITY_KIND_WRITER};
use crate::transport::UdpTransport;
use crate::types::TypeDescriptor;

/// Builder for [`Participant`].
#[derive(Debug, Clone)]
pub struct ParticipantBuilder {
    name: String,
    domain_id: u32,
    transport: Option<TransportMode>,
    config: FactoryConfig,
}

impl ParticipantBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            domain_id: 0,
            transport: None,
            config: FactoryConfig::default(),
        }
    }

    pub fn domain_id(mut self, domain_id: u32) -> Self {
        self.domain_id = domain_id;
        self
    }

    /// Override the transport mode from the configuration.
    pub fn with_transport(mut self, mode: TransportMode) -> Self {
        self.transport = Some(mode);
        self
    }

    pub fn with_config(mut self, config: FactoryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Arc<Participant>> {
        if self.domain_id > MAX_DOMAIN_ID {
            return Err(Error::InvalidDomainId(self.domain_id));
        }
        self.config.validate()?;

        let mode = self.transport.unwrap_or(self.config.transport.mode);
        let prefix = Guid::generate_prefix();

        let (domain, udp) = match mode {
            TransportMode::IntraProcess => {
                (DomainRegistry::global().get_or_create(self.domain_id), None)
            }
            TransportMode::UdpMulticast => {
                let local = Arc::new(DomainState::new(self.domain_id));
                let udp = UdpTransport::open(self.domain_id, prefix, &self.config, local.clone())?;
                (local, Some(udp))
            }
        };

        let participant = Participant {
            name: self.name,
            domain_id: self.domain_id,
            guid: Guid::endpoint(prefix, 0x0000_0001, ENTITY_KIND_PARTICIPANT),
            mode,
            domain,
            udp,
            types: RwLock::new(HashMap::new()),
            next_entity: AtomicU32::new(2),
            shut_down: AtomicBool::new(false),
        };

        log::info!(
            "[Participant] '{}' joined domain {} via {:?} guid={}",
            participant.name,
            participant.domain_id,
            mode,
            participant.guid
        );
        Ok(Arc::new(participant))
    }
}

/// Membership handle in one domain.
pub struct Participant {
    name: String,
    domain_id: u32,
    guid: Guid,
    mode: TransportMode,
    domain: Arc<DomainState>,
    udp: Option<Arc<UdpTransport>>,
    types: RwLock<HashMap<String, TypeDescriptor>>,
    next_entity: AtomicU32,
    shut_down: AtomicBool,
}

impl Participant {
    pub fn builder(name: &str) -> ParticipantBuilder {
        ParticipantBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain_id(&self) -> u32 {
        self.domain_id
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    pub fn transport_mode(&self) -> TransportMode {
        self.mode
    }

    /// Make a type usable for writers and readers of this participant.
    ///
    /// Registering the same name twice is accepted only with an identical
    /// structure.
    pub fn register_type(&self, descriptor: TypeDescriptor) -> Result<()> {
        let mut types = self.types.write();
        match types.get(&descriptor.type_name) {
            Some(existing) if existing.is_compatible_with(&descriptor) => Ok(()),
            Some(_) => Err(Error::TypeMismatch),
            None => {
                log::debug!(
                    "[Participant] '{}' registered type {}",
                    self.name,
                    descriptor.type_name
                );
                types.insert(descriptor.type_name.clone(), descriptor);
                Ok(())
            }
        }
    }

    pub fn is_type_registered(&self, type_name: &str) -> bool {
        self.types.read().contains_key(type_name)
    }

    pub fn create_writer<T: DDS>(
        self: &Arc<Self>,
        topic: &str,
        qos: QoS,
    ) -> Result<DataWriter<T>> {
        self.check_endpoint::<T>(topic)?;
        let guid = self.next_guid(ENTITY_KIND_WRITER);
        Ok(DataWriter::new(self.clone(), topic, qos, guid))
    }

    pub fn create_reader<T: DDS>(
        self: &Arc<Self>,
        topic: &str,
        qos: QoS,
    ) -> Result<DataReader<T>> {
        self.check_endpoint::<T>(topic)?;
        let guid = self.next_guid(ENTITY_KIND_READER);
        Ok(DataReader::new(self.clone(), topic, qos, guid))
    }

    fn check_endpoint<T: DDS>(&self, topic: &str) -> Result<()> {
        self.ensure_active()?;
        if topic.is_empty() {
            return Err(Error::InvalidConfig("topic name must not be empty".into()));
        }
        let expected = T::type_descriptor();
        let types = self.types.read();
        let registered = types
            .get(&expected.type_name)
            .ok_or_else(|| Error::TypeNotRegistered(expected.type_name.clone()))?;
        if !registered.is_compatible_with(expected) {
            log::warn!(
                "[Participant] type {} registered with a different structure",
                expected.type_name
            );
            return Err(Error::TypeMismatch);
        }
        Ok(())
    }

    fn next_guid(&self, kind: u8) -> Guid {
        let key = self.next_entity.fetch_add(1, Ordering::Relaxed);
        Guid::endpoint(self.guid.prefix, key, kind)
    }

    pub(crate) fn ensure_active(&self) -> Result<()> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(Error::InvalidState(format!(
                "participant '{}' has been deleted",
                self.name
            )));
        }
        Ok(())
    }

    pub(crate) fn domain_state(&self) -> &Arc<DomainState> {
        &self.domain
    }

    pub(crate) fn udp(&self) -> Option<&Arc<UdpTransport>> {
        self.udp.as_ref()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Leave the domain. Endpoints still alive stop working. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(udp) = &self.udp {
            udp.shutdown();
        }
        log::info!(
            "[Participant] '{}' left domain {}",
            self.name,
            self.domain_id
        );
    }
}

impl Drop for Participant {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("name", &self.name)
            .field("domain_id", &self.domain_id)
            .field("guid", &self.guid)
            .field("mode", &self.mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dds::test_types::Note;
    use crate::types::{FieldKind, MemberDescriptor};

    #[test]
    fn test_invalid_domain_id() {
        let result = Participant::builder("p").domain_id(233).build();
        assert!(matches!(result, Err(Error::InvalidDomainId(233))));
    }

    #[test]
    fn test_type_must_be_registered() {
        let participant = Participant::builder("p")
            .domain_id(200)
            .build()
            .expect("participant");
        let err = participant
            .create_writer::<Note>("notes", QoS::reliable())
            .expect_err("unregistered type");
        assert!(matches!(err, Error::TypeNotRegistered(name) if name == "Test::Note"));
    }

    #[test]
    fn test_type_structure_must_match() {
        let participant = Participant::builder("p")
            .domain_id(200)
            .build()
            .expect("participant");
        let other = TypeDescriptor::new(
            "Test::Note",
            vec![MemberDescriptor::new("id", FieldKind::Long)],
        );
        participant.register_type(other).expect("first registration");

        assert!(matches!(
            participant.register_type(Note::type_descriptor().clone()),
            Err(Error::TypeMismatch)
        ));
        assert!(matches!(
            participant.create_reader::<Note>("notes", QoS::reliable()),
            Err(Error::TypeMismatch)
        ));
    }

    #[test]
    fn test_shutdown_blocks_new_endpoints() {
        let participant = Participant::builder("p")
            .domain_id(200)
            .build()
            .expect("participant");
        participant
            .register_type(Note::type_descriptor().clone())
            .expect("register");
        participant.shutdown();
        participant.shutdown();

        assert!(participant.is_shut_down());
        assert!(matches!(
            participant.create_writer::<Note>("notes", QoS::reliable()),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_empty_topic_rejected() {
        let participant = Participant::builder("p")
            .domain_id(200)
            .build()
            .expect("participant");
        participant
            .register_type(Note::type_descriptor().clone())
            .expect("register");
        assert!(matches!(
            participant.create_writer::<Note>("", QoS::reliable()),
            Err(Error::InvalidConfig(_))
        ));
    }
}
