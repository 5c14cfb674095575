// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Participant factory.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::config::{FactoryConfig, TransportArgs};
use super::participant::Participant;
use super::{Error, Result};

/// Creates participants from one shared configuration and owns them until
/// they are deleted or the factory is finalized.
#[derive(Debug)]
pub struct DomainParticipantFactory {
    config: FactoryConfig,
    participants: Mutex<Vec<Arc<Participant>>>,
    created: AtomicU32,
    finalized: AtomicBool,
}

impl DomainParticipantFactory {
    /// Parse `-DCPS*` transport arguments (other arguments are ignored) and
    /// load the configuration file they name.
    pub fn initialize<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args = TransportArgs::parse(args)?;
        if let Some(level) = args.debug_level {
            log::info!("[Factory] debug level {}", level);
        }
        let config = FactoryConfig::from_args(&args)?;
        Self::with_config(config)
    }

    pub fn with_config(config: FactoryConfig) -> Result<Self> {
        config.validate()?;
        log::debug!(
            "[Factory] initialized transport={:?}",
            config.transport.mode
        );
        Ok(Self {
            config,
            participants: Mutex::new(Vec::new()),
            created: AtomicU32::new(0),
            finalized: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    pub fn create_participant(&self, domain_id: u32) -> Result<Arc<Participant>> {
        if self.is_finalized() {
            return Err(Error::InvalidState("factory has been finalized".into()));
        }
        let n = self.created.fetch_add(1, Ordering::Relaxed);
        let participant = Participant::builder(&format!("participant-{}", n))
            .domain_id(domain_id)
            .with_config(self.config.clone())
            .build()?;
        self.participants.lock().push(participant.clone());
        Ok(participant)
    }

    /// Remove and shut down a participant created by this factory.
    pub fn delete_participant(&self, participant: &Arc<Participant>) -> Result<()> {
        let removed = {
            let mut participants = self.participants.lock();
            participants
                .iter()
                .position(|p| Arc::ptr_eq(p, participant))
                .map(|idx| participants.remove(idx))
        };
        let removed = removed.ok_or(Error::ParticipantNotFound)?;
        removed.shutdown();
        Ok(())
    }

    pub fn participant_count(&self) -> usize {
        self.participants.lock().len()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    /// Delete every remaining participant. Later calls are no-ops.
    pub fn finalize(&self) {
        if self.finalized.swap(true, Ordering::AcqRel) {
            return;
        }
        let remaining = std::mem::take(&mut *self.participants.lock());
        for participant in &remaining {
            participant.shutdown();
        }
        log::info!(
            "[Factory] finalized ({} participant(s) still open)",
            remaining.len()
        );
    }
}

impl Drop for DomainParticipantFactory {
    fn drop(&mut self) {
        self.finalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_ignores_host_args() {
        let factory = DomainParticipantFactory::initialize(["chat-bridge", "--port", "7000"])
            .expect("initialize");
        assert_eq!(factory.participant_count(), 0);
        assert!(!factory.is_finalized());
    }

    #[test]
    fn test_initialize_rejects_bad_args() {
        assert!(DomainParticipantFactory::initialize(["-DCPSTransport"]).is_err());
    }

    #[test]
    fn test_create_delete_finalize() {
        let factory =
            DomainParticipantFactory::initialize(std::iter::empty::<&str>()).expect("initialize");
        let a = factory.create_participant(201).expect("participant a");
        let b = factory.create_participant(201).expect("participant b");
        assert_eq!(factory.participant_count(), 2);
        assert_ne!(a.guid(), b.guid());

        factory.delete_participant(&a).expect("delete a");
        assert!(a.is_shut_down());
        assert!(matches!(
            factory.delete_participant(&a),
            Err(Error::ParticipantNotFound)
        ));

        factory.finalize();
        factory.finalize();
        assert!(b.is_shut_down());
        assert_eq!(factory.participant_count(), 0);
        assert!(matches!(
            factory.create_participant(201),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_invalid_domain() {
        let factory =
            DomainParticipantFactory::initialize(std::iter::empty::<&str>()).expect("initialize");
        assert!(matches!(
            factory.create_participant(500),
            Err(Error::InvalidDomainId(500))
        ));
        assert_eq!(factory.participant_count(), 0);
    }
}
