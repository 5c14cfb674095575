// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bus membership for the bridge.
//!
//! A [`BusClient`] owns one participant, one reliable writer and (once
//! subscribed) one reliable reader on the `"User Messages"` topic. It moves
//! through `Uninitialized -> Initialized -> Subscribed -> Terminated`;
//! [`BusClient::teardown`] reaches `Terminated` from any state.
//!
//! Startup failures are returned as [`InitError`]. Publish and subscribe
//! failures are logged and reported as `false`.

use std::fmt;
use std::sync::Arc;

use chatbus::{
    DataReader, DataWriter, DomainParticipantFactory, Participant, QoS, TypeSupportLibrary, DDS,
};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ChatRoot;
use crate::error::{InitError, Result};
use crate::message::{UserMessage, USER_MESSAGES_TOPIC, USER_MESSAGE_TYPE};

/// Lifecycle state of a [`BusClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    Uninitialized,
    Initialized,
    Subscribed,
    Terminated,
}

impl BusState {
    pub fn as_str(self) -> &'static str {
        match self {
            BusState::Uninitialized => "uninitialized",
            BusState::Initialized => "initialized",
            BusState::Subscribed => "subscribed",
            BusState::Terminated => "terminated",
        }
    }
}

impl fmt::Display for BusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Inner {
    state: BusState,
    domain_id: Option<u32>,
    factory: Option<DomainParticipantFactory>,
    participant: Option<Arc<Participant>>,
    writer: Option<DataWriter<UserMessage>>,
    reader: Option<DataReader<UserMessage>>,
    consumer: Option<JoinHandle<()>>,
}

/// Publisher and subscriber of chat messages on the bus.
pub struct BusClient {
    inner: Mutex<Inner>,
}

impl BusClient {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: BusState::Uninitialized,
                domain_id: None,
                factory: None,
                participant: None,
                writer: None,
                reader: None,
                consumer: None,
            }),
        }
    }

    /// Join `domain_id` using `CHAT_ROOT` from the process environment.
    ///
    /// `transport_args` are `-DCPS*` bus arguments; anything else in the
    /// list is ignored.
    pub fn initialize<I, S>(&self, domain_id: u32, transport_args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.initialize_with_lookup(|name| std::env::var(name).ok(), domain_id, transport_args)
    }

    /// Same as [`BusClient::initialize`], reading environment variables
    /// through `lookup`.
    pub fn initialize_with_lookup<F, I, S>(
        &self,
        lookup: F,
        domain_id: u32,
        transport_args: I,
    ) -> Result<()>
    where
        F: FnOnce(&str) -> Option<String>,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut inner = self.inner.lock();
        if inner.state != BusState::Uninitialized {
            return Err(InitError::InvalidState(format!(
                "initialize called while {}",
                inner.state
            )));
        }

        let root = ChatRoot::resolve(lookup)?;
        let factory = DomainParticipantFactory::initialize(transport_args)?;
        let library = load_type_support(&root)?;
        let descriptor = library
            .get(USER_MESSAGE_TYPE)
            .cloned()
            .ok_or_else(|| InitError::TypeSupport {
                path: root.type_support_path(),
                reason: format!("type {} is not defined", USER_MESSAGE_TYPE),
            })?;
        if !descriptor.is_compatible_with(UserMessage::type_descriptor()) {
            return Err(InitError::TypeSupport {
                path: root.type_support_path(),
                reason: format!("type {} does not match `{{ string message; }}`", USER_MESSAGE_TYPE),
            });
        }

        let participant = factory.create_participant(domain_id)?;
        participant.register_type(descriptor)?;

        let writer = match participant.create_writer::<UserMessage>(USER_MESSAGES_TOPIC, QoS::reliable())
        {
            Ok(writer) => Some(writer),
            Err(e) => {
                error!("Failed to create writer on '{}': {}", USER_MESSAGES_TOPIC, e);
                None
            }
        };

        info!(
            "Joined domain {} as {} (writer: {})",
            domain_id,
            participant.guid(),
            if writer.is_some() { "yes" } else { "no" }
        );

        inner.domain_id = Some(domain_id);
        inner.factory = Some(factory);
        inner.participant = Some(participant);
        inner.writer = writer;
        inner.state = BusState::Initialized;
        Ok(())
    }

    /// Publish one message. `false` when there is no writer or the bus
    /// rejected the sample; never retries.
    pub fn publish(&self, message: &UserMessage) -> bool {
        let inner = self.inner.lock();
        let Some(writer) = inner.writer.as_ref() else {
            debug!("Publish skipped: no writer ({})", inner.state);
            return false;
        };
        match writer.write(message) {
            Ok(seq) => {
                debug!("Published seq={} ({} bytes)", seq, message.message().len());
                true
            }
            Err(e) => {
                warn!("Publish failed: {}", e);
                false
            }
        }
    }

    /// Start delivering incoming messages to `handler`.
    ///
    /// Only samples carrying data for an alive instance reach the handler.
    /// Must be called from within a tokio runtime. Subscribing again replaces
    /// the previous reader and consumer.
    pub fn subscribe<F>(&self, handler: F) -> bool
    where
        F: Fn(UserMessage) + Send + 'static,
    {
        let mut inner = self.inner.lock();

        if let Some(previous) = inner.consumer.take() {
            debug!("Replacing previous subscription");
            previous.abort();
        }
        inner.reader = None;

        let Some(participant) = inner.participant.clone() else {
            error!("Subscribe failed: no participant ({})", inner.state);
            return false;
        };
        // any earlier subscription is gone from here on
        if inner.state == BusState::Subscribed {
            inner.state = BusState::Initialized;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Subscribe failed: {}", e);
                return false;
            }
        };

        let reader = match participant
            .create_reader::<UserMessage>(USER_MESSAGES_TOPIC, QoS::reliable())
        {
            Ok(reader) => reader,
            Err(e) => {
                error!("Failed to create reader on '{}': {}", USER_MESSAGES_TOPIC, e);
                return false;
            }
        };
        let mut samples = match reader.samples() {
            Ok(samples) => samples,
            Err(e) => {
                error!("Failed to open sample stream: {}", e);
                return false;
            }
        };

        let consumer = runtime.spawn(async move {
            while let Some(sample) = samples.next().await {
                if !sample.is_alive_data() {
                    debug!(
                        "Skipping notification from {} ({:?})",
                        sample.info.writer_guid, sample.info.instance_state
                    );
                    continue;
                }
                if let Some(message) = sample.into_data() {
                    handler(message);
                }
            }
            debug!("Sample stream ended");
        });

        info!("Subscribed to '{}' as {}", USER_MESSAGES_TOPIC, reader.guid());
        inner.reader = Some(reader);
        inner.consumer = Some(consumer);
        inner.state = BusState::Subscribed;
        true
    }

    /// Release every bus resource. Returns `true` for the call that actually
    /// released them; later calls are no-ops.
    ///
    /// Never waits: the consumer task is aborted, not joined.
    pub fn teardown(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.state = BusState::Terminated;

        let Some(factory) = inner.factory.take() else {
            debug!("Teardown: nothing to release");
            return false;
        };

        if let Some(consumer) = inner.consumer.take() {
            consumer.abort();
        }
        inner.writer = None;
        inner.reader = None;
        if let Some(participant) = inner.participant.take() {
            if let Err(e) = factory.delete_participant(&participant) {
                warn!("Failed to delete participant: {}", e);
            }
        }
        factory.finalize();

        info!("Bus client torn down");
        true
    }

    pub fn state(&self) -> BusState {
        self.inner.lock().state
    }

    /// Domain joined by [`BusClient::initialize`].
    pub fn domain_id(&self) -> Option<u32> {
        self.inner.lock().domain_id
    }

    pub fn has_writer(&self) -> bool {
        self.inner.lock().writer.is_some()
    }

    pub fn has_subscription(&self) -> bool {
        self.inner.lock().reader.is_some()
    }

    /// Participants currently owned through this client (0 or 1).
    pub fn participant_count(&self) -> usize {
        self.inner
            .lock()
            .factory
            .as_ref()
            .map_or(0, DomainParticipantFactory::participant_count)
    }
}

impl Default for BusClient {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BusClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BusClient")
            .field("state", &inner.state)
            .field("domain_id", &inner.domain_id)
            .field("writer", &inner.writer.is_some())
            .field("reader", &inner.reader.is_some())
            .finish()
    }
}

fn load_type_support(root: &ChatRoot) -> Result<TypeSupportLibrary> {
    let path = root.type_support_path();
    TypeSupportLibrary::load(&path).map_err(|e| InitError::TypeSupport {
        path,
        reason: e.to_string(),
    })
}
