// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::missing_panics_doc)] // Tests panic on failure

//! End-to-end relay tests over the intra-process bus.
//!
//! Each test joins its own domain: the intra-process domain registry is
//! shared by the whole test binary.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chat_bridge::{
    BusClient, BusState, Connection, ConnectionHub, ConnectionState, LifecycleController,
    ShutdownTrigger, UserMessage, USER_MESSAGES_TOPIC,
};
use chatbus::{DomainParticipantFactory, QoS, DDS};
use parking_lot::Mutex;
use uuid::Uuid;

struct FakeConnection {
    id: Uuid,
    state: Mutex<ConnectionState>,
    sent: Mutex<Vec<String>>,
}

impl FakeConnection {
    fn new(state: ConnectionState) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            state: Mutex::new(state),
            sent: Mutex::new(Vec::new()),
        })
    }

    fn received(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

impl Connection for FakeConnection {
    fn id(&self) -> Uuid {
        self.id
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    fn send_text(&self, text: &str) -> bool {
        self.sent.lock().push(text.to_string());
        true
    }
}

fn chat_root() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir(dir.path().join("idl")).expect("idl dir");
    std::fs::write(
        dir.path().join("idl/Chat.idl"),
        "module Chat {\n  struct UserMessage {\n    string message;\n  };\n};\n",
    )
    .expect("write idl");
    dir
}

fn initialized_bus(root: &Path, domain_id: u32) -> Arc<BusClient> {
    let value = root.to_string_lossy().into_owned();
    let bus = Arc::new(BusClient::new());
    bus.initialize_with_lookup(move |_| Some(value), domain_id, std::iter::empty::<&str>())
        .expect("initialize");
    bus
}

/// Bus client, hub and a subscription relaying into the hub.
fn relay(root: &Path, domain_id: u32) -> (Arc<BusClient>, Arc<ConnectionHub>) {
    let bus = initialized_bus(root, domain_id);
    let hub = Arc::new(ConnectionHub::new(bus.clone()));
    let target = hub.clone();
    assert!(bus.subscribe(move |msg| {
        target.broadcast(msg.message());
    }));
    (bus, hub)
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition within timeout");
}

/// Give the consumer task a chance to run.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn test_client_frame_is_published_and_echoed() {
    let root = chat_root();
    let (bus, hub) = relay(root.path(), 70);
    let sender = FakeConnection::new(ConnectionState::Open);
    hub.register(sender.clone());

    assert!(hub.on_receive(sender.id(), "hello"));

    // the sender sees its own message like everyone else
    wait_for(|| sender.received() == vec!["hello".to_string()]).await;
    assert!(bus.teardown());
}

#[tokio::test]
async fn test_bus_message_reaches_open_connections_only() {
    let root = chat_root();
    let (bus, hub) = relay(root.path(), 71);
    let open_a = FakeConnection::new(ConnectionState::Open);
    let open_b = FakeConnection::new(ConnectionState::Open);
    let closed = FakeConnection::new(ConnectionState::Closed);
    for c in [&open_a, &open_b, &closed] {
        hub.register(c.clone());
    }

    assert!(bus.publish(&UserMessage::new("hi all")));

    wait_for(|| open_a.received().len() == 1 && open_b.received().len() == 1).await;
    settle().await;
    assert_eq!(open_a.received(), vec!["hi all".to_string()]);
    assert_eq!(open_b.received(), vec!["hi all".to_string()]);
    assert!(closed.received().is_empty());
    assert_eq!(hub.connection_count(), 3);
    bus.teardown();
}

#[tokio::test]
async fn test_messages_from_another_participant_are_relayed_in_order() {
    let root = chat_root();
    let (bus, hub) = relay(root.path(), 72);
    let client = FakeConnection::new(ConnectionState::Open);
    hub.register(client.clone());

    let factory = DomainParticipantFactory::initialize(std::iter::empty::<&str>()).expect("factory");
    let peer = factory.create_participant(72).expect("peer");
    peer.register_type(UserMessage::type_descriptor().clone())
        .expect("register");
    let writer = peer
        .create_writer::<UserMessage>(USER_MESSAGES_TOPIC, QoS::reliable())
        .expect("writer");

    for i in 0..20 {
        writer
            .write(&UserMessage::new(format!("m{}", i)))
            .expect("write");
    }

    let expected: Vec<String> = (0..20).map(|i| format!("m{}", i)).collect();
    wait_for(|| client.received().len() == expected.len()).await;
    assert_eq!(client.received(), expected);
    bus.teardown();
}

#[tokio::test]
async fn test_lifecycle_notifications_are_not_relayed() {
    let root = chat_root();
    let (bus, hub) = relay(root.path(), 73);
    let client = FakeConnection::new(ConnectionState::Open);
    hub.register(client.clone());

    let factory = DomainParticipantFactory::initialize(std::iter::empty::<&str>()).expect("factory");
    let peer = factory.create_participant(73).expect("peer");
    peer.register_type(UserMessage::type_descriptor().clone())
        .expect("register");
    let writer = peer
        .create_writer::<UserMessage>(USER_MESSAGES_TOPIC, QoS::reliable())
        .expect("writer");

    writer.write(&UserMessage::new("last words")).expect("write");
    writer.dispose().expect("dispose");
    drop(writer);
    factory.finalize();

    wait_for(|| !client.received().is_empty()).await;
    settle().await;
    assert_eq!(client.received(), vec!["last words".to_string()]);
    bus.teardown();
}

#[tokio::test]
async fn test_resubscribe_replaces_handler() {
    let root = chat_root();
    let bus = initialized_bus(root.path(), 74);
    let first = Arc::new(Mutex::new(Vec::new()));
    let second = Arc::new(Mutex::new(Vec::new()));

    let sink = first.clone();
    assert!(bus.subscribe(move |msg| sink.lock().push(msg.into_message())));
    let sink = second.clone();
    assert!(bus.subscribe(move |msg| sink.lock().push(msg.into_message())));
    assert_eq!(bus.state(), BusState::Subscribed);

    assert!(bus.publish(&UserMessage::new("once")));
    wait_for(|| second.lock().len() == 1).await;
    settle().await;
    assert!(first.lock().is_empty());
    assert_eq!(*second.lock(), vec!["once".to_string()]);
    bus.teardown();
}

#[tokio::test]
async fn test_interrupt_tears_down_once() {
    let root = chat_root();
    let (bus, hub) = relay(root.path(), 75);
    let client = FakeConnection::new(ConnectionState::Open);
    hub.register(client.clone());
    let lifecycle = LifecycleController::new(bus.clone());
    assert_eq!(bus.participant_count(), 1);

    assert_eq!(lifecycle.shutdown(ShutdownTrigger::Interrupt), Some(0));
    assert_eq!(bus.state(), BusState::Terminated);
    assert_eq!(bus.participant_count(), 0);
    assert!(!bus.has_writer());
    assert!(!bus.has_subscription());

    // later triggers and a direct teardown find nothing left to release
    assert_eq!(lifecycle.shutdown(ShutdownTrigger::Terminate), Some(0));
    assert!(!bus.teardown());
    drop(lifecycle);

    // the bridge keeps answering, but nothing reaches the bus any more
    assert!(!hub.on_receive(client.id(), "too late"));
    settle().await;
    assert!(client.received().is_empty());
}

#[tokio::test]
async fn test_normal_exit_tears_down() {
    let root = chat_root();
    let (bus, _hub) = relay(root.path(), 76);
    {
        let _lifecycle = LifecycleController::new(bus.clone());
    }
    assert_eq!(bus.state(), BusState::Terminated);
    assert_eq!(bus.participant_count(), 0);
}
