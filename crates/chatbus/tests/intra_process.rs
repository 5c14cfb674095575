// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::missing_panics_doc)] // Tests panic on failure

//! Intra-process delivery integration tests
//!
//! Every test uses its own domain id: the domain registry is process-wide.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chatbus::{
    CdrReader, CdrWriter, DomainParticipantFactory, Error, FieldKind, InstanceState,
    MemberDescriptor, Participant, QoS, TypeDescriptor, DDS,
};
use futures::StreamExt;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Line {
    text: String,
}

impl Line {
    fn new(text: &str) -> Self {
        Self { text: text.into() }
    }
}

impl DDS for Line {
    fn type_descriptor() -> &'static TypeDescriptor {
        static DESC: OnceLock<TypeDescriptor> = OnceLock::new();
        DESC.get_or_init(|| {
            TypeDescriptor::new(
                "Demo::Line",
                vec![MemberDescriptor::new(
                    "text",
                    FieldKind::String { bound: None },
                )],
            )
        })
    }

    fn encode_cdr2(&self, writer: &mut CdrWriter) -> chatbus::Result<()> {
        writer.write_string(&self.text)
    }

    fn decode_cdr2(buf: &[u8]) -> chatbus::Result<Self> {
        Ok(Self {
            text: CdrReader::new(buf).read_string()?,
        })
    }
}

fn participant(factory: &DomainParticipantFactory, domain_id: u32) -> Arc<Participant> {
    let participant = factory
        .create_participant(domain_id)
        .expect("create participant");
    participant
        .register_type(Line::type_descriptor().clone())
        .expect("register type");
    participant
}

fn factory() -> DomainParticipantFactory {
    DomainParticipantFactory::initialize(std::iter::empty::<&str>()).expect("factory")
}

fn drain_texts(reader: &chatbus::DataReader<Line>) -> Vec<String> {
    let mut texts = Vec::new();
    while let Some(sample) = reader.try_take().expect("try_take") {
        if let Some(line) = sample.into_data() {
            texts.push(line.text);
        }
    }
    texts
}

// ============================================================================
// Matching and delivery
// ============================================================================

#[test]
fn test_reliable_delivery_across_participants_in_order() {
    let factory = factory();
    let publisher = participant(&factory, 150);
    let subscriber_a = participant(&factory, 150);
    let subscriber_b = participant(&factory, 150);

    let reader_a = subscriber_a
        .create_reader::<Line>("lines", QoS::reliable())
        .expect("reader a");
    let reader_b = subscriber_b
        .create_reader::<Line>("lines", QoS::reliable())
        .expect("reader b");
    let writer = publisher
        .create_writer::<Line>("lines", QoS::reliable())
        .expect("writer");

    for i in 0..100 {
        let seq = writer.write(&Line::new(&format!("msg-{}", i))).expect("write");
        assert_eq!(seq, i + 1);
    }

    let expected: Vec<String> = (0..100).map(|i| format!("msg-{}", i)).collect();
    assert_eq!(drain_texts(&reader_a), expected);
    assert_eq!(drain_texts(&reader_b), expected);
}

#[test]
fn test_participant_receives_its_own_samples() {
    let factory = factory();
    let p = participant(&factory, 151);
    let reader = p
        .create_reader::<Line>("lines", QoS::reliable())
        .expect("reader");
    let writer = p
        .create_writer::<Line>("lines", QoS::reliable())
        .expect("writer");

    writer.write(&Line::new("echo")).expect("write");

    let sample = reader.try_take().expect("take").expect("own sample");
    assert!(sample.is_alive_data());
    assert_eq!(sample.info.writer_guid, writer.guid());
    assert_eq!(sample.info.sequence_number, 1);
    assert_eq!(sample.data(), Some(&Line::new("echo")));
}

#[test]
fn test_domains_are_isolated() {
    let factory = factory();
    let writer_side = participant(&factory, 152);
    let reader_side = participant(&factory, 153);

    let reader = reader_side
        .create_reader::<Line>("lines", QoS::reliable())
        .expect("reader");
    let writer = writer_side
        .create_writer::<Line>("lines", QoS::reliable())
        .expect("writer");
    writer.write(&Line::new("nobody hears this")).expect("write");

    assert!(reader.try_take().expect("take").is_none());
}

#[test]
fn test_topics_are_isolated() {
    let factory = factory();
    let p = participant(&factory, 154);
    let reader = p
        .create_reader::<Line>("other", QoS::reliable())
        .expect("reader");
    let writer = p
        .create_writer::<Line>("lines", QoS::reliable())
        .expect("writer");
    writer.write(&Line::new("x")).expect("write");

    assert!(reader.try_take().expect("take").is_none());
}

#[test]
fn test_best_effort_writer_does_not_reach_reliable_reader() {
    let factory = factory();
    let p = participant(&factory, 155);
    let reliable = p
        .create_reader::<Line>("lines", QoS::reliable())
        .expect("reliable reader");
    let best_effort = p
        .create_reader::<Line>("lines", QoS::best_effort())
        .expect("best effort reader");
    let writer = p
        .create_writer::<Line>("lines", QoS::best_effort())
        .expect("writer");

    writer.write(&Line::new("x")).expect("write");

    assert!(reliable.try_take().expect("take").is_none());
    assert_eq!(drain_texts(&best_effort), vec!["x".to_string()]);
}

#[test]
fn test_best_effort_reader_keeps_history_depth() {
    let factory = factory();
    let p = participant(&factory, 156);
    let reader = p
        .create_reader::<Line>("lines", QoS::best_effort().keep_last(3))
        .expect("reader");
    let writer = p
        .create_writer::<Line>("lines", QoS::reliable())
        .expect("writer");

    for i in 0..10 {
        writer.write(&Line::new(&i.to_string())).expect("write");
    }

    // oldest three are kept, the rest was dropped on a full queue
    assert_eq!(drain_texts(&reader), vec!["0", "1", "2"]);
}

// ============================================================================
// Lifecycle notifications
// ============================================================================

#[test]
fn test_dispose_and_unregister_notifications() {
    let factory = factory();
    let p = participant(&factory, 157);
    let reader = p
        .create_reader::<Line>("lines", QoS::reliable())
        .expect("reader");
    let writer = p
        .create_writer::<Line>("lines", QoS::reliable())
        .expect("writer");

    writer.write(&Line::new("before")).expect("write");
    writer.dispose().expect("dispose");
    drop(writer);

    let data = reader.try_take().expect("take").expect("data");
    assert!(data.is_alive_data());

    let disposed = reader.try_take().expect("take").expect("disposed");
    assert!(!disposed.info.valid_data);
    assert_eq!(disposed.info.instance_state, InstanceState::NotAliveDisposed);
    assert!(disposed.data().is_none());

    let gone = reader.try_take().expect("take").expect("no writers");
    assert!(!gone.info.valid_data);
    assert_eq!(gone.info.instance_state, InstanceState::NotAliveNoWriters);

    assert!(reader.try_take().expect("take").is_none());
}

// ============================================================================
// Streams and teardown
// ============================================================================

#[tokio::test]
async fn test_sample_stream_ends_when_reader_dropped() {
    let factory = factory();
    let p = participant(&factory, 158);
    let reader = p
        .create_reader::<Line>("lines", QoS::reliable())
        .expect("reader");
    let writer = p
        .create_writer::<Line>("lines", QoS::reliable())
        .expect("writer");

    let mut stream = reader.samples().expect("stream");
    assert!(matches!(reader.samples(), Err(Error::InvalidState(_))));
    assert!(matches!(reader.try_take(), Err(Error::InvalidState(_))));

    writer.write(&Line::new("streamed")).expect("write");
    let sample = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("no timeout")
        .expect("stream item");
    assert_eq!(sample.data(), Some(&Line::new("streamed")));

    drop(reader);
    let end = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("no timeout");
    assert!(end.is_none());
}

#[test]
fn test_finalize_invalidates_endpoints() {
    let factory = factory();
    let p = participant(&factory, 159);
    let writer = p
        .create_writer::<Line>("lines", QoS::reliable())
        .expect("writer");
    assert_eq!(factory.participant_count(), 1);

    factory.finalize();

    assert_eq!(factory.participant_count(), 0);
    assert!(matches!(
        writer.write(&Line::new("late")),
        Err(Error::InvalidState(_))
    ));
    assert!(matches!(writer.dispose(), Err(Error::InvalidState(_))));
}

#[test]
fn test_undecodable_payload_is_skipped() {
    #[derive(Debug)]
    struct Strict;

    impl DDS for Strict {
        fn type_descriptor() -> &'static TypeDescriptor {
            Line::type_descriptor()
        }

        fn encode_cdr2(&self, writer: &mut CdrWriter) -> chatbus::Result<()> {
            // wrong layout on purpose: no length prefix
            writer.write_raw(b"raw");
            Ok(())
        }

        fn decode_cdr2(buf: &[u8]) -> chatbus::Result<Self> {
            Line::decode_cdr2(buf).map(|_| Strict)
        }
    }

    let factory = factory();
    let p = participant(&factory, 160);
    let reader = p
        .create_reader::<Line>("lines", QoS::reliable())
        .expect("reader");
    let bad = p
        .create_writer::<Strict>("lines", QoS::reliable())
        .expect("bad writer");
    let good = p
        .create_writer::<Line>("lines", QoS::reliable())
        .expect("good writer");

    bad.write(&Strict).expect("write raw");
    good.write(&Line::new("ok")).expect("write");

    assert_eq!(drain_texts(&reader), vec!["ok".to_string()]);
}
