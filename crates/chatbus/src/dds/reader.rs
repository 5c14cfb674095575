// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed data reader and its sample stream.

use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::domain_registry::{BindToken, MatchKey, ReaderInbox};
use super::participant::Participant;
use super::qos::{QoS, Reliability};
use super::sample::{RawSample, Sample};
use super::{Error, Result, DDS};
use crate::guid::Guid;

/// Receiving half of a reader inbox.
#[derive(Debug)]
enum ReaderQueue {
    Unbounded(mpsc::UnboundedReceiver<RawSample>),
    Bounded(mpsc::Receiver<RawSample>),
}

impl ReaderQueue {
    fn try_recv(&mut self) -> Option<RawSample> {
        match self {
            ReaderQueue::Unbounded(rx) => rx.try_recv().ok(),
            ReaderQueue::Bounded(rx) => rx.try_recv().ok(),
        }
    }

    fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<RawSample>> {
        match self {
            ReaderQueue::Unbounded(rx) => rx.poll_recv(cx),
            ReaderQueue::Bounded(rx) => rx.poll_recv(cx),
        }
    }
}

fn inbox_for(qos: &QoS) -> (ReaderInbox, ReaderQueue) {
    match (qos.reliability, qos.history.depth()) {
        (Reliability::BestEffort, Some(depth)) => {
            let (tx, rx) = mpsc::channel(depth);
            (ReaderInbox::Bounded(tx), ReaderQueue::Bounded(rx))
        }
        _ => {
            let (tx, rx) = mpsc::unbounded_channel();
            (ReaderInbox::Unbounded(tx), ReaderQueue::Unbounded(rx))
        }
    }
}

fn decode<T: DDS>(raw: RawSample) -> Result<Sample<T>> {
    let data = match &raw.payload {
        Some(payload) if raw.info.valid_data => Some(T::decode_cdr2(payload)?),
        _ => None,
    };
    Ok(Sample::new(raw.info, data))
}

/// Receives samples of `T` from one topic.
///
/// Samples are consumed either by polling [`try_take`](Self::try_take) or by
/// moving the queue into a [`SampleStream`] with [`samples`](Self::samples);
/// only one consumer exists at a time.
pub struct DataReader<T: DDS> {
    topic: String,
    guid: Guid,
    qos: QoS,
    queue: Mutex<Option<ReaderQueue>>,
    _token: BindToken,
    _participant: Arc<Participant>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DDS> DataReader<T> {
    pub(super) fn new(participant: Arc<Participant>, topic: &str, qos: QoS, guid: Guid) -> Self {
        let key = MatchKey::from_names(topic, &T::type_descriptor().type_name);
        let (inbox, queue) = inbox_for(&qos);
        let token = participant
            .domain_state()
            .register_reader(key, guid, qos.reliability, inbox);

        log::debug!(
            "[DataReader] created {} on '{}' ({:?})",
            guid,
            topic,
            qos.reliability
        );

        Self {
            topic: topic.to_string(),
            guid,
            qos,
            queue: Mutex::new(Some(queue)),
            _token: token,
            _participant: participant,
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

    /// Take the next queued sample, if any. Undecodable payloads are skipped.
    pub fn try_take(&self) -> Result<Option<Sample<T>>> {
        let mut guard = self.queue.lock();
        let queue = guard
            .as_mut()
            .ok_or_else(|| Error::InvalidState("sample stream already taken".into()))?;

        while let Some(raw) = queue.try_recv() {
            match decode(raw) {
                Ok(sample) => return Ok(Some(sample)),
                Err(e) => log::warn!("[DataReader] {} dropping undecodable sample: {}", self.guid, e),
            }
        }
        Ok(None)
    }

    /// Move the queue into an async stream.
    ///
    /// The stream ends once this reader is dropped and the queue is drained.
    pub fn samples(&self) -> Result<SampleStream<T>> {
        let queue = self
            .queue
            .lock()
            .take()
            .ok_or_else(|| Error::InvalidState("sample stream already taken".into()))?;
        Ok(SampleStream {
            queue,
            guid: self.guid,
            _marker: PhantomData,
        })
    }
}

impl<T: DDS> std::fmt::Debug for DataReader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataReader")
            .field("topic", &self.topic)
            .field("guid", &self.guid)
            .field("qos", &self.qos)
            .finish()
    }
}

/// Lazy stream of decoded samples from one reader.
pub struct SampleStream<T> {
    queue: ReaderQueue,
    guid: Guid,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DDS> Stream for SampleStream<T> {
    type Item = Sample<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match this.queue.poll_recv(cx) {
                Poll::Ready(Some(raw)) => match decode(raw) {
                    Ok(sample) => return Poll::Ready(Some(sample)),
                    Err(e) => {
                        log::warn!("[DataReader] {} dropping undecodable sample: {}", this.guid, e);
                    }
                },
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<T> std::fmt::Debug for SampleStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleStream")
            .field("guid", &self.guid)
            .finish()
    }
}
