//! In-memory fake gateway (testing only)
//!
//! `MemoryBroker` records every call it receives and serves scripted fetch
//! batches and failures, so session and polling behaviour can be asserted
//! without a REST proxy. Like the proxy, it refuses to create a second live
//! instance under the same name until the first one is deleted.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::TransportError;
use crate::gateway::BrokerGateway;
use crate::wire::{ConsumerInstance, CreateConsumerRequest, ProduceRequest, RecordEnvelope};
use crate::Result;

/// Base address the fake hands out in consumer `base_uri`s
pub const FAKE_PROXY_URL: &str = "http://fake-proxy";

/// One call observed by [`MemoryBroker`].
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerCall {
    CreateConsumer { group: String, name: String },
    Subscribe { base_uri: String, topics: Vec<String> },
    Fetch { base_uri: String },
    Delete { base_uri: String },
    Produce { topic: String, request: ProduceRequest },
}

#[derive(Debug, Default)]
struct Inner {
    calls: Vec<BrokerCall>,
    batches: VecDeque<Result<Vec<RecordEnvelope>>>,
    create_failures: VecDeque<TransportError>,
    subscribe_failures: VecDeque<TransportError>,
    produce_failures: VecDeque<TransportError>,
    delete_failure: Option<TransportError>,
    live_instances: HashSet<String>,
}

/// Scripted in-memory broker gateway.
#[derive(Debug, Default)]
pub struct MemoryBroker {
    inner: Mutex<Inner>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a batch for the next fetch. Fetches beyond the script are empty.
    pub fn push_batch(&self, records: Vec<RecordEnvelope>) {
        self.inner().batches.push_back(Ok(records));
    }

    /// Queue a failure for the next fetch.
    pub fn push_fetch_error(&self, err: TransportError) {
        self.inner().batches.push_back(Err(err));
    }

    pub fn fail_next_create(&self, err: TransportError) {
        self.inner().create_failures.push_back(err);
    }

    pub fn fail_next_subscribe(&self, err: TransportError) {
        self.inner().subscribe_failures.push_back(err);
    }

    pub fn fail_next_produce(&self, err: TransportError) {
        self.inner().produce_failures.push_back(err);
    }

    /// Make every delete fail with `err`.
    pub fn fail_deletes(&self, err: TransportError) {
        self.inner().delete_failure = Some(err);
    }

    /// All calls observed so far, in order.
    pub fn calls(&self) -> Vec<BrokerCall> {
        self.inner().calls.clone()
    }

    pub fn create_count(&self) -> usize {
        self.count(|c| matches!(c, BrokerCall::CreateConsumer { .. }))
    }

    pub fn subscribe_count(&self) -> usize {
        self.count(|c| matches!(c, BrokerCall::Subscribe { .. }))
    }

    pub fn fetch_count(&self) -> usize {
        self.count(|c| matches!(c, BrokerCall::Fetch { .. }))
    }

    pub fn delete_count(&self) -> usize {
        self.count(|c| matches!(c, BrokerCall::Delete { .. }))
    }

    /// Produce requests in order, with their topic.
    pub fn produced(&self) -> Vec<(String, ProduceRequest)> {
        self.inner()
            .calls
            .iter()
            .filter_map(|c| match c {
                BrokerCall::Produce { topic, request } => Some((topic.clone(), request.clone())),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&BrokerCall) -> bool) -> usize {
        self.inner().calls.iter().filter(|c| pred(c)).count()
    }
}

#[async_trait]
impl BrokerGateway for MemoryBroker {
    async fn create_consumer(
        &self,
        group: &str,
        request: &CreateConsumerRequest,
    ) -> Result<ConsumerInstance> {
        // Give concurrent callers a chance to interleave, like a real round trip.
        tokio::task::yield_now().await;

        let mut inner = self.inner();
        inner.calls.push(BrokerCall::CreateConsumer {
            group: group.to_string(),
            name: request.name.clone(),
        });
        if let Some(err) = inner.create_failures.pop_front() {
            return Err(err);
        }
        let base_uri = format!(
            "{}/consumers/{}/instances/{}",
            FAKE_PROXY_URL, group, request.name
        );
        if !inner.live_instances.insert(base_uri.clone()) {
            return Err(TransportError::Status {
                url: format!("{}/consumers/{}", FAKE_PROXY_URL, group),
                status: 409,
                body: "Consumer instance with the specified name already exists.".to_string(),
            });
        }
        Ok(ConsumerInstance {
            instance_id: request.name.clone(),
            base_uri,
        })
    }

    async fn subscribe(&self, base_uri: &str, topics: &[String]) -> Result<()> {
        tokio::task::yield_now().await;

        let mut inner = self.inner();
        inner.calls.push(BrokerCall::Subscribe {
            base_uri: base_uri.to_string(),
            topics: topics.to_vec(),
        });
        match inner.subscribe_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn fetch_records(&self, base_uri: &str) -> Result<Vec<RecordEnvelope>> {
        let mut inner = self.inner();
        inner.calls.push(BrokerCall::Fetch {
            base_uri: base_uri.to_string(),
        });
        inner.batches.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn delete_consumer(&self, base_uri: &str) -> Result<()> {
        let mut inner = self.inner();
        inner.calls.push(BrokerCall::Delete {
            base_uri: base_uri.to_string(),
        });
        if let Some(err) = &inner.delete_failure {
            return Err(err.clone());
        }
        inner.live_instances.remove(base_uri);
        Ok(())
    }

    async fn produce(&self, topic: &str, request: &ProduceRequest) -> Result<()> {
        let mut inner = self.inner();
        inner.calls.push(BrokerCall::Produce {
            topic: topic.to_string(),
            request: request.clone(),
        });
        match inner.produce_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
