//! Gateway trait over the REST proxy operations.
//!
//! The session layer only talks to the broker through this trait, so the
//! polling and correlation logic can be exercised against
//! [`crate::fakes::MemoryBroker`] without a running proxy.

use async_trait::async_trait;

use crate::wire::{ConsumerInstance, CreateConsumerRequest, ProduceRequest, RecordEnvelope};
use crate::Result;

/// Broker gateway.
///
/// Guarantees:
/// - `create_consumer` returns an instance whose `base_uri` addresses every
///   later call for that instance.
/// - `fetch_records` returns records in broker delivery order.
/// - Every failed call maps to a single [`crate::TransportError`].
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// Register a consumer instance in `group`.
    async fn create_consumer(
        &self,
        group: &str,
        request: &CreateConsumerRequest,
    ) -> Result<ConsumerInstance>;

    /// Subscribe an existing instance to `topics`.
    async fn subscribe(&self, base_uri: &str, topics: &[String]) -> Result<()>;

    /// Fetch the next batch of records for an instance. May be empty.
    async fn fetch_records(&self, base_uri: &str) -> Result<Vec<RecordEnvelope>>;

    /// Release the instance on the proxy.
    async fn delete_consumer(&self, base_uri: &str) -> Result<()>;

    /// Produce records onto `topic`.
    async fn produce(&self, topic: &str, request: &ProduceRequest) -> Result<()>;
}
