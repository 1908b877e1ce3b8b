//! ctlpanel-broker: Kafka REST proxy transport for ctlpanel
//!
//! This crate owns every HTTP call the console makes against the broker
//! gateway: consumer instance management, record fetches and command
//! publishing.
//!
//! ## Layer 0 - Transport
//!
//! Focus: faithful wire formats and a single error type for failed calls.
//!
//! ## Key Components
//!
//! - `BrokerGateway`: async trait over the REST proxy operations
//! - `RestProxyClient`: `reqwest` implementation of the gateway
//! - `fakes::MemoryBroker`: scripted in-memory gateway for tests

mod client;
mod error;
pub mod fakes;
pub mod gateway;
pub mod wire;

pub use client::{RestProxyClient, RestProxyConfig, DEFAULT_PROXY_URL};
pub use error::TransportError;
pub use gateway::BrokerGateway;
pub use wire::{
    ConsumerInstance, CreateConsumerRequest, ProduceRecord, ProduceRequest, RecordEnvelope,
    SubscriptionRequest,
};

/// Result type for broker transport operations
pub type Result<T> = std::result::Result<T, TransportError>;
