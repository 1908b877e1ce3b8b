//! REST proxy client
//!
//! `reqwest`-backed implementation of [`BrokerGateway`] for the Confluent
//! style Kafka REST proxy (v2 API).

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TransportError;
use crate::gateway::BrokerGateway;
use crate::wire::{
    ConsumerInstance, CreateConsumerRequest, ProduceRequest, RecordEnvelope, SubscriptionRequest,
    ACCEPT_BINARY_V2_JSON, CONTENT_TYPE_AVRO_V2_JSON, CONTENT_TYPE_V2_JSON,
};
use crate::Result;

/// Default proxy address used by the local docker-compose stack
pub const DEFAULT_PROXY_URL: &str = "http://localhost:8082";

/// REST proxy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestProxyConfig {
    /// Proxy base URL, without trailing slash
    pub base_url: String,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for RestProxyConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PROXY_URL)
    }
}

impl RestProxyConfig {
    /// Create config for a specific proxy
    pub fn new(base_url: &str) -> Self {
        RestProxyConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: concat!("ctlpanel/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// REST proxy client
#[derive(Debug, Clone)]
pub struct RestProxyClient {
    config: RestProxyConfig,
    http_client: reqwest::Client,
}

impl RestProxyClient {
    /// Create a new client
    pub fn new(config: RestProxyConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TransportError::request(&config.base_url, e))?;

        Ok(RestProxyClient {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &RestProxyConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Send a request and turn any non-2xx answer into `TransportError::Status`.
    async fn send(&self, url: &str, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::request(url, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    async fn read_json<T: DeserializeOwned>(url: &str, response: reqwest::Response) -> Result<T> {
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::request(url, e))?;
        serde_json::from_str(&text).map_err(|e| TransportError::InvalidResponse {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl BrokerGateway for RestProxyClient {
    async fn create_consumer(
        &self,
        group: &str,
        request: &CreateConsumerRequest,
    ) -> Result<ConsumerInstance> {
        let url = self.url(&format!("/consumers/{}", group));
        debug!(%url, instance = %request.name, "creating consumer instance");

        let body = serde_json::to_vec(request)?;
        let response = self
            .send(
                &url,
                self.http_client
                    .post(&url)
                    .header(CONTENT_TYPE, CONTENT_TYPE_V2_JSON)
                    .body(body),
            )
            .await?;
        Self::read_json(&url, response).await
    }

    async fn subscribe(&self, base_uri: &str, topics: &[String]) -> Result<()> {
        let url = format!("{}/subscription", base_uri.trim_end_matches('/'));
        debug!(%url, ?topics, "subscribing consumer");

        let body = serde_json::to_vec(&SubscriptionRequest {
            topics: topics.to_vec(),
        })?;
        self.send(
            &url,
            self.http_client
                .post(&url)
                .header(CONTENT_TYPE, CONTENT_TYPE_V2_JSON)
                .body(body),
        )
        .await?;
        Ok(())
    }

    async fn fetch_records(&self, base_uri: &str) -> Result<Vec<RecordEnvelope>> {
        let url = format!("{}/records", base_uri.trim_end_matches('/'));

        let response = self
            .send(
                &url,
                self.http_client
                    .get(&url)
                    .header(ACCEPT, ACCEPT_BINARY_V2_JSON),
            )
            .await?;
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::request(&url, e))?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text).map_err(|e| TransportError::InvalidResponse {
            url: url.clone(),
            message: e.to_string(),
        })
    }

    async fn delete_consumer(&self, base_uri: &str) -> Result<()> {
        let url = base_uri.trim_end_matches('/').to_string();
        debug!(%url, "deleting consumer instance");

        self.send(
            &url,
            self.http_client
                .delete(&url)
                .header(CONTENT_TYPE, CONTENT_TYPE_V2_JSON),
        )
        .await?;
        Ok(())
    }

    async fn produce(&self, topic: &str, request: &ProduceRequest) -> Result<()> {
        let url = self.url(&format!("/topics/{}", topic));
        debug!(%url, records = request.records.len(), "producing records");

        let body = serde_json::to_vec(request)?;
        self.send(
            &url,
            self.http_client
                .post(&url)
                .header(CONTENT_TYPE, CONTENT_TYPE_AVRO_V2_JSON)
                .body(body),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = RestProxyConfig::default();
        assert_eq!(config.base_url, DEFAULT_PROXY_URL);
        assert!(config.user_agent.starts_with("ctlpanel/"));
    }

    #[test]
    fn test_config_trims_trailing_slash() {
        let config = RestProxyConfig::new("http://proxy:8082/");
        assert_eq!(config.base_url, "http://proxy:8082");
    }

    #[test]
    fn test_url_joins_path() {
        let client = RestProxyClient::new(RestProxyConfig::new("http://proxy:8082")).unwrap();
        assert_eq!(
            client.url("/topics/logs.app"),
            "http://proxy:8082/topics/logs.app"
        );
    }
}
