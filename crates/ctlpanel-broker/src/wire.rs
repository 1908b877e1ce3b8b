//! Wire types for the Kafka REST proxy (v2 API).
//!
//! Only the subset the console speaks is modelled: binary-format consumers
//! for the log topic and Avro-encoded single-record produce requests for the
//! command topics.

use serde::{Deserialize, Serialize};

/// Content type for consumer management requests.
pub const CONTENT_TYPE_V2_JSON: &str = "application/vnd.kafka.v2+json";

/// Content type for Avro produce requests with an inline value schema.
pub const CONTENT_TYPE_AVRO_V2_JSON: &str = "application/vnd.kafka.avro.v2+json";

/// Accept header for fetching binary-format records.
pub const ACCEPT_BINARY_V2_JSON: &str = "application/vnd.kafka.binary.v2+json";

/// Body of `POST /consumers/{group}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateConsumerRequest {
    /// Consumer instance name inside the group
    pub name: String,
    /// Record embedded format (`binary` for the log tail)
    pub format: String,
    /// Where a fresh consumer starts reading
    #[serde(rename = "auto.offset.reset")]
    pub auto_offset_reset: String,
}

impl CreateConsumerRequest {
    /// A binary-format consumer that only sees records produced from now on.
    pub fn binary_latest(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: "binary".to_string(),
            auto_offset_reset: "latest".to_string(),
        }
    }
}

/// Response of `POST /consumers/{group}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerInstance {
    #[serde(default)]
    pub instance_id: String,
    /// Absolute URI all further calls for this instance are made against
    pub base_uri: String,
}

/// Body of `POST {base_uri}/subscription`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    pub topics: Vec<String>,
}

/// One record returned by `GET {base_uri}/records` in binary format.
///
/// `key` and `value` are base64 strings; either may be null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEnvelope {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub partition: i32,
    #[serde(default)]
    pub offset: i64,
}

/// Body of `POST /topics/{topic}` with an inline Avro value schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProduceRequest {
    /// Avro schema of `records[*].value`, as a JSON string
    pub value_schema: String,
    pub records: Vec<ProduceRecord>,
}

impl ProduceRequest {
    /// A request carrying exactly one record.
    pub fn single(value_schema: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            value_schema: value_schema.into(),
            records: vec![ProduceRecord { value }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProduceRecord {
    pub value: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_consumer_request_uses_dotted_offset_key() {
        let body = serde_json::to_value(CreateConsumerRequest::binary_latest("ui-abc123")).unwrap();
        assert_eq!(
            body,
            json!({"name": "ui-abc123", "format": "binary", "auto.offset.reset": "latest"})
        );
    }

    #[test]
    fn record_envelope_accepts_null_key_and_missing_fields() {
        let records: Vec<RecordEnvelope> =
            serde_json::from_value(json!([{"key": null, "value": "e30="}])).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, None);
        assert_eq!(records[0].value.as_deref(), Some("e30="));
        assert_eq!(records[0].offset, 0);
    }

    #[test]
    fn produce_request_single_wraps_one_record() {
        let req = ProduceRequest::single("{\"type\":\"string\"}", json!("x"));
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["records"], json!([{"value": "x"}]));
        assert_eq!(body["value_schema"], json!("{\"type\":\"string\"}"));
    }
}
