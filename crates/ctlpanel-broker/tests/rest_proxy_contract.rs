//! HTTP contract tests for `RestProxyClient`.
//!
//! A wiremock server stands in for the Kafka REST proxy so the exact
//! methods, paths, headers and bodies of every call can be asserted.

use ctlpanel_broker::{
    BrokerGateway, CreateConsumerRequest, ProduceRequest, RestProxyClient, RestProxyConfig,
    TransportError,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(server: &MockServer) -> RestProxyClient {
    RestProxyClient::new(RestProxyConfig::new(&server.uri())).unwrap()
}

#[tokio::test]
async fn create_consumer_posts_binary_latest_instance() {
    let server = MockServer::start().await;
    let base_uri = format!("{}/consumers/cp-panel-abc123/instances/ui-xyz789", server.uri());

    Mock::given(method("POST"))
        .and(path("/consumers/cp-panel-abc123"))
        .and(header("content-type", "application/vnd.kafka.v2+json"))
        .and(body_json(json!({
            "name": "ui-xyz789",
            "format": "binary",
            "auto.offset.reset": "latest"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "instance_id": "ui-xyz789",
            "base_uri": base_uri
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let instance = client
        .create_consumer(
            "cp-panel-abc123",
            &CreateConsumerRequest::binary_latest("ui-xyz789"),
        )
        .await
        .unwrap();

    assert_eq!(instance.instance_id, "ui-xyz789");
    assert_eq!(instance.base_uri, base_uri);
}

#[tokio::test]
async fn subscribe_lists_the_log_topic() {
    let server = MockServer::start().await;
    let base_uri = format!("{}/consumers/g/instances/i", server.uri());

    Mock::given(method("POST"))
        .and(path("/consumers/g/instances/i/subscription"))
        .and(body_json(json!({"topics": ["logs.app"]})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    client
        .subscribe(&base_uri, &["logs.app".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn fetch_records_requests_binary_format_and_keeps_order() {
    let server = MockServer::start().await;
    let base_uri = format!("{}/consumers/g/instances/i", server.uri());

    Mock::given(method("GET"))
        .and(path("/consumers/g/instances/i/records"))
        .and(header("accept", "application/vnd.kafka.binary.v2+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"topic": "logs.app", "key": null, "value": "Zmlyc3Q=", "partition": 0, "offset": 10},
            {"topic": "logs.app", "key": null, "value": "c2Vjb25k", "partition": 0, "offset": 11}
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let records = client.fetch_records(&base_uri).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].offset, 10);
    assert_eq!(records[1].value.as_deref(), Some("c2Vjb25k"));
}

#[tokio::test]
async fn fetch_records_treats_empty_body_as_empty_batch() {
    let server = MockServer::start().await;
    let base_uri = format!("{}/consumers/g/instances/i", server.uri());

    Mock::given(method("GET"))
        .and(path("/consumers/g/instances/i/records"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    assert!(client.fetch_records(&base_uri).await.unwrap().is_empty());
}

#[tokio::test]
async fn fetch_records_maps_server_error_to_status() {
    let server = MockServer::start().await;
    let base_uri = format!("{}/consumers/g/instances/i", server.uri());

    Mock::given(method("GET"))
        .and(path("/consumers/g/instances/i/records"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Consumer instance not found"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.fetch_records(&base_uri).await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(err.body(), Some("Consumer instance not found"));
}

#[tokio::test]
async fn delete_consumer_targets_base_uri() {
    let server = MockServer::start().await;
    let base_uri = format!("{}/consumers/g/instances/i", server.uri());

    Mock::given(method("DELETE"))
        .and(path("/consumers/g/instances/i"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    client.delete_consumer(&base_uri).await.unwrap();
}

#[tokio::test]
async fn produce_posts_avro_payload_to_topic() {
    let server = MockServer::start().await;
    let schema = r#"{"type":"record","name":"CleanCmd","fields":[{"name":"run_id","type":"string"}]}"#;

    Mock::given(method("POST"))
        .and(path("/topics/cmd.web_agent.clean"))
        .and(header("content-type", "application/vnd.kafka.avro.v2+json"))
        .and(body_json(json!({
            "value_schema": schema,
            "records": [{"value": {"run_id": "run-42"}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"offsets": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    client
        .produce(
            "cmd.web_agent.clean",
            &ProduceRequest::single(schema, json!({"run_id": "run-42"})),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn produce_surfaces_rejection_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/topics/cmd.query_agent"))
        .respond_with(
            ResponseTemplate::new(422).set_body_string("{\"error_code\":42203,\"message\":\"bad schema\"}"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .produce(
            "cmd.query_agent",
            &ProduceRequest::single("{}", json!({"date": "2025-06-20"})),
        )
        .await
        .unwrap_err();

    match err {
        TransportError::Status { status, body, .. } => {
            assert_eq!(status, 422);
            assert!(body.contains("bad schema"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_proxy_is_a_request_error() {
    let client = RestProxyClient::new(RestProxyConfig::new("http://127.0.0.1:9")).unwrap();
    let err = client
        .create_consumer("g", &CreateConsumerRequest::binary_latest("ui"))
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Request { .. }));
}
