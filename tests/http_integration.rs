//! Integration tests for the JSON protocol client and publisher using wiremock
//!
//! These tests verify request shape, pagination and error handling against
//! mocked endpoints.

use chrono::Utc;
use resource_counter::aws::{ClientRegistry, HttpTransport, JsonProtocolClient, JsonVersion, ServiceClient};
use resource_counter::metrics::{CloudWatchPublisher, MetricPoint, MetricPublisher};
use resource_counter::resource::{fetch_resources, ContinuationFields, FetchStrategy, ResourceConfig};
use serde_json::{json, Map};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{bearer_token, body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport(token: Option<&str>) -> HttpTransport {
    HttpTransport::new(Duration::from_secs(5), token.map(str::to_string)).expect("transport should build")
}

/// Test module for the service client
mod client_tests {
    use super::*;

    /// Successful call sends target header and arguments, returns parsed JSON
    #[tokio::test]
    async fn test_invoke_sends_target_and_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("X-Amz-Target", "AmazonEC2ContainerServiceV20141113.ListClusters"))
            .and(header("Content-Type", "application/x-amz-json-1.1"))
            .and(bearer_token("test-token"))
            .and(body_json(json!({"maxResults": 10})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "clusterArns": ["arn:1", "arn:2"]
            })))
            .mount(&server)
            .await;

        let client = JsonProtocolClient::for_service(transport(Some("test-token")), format!("{}/", server.uri()), "ecs");
        let mut args = Map::new();
        args.insert("maxResults".to_string(), json!(10));

        let response = client.invoke("list_clusters", &args).await.expect("call should succeed");

        assert_eq!(response["clusterArns"].as_array().map(Vec::len), Some(2));
    }

    /// Non-2xx status becomes an error
    #[tokio::test]
    async fn test_error_status_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "__type": "AccessDeniedException",
                "message": "not authorized"
            })))
            .mount(&server)
            .await;

        let client = JsonProtocolClient::new(transport(None), server.uri(), "TestService", JsonVersion::V1_1);
        let err = client.invoke("ListThings", &Map::new()).await.unwrap_err();

        assert!(err.to_string().contains("400"));
    }

    /// Empty body on success decodes to an empty object
    #[tokio::test]
    async fn test_empty_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = JsonProtocolClient::new(transport(None), server.uri(), "TestService", JsonVersion::V1_0);
        let response = client.invoke("ListThings", &Map::new()).await.expect("call should succeed");

        assert_eq!(response, json!({}));
    }

    /// Paginated fetch follows NextToken across requests
    #[tokio::test]
    async fn test_paginated_fetch_over_http() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_json(json!({"Limit": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "TableNames": ["a", "b"],
                "LastEvaluatedTableName": "b",
                "NextToken": "page-2"
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({"NextToken": "page-2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "TableNames": ["c"]
            })))
            .mount(&server)
            .await;

        let clients = ClientRegistry::new().with(
            "dynamodb",
            Arc::new(JsonProtocolClient::for_service(transport(None), server.uri(), "dynamodb")),
        );
        let mut config = ResourceConfig::direct("dynamodb", "list_tables", &["TableNames"], "Inventory", "Tables");
        config.strategy = FetchStrategy::Paginated;
        config.call_args.insert("Limit".to_string(), json!(2));

        let items = fetch_resources(&clients, &config).await.expect("fetch should succeed");

        assert_eq!(items, vec![json!("a"), json!("b"), json!("c")]);
        let requests = server.received_requests().await.expect("recording enabled");
        assert_eq!(requests.len(), 2);
    }

    /// Next-in-response fetch with custom marker fields
    #[tokio::test]
    async fn test_next_in_response_fetch_over_http() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_json(json!({})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "logGroups": [{"logGroupName": "/app/a"}],
                "nextToken": "cursor-1"
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(body_json(json!({"nextToken": "cursor-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "logGroups": [{"logGroupName": "/app/b"}, {"logGroupName": "/app/c"}]
            })))
            .mount(&server)
            .await;

        let clients = ClientRegistry::new().with(
            "logs",
            Arc::new(JsonProtocolClient::for_service(transport(None), server.uri(), "logs")),
        );
        let mut config = ResourceConfig::direct("logs", "describe_log_groups", &["logGroups"], "Inventory", "LogGroups");
        config.strategy = FetchStrategy::NextToken;
        config.continuation = Some(ContinuationFields {
            response_field: "nextToken".to_string(),
            request_field: "nextToken".to_string(),
        });

        let items = fetch_resources(&clients, &config).await.expect("fetch should succeed");

        assert_eq!(items.len(), 3);
        assert_eq!(items[2]["logGroupName"], "/app/c");
    }
}

/// Test module for the metric publisher
mod publisher_tests {
    use super::*;

    fn point(name: &str, value: u64) -> MetricPoint {
        MetricPoint {
            namespace: "Inventory".to_string(),
            dimension_name: "Account".to_string(),
            dimension_value: "prod".to_string(),
            metric_name: name.to_string(),
            value,
            timestamp: Utc::now(),
        }
    }

    /// PutMetricData carries namespace, datum fields and the JSON 1.0 content type
    #[tokio::test]
    async fn test_put_metric_data_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(header("X-Amz-Target", "GraniteServiceVersion20100801.PutMetricData"))
            .and(header("Content-Type", "application/x-amz-json-1.0"))
            .and(body_partial_json(json!({
                "Namespace": "Inventory",
                "MetricData": [
                    {
                        "MetricName": "Buckets",
                        "Dimensions": [{"Name": "Account", "Value": "prod"}],
                        "Value": 4,
                        "Unit": "Count",
                        "StorageResolution": 60
                    }
                ]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let publisher = CloudWatchPublisher::new(transport(None), server.uri());
        publisher
            .publish("Inventory", &[point("Buckets", 4)])
            .await
            .expect("publish should succeed");
    }

    /// Throttled publish reports an error
    #[tokio::test]
    async fn test_put_metric_data_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let publisher = CloudWatchPublisher::new(transport(None), server.uri());
        let result = publisher.publish("Inventory", &[point("Buckets", 1)]).await;

        assert!(result.is_err());
    }
}
