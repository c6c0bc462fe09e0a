//! HTTP transport for JSON protocol service calls
//!
//! Operations are sent as `POST` requests carrying an `X-Amz-Target`
//! header and the call arguments as a JSON body. Request signing is left
//! to whatever sits at the endpoint (a signing proxy or a local emulator);
//! an optional bearer token is forwarded when configured.

use super::client::ServiceClient;
use anyhow::{Context, Result};
use futures::future::{BoxFuture, FutureExt};
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
        format!("{}... [truncated, {} bytes total]", cut, body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// JSON protocol flavour, selects the request content type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonVersion {
    V1_0,
    V1_1,
}

impl JsonVersion {
    pub fn content_type(self) -> &'static str {
        match self {
            JsonVersion::V1_0 => "application/x-amz-json-1.0",
            JsonVersion::V1_1 => "application/x-amz-json-1.1",
        }
    }
}

/// Target prefix and protocol version of a service
pub fn service_protocol(service: &str) -> (&str, JsonVersion) {
    match service {
        "dynamodb" => ("DynamoDB_20120810", JsonVersion::V1_0),
        "monitoring" | "cloudwatch" => ("GraniteServiceVersion20100801", JsonVersion::V1_0),
        "ecs" => ("AmazonEC2ContainerServiceV20141113", JsonVersion::V1_1),
        "ecr" => ("AmazonEC2ContainerRegistry_V20150921", JsonVersion::V1_1),
        "logs" => ("Logs_20140328", JsonVersion::V1_1),
        "kms" => ("TrentService", JsonVersion::V1_1),
        "ssm" => ("AmazonSSM", JsonVersion::V1_1),
        "kinesis" => ("Kinesis_20131202", JsonVersion::V1_1),
        "cloudtrail" => ("CloudTrail_20131101", JsonVersion::V1_1),
        "events" => ("AWSEvents", JsonVersion::V1_1),
        "codebuild" => ("CodeBuild_20161006", JsonVersion::V1_1),
        "cognito-idp" => ("AWSCognitoIdentityProviderService", JsonVersion::V1_1),
        "athena" => ("AmazonAthena", JsonVersion::V1_1),
        "secretsmanager" => ("secretsmanager", JsonVersion::V1_1),
        other => (other, JsonVersion::V1_1),
    }
}

/// Wire name of an operation: `describe_instances` -> `DescribeInstances`.
/// Names that are already PascalCase pass through unchanged.
pub fn operation_name(method: &str) -> String {
    method
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Shared HTTP client with timeout and optional bearer token
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    token: Option<String>,
}

impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new(timeout: Duration, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("resource-counter/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, token })
    }

    /// POST a JSON protocol request and decode the JSON response
    pub async fn post(
        &self,
        url: &str,
        target: &str,
        version: JsonVersion,
        body: &Value,
    ) -> Result<Value> {
        tracing::debug!("POST {} ({})", url, target);

        let mut request = self
            .client
            .post(url)
            .header("X-Amz-Target", target)
            .header(reqwest::header::CONTENT_TYPE, version.content_type())
            .body(serde_json::to_vec(body).context("Failed to encode request body")?);

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&response_body));
            return Err(anyhow::anyhow!("API request {} failed: {}", target, status));
        }

        if response_body.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }

        serde_json::from_str(&response_body).context("Failed to parse response JSON")
    }
}

/// Client for one JSON protocol service
#[derive(Clone)]
pub struct JsonProtocolClient {
    transport: HttpTransport,
    endpoint: String,
    target_prefix: String,
    version: JsonVersion,
}

impl JsonProtocolClient {
    pub fn new(
        transport: HttpTransport,
        endpoint: impl Into<String>,
        target_prefix: impl Into<String>,
        version: JsonVersion,
    ) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            target_prefix: target_prefix.into(),
            version,
        }
    }

    /// Client for `service` using its known target prefix and protocol version
    pub fn for_service(transport: HttpTransport, endpoint: impl Into<String>, service: &str) -> Self {
        let (prefix, version) = service_protocol(service);
        Self::new(transport, endpoint, prefix, version)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Call an operation with an arbitrary JSON body
    pub async fn call(&self, method: &str, body: &Value) -> Result<Value> {
        let target = format!("{}.{}", self.target_prefix, operation_name(method));
        self.transport
            .post(&self.endpoint, &target, self.version, body)
            .await
    }
}

impl ServiceClient for JsonProtocolClient {
    fn invoke<'a>(
        &'a self,
        method: &'a str,
        args: &'a Map<String, Value>,
    ) -> BoxFuture<'a, Result<Value>> {
        async move { self.call(method, &Value::Object(args.clone())).await }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_name() {
        assert_eq!(operation_name("describe_instances"), "DescribeInstances");
        assert_eq!(operation_name("list_functions"), "ListFunctions");
        assert_eq!(operation_name("ListTables"), "ListTables");
        assert_eq!(operation_name("get_metric_data"), "GetMetricData");
    }

    #[test]
    fn test_service_protocol() {
        assert_eq!(service_protocol("dynamodb"), ("DynamoDB_20120810", JsonVersion::V1_0));
        assert_eq!(service_protocol("ecs").1, JsonVersion::V1_1);
        assert_eq!(service_protocol("custom"), ("custom", JsonVersion::V1_1));
    }

    #[test]
    fn test_client_keeps_its_endpoint() {
        let transport = HttpTransport::new(Duration::from_secs(5), None).unwrap();
        let client = JsonProtocolClient::for_service(transport, "http://localhost:4566/", "monitoring");
        assert_eq!(client.endpoint(), "http://localhost:4566/");
    }

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.starts_with(&"x".repeat(MAX_LOG_BODY_LENGTH)));
        assert!(sanitized.contains("500 bytes total"));
    }

    #[test]
    fn test_sanitize_strips_control_characters() {
        assert_eq!(sanitize_for_log("bad\nline\tend"), "badlineend");
    }
}
