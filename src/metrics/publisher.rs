//! Metric publishing
//!
//! Each call sends one batch for one namespace. Delivery is best effort:
//! there is no retry and no ordering guarantee between batches.

use super::MetricPoint;
use crate::aws::http::{HttpTransport, JsonProtocolClient};
use anyhow::{anyhow, Result};
use chrono::SecondsFormat;
use futures::future::{self, BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Mutex;

/// Storage resolution sent with every point (standard, one minute)
pub const STORAGE_RESOLUTION: u32 = 60;

/// Sends a batch of points for a namespace
pub trait MetricPublisher: Send + Sync {
    fn publish<'a>(&'a self, namespace: &'a str, batch: &'a [MetricPoint]) -> BoxFuture<'a, Result<()>>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Dimension<'a> {
    name: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct MetricDatum<'a> {
    metric_name: &'a str,
    dimensions: [Dimension<'a>; 1],
    timestamp: String,
    value: u64,
    unit: &'static str,
    storage_resolution: u32,
}

impl<'a> From<&'a MetricPoint> for MetricDatum<'a> {
    fn from(point: &'a MetricPoint) -> Self {
        Self {
            metric_name: &point.metric_name,
            dimensions: [Dimension {
                name: &point.dimension_name,
                value: &point.dimension_value,
            }],
            timestamp: point.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            value: point.value,
            unit: "Count",
            storage_resolution: STORAGE_RESOLUTION,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PutMetricData<'a> {
    namespace: &'a str,
    metric_data: Vec<MetricDatum<'a>>,
}

/// Request body of a `PutMetricData` call
pub fn put_metric_data_body(namespace: &str, batch: &[MetricPoint]) -> Value {
    let request = PutMetricData {
        namespace,
        metric_data: batch.iter().map(MetricDatum::from).collect(),
    };
    // Only strings and integers: cannot fail
    serde_json::to_value(request).unwrap_or(Value::Null)
}

/// Publishes through the monitoring service's JSON protocol
#[derive(Clone)]
pub struct CloudWatchPublisher {
    client: JsonProtocolClient,
}

impl CloudWatchPublisher {
    pub fn new(transport: HttpTransport, endpoint: impl Into<String>) -> Self {
        Self {
            client: JsonProtocolClient::for_service(transport, endpoint, "monitoring"),
        }
    }
}

impl MetricPublisher for CloudWatchPublisher {
    fn publish<'a>(&'a self, namespace: &'a str, batch: &'a [MetricPoint]) -> BoxFuture<'a, Result<()>> {
        async move {
            tracing::info!(
                "PutMetricData {} to {}: {} metrics",
                namespace,
                self.client.endpoint(),
                batch.len()
            );
            let body = put_metric_data_body(namespace, batch);
            self.client.call("PutMetricData", &body).await?;
            Ok(())
        }
        .boxed()
    }
}

/// Dry run: logs batches instead of sending them
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPublisher;

impl MetricPublisher for LogPublisher {
    fn publish<'a>(&'a self, namespace: &'a str, batch: &'a [MetricPoint]) -> BoxFuture<'a, Result<()>> {
        tracing::info!("[dry-run] {}: {} metrics", namespace, batch.len());
        for point in batch {
            tracing::debug!("[dry-run] {} {} = {}", namespace, point.metric_name, point.value);
        }
        future::ready(Ok(())).boxed()
    }
}

/// Keeps every published batch in memory, optionally failing for some
/// namespaces
#[derive(Debug, Default)]
pub struct CapturingPublisher {
    batches: Mutex<Vec<(String, Vec<MetricPoint>)>>,
    failing: HashSet<String>,
}

impl CapturingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every batch sent to `namespace` (the attempt is still recorded)
    pub fn failing_on(mut self, namespace: &str) -> Self {
        self.failing.insert(namespace.to_string());
        self
    }

    /// Every batch attempted so far, in order
    pub fn batches(&self) -> Vec<(String, Vec<MetricPoint>)> {
        self.batches
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl MetricPublisher for CapturingPublisher {
    fn publish<'a>(&'a self, namespace: &'a str, batch: &'a [MetricPoint]) -> BoxFuture<'a, Result<()>> {
        self.batches
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((namespace.to_string(), batch.to_vec()));

        let result = if self.failing.contains(namespace) {
            Err(anyhow!("publishing to {} rejected", namespace))
        } else {
            Ok(())
        };
        future::ready(result).boxed()
    }
}
