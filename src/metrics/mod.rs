//! Metric model, counting, batching and publishing
//!
//! - [`aggregator`] - Turns items into named counters
//! - [`batcher`] - Splits a namespace's points into publishable batches
//! - [`publisher`] - The [`MetricPublisher`] contract and its backends

pub mod aggregator;
pub mod batcher;
pub mod publisher;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

pub use aggregator::{aggregate, collect_metrics, Counters};
pub use batcher::{batches, MAX_METRIC_DATA};
pub use publisher::{CapturingPublisher, CloudWatchPublisher, LogPublisher, MetricPublisher};

/// One emitted data point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricPoint {
    pub namespace: String,
    pub dimension_name: String,
    pub dimension_value: String,
    pub metric_name: String,
    pub value: u64,
    pub timestamp: DateTime<Utc>,
}

/// Metrics of one namespace, keyed by metric name.
///
/// Merging a point whose name is already present replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NamespaceMetrics {
    points: BTreeMap<String, MetricPoint>,
}

impl NamespaceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, points: impl IntoIterator<Item = MetricPoint>) {
        for point in points {
            self.points.insert(point.metric_name.clone(), point);
        }
    }

    pub fn get(&self, metric_name: &str) -> Option<&MetricPoint> {
        self.points.get(metric_name)
    }

    /// Points ordered by metric name
    pub fn points(&self) -> impl Iterator<Item = &MetricPoint> {
        self.points.values()
    }

    /// Metric name -> value, mostly for assertions and summaries
    pub fn values(&self) -> BTreeMap<&str, u64> {
        self.points
            .iter()
            .map(|(name, point)| (name.as_str(), point.value))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Result of one run: namespace -> metrics
pub type MetricsByNamespace = BTreeMap<String, NamespaceMetrics>;
