//! Run orchestration
//!
//! One run fetches and counts every configured resource, merges the
//! resulting points per namespace (later configs overwrite earlier ones
//! with the same metric name), then publishes each namespace in batches.
//!
//! Failures stay local: a resource that cannot be fetched contributes no
//! points and a rejected batch does not stop the others. The returned
//! mapping always holds everything that was computed.

use crate::aws::ClientRegistry;
use crate::metrics::{self, MetricPoint, MetricPublisher, MetricsByNamespace, NamespaceMetrics};
use crate::resource::{fetch_resources, ResourceConfig};
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

/// Outcome of the publish phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishSummary {
    pub batches_sent: usize,
    pub batches_failed: usize,
}

pub struct Orchestrator<'a> {
    clients: &'a ClientRegistry,
    publisher: &'a dyn MetricPublisher,
    concurrency: usize,
}

impl<'a> Orchestrator<'a> {
    pub fn new(clients: &'a ClientRegistry, publisher: &'a dyn MetricPublisher) -> Self {
        Self {
            clients,
            publisher,
            concurrency: 1,
        }
    }

    /// Fetch up to `concurrency` resource configs at a time.
    /// Results are still merged in configuration order.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Run one full pass: collect, then publish
    pub async fn run(&self, configs: &[ResourceConfig]) -> MetricsByNamespace {
        let metrics = self.collect(configs).await;
        let summary = self.publish(&metrics).await;
        info!(
            "Run finished: {} namespaces, {} batches sent, {} failed",
            metrics.len(),
            summary.batches_sent,
            summary.batches_failed
        );
        metrics
    }

    /// Fetch and count every config, merging points per namespace
    pub async fn collect(&self, configs: &[ResourceConfig]) -> MetricsByNamespace {
        let mut metrics = initialize_namespaces(configs);

        // `buffered` yields in input order, which keeps the merge deterministic
        let results: Vec<Vec<MetricPoint>> = stream::iter(configs)
            .map(|config| self.collect_one(config))
            .buffered(self.concurrency)
            .collect()
            .await;

        for (config, points) in configs.iter().zip(results) {
            if points.is_empty() {
                continue;
            }
            info!(
                "Set {} metrics for namespace {}",
                points.len(),
                config.metric.namespace
            );
            metrics
                .entry(config.metric.namespace.clone())
                .or_default()
                .merge(points);
        }

        metrics
    }

    async fn collect_one(&self, config: &ResourceConfig) -> Vec<MetricPoint> {
        let items = match fetch_resources(self.clients, config).await {
            Ok(items) => items,
            Err(e) => {
                error!(
                    "Resource #{} ({}.{}): {}",
                    config.index, config.client, config.method, e
                );
                return Vec::new();
            }
        };

        if items.is_empty() {
            info!(
                "Resource #{} ({}.{}): no items",
                config.index, config.client, config.method
            );
            return Vec::new();
        }

        metrics::collect_metrics(&items, config)
    }

    /// Publish every namespace batch by batch; failures are logged and skipped
    pub async fn publish(&self, metrics: &MetricsByNamespace) -> PublishSummary {
        let mut summary = PublishSummary::default();

        for (namespace, namespace_metrics) in metrics {
            let points: Vec<MetricPoint> = namespace_metrics.points().cloned().collect();
            let batches = metrics::batches(&points);
            info!(
                "Publishing namespace {}: {} metrics in {} batches",
                namespace,
                points.len(),
                batches.len()
            );

            for batch in batches {
                match self.publisher.publish(namespace, batch).await {
                    Ok(()) => summary.batches_sent += 1,
                    Err(e) => {
                        warn!("Failed to publish batch to {}: {:#}", namespace, e);
                        summary.batches_failed += 1;
                    }
                }
            }
        }

        summary
    }
}

/// One empty entry per namespace referenced by the configs
fn initialize_namespaces(configs: &[ResourceConfig]) -> MetricsByNamespace {
    configs
        .iter()
        .map(|config| (config.metric.namespace.clone(), NamespaceMetrics::new()))
        .collect()
}
