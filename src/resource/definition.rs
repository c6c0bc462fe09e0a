//! Resource definitions
//!
//! Validated recipes describing how to list one resource type and how to
//! count what comes back. Built once by the services loader and only read
//! afterwards.

use serde_json::{Map, Value};
use std::fmt;

/// How the list operation of a resource is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStrategy {
    /// Native page-by-page iteration provided by the client
    Paginated,
    /// Single call repeated while the response carries a continuation token
    NextToken,
    /// One call, no looping
    Direct,
}

impl FetchStrategy {
    pub const ALL: [FetchStrategy; 3] = [
        FetchStrategy::Paginated,
        FetchStrategy::NextToken,
        FetchStrategy::Direct,
    ];

    /// Tag used in the services document
    pub fn tag(self) -> &'static str {
        match self {
            FetchStrategy::Paginated => "paginator",
            FetchStrategy::NextToken => "next-in-response",
            FetchStrategy::Direct => "direct",
        }
    }

    /// Parse a services document tag (case-insensitive)
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.to_lowercase();
        Self::ALL.into_iter().find(|strategy| strategy.tag() == tag)
    }
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Where the continuation token is read from and written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationFields {
    /// Field of the response holding the token
    pub response_field: String,
    /// Call argument the token is copied into
    pub request_field: String,
}

/// Group items by the value found at `path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupBy {
    pub path: Vec<String>,
    /// When non-empty, items whose value is not listed are ignored
    pub allowed_values: Vec<String>,
    pub capitalize_label: bool,
    /// Append the grouping value to the metric name
    pub use_custom_metric_name: bool,
}

/// Split items in two buckets by presence and truthiness of `path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfExists {
    pub path: Vec<String>,
    pub exists_suffix: String,
    pub not_exists_suffix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountingRule {
    pub generate_total: bool,
    pub group_by: Option<GroupBy>,
    pub if_exists: Option<IfExists>,
}

impl Default for CountingRule {
    fn default() -> Self {
        Self {
            generate_total: true,
            group_by: None,
            if_exists: None,
        }
    }
}

/// Namespace, dimension and base name of the emitted metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricTarget {
    pub namespace: String,
    pub dimension_name: String,
    pub dimension_value: String,
    pub metric_name: String,
}

/// One traversal and aggregation recipe
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceConfig {
    /// 1-based position in the services document, for diagnostics
    pub index: usize,
    pub strategy: FetchStrategy,
    /// Service name used to look up the client
    pub client: String,
    pub method: String,
    pub call_args: Map<String, Value>,
    /// Attribute names leading to the item list inside each response
    pub item_path: Vec<String>,
    pub require_item_path: bool,
    /// Only set for [`FetchStrategy::NextToken`]
    pub continuation: Option<ContinuationFields>,
    pub counting: CountingRule,
    pub metric: MetricTarget,
}

impl ResourceConfig {
    /// Minimal direct-call config counting only the total; handy for tests
    pub fn direct(
        client: &str,
        method: &str,
        item_path: &[&str],
        namespace: &str,
        metric_name: &str,
    ) -> Self {
        Self {
            index: 1,
            strategy: FetchStrategy::Direct,
            client: client.to_string(),
            method: method.to_string(),
            call_args: Map::new(),
            item_path: item_path.iter().map(|s| s.to_string()).collect(),
            require_item_path: true,
            continuation: None,
            counting: CountingRule::default(),
            metric: MetricTarget {
                namespace: namespace.to_string(),
                dimension_name: "Resource".to_string(),
                dimension_value: client.to_string(),
                metric_name: metric_name.to_string(),
            },
        }
    }
}
