//! Configuration Management
//!
//! Loads the services document (which resources to count and how) and
//! holds the runtime settings used to reach the service endpoints.
//!
//! Validation is permissive: a defective resource entry is logged and
//! skipped, it never prevents the other entries from being counted.

use crate::resource::definition::{
    ContinuationFields, CountingRule, FetchStrategy, GroupBy, IfExists, MetricTarget,
    ResourceConfig,
};
use crate::resource::path;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default services document name
pub const DEFAULT_SERVICES_FILE: &str = "services.json";

/// Default endpoint template
pub const DEFAULT_ENDPOINT: &str = "https://{service}.{region}.amazonaws.com/";

/// Defects in one resource entry of the services document
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("attribute {0} not found")]
    MissingAttribute(&'static str),

    #[error("type {found:?} not valid, expecting one of {expected:?}")]
    UnknownStrategy {
        found: String,
        expected: Vec<&'static str>,
    },

    #[error("attribute {0} not found, it is mandatory for type next-in-response")]
    MissingContinuation(&'static str),

    #[error("malformed entry: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Attribute name or list of names
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum AttributePath {
    One(String),
    Many(Vec<String>),
}

impl AttributePath {
    fn into_vec(self) -> Vec<String> {
        match self {
            AttributePath::One(s) if s.is_empty() => Vec::new(),
            AttributePath::One(s) => vec![s],
            AttributePath::Many(parts) => parts,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCall {
    client: Option<String>,
    method: Option<String>,
    #[serde(default)]
    kwargs: Map<String, Value>,
    iterate_over: Option<AttributePath>,
    next_in_response: Option<String>,
    next_in_request: Option<String>,
    must_exists: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGroupBy {
    element: Option<AttributePath>,
    /// Any scalar; compared against the rendered label
    #[serde(default)]
    values: Vec<Value>,
    capitalize: Option<bool>,
    custom_name: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIfExists {
    element: Option<AttributePath>,
    #[serde(default)]
    exists_suffix: String,
    #[serde(default)]
    not_exists_suffix: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCount {
    generate_total: Option<bool>,
    group_by: Option<RawGroupBy>,
    if_exists: Option<RawIfExists>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetric {
    namespace: Option<String>,
    dimension_name: Option<String>,
    dimension_value: Option<String>,
    metric_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawResource {
    #[serde(rename = "type")]
    kind: Option<String>,
    resource: Option<RawCall>,
    count: Option<RawCount>,
    metric: Option<RawMetric>,
}

/// Document-wide defaults applied to every resource entry
#[derive(Debug, Clone)]
struct Defaults {
    namespace: String,
    dimension_name: String,
}

/// Read and validate a services document (JSON, or YAML for `.yaml`/`.yml`)
pub fn load_services(path: &Path) -> Result<Vec<ResourceConfig>> {
    tracing::info!("Reading services file {:?}", path);
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read services file {}", path.display()))?;

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    let document: Value = if is_yaml {
        serde_yaml::from_str(&content).context("Failed to parse services YAML")?
    } else {
        serde_json::from_str(&content).context("Failed to parse services JSON")?
    };

    Ok(parse_services(document))
}

/// Validate a parsed services document, keeping only the valid entries
pub fn parse_services(document: Value) -> Vec<ResourceConfig> {
    let Value::Object(mut document) = document else {
        tracing::error!("Services document is not an object. Will ignore this file configuration.");
        return Vec::new();
    };

    for attribute in ["defaultNamespace", "defaultDimensionName", "resources"] {
        if !document.contains_key(attribute) {
            tracing::error!(
                "Attribute {} not found. Will ignore this file configuration.",
                attribute
            );
            return Vec::new();
        }
    }

    let text = |value: Option<Value>| match value {
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let defaults = Defaults {
        namespace: text(document.remove("defaultNamespace")),
        dimension_name: text(document.remove("defaultDimensionName")),
    };

    let Some(Value::Array(resources)) = document.remove("resources") else {
        tracing::error!("Attribute resources is not a list. Will ignore this file configuration.");
        return Vec::new();
    };

    resources
        .into_iter()
        .enumerate()
        .filter_map(|(position, entry)| {
            let index = position + 1;
            match parse_resource(entry, index, &defaults) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::error!(
                        "Resource #{}: {}. Will ignore this service configuration.",
                        index,
                        e
                    );
                    None
                }
            }
        })
        .collect()
}

fn parse_resource(
    entry: Value,
    index: usize,
    defaults: &Defaults,
) -> std::result::Result<ResourceConfig, ConfigError> {
    let raw: RawResource = serde_json::from_value(entry)?;

    let kind = raw.kind.ok_or(ConfigError::MissingAttribute("type"))?;
    let call = raw.resource.ok_or(ConfigError::MissingAttribute("resource"))?;
    let metric = raw.metric.ok_or(ConfigError::MissingAttribute("metric"))?;

    let strategy = FetchStrategy::from_tag(&kind).ok_or_else(|| ConfigError::UnknownStrategy {
        found: kind.to_lowercase(),
        expected: FetchStrategy::ALL.iter().map(|s| s.tag()).collect(),
    })?;

    let client = call.client.ok_or(ConfigError::MissingAttribute("client"))?;
    let method = call.method.ok_or(ConfigError::MissingAttribute("method"))?;
    let item_path = call
        .iterate_over
        .ok_or(ConfigError::MissingAttribute("iterateOver"))?
        .into_vec();

    let continuation = match (call.next_in_response, call.next_in_request) {
        (Some(response_field), Some(request_field)) => Some(ContinuationFields {
            response_field,
            request_field,
        }),
        (None, _) if strategy == FetchStrategy::NextToken => {
            return Err(ConfigError::MissingContinuation("nextInResponse"))
        }
        (_, None) if strategy == FetchStrategy::NextToken => {
            return Err(ConfigError::MissingContinuation("nextInRequest"))
        }
        _ => None,
    };

    let dimension_value = metric
        .dimension_value
        .ok_or(ConfigError::MissingAttribute("dimensionValue"))?;
    let metric_name = metric
        .metric_name
        .ok_or(ConfigError::MissingAttribute("metricName"))?;

    Ok(ResourceConfig {
        index,
        strategy,
        client,
        method,
        call_args: call.kwargs,
        item_path,
        require_item_path: call.must_exists.unwrap_or(true),
        continuation,
        counting: raw.count.map(counting_rule).unwrap_or_default(),
        metric: MetricTarget {
            namespace: metric.namespace.unwrap_or_else(|| defaults.namespace.clone()),
            dimension_name: metric
                .dimension_name
                .unwrap_or_else(|| defaults.dimension_name.clone()),
            dimension_value,
            metric_name,
        },
    })
}

/// Build the counting rule; a groupBy/ifExists without element is ignored
fn counting_rule(raw: RawCount) -> CountingRule {
    let group_by = raw.group_by.and_then(|g| {
        let path = g.element.map(AttributePath::into_vec).unwrap_or_default();
        (!path.is_empty()).then(|| GroupBy {
            path,
            allowed_values: g.values.iter().map(path::label_of).collect(),
            capitalize_label: g.capitalize.unwrap_or(true),
            use_custom_metric_name: g.custom_name.unwrap_or(true),
        })
    });

    let if_exists = raw.if_exists.and_then(|e| {
        let path = e.element.map(AttributePath::into_vec).unwrap_or_default();
        (!path.is_empty()).then(|| IfExists {
            path,
            exists_suffix: e.exists_suffix,
            not_exists_suffix: e.not_exists_suffix,
        })
    });

    CountingRule {
        generate_total: raw.generate_total.unwrap_or(true),
        group_by,
        if_exists,
    }
}

/// Runtime settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub region: String,
    /// Endpoint template with `{service}` and `{region}` placeholders
    pub endpoint: String,
    pub token: Option<String>,
    pub timeout: Duration,
    /// Number of resource configs fetched at the same time
    pub concurrency: usize,
    pub dry_run: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            timeout: Duration::from_secs(30),
            concurrency: 1,
            dry_run: false,
        }
    }
}

impl Settings {
    /// Resolve the endpoint URL of `service`
    pub fn endpoint_for(&self, service: &str) -> Result<String> {
        let url = self
            .endpoint
            .replace("{service}", service)
            .replace("{region}", &self.region);
        let parsed = Url::parse(&url).with_context(|| format!("Invalid endpoint for {}: {}", service, url))?;
        Ok(parsed.to_string())
    }
}
