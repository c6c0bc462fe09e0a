//! Counting rules
//!
//! Produces named counters from a flat item list. Counters are built in a
//! fixed order (total, group-by, if-exists) and merged in that order, so a
//! later counter replaces an earlier one that happens to share its name.

use super::MetricPoint;
use crate::resource::definition::{CountingRule, GroupBy, IfExists, MetricTarget, ResourceConfig};
use crate::resource::path;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Metric name -> count
pub type Counters = BTreeMap<String, u64>;

/// Count `items` following `rule`, naming counters after `metric_name`
pub fn aggregate(items: &[Value], rule: &CountingRule, metric_name: &str) -> Counters {
    let mut counters = Counters::new();

    if rule.generate_total {
        counters.insert(metric_name.to_string(), items.len() as u64);
    }

    if let Some(group_by) = &rule.group_by {
        counters.extend(count_group_by(items, group_by, metric_name));
    }

    if let Some(if_exists) = &rule.if_exists {
        counters.extend(count_if_exists(items, if_exists, metric_name));
    }

    counters
}

/// One counter per grouping value, or a single counter under the plain
/// metric name when custom names are off.
///
/// Items without a grouping value, or whose value is not in the allowed
/// list, are skipped.
fn count_group_by(items: &[Value], group_by: &GroupBy, metric_name: &str) -> Counters {
    let mut counters = Counters::new();

    for item in items {
        let Some(value) = path::lookup(item, &group_by.path) else {
            debug!("No {:?} in item, skipping", group_by.path);
            continue;
        };
        let label = path::label_of(value);

        if !group_by.allowed_values.is_empty() && !group_by.allowed_values.contains(&label) {
            debug!("Value {:?} not in {:?}, skipping", label, group_by.allowed_values);
            continue;
        }

        let name = if !group_by.use_custom_metric_name {
            metric_name.to_string()
        } else if group_by.capitalize_label {
            format!("{}-{}", metric_name, path::capitalize(&label))
        } else {
            format!("{}-{}", metric_name, label)
        };

        *counters.entry(name).or_insert(0) += 1;
    }

    counters
}

/// Two buckets: value present and truthy, or anything else
fn count_if_exists(items: &[Value], if_exists: &IfExists, metric_name: &str) -> Counters {
    let exists = format!("{}-{}", metric_name, if_exists.exists_suffix);
    let not_exists = format!("{}-{}", metric_name, if_exists.not_exists_suffix);
    let mut counters = Counters::new();

    for item in items {
        let present = path::lookup(item, &if_exists.path).is_some_and(path::is_truthy);
        let name = if present { &exists } else { &not_exists };
        *counters.entry(name.clone()).or_insert(0) += 1;
    }

    counters
}

/// Attach namespace, dimension and capture time to each counter
pub fn metric_points(
    counters: Counters,
    target: &MetricTarget,
    captured_at: DateTime<Utc>,
) -> Vec<MetricPoint> {
    counters
        .into_iter()
        .map(|(metric_name, value)| MetricPoint {
            namespace: target.namespace.clone(),
            dimension_name: target.dimension_name.clone(),
            dimension_value: target.dimension_value.clone(),
            metric_name,
            value,
            timestamp: captured_at,
        })
        .collect()
}

/// Count the items fetched for `config` and stamp them with the current time
pub fn collect_metrics(items: &[Value], config: &ResourceConfig) -> Vec<MetricPoint> {
    let counters = aggregate(items, &config.counting, &config.metric.metric_name);
    metric_points(counters, &config.metric, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn group_by(path: &[&str], allowed: &[&str], capitalize: bool, custom: bool) -> GroupBy {
        GroupBy {
            path: path.iter().map(|s| s.to_string()).collect(),
            allowed_values: allowed.iter().map(|s| s.to_string()).collect(),
            capitalize_label: capitalize,
            use_custom_metric_name: custom,
        }
    }

    fn if_exists(path: &[&str], exists: &str, not_exists: &str) -> IfExists {
        IfExists {
            path: path.iter().map(|s| s.to_string()).collect(),
            exists_suffix: exists.to_string(),
            not_exists_suffix: not_exists.to_string(),
        }
    }

    fn counters(pairs: &[(&str, u64)]) -> Counters {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_total_only() {
        let items = vec![json!({}), json!({}), json!({})];
        let result = aggregate(&items, &CountingRule::default(), "Buckets");
        assert_eq!(result, counters(&[("Buckets", 3)]));
    }

    #[test]
    fn test_group_by_capitalized_custom_names() {
        let items = vec![
            json!({"state": "active"}),
            json!({"state": "active"}),
            json!({"state": "stopped"}),
        ];
        let rule = CountingRule {
            generate_total: false,
            group_by: Some(group_by(&["state"], &[], true, true)),
            if_exists: None,
        };

        let result = aggregate(&items, &rule, "Instances");
        assert_eq!(result, counters(&[("Instances-Active", 2), ("Instances-Stopped", 1)]));
    }

    #[test]
    fn test_group_by_nested_path_without_capitalize() {
        let items = vec![
            json!({"State": {"Name": "running"}}),
            json!({"State": {"Name": "stopped"}}),
            json!({"State": {"Name": "running"}}),
            json!({"NoState": true}),
        ];
        let rule = CountingRule {
            generate_total: true,
            group_by: Some(group_by(&["State", "Name"], &[], false, true)),
            if_exists: None,
        };

        let result = aggregate(&items, &rule, "Instances");
        assert_eq!(
            result,
            counters(&[("Instances", 4), ("Instances-running", 2), ("Instances-stopped", 1)])
        );
    }

    #[test]
    fn test_allowed_values_filter_group_but_not_total() {
        let items = vec![
            json!({"Engine": "postgres"}),
            json!({"Engine": "mysql"}),
            json!({"Engine": "oracle-ee"}),
            json!({"Engine": "postgres"}),
        ];
        let rule = CountingRule {
            generate_total: true,
            group_by: Some(group_by(&["Engine"], &["postgres", "mysql"], true, true)),
            if_exists: None,
        };

        let result = aggregate(&items, &rule, "Databases");
        assert_eq!(
            result,
            counters(&[("Databases", 4), ("Databases-Mysql", 1), ("Databases-Postgres", 2)])
        );
    }

    #[test]
    fn test_group_by_without_custom_name_replaces_total() {
        let items = vec![
            json!({"Runtime": "python3.12"}),
            json!({"Runtime": "nodejs20.x"}),
            json!({"Runtime": "python3.12"}),
        ];
        let rule = CountingRule {
            generate_total: true,
            group_by: Some(group_by(&["Runtime"], &["python3.12"], true, false)),
            if_exists: None,
        };

        let result = aggregate(&items, &rule, "Functions");
        assert_eq!(result, counters(&[("Functions", 2)]));
    }

    #[test]
    fn test_group_by_non_string_values() {
        let items = vec![json!({"Port": 443}), json!({"Port": 80}), json!({"Port": 443})];
        let rule = CountingRule {
            generate_total: false,
            group_by: Some(group_by(&["Port"], &["443"], false, true)),
            if_exists: None,
        };

        let result = aggregate(&items, &rule, "Listeners");
        assert_eq!(result, counters(&[("Listeners-443", 2)]));
    }

    #[test]
    fn test_group_by_boolean_labels() {
        let items = vec![
            json!({"Encrypted": true}),
            json!({"Encrypted": false}),
            json!({"Encrypted": true}),
            json!({"Encrypted": null}),
        ];
        let rule = CountingRule {
            generate_total: false,
            group_by: Some(group_by(&["Encrypted"], &[], false, true)),
            if_exists: None,
        };

        let result = aggregate(&items, &rule, "Volumes");
        assert_eq!(result, counters(&[("Volumes-True", 2), ("Volumes-False", 1)]));
    }

    #[test]
    fn test_if_exists_uses_truthiness() {
        let items = vec![json!({"tags": {}}), json!({"tags": {"env": "prod"}})];
        let rule = CountingRule {
            generate_total: false,
            group_by: None,
            if_exists: Some(if_exists(&["tags"], "WithTags", "WithoutTags")),
        };

        let result = aggregate(&items, &rule, "Resource");
        assert_eq!(result, counters(&[("Resource-WithTags", 1), ("Resource-WithoutTags", 1)]));
    }

    #[test]
    fn test_if_exists_absent_empty_and_present() {
        let items = vec![
            json!({"KmsKeyId": "arn:aws:kms:key"}),
            json!({"KmsKeyId": ""}),
            json!({"KmsKeyId": null}),
            json!({}),
        ];
        let rule = CountingRule {
            generate_total: true,
            group_by: None,
            if_exists: Some(if_exists(&["KmsKeyId"], "Encrypted", "Unencrypted")),
        };

        let result = aggregate(&items, &rule, "Volumes");
        assert_eq!(
            result,
            counters(&[("Volumes", 4), ("Volumes-Encrypted", 1), ("Volumes-Unencrypted", 3)])
        );
    }

    #[test]
    fn test_group_by_and_if_exists_together() {
        let items = vec![
            json!({"Type": "gp3", "Encrypted": true}),
            json!({"Type": "gp2", "Encrypted": false}),
            json!({"Type": "gp3", "Encrypted": true}),
        ];
        let rule = CountingRule {
            generate_total: true,
            group_by: Some(group_by(&["Type"], &[], false, true)),
            if_exists: Some(if_exists(&["Encrypted"], "Encrypted", "Plain")),
        };

        let result = aggregate(&items, &rule, "Volumes");
        assert_eq!(
            result,
            counters(&[
                ("Volumes", 3),
                ("Volumes-gp2", 1),
                ("Volumes-gp3", 2),
                ("Volumes-Encrypted", 2),
                ("Volumes-Plain", 1),
            ])
        );
    }

    #[test]
    fn test_metric_points_carry_target_and_timestamp() {
        let target = MetricTarget {
            namespace: "Inventory".to_string(),
            dimension_name: "Account".to_string(),
            dimension_value: "prod".to_string(),
            metric_name: "Buckets".to_string(),
        };
        let captured_at = Utc::now();

        let points = metric_points(counters(&[("Buckets", 2)]), &target, captured_at);

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].namespace, "Inventory");
        assert_eq!(points[0].dimension_name, "Account");
        assert_eq!(points[0].dimension_value, "prod");
        assert_eq!(points[0].metric_name, "Buckets");
        assert_eq!(points[0].value, 2);
        assert_eq!(points[0].timestamp, captured_at);
    }
}
