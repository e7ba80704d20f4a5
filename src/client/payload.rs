//! Fixed-shape JSON payloads for the cluster's administrative surface
//!
//! The provisioner assembles configuration payloads; it does not implement
//! the query language. Shapes here mirror the cluster's documented wire
//! formats exactly.

use serde_json::{json, Value};

use crate::config::{AlertDestinationSpec, MonitorSpec};

/// Settings applied to every index we create
const DEFAULT_SHARDS: u32 = 1;
const DEFAULT_REPLICAS: u32 = 1;

/// Body for `PUT <index>`
pub fn index_settings(mappings: Option<&Value>) -> Value {
    json!({
        "settings": {
            "index": {
                "number_of_shards": DEFAULT_SHARDS,
                "number_of_replicas": DEFAULT_REPLICAS,
            }
        },
        "mappings": mappings.cloned().unwrap_or_else(|| json!({})),
    })
}

/// Body for `POST _reindex`
pub fn reindex(source: &str, destination: &str) -> Value {
    json!({
        "source": { "index": source },
        "dest": { "index": destination },
    })
}

/// Body for `POST <index>/_delete_by_query`
pub fn delete_by_query(range: &Value) -> Value {
    json!({
        "query": { "range": range }
    })
}

/// Body for `POST/PUT _plugins/_alerting/destinations`
pub fn destination(spec: &AlertDestinationSpec) -> Value {
    json!({
        "name": spec.name,
        "type": "sns",
        "sns": {
            "topic_arn": spec.topic_arn,
            "role_arn": spec.role_arn,
        }
    })
}

/// Body for `GET _plugins/_alerting/monitors/_search`
pub fn monitor_search(name: &str) -> Value {
    json!({
        "query": { "match": { "monitor.name": name } }
    })
}

/// Body for `POST/PUT _plugins/_alerting/monitors[/<id>]`
///
/// A query-level monitor: a scheduled search over the target index with a
/// time-range plus terms filter, and a single painless-conditioned trigger
/// whose action delivers to the given destination.
pub fn monitor(spec: &MonitorSpec, index: &str, destination_id: &str) -> Value {
    // The range filter is keyed by the configured date field, which json!
    // cannot express as a literal key.
    let mut range_filter = serde_json::Map::new();
    range_filter.insert(
        spec.range_field.clone(),
        json!({
            "gte": spec.range_from,
            "lt": spec.range_to,
            "include_lower": "true",
            "include_upper": "true",
            "format": "epoch_millis",
        }),
    );

    json!({
        "type": "monitor",
        "name": spec.name,
        "monitor_type": "query_level_monitor",
        "enabled": "true",
        "schedule": {
            "period": {
                "interval": spec.interval,
                "unit": spec.unit,
            }
        },
        "inputs": [{
            "search": {
                "indices": [index],
                "query": {
                    "size": 0,
                    "query": {
                        "bool": {
                            "filter": [{
                                "range": Value::Object(range_filter),
                            }, {
                                "terms": spec.query_terms,
                            }]
                        }
                    },
                    "aggregations": {},
                }
            }
        }],
        "triggers": [{
            "name": spec.name,
            "severity": "1",
            "condition": {
                "script": {
                    "source": spec.condition,
                    "lang": "painless",
                }
            },
            "actions": [{
                "name": spec.name,
                "destination_id": destination_id,
                "message_template": { "source": spec.trigger_message },
                "throttle_enabled": "false",
                "subject_template": { "source": spec.trigger_subject },
            }]
        }]
    })
}

/// Body for the saved-object endpoints (index patterns and dashboards)
pub fn saved_object(title: &str) -> Value {
    json!({
        "attributes": { "title": title }
    })
}
