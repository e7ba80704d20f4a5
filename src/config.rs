//! Target configuration
//!
//! The deployment tool hands us a flat, string-typed property bag. This
//! module performs the single validating parse step that turns it into a
//! typed [`TargetConfiguration`], failing fast with field-level errors
//! instead of deferring malformed-JSON discovery to first use.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::Error;
use crate::event::LifecycleEvent;

/// Default schedule interval for a query monitor
pub const DEFAULT_MONITOR_INTERVAL: u32 = 5;
/// Default schedule unit for a query monitor
pub const DEFAULT_MONITOR_UNIT: &str = "MINUTES";
/// Default painless trigger condition for a query monitor
pub const DEFAULT_MONITOR_CONDITION: &str = "ctx.results[0].hits.total.value > 5";

/// Alerting destination to ensure on the cluster (an SNS-backed sink)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertDestinationSpec {
    /// Destination name; lookups are by exact name
    pub name: String,
    /// SNS topic the destination delivers to
    pub topic_arn: String,
    /// Role assumed for delivery
    pub role_arn: String,
}

/// Query-level monitor to ensure on the cluster
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSpec {
    /// Monitor name; lookups are by exact name
    pub name: String,
    /// Schedule period interval
    pub interval: u32,
    /// Schedule period unit (e.g. MINUTES)
    pub unit: String,
    /// Painless source for the trigger condition
    pub condition: String,
    /// Document field the time-range filter applies to
    pub range_field: String,
    /// Inclusive lower bound of the time-range filter
    pub range_from: String,
    /// Exclusive upper bound of the time-range filter
    pub range_to: String,
    /// Terms filter applied alongside the time range
    pub query_terms: Value,
    /// Subject template for the trigger action
    pub trigger_subject: String,
    /// Message template for the trigger action
    pub trigger_message: String,
}

/// Typed projection of the event's property bag
///
/// Construction validates every field; a malformed property is an input
/// error for the invocation. Absent optional features parse to `None` and
/// the corresponding reconciliation step simply is not part of the pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetConfiguration {
    /// Cluster administrative endpoint URL
    pub endpoint: String,
    /// Region passed through to a fronting request-signing layer
    pub region: Option<String>,
    /// Target index name (lowercase; must not start with `-` or `_`)
    pub index: String,
    /// Request headers for cluster calls
    pub headers: BTreeMap<String, String>,
    /// Destination name used for monitor binding, independent of whether the
    /// full destination spec was supplied
    pub sns_alert_name: Option<String>,
    /// Full destination spec; present only when name, topic and role are all
    /// configured
    pub alert: Option<AlertDestinationSpec>,
    /// Monitor spec; present when a monitor name is configured
    pub monitor: Option<MonitorSpec>,
    /// Field mappings to apply through a two-phase remap
    pub mappings: Option<Value>,
    /// Whether to ensure an index pattern and dashboard
    pub initialize_dashboard: bool,
    /// Range filter for a document purge
    pub document_delete_range: Option<Value>,
    /// Whether verbose tracing was requested for this invocation
    pub tracing_enabled: bool,
}

impl TargetConfiguration {
    /// Build a configuration from the event's property bag
    ///
    /// # Errors
    ///
    /// Returns [`Error::Input`] when a property fails its typed parse:
    /// malformed JSON blobs, non-truthy boolean strings, non-numeric
    /// intervals, or an index name violating the naming rule.
    pub fn from_event(event: &LifecycleEvent) -> Result<Self, Error> {
        let prop = |key: &str| event.property(key).unwrap_or("");

        let index = prop("OpenSearchIndex").to_string();
        if !index.is_empty() {
            validate_index_name(&index)?;
        }

        let headers = parse_headers(event.property("Headers"))?;
        let mappings = parse_json_object("Mappings", event.property("Mappings"))?;
        let document_delete_range =
            parse_json_object("DocumentDeleteRange", event.property("DocumentDeleteRange"))?;

        // The misspelled wire key is part of the original template contract.
        let initialize_dashboard =
            parse_truthy("InitalizeDashboard", event.property("InitalizeDashboard"), true)?;
        let tracing_enabled =
            parse_truthy("TracingEnabled", event.property("TracingEnabled"), true)?;

        let sns_alert_name = non_empty(prop("SnsAlertName"));
        let sns_topic_arn = non_empty(prop("SnsTopicArn"));
        let sns_role_arn = non_empty(prop("SnsRoleArn"));
        let alert = match (&sns_alert_name, sns_topic_arn, sns_role_arn) {
            (Some(name), Some(topic_arn), Some(role_arn)) => Some(AlertDestinationSpec {
                name: name.clone(),
                topic_arn,
                role_arn,
            }),
            _ => None,
        };

        let monitor = match non_empty(prop("MonitorName")) {
            Some(name) => Some(parse_monitor(event, name)?),
            None => None,
        };

        Ok(Self {
            endpoint: prop("OpenSearchDomain").to_string(),
            region: non_empty(prop("Region")),
            index,
            headers,
            sns_alert_name,
            alert,
            monitor,
            mappings,
            initialize_dashboard,
            document_delete_range,
            tracing_enabled,
        })
    }
}

fn parse_monitor(event: &LifecycleEvent, name: String) -> Result<MonitorSpec, Error> {
    let prop = |key: &str, default: &str| {
        event
            .property(key)
            .filter(|v| !v.is_empty())
            .unwrap_or(default)
            .to_string()
    };

    let interval = match event.property("MonitorInterval").filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|e| Error::input(format!("MonitorInterval: {e}")))?,
        None => DEFAULT_MONITOR_INTERVAL,
    };

    let condition = prop("MonitorCondition", DEFAULT_MONITOR_CONDITION);
    let query_terms = parse_json_object("MonitorQueryTerms", event.property("MonitorQueryTerms"))?
        .unwrap_or_else(|| Value::Object(Default::default()));

    let default_message = format!(
        "Monitor detected {query_terms} satisfying {condition} within {interval}"
    );

    Ok(MonitorSpec {
        interval,
        unit: prop("MonitorUnit", DEFAULT_MONITOR_UNIT),
        range_field: prop("MonitorRangeField", "timestamp"),
        range_from: prop("MonitorRangeFrom", "now-1h"),
        range_to: prop("MonitorRangeTo", "now"),
        trigger_subject: prop("MonitorTriggerSubject", "Monitor Triggered"),
        trigger_message: prop("MonitorTriggerMessage", &default_message),
        condition,
        query_terms,
        name,
    })
}

/// Index names must be lowercase and must not start with `-` or `_`.
/// Violations are rejected, never auto-corrected.
fn validate_index_name(index: &str) -> Result<(), Error> {
    if index.starts_with('-') || index.starts_with('_') {
        return Err(Error::input(format!(
            "OpenSearchIndex: '{index}' must not start with '-' or '_'"
        )));
    }
    if index.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(Error::input(format!(
            "OpenSearchIndex: '{index}' must be lowercase"
        )));
    }
    Ok(())
}

/// Explicit truthy-string parse; the bag carries booleans as strings
fn parse_truthy(key: &str, raw: Option<&str>, default: bool) -> Result<bool, Error> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(Error::input(format!("{key}: '{other}' is not a boolean"))),
    }
}

/// Parse a JSON-object property; an absent value or empty object disables
/// the feature the object configures
fn parse_json_object(key: &str, raw: Option<&str>) -> Result<Option<Value>, Error> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| Error::input(format!("{key}: malformed JSON ({e})")))?;
    match &value {
        Value::Object(map) if map.is_empty() => Ok(None),
        Value::Object(_) => Ok(Some(value)),
        _ => Err(Error::input(format!("{key}: expected a JSON object"))),
    }
}

fn parse_headers(raw: Option<&str>) -> Result<BTreeMap<String, String>, Error> {
    let mut headers = BTreeMap::new();
    match parse_json_object("Headers", raw)? {
        Some(Value::Object(map)) => {
            for (k, v) in map {
                let v = v
                    .as_str()
                    .ok_or_else(|| Error::input(format!("Headers: value for '{k}' must be a string")))?;
                headers.insert(k, v.to_string());
            }
        }
        _ => {
            headers.insert("Content-Type".to_string(), "application/json".to_string());
        }
    }
    Ok(headers)
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
