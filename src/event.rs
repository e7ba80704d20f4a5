//! Lifecycle event envelope
//!
//! The deployment tool delivers one JSON event per invocation. The envelope
//! carries the request kind, a flat string-typed property bag, and - when the
//! invocation originates from a stack deployment - the callback coordinates
//! for the acknowledgment PUT.

use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Kind of lifecycle request issued by the deployment tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Provision the configured resources
    Create,
    /// Re-apply configuration with update semantics
    Update,
    /// Resource removal; cluster resources are intentionally left in place
    Delete,
    /// Anything else; reconciliation reports a single failed step
    Unknown,
}

impl RequestKind {
    fn from_wire(raw: Option<&str>) -> Self {
        match raw {
            Some("Create") => Self::Create,
            Some("Update") => Self::Update,
            Some("Delete") => Self::Delete,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Callback coordinates present when the event was issued by a stack
/// deployment (signaled by `StackId` on the envelope)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackContext {
    /// Pre-signed URL the acknowledgment is PUT to
    pub response_url: String,
    /// Stack identifier, echoed back verbatim
    pub stack_id: String,
    /// Request identifier, echoed back verbatim
    pub request_id: String,
    /// Logical resource identifier, echoed back verbatim
    pub logical_id: String,
}

/// One inbound lifecycle event; immutable for the duration of the invocation
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleEvent {
    #[serde(rename = "RequestType", default)]
    request_type: Option<String>,

    /// Flat property bag driving the target configuration
    #[serde(rename = "ResourceProperties", default)]
    pub properties: Map<String, Value>,

    #[serde(rename = "StackId", default)]
    stack_id: Option<String>,

    #[serde(rename = "RequestId", default)]
    request_id: Option<String>,

    #[serde(rename = "LogicalResourceId", default)]
    logical_id: Option<String>,

    #[serde(rename = "ResponseURL", default)]
    response_url: Option<String>,

    /// Physical id assigned on a previous pass; present on Update/Delete
    #[serde(rename = "PhysicalResourceId", default)]
    pub physical_resource_id: Option<String>,
}

impl LifecycleEvent {
    /// Kind of this event
    pub fn kind(&self) -> RequestKind {
        RequestKind::from_wire(self.request_type.as_deref())
    }

    /// Look up a string property, trimmed; `None` when absent or not a string
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
    }

    /// Stack callback context, present only when invoked by a stack
    /// deployment (all four coordinates must be on the envelope)
    pub fn stack(&self) -> Option<StackContext> {
        Some(StackContext {
            response_url: self.response_url.clone()?,
            stack_id: self.stack_id.clone()?,
            request_id: self.request_id.clone()?,
            logical_id: self.logical_id.clone()?,
        })
    }
}
