//! Outbound lifecycle acknowledgment
//!
//! Stack-issued events carry a pre-signed callback URL; the deployment tool
//! blocks the rollout until a status document is PUT there. The callback PUT
//! deliberately sends an empty content type - the pre-signed URL's signature
//! does not cover one, and a JSON content type is rejected.
//!
//! Direct invocations (no stack coordinates on the envelope) produce no
//! callback; the process exit code carries the outcome instead.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::Error;
use crate::event::{LifecycleEvent, StackContext};
use crate::ledger::ExecutionLedger;

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(30);

/// Aggregate outcome reported to the deployment tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    /// Every recorded step succeeded
    #[serde(rename = "SUCCESS")]
    Success,
    /// At least one step failed
    #[serde(rename = "FAILED")]
    Failed,
}

/// Status document PUT to the callback URL
///
/// Field names follow the deployment tool's wire format; the stack
/// coordinates are echoed back verbatim so the tool can correlate the
/// acknowledgment with the pending resource.
#[derive(Debug, Serialize)]
pub struct Acknowledgment {
    /// Aggregate outcome of the reconciliation pass
    #[serde(rename = "Status")]
    pub status: Status,
    /// Human-readable summary, pointing at the failed steps when any
    #[serde(rename = "Reason")]
    pub reason: String,
    /// Stable physical identity of the resource
    #[serde(rename = "PhysicalResourceId")]
    pub physical_resource_id: String,
    /// Echoed stack identifier
    #[serde(rename = "StackId")]
    pub stack_id: String,
    /// Echoed request identifier
    #[serde(rename = "RequestId")]
    pub request_id: String,
    /// Echoed logical resource identifier
    #[serde(rename = "LogicalResourceId")]
    pub logical_resource_id: String,
    /// The outcome is not sensitive; never masked
    #[serde(rename = "NoEcho")]
    pub no_echo: bool,
    /// Per-step outcomes, keyed by step name
    #[serde(rename = "Data")]
    pub data: BTreeMap<String, bool>,
}

impl Acknowledgment {
    /// Reduce a ledger to the status document for one stack invocation
    ///
    /// The physical resource id is carried over from the previous pass when
    /// the envelope has one; a first Create falls back to the logical id so
    /// the identity stays stable across subsequent updates.
    pub fn from_ledger(
        event: &LifecycleEvent,
        stack: &StackContext,
        ledger: &ExecutionLedger,
    ) -> Self {
        let status = if ledger.succeeded() {
            Status::Success
        } else {
            Status::Failed
        };

        let failed: Vec<&str> = ledger
            .records()
            .iter()
            .filter(|r| !r.ok)
            .map(|r| r.step.as_str())
            .collect();
        let reason = if failed.is_empty() {
            "reconciliation succeeded".to_string()
        } else {
            format!("failed steps: {}", failed.join(", "))
        };

        let data = ledger
            .records()
            .iter()
            .map(|r| (r.step.as_str().to_string(), r.ok))
            .collect();

        Self {
            status,
            reason,
            physical_resource_id: event
                .physical_resource_id
                .clone()
                .unwrap_or_else(|| stack.logical_id.clone()),
            stack_id: stack.stack_id.clone(),
            request_id: stack.request_id.clone(),
            logical_resource_id: stack.logical_id.clone(),
            no_echo: false,
            data,
        }
    }
}

/// Delivers acknowledgments for stack-issued lifecycle events
pub struct LifecycleResponder {
    http: reqwest::Client,
}

impl LifecycleResponder {
    /// Build a responder with the callback timeout applied
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the underlying connection pool cannot be
    /// constructed.
    pub fn new() -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(CALLBACK_TIMEOUT)
            .build()?;
        Ok(Self { http })
    }

    /// Acknowledge one reconciliation pass
    ///
    /// Returns `Ok(true)` when a callback was delivered, `Ok(false)` when the
    /// event carries no stack coordinates and none was attempted.
    ///
    /// # Errors
    ///
    /// - [`Error::Serialization`] if the status document cannot be encoded
    /// - [`Error::Http`] on transport failure
    /// - [`Error::Rejected`] when the callback URL refuses the PUT
    #[instrument(skip_all, fields(status))]
    pub async fn acknowledge(
        &self,
        event: &LifecycleEvent,
        ledger: &ExecutionLedger,
    ) -> Result<bool, Error> {
        let Some(stack) = event.stack() else {
            debug!("no stack coordinates on the envelope, skipping callback");
            return Ok(false);
        };

        let acknowledgment = Acknowledgment::from_ledger(event, &stack, ledger);
        tracing::Span::current()
            .record("status", format!("{:?}", acknowledgment.status).as_str());

        let body = serde_json::to_string(&acknowledgment)
            .map_err(|e| Error::serialization(e.to_string()))?;

        let response = self
            .http
            .put(&stack.response_url)
            .header("content-type", "")
            .header("content-length", body.len().to_string())
            .body(body)
            .send()
            .await?;

        let http_status = response.status();
        if !http_status.is_success() {
            return Err(Error::rejected(http_status));
        }
        info!(request_id = %stack.request_id, "acknowledgment delivered");
        Ok(true)
    }
}
