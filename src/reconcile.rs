//! Reconciliation state machine
//!
//! Interprets one lifecycle event against the declarative target
//! configuration and executes the ordered set of provisioning actions.
//! Every configured sub-action appends exactly one outcome to the execution
//! ledger; a sub-action whose precondition is missing records a failure, it
//! is never silently skipped. No error crosses a step boundary - failures
//! are logged and reduced to the step's boolean outcome.
//!
//! Ordering invariants: the alert destination is ensured before the monitor
//! (the monitor payload needs a destination id); a requested migration fully
//! resolves before the dashboard steps observe the target index; the index
//! pattern is ensured before the dashboard.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::client::{index_exists, ClusterClient};
use crate::config::{AlertDestinationSpec, MonitorSpec, TargetConfiguration};
use crate::event::{LifecycleEvent, RequestKind};
use crate::ledger::{ExecutionLedger, Step};
use crate::migrate::{migrate, BackoffPolicy};
use crate::TEMPORARY_INDEX_SUFFIX;

/// Shared dependencies for one reconciliation pass
pub struct Context {
    /// Cluster client the pass issues operations through
    pub client: Arc<dyn ClusterClient>,
    /// Backoff policy for reindex migrations
    pub backoff: BackoffPolicy,
}

impl Context {
    /// Context with the default migration backoff
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self {
            client,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Override the migration backoff (primarily for testing)
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Reconcile one lifecycle event into an execution ledger
///
/// - **Create**: destination, document purge, monitor, two-phase remap,
///   index pattern + dashboard - each only when configured
/// - **Update**: same, but with update semantics for destination, pattern
///   and dashboard, monitor update-in-place by resolved id, and no remap
///   (re-mapping is Create-only)
/// - **Delete**: single successful step, no cluster calls; resources are
///   intentionally left in place
/// - anything else: single failed step, no side effects
#[instrument(skip_all, fields(kind = %event.kind()))]
pub async fn reconcile(event: &LifecycleEvent, ctx: &Context) -> ExecutionLedger {
    match event.kind() {
        RequestKind::Delete => {
            info!("delete requested; cluster resources are left in place");
            let mut ledger = ExecutionLedger::new();
            ledger.pass(Step::Lifecycle);
            ledger
        }
        RequestKind::Unknown => {
            warn!("unrecognized request type");
            ExecutionLedger::single_failure(Step::Lifecycle, "unrecognized request type")
        }
        kind => {
            let config = match TargetConfiguration::from_event(event) {
                Ok(config) => config,
                Err(e) => {
                    warn!(error = %e, "configuration parse failed");
                    return ExecutionLedger::single_failure(Step::ParseConfiguration, e.to_string());
                }
            };
            apply(kind == RequestKind::Update, &config, ctx).await
        }
    }
}

/// Steps a reconciliation pass would execute for this event, in order
///
/// Used by the CLI's dry-run mode; performs no cluster calls.
pub fn planned_steps(kind: RequestKind, config: Option<&TargetConfiguration>) -> Vec<Step> {
    match (kind, config) {
        (RequestKind::Delete | RequestKind::Unknown, _) => vec![Step::Lifecycle],
        (_, None) => vec![Step::ParseConfiguration],
        (kind, Some(config)) => {
            let mut steps = Vec::new();
            if config.alert.is_some() {
                steps.push(Step::AlertDestination);
            }
            if config.document_delete_range.is_some() {
                steps.push(Step::DocumentPurge);
            }
            if config.monitor.is_some() {
                steps.push(Step::Monitor);
            }
            if kind == RequestKind::Create && config.mappings.is_some() {
                steps.push(Step::Remap);
            }
            if config.initialize_dashboard {
                steps.push(Step::Dashboard);
            }
            steps
        }
    }
}

async fn apply(update: bool, config: &TargetConfiguration, ctx: &Context) -> ExecutionLedger {
    let client = ctx.client.as_ref();
    let mut ledger = ExecutionLedger::new();

    if let Some(alert) = &config.alert {
        let outcome = ensure_destination(client, alert, update).await;
        record(&mut ledger, Step::AlertDestination, outcome);
    }

    if let Some(range) = &config.document_delete_range {
        let outcome = purge_documents(client, &config.index, range).await;
        record(&mut ledger, Step::DocumentPurge, outcome);
    }

    if let Some(monitor) = &config.monitor {
        let outcome = ensure_monitor(client, config, monitor, update).await;
        record(&mut ledger, Step::Monitor, outcome);
    }

    // Re-mapping is Create-only; an Update never re-runs a migration.
    if !update {
        if let Some(mappings) = &config.mappings {
            let outcome = remap(client, &config.index, mappings, &ctx.backoff).await;
            record(&mut ledger, Step::Remap, outcome);
        }
    }

    if config.initialize_dashboard {
        let outcome = ensure_dashboard(client, &config.index, update).await;
        record(&mut ledger, Step::Dashboard, outcome);
    }

    ledger
}

fn record(ledger: &mut ExecutionLedger, step: Step, outcome: Result<(), String>) {
    match outcome {
        Ok(()) => {
            info!(step = %step, "step succeeded");
            ledger.pass(step);
        }
        Err(detail) => {
            warn!(step = %step, detail = %detail, "step failed");
            ledger.fail(step, detail);
        }
    }
}

/// Ensure the alerting destination exists; an existing destination with the
/// configured name satisfies the step (creation is append-only, identities
/// are never reused across distinct names)
async fn ensure_destination(
    client: &dyn ClusterClient,
    alert: &AlertDestinationSpec,
    update: bool,
) -> Result<(), String> {
    match client.find_destination(&alert.name).await {
        Ok(Some(existing)) => {
            debug!(id = %existing.id, "destination already exists");
            Ok(())
        }
        Ok(None) => client
            .create_destination(alert, update)
            .await
            .map_err(|e| format!("create destination: {e}")),
        Err(e) => Err(format!("destination lookup: {e}")),
    }
}

async fn purge_documents(
    client: &dyn ClusterClient,
    index: &str,
    range: &Value,
) -> Result<(), String> {
    if index.is_empty() {
        return Err("no target index configured".to_string());
    }
    client
        .delete_documents(index, range)
        .await
        .map_err(|e| format!("delete documents: {e}"))
}

/// Ensure the query monitor; on update the existing monitor id is resolved
/// first so the write updates in place instead of creating a duplicate
async fn ensure_monitor(
    client: &dyn ClusterClient,
    config: &TargetConfiguration,
    monitor: &MonitorSpec,
    update: bool,
) -> Result<(), String> {
    if config.index.is_empty() {
        return Err("no target index configured".to_string());
    }
    let alert_name = config
        .sns_alert_name
        .as_deref()
        .ok_or_else(|| "no alert destination name configured".to_string())?;

    let destination_id = match client.find_destination(alert_name).await {
        Ok(Some(destination)) => destination.id,
        Ok(None) => return Err(format!("destination '{alert_name}' not found")),
        Err(e) => return Err(format!("destination lookup: {e}")),
    };

    let monitor_id = if update {
        match client.find_monitor(&monitor.name).await {
            Ok(hit) => hit.map(|h| h.id),
            Err(e) => {
                warn!(error = %e, "monitor lookup failed, writing as a new monitor");
                None
            }
        }
    } else {
        None
    };

    client
        .put_monitor(monitor, &config.index, &destination_id, monitor_id.as_deref())
        .await
        .map_err(|e| format!("put monitor: {e}"))
}

/// Two-phase remap: `index -> index_temporary`, then back with the new
/// mappings applied. A failed first hop skips the second.
async fn remap(
    client: &dyn ClusterClient,
    index: &str,
    mappings: &Value,
    backoff: &BackoffPolicy,
) -> Result<(), String> {
    if index.is_empty() {
        return Err("no target index configured".to_string());
    }
    let temporary = format!("{index}{TEMPORARY_INDEX_SUFFIX}");

    migrate(client, index, &temporary, None, backoff)
        .await
        .map_err(|e| format!("migration to '{temporary}': {e}"))?;
    migrate(client, &temporary, index, Some(mappings), backoff)
        .await
        .map_err(|e| format!("migration back to '{index}': {e}"))
}

/// Ensure the index pattern, then the dashboard
///
/// The dashboard is written only when the target index exists, the pattern
/// exists, and (on create) no dashboard of that title exists yet. The
/// pattern write's outcome surfaces through the re-check; the sub-action
/// contributes exactly one ledger entry.
async fn ensure_dashboard(
    client: &dyn ClusterClient,
    index: &str,
    update: bool,
) -> Result<(), String> {
    if index.is_empty() {
        return Err("no target index configured".to_string());
    }
    let pattern_id = pattern_id(index);

    let existing = client.get_index_pattern(&pattern_id).await.ok().flatten();
    if existing.as_deref() != Some(pattern_id.as_str()) {
        if let Err(e) = client.put_index_pattern(&pattern_id, index, update).await {
            warn!(error = %e, "index pattern write failed");
        }
    }

    if !index_exists(client, index).await.unwrap_or(false) {
        return Err(format!("index '{index}' does not exist"));
    }

    let pattern_present = matches!(
        client.get_index_pattern(&pattern_id).await,
        Ok(Some(ref id)) if *id == pattern_id
    );
    if !pattern_present {
        return Err(format!("index pattern '{pattern_id}' does not exist"));
    }

    if !update {
        match client.get_dashboard(index).await {
            Ok(None) => {}
            Ok(Some(_)) => {
                debug!("dashboard already exists");
                return Ok(());
            }
            Err(e) => return Err(format!("dashboard lookup: {e}")),
        }
    }

    client
        .put_dashboard(index, update)
        .await
        .map_err(|e| format!("put dashboard: {e}"))
}

/// Saved-object id for an index's pattern: wildcards stripped, trailing
/// separators trimmed (`logs-*` -> `logs`)
fn pattern_id(index: &str) -> String {
    index.replace('*', "").trim_end_matches(['-', '_']).to_string()
}
