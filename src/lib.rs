//! Osprey - lifecycle-driven configuration provisioner for managed OpenSearch domains
//!
//! Osprey interprets Create/Update/Delete lifecycle events issued by an
//! infrastructure-as-code deployment tool and reconciles the target domain's
//! configuration: indices, index patterns, dashboards, alerting destinations,
//! and query monitors.
//!
//! # Architecture
//!
//! A single reconciliation pass flows through four stages:
//! - the inbound [`event::LifecycleEvent`] is parsed into a typed
//!   [`config::TargetConfiguration`]
//! - [`reconcile`] runs the state machine for the event kind, issuing
//!   idempotent operations through the [`client::ClusterClient`] trait
//! - schema changes go through [`migrate`]'s reindex-migrate-verify-delete
//!   cycle with bounded quadratic backoff
//! - the per-step [`ledger::ExecutionLedger`] is reduced to the
//!   SUCCESS/FAILED acknowledgment delivered by [`respond`]
//!
//! Nothing persists beyond one invocation; the cluster itself is the only
//! durable store and is re-queried rather than cached.
//!
//! # Modules
//!
//! - [`event`] - Lifecycle event envelope and deployment-tool stack context
//! - [`config`] - Validating parse of the event's property bag
//! - [`client`] - Cluster administrative surface (trait + reqwest implementation)
//! - [`migrate`] - Reindex migration with convergence polling
//! - [`reconcile`] - The event-driven reconciliation state machine
//! - [`ledger`] - Typed per-step execution ledger
//! - [`respond`] - Outbound lifecycle acknowledgment
//! - [`error`] - Error types for the provisioner

#![deny(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod ledger;
pub mod migrate;
pub mod reconcile;
pub mod respond;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Default Configuration Constants
// =============================================================================

/// Default number of convergence-poll attempts for a reindex migration
///
/// Large indices can take a while to copy; the quadratic backoff between
/// attempts lets 15 attempts tolerate multi-minute reindex jobs without a
/// fixed timeout guess.
pub const DEFAULT_REINDEX_ATTEMPTS: u32 = 15;

/// Default base unit for the migration backoff (attempt `i` sleeps `i * i`
/// times this value)
pub const DEFAULT_BACKOFF_BASE_SECS: u64 = 1;

/// Suffix appended to an index name for the intermediate hop of a two-phase
/// remap (`index -> index_temporary -> index`)
pub const TEMPORARY_INDEX_SUFFIX: &str = "_temporary";
