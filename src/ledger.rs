//! Per-step execution ledger
//!
//! One reconciliation pass accumulates an ordered sequence of step records;
//! the aggregate rule is all-true. Records carry an optional detail string so
//! a failed pass is diagnosable from the log without changing the aggregate
//! contract. The ledger lives for exactly one invocation and is consumed
//! once by the responder.

use std::fmt;

/// Identity of one reconciliation sub-action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Typed parse of the event's property bag
    ParseConfiguration,
    /// Ensure the alerting destination exists
    AlertDestination,
    /// Purge documents matching the configured range
    DocumentPurge,
    /// Ensure the query monitor exists (create or update-in-place)
    Monitor,
    /// Two-phase reindex migration applying new field mappings
    Remap,
    /// Ensure index pattern and dashboard
    Dashboard,
    /// Lifecycle bookkeeping with no cluster side effects (Delete, or an
    /// unrecognized request kind)
    Lifecycle,
}

impl Step {
    /// Stable name used in logs and summaries
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParseConfiguration => "parse-configuration",
            Self::AlertDestination => "alert-destination",
            Self::DocumentPurge => "document-purge",
            Self::Monitor => "monitor",
            Self::Remap => "remap",
            Self::Dashboard => "dashboard",
            Self::Lifecycle => "lifecycle",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one sub-action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    /// Which sub-action ran (or was found to have a failed precondition)
    pub step: Step,
    /// Whether the sub-action succeeded
    pub ok: bool,
    /// Free-text context for the log, typically the failure reason
    pub detail: Option<String>,
}

/// Ordered sequence of step outcomes for one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionLedger {
    records: Vec<StepRecord>,
}

impl ExecutionLedger {
    /// Empty ledger for a new pass
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger holding a single failed record; used when the pass cannot
    /// start at all (e.g. the property bag failed its parse)
    pub fn single_failure(step: Step, detail: impl Into<String>) -> Self {
        let mut ledger = Self::new();
        ledger.fail(step, detail);
        ledger
    }

    /// Record a successful step
    pub fn pass(&mut self, step: Step) {
        self.records.push(StepRecord {
            step,
            ok: true,
            detail: None,
        });
    }

    /// Record a failed step with its reason
    pub fn fail(&mut self, step: Step, detail: impl Into<String>) {
        self.records.push(StepRecord {
            step,
            ok: false,
            detail: Some(detail.into()),
        });
    }

    /// Record an outcome computed elsewhere
    pub fn record(&mut self, step: Step, ok: bool, detail: Option<String>) {
        self.records.push(StepRecord { step, ok, detail });
    }

    /// Aggregate success rule: every recorded step succeeded
    ///
    /// An empty ledger aggregates to success (a pass where no sub-action was
    /// configured has nothing to fail).
    pub fn succeeded(&self) -> bool {
        self.records.iter().all(|r| r.ok)
    }

    /// The recorded steps, in execution order
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Number of recorded steps
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no step was recorded
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
