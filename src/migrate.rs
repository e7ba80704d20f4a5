//! Reindex migration with convergence polling
//!
//! Changing an index's schema safely requires copying its documents into a
//! freshly created index and verifying the copy before the old index is
//! deleted. The cluster performs the copy server-side and asynchronously, so
//! the migrator polls document counts with a bounded quadratic backoff until
//! they converge.
//!
//! The engine composes two migrations into a rename cycle
//! (`index -> index_temporary -> index`, mappings applied on the second hop)
//! so the original name never disappears, at the cost of two full copies.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::client::{document_count, ClusterClient};
use crate::error::Error;
use crate::{DEFAULT_BACKOFF_BASE_SECS, DEFAULT_REINDEX_ATTEMPTS};

/// Bounded backoff for the convergence poll
///
/// Attempt `i` (1-indexed) sleeps `base * i * i` before the next poll. The
/// quadratic growth tolerates large reindex jobs without guessing a fixed
/// timeout; there is deliberately no jitter, the total wait is a specified
/// quantity.
#[derive(Clone, Debug)]
pub struct BackoffPolicy {
    /// Maximum number of count comparisons before giving up
    pub max_attempts: u32,
    /// Base unit the quadratic delay multiplies
    pub base: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_REINDEX_ATTEMPTS,
            base: Duration::from_secs(DEFAULT_BACKOFF_BASE_SECS),
        }
    }
}

impl BackoffPolicy {
    /// Policy with a custom attempt bound and the default base unit
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Delay slept after attempt `attempt` (1-indexed)
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base * attempt.saturating_mul(attempt)
    }
}

/// Copy `source` into a newly created `destination` and delete `source` once
/// the document counts converge
///
/// Steps: capture the source count, create the destination with the given
/// mappings, submit the server-side reindex, then poll the destination count
/// up to `policy.max_attempts` times, sleeping `policy.delay(i)` between
/// attempts (never after the last one).
///
/// The source index is deleted only on verified convergence. On exhaustion
/// both indices are left in place - losing data is worse than leaving a
/// stray index behind.
///
/// # Errors
///
/// - [`Error::MissingSourceIndex`] when the source has no observable
///   document count; an absent source is a failed precondition, not a
///   trivially converged migration
/// - [`Error::ConvergenceTimeout`] when the attempt budget runs out
/// - any client error from index creation, reindex submission, or the
///   final source deletion
#[instrument(skip(client, mappings, policy))]
pub async fn migrate(
    client: &dyn ClusterClient,
    source: &str,
    destination: &str,
    mappings: Option<&Value>,
    policy: &BackoffPolicy,
) -> Result<(), Error> {
    let old_count = document_count(client, source)
        .await?
        .ok_or_else(|| Error::MissingSourceIndex(source.to_string()))?;

    info!(old_count, "starting reindex migration");
    client.create_index(destination, mappings).await?;
    client.start_reindex(source, destination).await?;

    for attempt in 1..=policy.max_attempts {
        // A failed count read is indistinguishable from "not converged yet";
        // the attempt budget bounds how long we keep looking.
        let new_count = match document_count(client, destination).await {
            Ok(count) => count,
            Err(e) => {
                warn!(attempt, error = %e, "count poll failed");
                None
            }
        };

        if new_count == Some(old_count) {
            info!(attempt, count = old_count, "counts converged, deleting source index");
            client.delete_index(source).await?;
            return Ok(());
        }

        debug!(attempt, ?new_count, expected = old_count, "counts not converged");
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.delay(attempt)).await;
        }
    }

    warn!(
        attempts = policy.max_attempts,
        "migration did not converge; source index preserved"
    );
    Err(Error::ConvergenceTimeout {
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{CatIndex, MockClusterClient};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn rows(pairs: &[(&str, Option<u64>)]) -> Vec<CatIndex> {
        pairs
            .iter()
            .map(|(index, docs_count)| CatIndex {
                index: (*index).to_string(),
                docs_count: *docs_count,
            })
            .collect()
    }

    /// Catalog that reports the destination catching up over successive
    /// polls: absent, partial, converged.
    fn converging_catalog(calls: Arc<AtomicU32>) -> impl Fn() -> Result<Vec<CatIndex>, Error> {
        move || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            Ok(match call {
                // Initial source count read
                0 => rows(&[("logs-app", Some(120))]),
                // Poll 1: destination not visible yet
                1 => rows(&[("logs-app", Some(120))]),
                // Poll 2: copy in flight
                2 => rows(&[("logs-app", Some(120)), ("logs-app_temporary", Some(60))]),
                // Poll 3 and later: converged
                _ => rows(&[("logs-app", Some(120)), ("logs-app_temporary", Some(120))]),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn converges_and_deletes_source() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut mock = MockClusterClient::new();
        mock.expect_cat_indices()
            .returning(converging_catalog(calls.clone()));
        mock.expect_create_index()
            .withf(|name, mappings| name == "logs-app_temporary" && mappings.is_none())
            .times(1)
            .returning(|_, _| Ok(()));
        mock.expect_start_reindex()
            .withf(|s, d| s == "logs-app" && d == "logs-app_temporary")
            .times(1)
            .returning(|_, _| Ok(()));
        mock.expect_delete_index()
            .withf(|name| name == "logs-app")
            .times(1)
            .returning(|_| Ok(()));

        let started = tokio::time::Instant::now();
        let policy = BackoffPolicy::with_max_attempts(5);
        migrate(&mock, "logs-app", "logs-app_temporary", None, &policy)
            .await
            .expect("migration should converge");

        // Converged at attempt 3: slept after attempts 1 and 2 only
        assert_eq!(started.elapsed(), Duration::from_secs(1 + 4));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_preserves_both_indices() {
        let mut mock = MockClusterClient::new();
        let polls = Arc::new(AtomicU32::new(0));
        let polls_seen = polls.clone();
        mock.expect_cat_indices().returning(move || {
            polls_seen.fetch_add(1, Ordering::SeqCst);
            // Destination never catches up
            Ok(rows(&[
                ("logs-app", Some(120)),
                ("logs-app_temporary", Some(40)),
            ]))
        });
        mock.expect_create_index().returning(|_, _| Ok(()));
        mock.expect_start_reindex().returning(|_, _| Ok(()));
        // delete_index must never run: no expectation is set for it

        let started = tokio::time::Instant::now();
        let policy = BackoffPolicy::with_max_attempts(4);
        let err = migrate(&mock, "logs-app", "logs-app_temporary", None, &policy)
            .await
            .expect_err("migration should time out");

        assert!(matches!(err, Error::ConvergenceTimeout { attempts: 4 }));
        // Initial read plus exactly max_attempts polls
        assert_eq!(polls.load(Ordering::SeqCst), 1 + 4);
        // Slept 1 + 4 + 9 seconds; no sleep after the final attempt
        assert_eq!(started.elapsed(), Duration::from_secs(1 + 4 + 9));
    }

    #[tokio::test]
    async fn absent_source_is_a_precondition_failure() {
        let mut mock = MockClusterClient::new();
        mock.expect_cat_indices()
            .times(1)
            .returning(|| Ok(rows(&[("other-index", Some(7))])));
        // Neither create_index nor start_reindex may run

        let err = migrate(
            &mock,
            "logs-app",
            "logs-app_temporary",
            None,
            &BackoffPolicy::with_max_attempts(3),
        )
        .await
        .expect_err("absent source must fail");

        assert!(matches!(err, Error::MissingSourceIndex(ref idx) if idx == "logs-app"));
    }

    #[tokio::test]
    async fn zero_counts_are_a_real_convergence() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();
        let mut mock = MockClusterClient::new();
        mock.expect_cat_indices().returning(move || {
            let call = calls_in.fetch_add(1, Ordering::SeqCst);
            Ok(if call == 0 {
                rows(&[("empty-index", Some(0))])
            } else {
                rows(&[("empty-index", Some(0)), ("empty-index_temporary", Some(0))])
            })
        });
        mock.expect_create_index().returning(|_, _| Ok(()));
        mock.expect_start_reindex().returning(|_, _| Ok(()));
        mock.expect_delete_index()
            .withf(|name| name == "empty-index")
            .times(1)
            .returning(|_| Ok(()));

        migrate(
            &mock,
            "empty-index",
            "empty-index_temporary",
            None,
            &BackoffPolicy::with_max_attempts(2),
        )
        .await
        .expect("an empty index still migrates");
    }

    #[tokio::test(start_paused = true)]
    async fn count_poll_errors_count_against_the_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();
        let mut mock = MockClusterClient::new();
        mock.expect_cat_indices().returning(move || {
            let call = calls_in.fetch_add(1, Ordering::SeqCst);
            match call {
                0 => Ok(rows(&[("logs-app", Some(10))])),
                // First poll: cluster hiccup
                1 => Err(Error::Rejected { status: 503 }),
                _ => Ok(rows(&[("logs-app", Some(10)), ("logs-app_temporary", Some(10))])),
            }
        });
        mock.expect_create_index().returning(|_, _| Ok(()));
        mock.expect_start_reindex().returning(|_, _| Ok(()));
        mock.expect_delete_index().times(1).returning(|_| Ok(()));

        migrate(
            &mock,
            "logs-app",
            "logs-app_temporary",
            None,
            &BackoffPolicy::with_max_attempts(3),
        )
        .await
        .expect("should recover on the next poll");
    }

    #[test]
    fn delay_grows_quadratically() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
        assert_eq!(policy.delay(3), Duration::from_secs(9));
        assert_eq!(policy.max_attempts, DEFAULT_REINDEX_ATTEMPTS);
    }
}
