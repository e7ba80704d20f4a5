//! Cluster administrative surface
//!
//! Every remote operation the engine can issue lives behind the
//! [`ClusterClient`] trait: stateless, idempotent calls against the search
//! cluster's administrative HTTP API. The trait allows mocking the cluster in
//! tests while [`HttpClusterClient`] talks to the real domain in production.
//!
//! Outcome contract for all callers: `Ok` on a 2xx answer,
//! [`Error::Rejected`](crate::Error::Rejected) on a non-success status,
//! [`Error::Http`](crate::Error::Http) on transport failure. Lookup
//! operations map an unsuccessful status to `Ok(None)` (absent); callers must
//! not assume partial payloads on failure.

mod http;
mod payload;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::Value;

use crate::config::{AlertDestinationSpec, MonitorSpec};
use crate::error::Error;

pub use http::{ClientConfig, HttpClusterClient};

/// One row of the cluster's index catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatIndex {
    /// Index name
    pub index: String,
    /// Document count; `None` when the cluster did not report one
    pub docs_count: Option<u64>,
}

/// Cluster-assigned identity of an alerting destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Cluster-assigned id
    pub id: String,
    /// Destination name
    pub name: String,
}

/// A monitor located by name search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorHit {
    /// Cluster-assigned monitor id; required for update-in-place
    pub id: String,
}

/// Idempotent operations against the cluster's administrative HTTP surface
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// List indices with their document counts (`GET _cat/indices`)
    async fn cat_indices(&self) -> Result<Vec<CatIndex>, Error>;

    /// Create an index, optionally with field mappings (`PUT <index>`)
    async fn create_index<'a>(&self, name: &str, mappings: Option<&'a Value>)
        -> Result<(), Error>;

    /// Delete an index (`DELETE <index>`)
    async fn delete_index(&self, name: &str) -> Result<(), Error>;

    /// Submit a server-side copy of all documents (`POST _reindex`)
    async fn start_reindex(&self, source: &str, destination: &str) -> Result<(), Error>;

    /// Delete documents matching a range filter
    /// (`POST <index>/_delete_by_query`)
    async fn delete_documents(&self, index: &str, range: &Value) -> Result<(), Error>;

    /// Look up an alerting destination by exact name
    async fn find_destination(&self, name: &str) -> Result<Option<Destination>, Error>;

    /// Create (or, with `update`, overwrite) an SNS alerting destination
    async fn create_destination(
        &self,
        spec: &AlertDestinationSpec,
        update: bool,
    ) -> Result<(), Error>;

    /// Search for a monitor by exact name
    async fn find_monitor(&self, name: &str) -> Result<Option<MonitorHit>, Error>;

    /// Create a query-level monitor, or update in place when `monitor_id`
    /// is supplied (omitting the id on update would create a duplicate)
    async fn put_monitor<'a>(
        &self,
        spec: &MonitorSpec,
        index: &str,
        destination_id: &str,
        monitor_id: Option<&'a str>,
    ) -> Result<(), Error>;

    /// Fetch an index pattern's id; `None` when no pattern with that id exists
    async fn get_index_pattern(&self, id: &str) -> Result<Option<String>, Error>;

    /// Create or update an index pattern saved object
    async fn put_index_pattern(&self, id: &str, title: &str, update: bool) -> Result<(), Error>;

    /// Fetch a dashboard's id by title; `None` when absent
    async fn get_dashboard(&self, title: &str) -> Result<Option<String>, Error>;

    /// Create or update a dashboard saved object
    async fn put_dashboard(&self, title: &str, update: bool) -> Result<(), Error>;
}

/// Whether an index with the exact name exists in the catalog
pub async fn index_exists(client: &dyn ClusterClient, index: &str) -> Result<bool, Error> {
    let rows = client.cat_indices().await?;
    Ok(rows.iter().any(|row| row.index == index))
}

/// Document count for an index; `None` when the index is absent or the
/// cluster reported no count for it
pub async fn document_count(
    client: &dyn ClusterClient,
    index: &str,
) -> Result<Option<u64>, Error> {
    let rows = client.cat_indices().await?;
    Ok(rows
        .iter()
        .find(|row| row.index == index)
        .and_then(|row| row.docs_count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<CatIndex> {
        vec![
            CatIndex {
                index: "logs-app".to_string(),
                docs_count: Some(120),
            },
            CatIndex {
                index: "logs-app_temporary".to_string(),
                docs_count: Some(0),
            },
            CatIndex {
                index: "metrics".to_string(),
                docs_count: None,
            },
        ]
    }

    #[tokio::test]
    async fn index_exists_matches_exact_names_only() {
        let mut mock = MockClusterClient::new();
        mock.expect_cat_indices().returning(|| Ok(catalog()));

        assert!(index_exists(&mock, "logs-app").await.unwrap());
        assert!(index_exists(&mock, "logs-app_temporary").await.unwrap());
        // "logs" is a prefix of two catalog rows but matches neither
        assert!(!index_exists(&mock, "logs").await.unwrap());
    }

    #[tokio::test]
    async fn document_count_distinguishes_zero_from_absent() {
        let mut mock = MockClusterClient::new();
        mock.expect_cat_indices().returning(|| Ok(catalog()));

        assert_eq!(document_count(&mock, "logs-app").await.unwrap(), Some(120));
        // Zero documents is a defined count, not absence
        assert_eq!(
            document_count(&mock, "logs-app_temporary").await.unwrap(),
            Some(0)
        );
        // Index present but the cluster reported no count
        assert_eq!(document_count(&mock, "metrics").await.unwrap(), None);
        // Index absent entirely
        assert_eq!(document_count(&mock, "missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn catalog_errors_propagate() {
        let mut mock = MockClusterClient::new();
        mock.expect_cat_indices()
            .returning(|| Err(Error::Rejected { status: 503 }));

        assert!(index_exists(&mock, "logs-app").await.is_err());
        assert!(document_count(&mock, "logs-app").await.is_err());
    }
}
