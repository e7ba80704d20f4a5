//! Error types for the provisioner

use thiserror::Error;

/// Main error type for provisioning operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Malformed or missing input property
    #[error("input error: {0}")]
    Input(String),

    /// The cluster answered with a non-success HTTP status
    #[error("cluster rejected request: status {status}")]
    Rejected {
        /// HTTP status code returned by the cluster
        status: u16,
    },

    /// Transport-level HTTP failure
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A migration was requested for an index that does not exist
    #[error("source index '{0}' does not exist")]
    MissingSourceIndex(String),

    /// A reindex migration exhausted its poll attempts without the document
    /// counts converging
    #[error("reindex did not converge after {attempts} attempts")]
    ConvergenceTimeout {
        /// Number of attempts performed before giving up
        attempts: u32,
    },
}

impl Error {
    /// Create an input error with the given message
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a rejection error from an HTTP status code
    pub fn rejected(status: reqwest::StatusCode) -> Self {
        Self::Rejected {
            status: status.as_u16(),
        }
    }
}
