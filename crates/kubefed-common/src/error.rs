//! Error types for kubefed membership operations
//!
//! Errors carry the cluster (or object) they concern so a single logged line
//! is enough to see which side of a host/member pair failed.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for kubefed operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// The target object is already absent
    #[error("{kind} {name:?} not found")]
    NotFound {
        /// Kind of the missing object (e.g., "ClusterRole")
        kind: String,
        /// Name of the missing object
        name: String,
    },

    /// Malformed names or arguments, detected before any network call
    #[error("validation error for {cluster}: {message}")]
    Validation {
        /// Cluster the invalid input refers to
        cluster: String,
        /// Description of what's invalid
        message: String,
    },

    /// A cluster API server could not be reached or a client could not be built for it
    #[error("cluster {cluster} unreachable: {message}")]
    Unreachable {
        /// Name or context of the unreachable cluster
        cluster: String,
        /// Description of what failed
        message: String,
    },

    /// Client configuration could not be resolved
    #[error("configuration error [{context}]: {message}")]
    Config {
        /// Where the configuration was being resolved from (context name, secret, ...)
        context: String,
        /// Description of what failed
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "join", "poll_until")
        context: String,
    },
}

impl Error {
    /// Create a not-found error for the given object
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            cluster: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
        }
    }

    /// Create a validation error with cluster context
    pub fn validation_for(cluster: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            cluster: cluster.into(),
            message: msg.into(),
        }
    }

    /// Create an unreachable-cluster error
    pub fn unreachable(cluster: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Unreachable {
            cluster: cluster.into(),
            message: msg.into(),
        }
    }

    /// Create a configuration error
    pub fn config(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Config {
            context: context.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Whether the error means the object is already gone.
    ///
    /// Covers both our own `NotFound` and a raw kube API 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Kube {
                source: kube::Error::Api(ae),
            } => ae.code == 404,
            _ => false,
        }
    }

    /// Whether the error means the object already exists (HTTP 409 AlreadyExists)
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            Self::Kube { source: kube::Error::Api(ae) } if ae.code == 409 && ae.reason == "AlreadyExists"
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}
