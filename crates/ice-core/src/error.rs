//! Error types for the communicator runtime.
//!
//! `CommunicatorDestroyed` is the only error the facade itself raises. Every
//! other variant comes from a collaborator (resolver, adapter factory,
//! registries, properties) and is propagated unchanged.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the runtime.
#[derive(Debug, Error)]
pub enum IceError {
    // Lifecycle errors
    #[error("Communicator has been destroyed")]
    CommunicatorDestroyed,

    #[error("Object adapter factory has been shut down")]
    AdapterFactoryShutdown,

    #[error("Object adapter {name} has been deactivated")]
    AdapterDeactivated { name: String },

    #[error("Thread pool {name} is shutting down")]
    ThreadPoolShutdown { name: String },

    // Parse errors
    #[error("Invalid proxy string `{proxy}`: {reason}")]
    ProxyParse { proxy: String, reason: String },

    #[error("Invalid endpoint `{endpoint}`: {reason}")]
    EndpointParse { endpoint: String, reason: String },

    #[error("Invalid identity `{identity}`: {reason}")]
    IdentityParse { identity: String, reason: String },

    // Registration errors
    #[error("{kind} `{id}` is already registered")]
    AlreadyRegistered { kind: &'static str, id: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },
}

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, IceError>;

impl From<std::io::Error> for IceError {
    fn from(err: std::io::Error) -> Self {
        IceError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl IceError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        IceError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    pub(crate) fn proxy_parse(proxy: &str, reason: impl Into<String>) -> Self {
        IceError::ProxyParse {
            proxy: proxy.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn endpoint_parse(endpoint: &str, reason: impl Into<String>) -> Self {
        IceError::EndpointParse {
            endpoint: endpoint.to_string(),
            reason: reason.into(),
        }
    }

    /// True when the handle that produced this error is permanently unusable.
    pub fn is_destroyed(&self) -> bool {
        matches!(self, IceError::CommunicatorDestroyed)
    }

    /// Check if retrying the same call could succeed.
    ///
    /// Nothing in this runtime is transient: a destroyed communicator stays
    /// destroyed and parse failures are deterministic. Only IO errors from
    /// loading configuration are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IceError::Io { .. })
    }
}
