//! Error types for fleetdeck-kube

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Result type for fleetdeck-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while resolving values or detecting drift
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// A referenced secret or key could not be read
    #[error("cannot read key '{key}' of secret '{name}': {message}")]
    Secret {
        name: String,
        key: String,
        message: String,
    },

    /// The server rejected a write because of a field or version conflict
    #[error("conflict on {resource}: {message}")]
    Conflict { resource: String, message: String },

    /// A manifest document could not be parsed or lacks identity fields
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// Timeout
    #[error("operation timed out after {0}")]
    Timeout(String),

    /// Resolving a single option value failed
    #[error("failed to resolve option '{name}' ({source_kind}): {source}")]
    OptionValue {
        name: String,
        source_kind: &'static str,
        #[source]
        source: Box<KubeError>,
    },

    /// Template, expression or placeholder evaluation error
    #[error(transparent)]
    Engine(#[from] fleetdeck_engine::EngineError),

    /// Data model or values error
    #[error(transparent)]
    Core(#[from] fleetdeck_core::CoreError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl KubeError {
    pub fn secret(name: impl Into<String>, key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Secret {
            name: name.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Check if this is a Kubernetes 404 Not Found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, KubeError::Api(kube::Error::Api(resp)) if resp.code == 404)
    }

    /// Check if this is a conflict error (409)
    pub fn is_conflict(&self) -> bool {
        match self {
            KubeError::Conflict { .. } => true,
            KubeError::Api(kube::Error::Api(resp)) => resp.code == 409,
            _ => false,
        }
    }

    /// Check if this is a timeout, directly or as the cause of an option failure
    pub fn is_timeout(&self) -> bool {
        match self {
            KubeError::Timeout(_) => true,
            KubeError::OptionValue { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

/// Run `fut`, failing with [`KubeError::Timeout`] once `limit` elapses
///
/// The future is dropped on timeout, which cancels any in-flight request.
pub(crate) async fn within<F, T>(limit: Option<Duration>, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        None => fut.await,
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(KubeError::Timeout(format!("{:?} ({})", limit, what))),
        },
    }
}
