//! CLI error types with exit code handling
//!
//! Library errors are folded into [`CliError`], which knows the exit code
//! for each category. Template errors keep their source-annotated
//! diagnostic.

use fleetdeck_core::CoreError;
use fleetdeck_engine::{EngineError, TemplateError};
use fleetdeck_kube::KubeError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Invalid input: option values, definitions, arguments
    #[error("Validation failed: {message}")]
    #[diagnostic(code(fleetdeck::cli::validation))]
    Validation {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Template failure with its source span
    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),

    /// Expression or placeholder evaluation failed
    #[error("Evaluation failed: {message}")]
    #[diagnostic(code(fleetdeck::cli::evaluation))]
    Evaluation { message: String },

    /// Manifest or release record could not be used
    #[error("Manifest error: {message}")]
    #[diagnostic(code(fleetdeck::cli::manifest))]
    Manifest { message: String },

    /// Cluster access failed
    #[error("Cluster error: {message}")]
    #[diagnostic(
        code(fleetdeck::cli::cluster),
        help("check the current kubeconfig context and RBAC permissions")
    )]
    Cluster { message: String },

    /// Differences were found and the caller asked for a failing exit code
    #[error("drift detected in {count} object(s)")]
    #[diagnostic(code(fleetdeck::cli::drift))]
    DriftDetected { count: usize },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(fleetdeck::cli::io))]
    Io { message: String },

    /// Wrapped error for passthrough (stores the formatted message)
    #[error("{message}")]
    #[diagnostic(code(fleetdeck::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Validation { .. } => exit_codes::VALIDATION_ERROR,
            CliError::Template(_) | CliError::Evaluation { .. } => exit_codes::EVALUATION_ERROR,
            CliError::Manifest { .. } => exit_codes::MANIFEST_ERROR,
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::DriftDetected { .. } => exit_codes::DRIFT_DETECTED,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            help: None,
        }
    }

    /// Create a validation error with help text
    pub fn validation_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    pub fn manifest(message: impl Into<String>) -> Self {
        Self::Manifest {
            message: message.into(),
        }
    }

    pub fn cluster(message: impl Into<String>) -> Self {
        Self::Cluster {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Io(e) => e.into(),
            CoreError::YamlParse(_) | CoreError::JsonParse(_) => CliError::manifest(err.to_string()),
            CoreError::Validation { .. }
            | CoreError::InvalidOptionValue { .. }
            | CoreError::MissingRequiredOption { .. }
            | CoreError::ValuesMerge { .. } => CliError::validation(err.to_string()),
            CoreError::Config { .. } => CliError::validation_with_help(
                err.to_string(),
                "see `fleetdeck --help` for the configuration file location",
            ),
        }
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Template(t) => CliError::Template(t),
            EngineError::Validation { message } => CliError::validation(message),
            other => CliError::Evaluation {
                message: other.to_string(),
            },
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        match err {
            KubeError::Engine(e) => e.into(),
            KubeError::Core(e) => e.into(),
            KubeError::Io(e) => e.into(),
            KubeError::InvalidManifest(_) | KubeError::Serialization(_) => {
                CliError::manifest(err.to_string())
            }
            KubeError::OptionValue { ref source, .. } => match source.as_ref() {
                KubeError::Engine(EngineError::Template(t)) => CliError::Template(t.clone()),
                KubeError::Core(_) => CliError::validation(err.to_string()),
                KubeError::Engine(_) => CliError::Evaluation {
                    message: err.to_string(),
                },
                _ => CliError::cluster(err.to_string()),
            },
            _ => CliError::cluster(err.to_string()),
        }
    }
}

impl From<kube::Error> for CliError {
    fn from(err: kube::Error) -> Self {
        CliError::cluster(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Other {
            message: format!("failed to serialize output: {}", err),
        }
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        CliError::manifest(err.to_string())
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
