//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Validation error - invalid option values or missing required options
pub const VALIDATION_ERROR: i32 = 2;

/// Evaluation error - template, expression or placeholder failed
pub const EVALUATION_ERROR: i32 = 3;

/// Manifest error - unparseable manifest or release record
pub const MANIFEST_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Cluster error - API failure, unreadable secret, timeout
pub const CLUSTER_ERROR: i32 = 6;

/// Differences found and `--exit-code` was given
pub const DRIFT_DETECTED: i32 = 8;
