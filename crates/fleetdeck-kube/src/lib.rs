//! fleetdeck Kube - cluster-facing half of fleetdeck
//!
//! This crate provides:
//! - **Value resolution**: chart defaults, option defaults and option values
//!   (secrets, templates, expressions) merged into one configuration tree
//! - **Secret sources**: Kubernetes secrets or a static map
//! - **Drift detection**: rendered release vs prior release, bundled CRDs vs
//!   registered CRDs, rendered objects vs live objects via dry-run apply
//! - **Secret masking**: secret payloads never appear in a diff

pub mod crd;
pub mod diff;
pub mod error;
pub mod manifest;
pub mod masking;
pub mod secrets;
pub mod store;
pub mod values;

pub use crd::{CrdLookup, KubeCrdLookup, StaticCrdLookup};
pub use diff::{DiffEngine, DiffKind, DiffList, DiffRecord, diff_object};
pub use error::{KubeError, Result};
pub use manifest::{ObjectKey, parse_manifest};
pub use masking::mask_secret_data;
pub use secrets::{KubeSecretSource, SecretSource, StaticSecretSource};
pub use store::{
    KubeResourceStore, MockResourceStore, OperationCounts, ResourceStore, WriteOptions,
};
pub use values::{ResolvedEntry, ResolvedValues, SecretValueRef, ValueResolver};
