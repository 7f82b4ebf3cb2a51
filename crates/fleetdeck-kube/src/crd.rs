//! CustomResourceDefinition lookups
//!
//! A chart may bundle CRDs that the target cluster does not have yet. The
//! drift detector reports those as missing rather than failing on the
//! custom resources that depend on them.

use std::collections::BTreeSet;

use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{
    Client,
    api::{Api, ListParams},
};
use serde_json::Value as JsonValue;

use crate::error::{KubeError, Result};

pub const CRD_KIND: &str = "CustomResourceDefinition";

/// Answers whether a CRD for `group`/`kind` is registered
#[async_trait]
pub trait CrdLookup: Send + Sync {
    async fn is_registered(&self, group: &str, kind: &str) -> Result<bool>;
}

/// CRD lookup against the cluster's apiextensions API
pub struct KubeCrdLookup {
    api: Api<CustomResourceDefinition>,
}

impl KubeCrdLookup {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl CrdLookup for KubeCrdLookup {
    async fn is_registered(&self, group: &str, kind: &str) -> Result<bool> {
        let crds = self
            .api
            .list(&ListParams::default())
            .await
            .map_err(KubeError::Api)?;

        Ok(crds
            .items
            .iter()
            .any(|crd| crd.spec.group == group && crd.spec.names.kind == kind))
    }
}

/// Fixed set of registered CRDs
#[derive(Debug, Clone, Default)]
pub struct StaticCrdLookup {
    registered: BTreeSet<(String, String)>,
}

impl StaticCrdLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_crd(mut self, group: impl Into<String>, kind: impl Into<String>) -> Self {
        self.registered.insert((group.into(), kind.into()));
        self
    }
}

#[async_trait]
impl CrdLookup for StaticCrdLookup {
    async fn is_registered(&self, group: &str, kind: &str) -> Result<bool> {
        Ok(self
            .registered
            .contains(&(group.to_string(), kind.to_string())))
    }
}

/// Check if a parsed object is a CRD
pub fn is_crd(object: &JsonValue) -> bool {
    object.get("kind").and_then(JsonValue::as_str) == Some(CRD_KIND)
}

/// `spec.group` and `spec.names.kind` of a CRD manifest
pub fn crd_group_kind(crd: &JsonValue) -> Result<(String, String)> {
    let spec = crd
        .get("spec")
        .ok_or_else(|| KubeError::InvalidManifest("CRD has no spec".to_string()))?;
    let group = spec
        .get("group")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| KubeError::InvalidManifest("CRD has no spec.group".to_string()))?;
    let kind = spec
        .get("names")
        .and_then(|n| n.get("kind"))
        .and_then(JsonValue::as_str)
        .ok_or_else(|| KubeError::InvalidManifest("CRD has no spec.names.kind".to_string()))?;
    Ok((group.to_string(), kind.to_string()))
}
