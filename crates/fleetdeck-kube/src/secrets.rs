//! Secret sources for `valueFrom.secret` option values
//!
//! Secrets are read from the namespace of the plugin that references them.
//! [`StaticSecretSource`] serves fixed content for offline use and tests.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use fleetdeck_core::SecretKeyRef;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use tracing::debug;

use crate::error::{KubeError, Result};

/// Reads single keys out of secrets
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Value of `reference.key` in secret `reference.name`, decoded as UTF-8
    async fn fetch(&self, reference: &SecretKeyRef) -> Result<String>;
}

/// Secret source backed by the Kubernetes API
pub struct KubeSecretSource {
    api: Api<Secret>,
    namespace: String,
}

impl KubeSecretSource {
    /// Read secrets from `namespace`
    pub fn namespaced(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

#[async_trait]
impl SecretSource for KubeSecretSource {
    async fn fetch(&self, reference: &SecretKeyRef) -> Result<String> {
        debug!(
            namespace = %self.namespace,
            secret = %reference.name,
            key = %reference.key,
            "reading secret key"
        );

        let secret = self
            .api
            .get_opt(&reference.name)
            .await?
            .ok_or_else(|| {
                KubeError::secret(
                    &reference.name,
                    &reference.key,
                    format!("secret not found in namespace '{}'", self.namespace),
                )
            })?;

        secret_key_value(&secret, reference)
    }
}

/// Look a key up in `data` first, then in `stringData`
fn secret_key_value(secret: &Secret, reference: &SecretKeyRef) -> Result<String> {
    if let Some(bytes) = secret.data.as_ref().and_then(|d| d.get(&reference.key)) {
        return String::from_utf8(bytes.0.clone()).map_err(|e| {
            KubeError::secret(&reference.name, &reference.key, format!("invalid UTF-8: {}", e))
        });
    }

    secret
        .string_data
        .as_ref()
        .and_then(|d| d.get(&reference.key))
        .cloned()
        .ok_or_else(|| KubeError::secret(&reference.name, &reference.key, "key not present"))
}

/// In-memory secret source
#[derive(Debug, Clone, Default)]
pub struct StaticSecretSource {
    secrets: HashMap<SecretKeyRef, String>,
}

impl StaticSecretSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(
        mut self,
        name: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.secrets
            .insert(SecretKeyRef::new(name, key), value.into());
        self
    }

    /// Parse `{secret-name: {key: value}}` YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let parsed: BTreeMap<String, BTreeMap<String, String>> = serde_yaml::from_str(yaml)?;
        let secrets = parsed
            .into_iter()
            .flat_map(|(name, keys)| {
                keys.into_iter()
                    .map(move |(key, value)| (SecretKeyRef::new(name.clone(), key), value))
            })
            .collect();
        Ok(Self { secrets })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

#[async_trait]
impl SecretSource for StaticSecretSource {
    async fn fetch(&self, reference: &SecretKeyRef) -> Result<String> {
        self.secrets
            .get(reference)
            .cloned()
            .ok_or_else(|| KubeError::secret(&reference.name, &reference.key, "not found"))
    }
}
