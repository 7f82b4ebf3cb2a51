//! Access to live cluster objects
//!
//! The drift detector needs four things from the cluster: whether a kind is
//! served, the live object, and dry-run create or server-side apply.
//! [`KubeResourceStore`] does this with dynamic objects resolved through API
//! discovery; [`MockResourceStore`] keeps objects in memory for tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use kube::{
    Client,
    api::{Api, DynamicObject, Patch, PatchParams, PostParams},
    core::GroupVersionKind,
    discovery::{ApiCapabilities, ApiResource, Discovery, Scope},
};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::{KubeError, Result};
use crate::manifest::ObjectKey;

pub use fleetdeck_core::config::DEFAULT_FIELD_MANAGER;

/// How a write is sent to the API server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    pub dry_run: bool,
    pub field_manager: String,
    /// Take ownership of conflicting fields (server-side apply only)
    pub force: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            force: false,
        }
    }
}

impl WriteOptions {
    /// Dry run with forced ownership, as used for drift detection
    pub fn dry_run(field_manager: impl Into<String>) -> Self {
        Self {
            dry_run: true,
            field_manager: field_manager.into(),
            force: true,
        }
    }
}

/// Object access used by the drift detector
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Whether the API server serves this kind at all
    async fn is_served(&self, key: &ObjectKey) -> Result<bool>;

    /// The live object, `None` if it does not exist
    async fn get(&self, key: &ObjectKey) -> Result<Option<JsonValue>>;

    /// Create `object`, returning what the server stored (or would store)
    async fn create(&self, key: &ObjectKey, object: &JsonValue, options: &WriteOptions)
    -> Result<JsonValue>;

    /// Server-side apply `object`, returning the resulting object
    async fn apply(&self, key: &ObjectKey, object: &JsonValue, options: &WriteOptions)
    -> Result<JsonValue>;
}

/// Resource store talking to the Kubernetes API
pub struct KubeResourceStore {
    client: Client,
    /// Cached discovery information
    discovery: Discovery,
    /// Namespace for namespaced objects whose key has none
    namespace: String,
}

impl KubeResourceStore {
    /// Run discovery and create a store
    pub async fn new(client: Client, namespace: &str) -> Result<Self> {
        let discovery = Discovery::new(client.clone())
            .run()
            .await
            .map_err(KubeError::Api)?;

        Ok(Self::with_discovery(client, discovery, namespace))
    }

    /// Create from existing client and discovery (for reuse)
    pub fn with_discovery(client: Client, discovery: Discovery, namespace: &str) -> Self {
        Self {
            client,
            discovery,
            namespace: namespace.to_string(),
        }
    }

    fn resolve(&self, key: &ObjectKey) -> Option<(ApiResource, ApiCapabilities)> {
        self.discovery.resolve_gvk(&gvk_from_key(key))
    }

    /// Api client for a key, namespaced or cluster-wide per discovery
    fn api_for(&self, key: &ObjectKey) -> Result<Api<DynamicObject>> {
        let (resource, capabilities) = self.resolve(key).ok_or_else(|| {
            KubeError::InvalidManifest(format!(
                "unknown resource type: {}/{}",
                key.api_version(),
                key.kind
            ))
        })?;

        if capabilities.scope == Scope::Namespaced {
            let namespace = key.namespace.as_deref().unwrap_or(&self.namespace);
            Ok(Api::namespaced_with(self.client.clone(), namespace, &resource))
        } else {
            Ok(Api::all_with(self.client.clone(), &resource))
        }
    }
}

#[async_trait]
impl ResourceStore for KubeResourceStore {
    async fn is_served(&self, key: &ObjectKey) -> Result<bool> {
        Ok(self.resolve(key).is_some())
    }

    async fn get(&self, key: &ObjectKey) -> Result<Option<JsonValue>> {
        let api = self.api_for(key)?;
        match api.get_opt(&key.name).await.map_err(KubeError::Api)? {
            Some(object) => Ok(Some(serde_json::to_value(object)?)),
            None => Ok(None),
        }
    }

    async fn create(
        &self,
        key: &ObjectKey,
        object: &JsonValue,
        options: &WriteOptions,
    ) -> Result<JsonValue> {
        let api = self.api_for(key)?;
        let dynamic: DynamicObject = serde_json::from_value(object.clone())?;

        let params = PostParams {
            dry_run: options.dry_run,
            field_manager: Some(options.field_manager.clone()),
        };

        debug!(object = %key, dry_run = options.dry_run, "create");
        let created = api
            .create(&params, &dynamic)
            .await
            .map_err(|e| write_error(key, e))?;
        Ok(serde_json::to_value(created)?)
    }

    async fn apply(
        &self,
        key: &ObjectKey,
        object: &JsonValue,
        options: &WriteOptions,
    ) -> Result<JsonValue> {
        let api = self.api_for(key)?;

        // Build patch params for Server-Side Apply
        let mut params = PatchParams::apply(&options.field_manager);
        params.force = options.force;
        params.dry_run = options.dry_run;

        debug!(object = %key, dry_run = options.dry_run, force = options.force, "server-side apply");
        let applied = api
            .patch(&key.name, &params, &Patch::Apply(object))
            .await
            .map_err(|e| write_error(key, e))?;
        Ok(serde_json::to_value(applied)?)
    }
}

/// Surface 409 responses as conflicts, naming the object
fn write_error(key: &ObjectKey, error: kube::Error) -> KubeError {
    match &error {
        kube::Error::Api(response) if response.code == 409 => KubeError::Conflict {
            resource: key.label(),
            message: response.message.clone(),
        },
        _ => KubeError::Api(error),
    }
}

/// Convert an object key to the GroupVersionKind discovery understands
fn gvk_from_key(key: &ObjectKey) -> GroupVersionKind {
    GroupVersionKind {
        group: key.group.clone(),
        version: key.version.clone(),
        kind: key.kind.clone(),
    }
}

/// Operation counts for a [`MockResourceStore`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationCounts {
    pub gets: usize,
    pub creates: usize,
    pub applies: usize,
}

/// In-memory resource store
///
/// Every kind is served unless marked otherwise. Writes honour `dry_run`:
/// a dry run returns the resulting object without storing it. Apply merges
/// the object into the live one, the way server-side apply keeps fields
/// owned by other managers.
#[derive(Debug, Clone, Default)]
pub struct MockResourceStore {
    objects: Arc<RwLock<HashMap<ObjectKey, JsonValue>>>,
    unserved: Arc<RwLock<BTreeSet<(String, String)>>>,
    operations: Arc<RwLock<OperationCounts>>,
    writes: Arc<RwLock<Vec<WriteOptions>>>,
    latency: Option<Duration>,
}

impl MockResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a live object under its own key
    pub fn with_object(self, object: JsonValue) -> Result<Self> {
        let key = ObjectKey::from_object(&object)?;
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, object);
        Ok(self)
    }

    /// Make the API server stop serving `group`/`kind`
    pub fn with_unserved_kind(self, group: &str, kind: &str) -> Self {
        self.unserved
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((group.to_string(), kind.to_string()));
        self
    }

    /// Delay every call, to exercise timeouts
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn operation_counts(&self) -> OperationCounts {
        self.operations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Options of every write, in call order
    pub fn writes(&self) -> Vec<WriteOptions> {
        self.writes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn object_count(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn count(&self, update: impl FnOnce(&mut OperationCounts)) {
        let mut operations = self.operations.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut *operations);
    }

    fn record_write(&self, options: &WriteOptions) {
        self.writes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(options.clone());
    }

    /// Look an object up, matching a key without namespace against a stored
    /// object in any namespace
    fn find(&self, key: &ObjectKey) -> Option<(ObjectKey, JsonValue)> {
        let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(object) = objects.get(key) {
            return Some((key.clone(), object.clone()));
        }
        objects
            .iter()
            .find(|(k, _)| {
                k.group == key.group
                    && k.version == key.version
                    && k.kind == key.kind
                    && k.name == key.name
                    && (k.namespace.is_none() || key.namespace.is_none())
            })
            .map(|(k, v)| (k.clone(), v.clone()))
    }

    fn store(&self, key: ObjectKey, object: JsonValue) {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, object);
    }
}

#[async_trait]
impl ResourceStore for MockResourceStore {
    async fn is_served(&self, key: &ObjectKey) -> Result<bool> {
        self.delay().await;
        let unserved = self.unserved.read().unwrap_or_else(PoisonError::into_inner);
        Ok(!unserved.contains(&(key.group.clone(), key.kind.clone())))
    }

    async fn get(&self, key: &ObjectKey) -> Result<Option<JsonValue>> {
        self.delay().await;
        self.count(|ops| ops.gets += 1);
        Ok(self.find(key).map(|(_, object)| object))
    }

    async fn create(
        &self,
        key: &ObjectKey,
        object: &JsonValue,
        options: &WriteOptions,
    ) -> Result<JsonValue> {
        self.delay().await;
        self.count(|ops| ops.creates += 1);
        self.record_write(options);

        if self.find(key).is_some() {
            return Err(KubeError::Conflict {
                resource: key.label(),
                message: "already exists".to_string(),
            });
        }

        let mut created = object.clone();
        if let (Some(namespace), Some(metadata)) = (
            key.namespace.as_ref(),
            created.get_mut("metadata").and_then(JsonValue::as_object_mut),
        ) {
            metadata
                .entry("namespace")
                .or_insert_with(|| JsonValue::String(namespace.clone()));
        }

        if !options.dry_run {
            self.store(key.clone(), created.clone());
        }
        Ok(created)
    }

    async fn apply(
        &self,
        key: &ObjectKey,
        object: &JsonValue,
        options: &WriteOptions,
    ) -> Result<JsonValue> {
        self.delay().await;
        self.count(|ops| ops.applies += 1);
        self.record_write(options);

        let (stored_key, mut merged) = match self.find(key) {
            Some(found) => found,
            None => (key.clone(), JsonValue::Object(serde_json::Map::new())),
        };
        merge_json(&mut merged, object);

        if !options.dry_run {
            self.store(stored_key, merged.clone());
        }
        Ok(merged)
    }
}

/// Recursive object merge, overlay wins for everything but nested objects
fn merge_json(base: &mut JsonValue, overlay: &JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}
