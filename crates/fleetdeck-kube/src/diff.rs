//! Drift detection
//!
//! Three comparisons share one record format:
//!
//! - a freshly rendered release against the release deployed before it
//! - bundled CRDs against the CRDs registered in the cluster
//! - rendered objects against live cluster objects, via dry-run writes so
//!   that server defaulting does not show up as drift
//!
//! Differences are RFC 6902 patches from the old side to the new side.
//! Secret payloads are masked before anything is compared.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use fleetdeck_core::{FleetdeckConfig, Release, Values};
use fleetdeck_engine::ChartRenderer;
use serde::Serialize;
use serde_json::Value as JsonValue;
use serde_json::ser::PrettyFormatter;
use similar::{ChangeTag, TextDiff};
use tracing::{debug, info};

use crate::crd::{CrdLookup, crd_group_kind, is_crd};
use crate::error::{KubeError, Result, within};
use crate::manifest::{ObjectKey, object_map};
use crate::masking::{is_secret, mask_secret_data};
use crate::store::{DEFAULT_FIELD_MANAGER, ResourceStore, WriteOptions};

/// Annotation kubectl uses for client-side apply state
pub const LAST_APPLIED_ANNOTATION: &str = "kubectl.kubernetes.io/last-applied-configuration";

const DEFAULT_INDENT: usize = 4;

/// What a record reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DiffKind {
    /// Object differs, or exists on one side only
    Changed,
    /// Bundled CRD not registered in the cluster
    MissingCrd,
}

/// A single difference
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffRecord {
    pub key: ObjectKey,
    pub kind: DiffKind,
    /// JSON patch text, never empty
    pub patch: String,
    /// Old side, secrets masked
    pub before: Option<JsonValue>,
    /// New side, secrets masked
    pub after: Option<JsonValue>,
}

impl DiffRecord {
    /// `Kind/Name`
    pub fn label(&self) -> String {
        self.key.label()
    }

    /// Line diff of the masked objects rendered as YAML
    pub fn unified_diff(&self) -> String {
        let old = yaml_or_empty(self.before.as_ref());
        let new = yaml_or_empty(self.after.as_ref());
        let diff = TextDiff::from_lines(&old, &new);

        let mut output = format!("--- {} (before)\n+++ {} (after)\n", self.label(), self.label());
        for change in diff.iter_all_changes() {
            let prefix = match change.tag() {
                ChangeTag::Delete => "-",
                ChangeTag::Insert => "+",
                ChangeTag::Equal => " ",
            };
            output.push_str(prefix);
            output.push_str(change.value().trim_end());
            output.push('\n');
        }
        output
    }
}

fn yaml_or_empty(value: Option<&JsonValue>) -> String {
    value
        .and_then(|v| serde_yaml::to_string(v).ok())
        .unwrap_or_default()
}

/// The records of one comparison
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DiffList(pub Vec<DiffRecord>);

impl DiffList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DiffRecord> {
        self.0.iter()
    }

    pub fn push(&mut self, record: DiffRecord) {
        self.0.push(record);
    }

    /// Records ordered by label
    pub fn sorted(mut self) -> Self {
        self.0.sort_by_key(|r| r.label());
        self
    }

    pub fn labels(&self) -> Vec<String> {
        self.0.iter().map(DiffRecord::label).collect()
    }
}

impl fmt::Display for DiffList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .0
            .iter()
            .map(|r| format!("{}: {}", r.label(), r.patch))
            .collect();
        f.write_str(&rendered.join(", "))
    }
}

impl IntoIterator for DiffList {
    type Item = DiffRecord;
    type IntoIter = std::vec::IntoIter<DiffRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Extend<DiffRecord> for DiffList {
    fn extend<T: IntoIterator<Item = DiffRecord>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

/// Compare the old side with the new one, masking secrets first
///
/// Returns an empty string when there is no difference, otherwise the JSON
/// patch from `live` to `local` pretty-printed with 4-space indentation.
pub fn diff_object(live: Option<&JsonValue>, local: Option<&JsonValue>) -> Result<String> {
    DiffEngine::new().diff_object(live, local)
}

/// Drift detection engine
#[derive(Debug, Clone)]
pub struct DiffEngine {
    field_manager: String,
    timeout: Option<Duration>,
    indent: usize,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self {
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            timeout: None,
            indent: DEFAULT_INDENT,
        }
    }
}

impl DiffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &FleetdeckConfig) -> Self {
        Self {
            field_manager: config.field_manager.clone(),
            timeout: config.timeout(),
            indent: config.diff_indent.max(1),
        }
    }

    pub fn with_field_manager(mut self, field_manager: impl Into<String>) -> Self {
        self.field_manager = field_manager.into();
        self
    }

    /// Bound every cluster call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent.max(1);
        self
    }

    /// Patch text between two objects, empty when they are equal
    pub fn diff_object(&self, live: Option<&JsonValue>, local: Option<&JsonValue>) -> Result<String> {
        let (before, after) = masked(live, local);
        self.patch_text(before.as_ref(), after.as_ref())
    }

    /// Compare a rendered release with the release deployed before it
    ///
    /// Objects are matched by key across the manifest and hook manifests of
    /// both sides; an object present on one side only is compared with
    /// nothing.
    pub fn diff_against_release(&self, local: &Release, prior: &Release) -> Result<DiffList> {
        let local_objects = object_map(local.manifests())?;
        let prior_objects = object_map(prior.manifests())?;

        let keys: BTreeSet<&ObjectKey> = local_objects.keys().chain(prior_objects.keys()).collect();

        let mut list = DiffList::new();
        for key in keys {
            if let Some(record) = self.record(
                key.clone(),
                DiffKind::Changed,
                prior_objects.get(key),
                local_objects.get(key),
            )? {
                list.push(record);
            }
        }

        debug!(
            release = %local.name,
            revision = prior.revision,
            changed = list.len(),
            "compared against prior release"
        );
        Ok(list)
    }

    /// Render a chart and compare the result with the prior release
    pub fn diff_chart_against_release(
        &self,
        renderer: &dyn ChartRenderer,
        values: &Values,
        prior: &Release,
    ) -> Result<DiffList> {
        let rendered = renderer.render(values)?;
        let local = Release::new(&prior.name, &prior.namespace, rendered.manifest)
            .with_revision(prior.revision + 1)
            .with_hooks(rendered.hooks);
        self.diff_against_release(&local, prior)
    }

    /// Report bundled CRDs the cluster does not have
    pub async fn diff_against_remote_crds(
        &self,
        crds: &[JsonValue],
        lookup: &dyn CrdLookup,
    ) -> Result<DiffList> {
        let mut list = DiffList::new();

        for crd in crds.iter().filter(|o| is_crd(o)) {
            let (group, kind) = crd_group_kind(crd)?;
            let registered = within(
                self.timeout,
                "CRD lookup",
                lookup.is_registered(&group, &kind),
            )
            .await?;
            if registered {
                continue;
            }

            let key = ObjectKey::from_object(crd)?;
            debug!(crd = %key.name, %group, %kind, "bundled CRD not registered");
            if let Some(record) = self.record(key, DiffKind::MissingCrd, None, Some(crd))? {
                list.push(record);
            }
        }

        Ok(list)
    }

    /// Compare rendered objects with what is live in the cluster
    ///
    /// For each object the live state is fetched, then the object is sent as
    /// a dry-run create (absent) or a forced dry-run server-side apply
    /// (present). The server's answer is compared with the live object after
    /// pruning `metadata.managedFields` and the last-applied annotation from
    /// both. Objects of kinds the cluster does not serve are skipped.
    pub async fn diff_against_live_objects(
        &self,
        local: &Release,
        namespace: &str,
        store: &dyn ResourceStore,
    ) -> Result<DiffList> {
        let objects: BTreeMap<ObjectKey, JsonValue> = object_map(local.manifests())?;
        let options = WriteOptions::dry_run(&self.field_manager);

        let mut list = DiffList::new();
        let mut skipped = 0usize;

        for (key, object) in objects {
            let key = match key.namespace {
                Some(_) => key,
                None => key.with_namespace(Some(namespace.to_string())),
            };

            if !within(self.timeout, "discovery", store.is_served(&key)).await? {
                debug!(object = %key, "kind not served by the cluster, skipping");
                skipped += 1;
                continue;
            }

            let live = within(self.timeout, "get", store.get(&key)).await?;
            let desired = match live {
                None => {
                    debug!(object = %key, "not found, dry-run create");
                    within(self.timeout, "dry-run create", store.create(&key, &object, &options))
                        .await?
                }
                Some(_) => {
                    debug!(object = %key, field_manager = %options.field_manager, "dry-run apply");
                    within(self.timeout, "dry-run apply", store.apply(&key, &object, &options))
                        .await?
                }
            };

            let live = live.map(pruned);
            let desired = pruned(desired);
            if let Some(record) = self.record(key, DiffKind::Changed, live.as_ref(), Some(&desired))? {
                list.push(record);
            }
        }

        info!(
            release = %local.name,
            namespace,
            drifted = list.len(),
            skipped,
            "compared against live objects"
        );
        Ok(list)
    }

    fn record(
        &self,
        key: ObjectKey,
        kind: DiffKind,
        before: Option<&JsonValue>,
        after: Option<&JsonValue>,
    ) -> Result<Option<DiffRecord>> {
        let (before, after) = masked(before, after);
        let patch = self.patch_text(before.as_ref(), after.as_ref())?;
        if patch.is_empty() {
            return Ok(None);
        }
        Ok(Some(DiffRecord {
            key,
            kind,
            patch,
            before,
            after,
        }))
    }

    fn patch_text(&self, before: Option<&JsonValue>, after: Option<&JsonValue>) -> Result<String> {
        let absent = JsonValue::Null;
        let patch = json_patch::diff(before.unwrap_or(&absent), after.unwrap_or(&absent));
        if patch.0.is_empty() {
            return Ok(String::new());
        }

        let indent = " ".repeat(self.indent);
        let mut buf = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(indent.as_bytes()));
        patch.serialize(&mut serializer)?;
        String::from_utf8(buf).map_err(|e| KubeError::Serialization(e.to_string()))
    }
}

/// Copies of both sides with secret payloads masked, if either is a Secret
fn masked(before: Option<&JsonValue>, after: Option<&JsonValue>) -> (Option<JsonValue>, Option<JsonValue>) {
    if before.is_some_and(is_secret) || after.is_some_and(is_secret) {
        mask_secret_data(before, after)
    } else {
        (before.cloned(), after.cloned())
    }
}

/// Drop server bookkeeping that never counts as drift
fn pruned(mut object: JsonValue) -> JsonValue {
    if let Some(metadata) = object.get_mut("metadata").and_then(JsonValue::as_object_mut) {
        metadata.remove("managedFields");

        let annotations_empty = match metadata
            .get_mut("annotations")
            .and_then(JsonValue::as_object_mut)
        {
            Some(annotations) => {
                annotations.remove(LAST_APPLIED_ANNOTATION);
                annotations.is_empty()
            }
            None => false,
        };
        if annotations_empty {
            metadata.remove("annotations");
        }
    }
    object
}
