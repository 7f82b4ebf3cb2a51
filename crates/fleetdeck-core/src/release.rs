//! Deployed release records
//!
//! A release is what a previous deployment left behind: the rendered
//! manifest plus any lifecycle hook manifests, which are kept apart from the
//! main manifest.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Hook annotations, fleetdeck first then Helm for compatibility
pub const HOOK_ANNOTATIONS: &[&str] = &["fleetdeck.io/hook", "helm.sh/hook"];

/// A deployed release of a plugin's chart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub name: String,

    pub namespace: String,

    #[serde(default = "default_revision")]
    pub revision: u32,

    /// Rendered manifest, hooks excluded
    #[serde(default)]
    pub manifest: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<HookManifest>,
}

fn default_revision() -> u32 {
    1
}

/// A lifecycle hook manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookManifest {
    pub name: String,
    pub manifest: String,
}

impl Release {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, manifest: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            revision: default_revision(),
            manifest: manifest.into(),
            hooks: Vec::new(),
        }
    }

    /// Build a release from a freshly rendered manifest, moving hook
    /// documents into `hooks`
    pub fn from_rendered(
        name: impl Into<String>,
        namespace: impl Into<String>,
        rendered: &str,
    ) -> Self {
        let (manifest, hooks) = split_hooks(rendered);
        Self {
            hooks,
            ..Self::new(name, namespace, manifest)
        }
    }

    pub fn with_revision(mut self, revision: u32) -> Self {
        self.revision = revision;
        self
    }

    pub fn with_hooks(mut self, hooks: Vec<HookManifest>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Manifest followed by every hook manifest
    pub fn manifests(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.manifest.as_str()).chain(self.hooks.iter().map(|h| h.manifest.as_str()))
    }

    /// Load a stored release record (YAML or JSON)
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

/// Split a multi-document YAML stream on `---` separator lines
///
/// Empty documents and comment-only documents are dropped.
pub fn split_documents(manifest: &str) -> Vec<String> {
    let mut documents = Vec::new();
    let mut current = String::new();

    for line in manifest.lines() {
        if line.trim_end() == "---" || line.starts_with("--- ") {
            push_document(&mut documents, &mut current);
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    push_document(&mut documents, &mut current);

    documents
}

fn push_document(documents: &mut Vec<String>, current: &mut String) {
    let has_content = current
        .lines()
        .any(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'));
    if has_content {
        documents.push(std::mem::take(current));
    } else {
        current.clear();
    }
}

/// Separate hook documents from a rendered manifest
pub fn split_hooks(rendered: &str) -> (String, Vec<HookManifest>) {
    let mut manifest = Vec::new();
    let mut hooks = Vec::new();

    for document in split_documents(rendered) {
        match hook_name(&document) {
            Some(name) => hooks.push(HookManifest {
                name,
                manifest: document,
            }),
            None => manifest.push(document),
        }
    }

    (manifest.join("---\n"), hooks)
}

/// Name of the object if the document is annotated as a hook
fn hook_name(document: &str) -> Option<String> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(document).ok()?;
    let metadata = yaml.get("metadata")?;
    let annotations = metadata.get("annotations")?.as_mapping()?;

    let is_hook = HOOK_ANNOTATIONS
        .iter()
        .any(|key| annotations.contains_key(*key));
    if !is_hook {
        return None;
    }

    Some(
        metadata
            .get("name")
            .and_then(|n| n.as_str())
            .unwrap_or("unnamed-hook")
            .to_string(),
    )
}
