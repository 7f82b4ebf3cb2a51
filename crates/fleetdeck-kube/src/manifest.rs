//! Manifest parsing and object identity
//!
//! Objects are matched across a rendered manifest, a prior release and the
//! cluster by [`ObjectKey`]: group, version, kind, namespace and name.
//! Resource version and generation never take part.

use std::collections::BTreeMap;
use std::fmt;

use fleetdeck_core::release::split_documents;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::{KubeError, Result};

/// Identity of a Kubernetes object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjectKey {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new(api_version: &str, kind: impl Into<String>, name: impl Into<String>) -> Self {
        let (group, version) = split_api_version(api_version);
        Self {
            group,
            version,
            kind: kind.into(),
            namespace: None,
            name: name.into(),
        }
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    /// Identity of a parsed object; `apiVersion`, `kind` and `metadata.name`
    /// are required
    pub fn from_object(object: &JsonValue) -> Result<Self> {
        let field = |path: &[&str]| -> Option<&str> {
            let mut current = object;
            for segment in path {
                current = current.get(segment)?;
            }
            current.as_str()
        };

        let api_version = field(&["apiVersion"])
            .ok_or_else(|| KubeError::InvalidManifest("object has no apiVersion".to_string()))?;
        let kind = field(&["kind"])
            .ok_or_else(|| KubeError::InvalidManifest("object has no kind".to_string()))?;
        let name = field(&["metadata", "name"]).ok_or_else(|| {
            KubeError::InvalidManifest(format!("{} object has no metadata.name", kind))
        })?;
        let namespace = field(&["metadata", "namespace"]).map(str::to_string);

        Ok(Self::new(api_version, kind, name).with_namespace(namespace))
    }

    /// `Kind/Name`
    pub fn label(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }

    /// `group/version`, or just `version` for the core group
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    pub fn is_secret(&self) -> bool {
        self.group.is_empty() && self.version == "v1" && self.kind == "Secret"
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Split `apps/v1` into `("apps", "v1")` and `v1` into `("", "v1")`
pub fn split_api_version(api_version: &str) -> (String, String) {
    match api_version.rsplit_once('/') {
        Some((g, v)) => (g.to_string(), v.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Parse a multi-document manifest into JSON objects
///
/// Empty and comment-only documents are skipped; anything else must be a
/// mapping.
pub fn parse_manifest(manifest: &str) -> Result<Vec<JsonValue>> {
    let mut objects = Vec::new();

    for (index, document) in split_documents(manifest).iter().enumerate() {
        let value: JsonValue = serde_yaml::from_str(document).map_err(|e| {
            KubeError::InvalidManifest(format!("failed to parse document {}: {}", index, e))
        })?;
        match value {
            JsonValue::Null => continue,
            JsonValue::Object(_) => objects.push(value),
            _ => {
                return Err(KubeError::InvalidManifest(format!(
                    "document {} is not a mapping",
                    index
                )));
            }
        }
    }

    Ok(objects)
}

/// Index the objects of several manifests by key
///
/// A later object with the same key replaces an earlier one.
pub fn object_map<'a, I>(manifests: I) -> Result<BTreeMap<ObjectKey, JsonValue>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut map = BTreeMap::new();
    for manifest in manifests {
        for object in parse_manifest(manifest)? {
            map.insert(ObjectKey::from_object(&object)?, object);
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MANIFEST: &str = r#"# Source: web/deployment.yaml
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  namespace: team-a
spec:
  replicas: 2
---
# Source: web/empty.yaml
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
data:
  region: eu-1
"#;

    #[test]
    fn test_parse_manifest() {
        let objects = parse_manifest(MANIFEST).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0]["spec"]["replicas"], json!(2));
    }

    #[test]
    fn test_object_key() {
        let objects = parse_manifest(MANIFEST).unwrap();
        let deployment = ObjectKey::from_object(&objects[0]).unwrap();
        assert_eq!(deployment.group, "apps");
        assert_eq!(deployment.version, "v1");
        assert_eq!(deployment.namespace.as_deref(), Some("team-a"));
        assert_eq!(deployment.label(), "Deployment/web");
        assert_eq!(deployment.api_version(), "apps/v1");

        let config = ObjectKey::from_object(&objects[1]).unwrap();
        assert_eq!(config.group, "");
        assert_eq!(config.api_version(), "v1");
        assert!(config.namespace.is_none());
    }

    #[test]
    fn test_key_ignores_resource_version() {
        let a = json!({"apiVersion": "v1", "kind": "Secret",
            "metadata": {"name": "db", "resourceVersion": "1", "generation": 1}});
        let b = json!({"apiVersion": "v1", "kind": "Secret",
            "metadata": {"name": "db", "resourceVersion": "42", "generation": 7}});
        assert_eq!(
            ObjectKey::from_object(&a).unwrap(),
            ObjectKey::from_object(&b).unwrap()
        );
        assert!(ObjectKey::from_object(&a).unwrap().is_secret());
    }

    #[test]
    fn test_missing_identity_fields() {
        let err = ObjectKey::from_object(&json!({"apiVersion": "v1", "kind": "Pod"})).unwrap_err();
        assert!(matches!(err, KubeError::InvalidManifest(_)));
        assert!(ObjectKey::from_object(&json!({"kind": "Pod"})).is_err());
    }

    #[test]
    fn test_non_mapping_document() {
        assert!(parse_manifest("- a\n- b\n").is_err());
        assert!(parse_manifest("key: [unclosed\n").is_err());
    }

    #[test]
    fn test_split_api_version() {
        assert_eq!(
            split_api_version("networking.k8s.io/v1"),
            ("networking.k8s.io".to_string(), "v1".to_string())
        );
        assert_eq!(split_api_version("v1"), (String::new(), "v1".to_string()));
    }

    #[test]
    fn test_object_map_later_wins() {
        let first = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\ndata:\n  v: '1'\n";
        let second = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\ndata:\n  v: '2'\n";
        let map = object_map([first, second]).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.values().next().unwrap()["data"]["v"], json!("2"));
    }
}
