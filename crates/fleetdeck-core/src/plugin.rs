//! Plugin and PluginDefinition resources
//!
//! A `PluginDefinition` declares the options a workload understands and the
//! chart backing it; a `Plugin` instantiates a definition with concrete option
//! values.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

use crate::error::{CoreError, Result};
use crate::option::OptionValue;
use crate::values::type_name;

/// API group/version of the plugin resources
pub const API_VERSION: &str = "fleetdeck.io/v1alpha1";

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn plugin_kind() -> String {
    "Plugin".to_string()
}

fn definition_kind() -> String {
    "PluginDefinition".to_string()
}

/// A deployable workload instance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plugin {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "plugin_kind")]
    pub kind: String,

    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: PluginSpec,
}

impl Plugin {
    /// Create a plugin with the given name and namespace
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            api_version: default_api_version(),
            kind: plugin_kind(),
            metadata: ObjectMeta {
                name: Some(name.into()),
                namespace: Some(namespace.into()),
                ..Default::default()
            },
            spec: PluginSpec::default(),
        }
    }

    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or("default")
    }

    /// Namespace the chart is released into (defaults to the plugin namespace)
    pub fn release_namespace(&self) -> &str {
        self.spec
            .release_namespace
            .as_deref()
            .unwrap_or_else(|| self.namespace())
    }

    /// Release name (defaults to the plugin name)
    pub fn release_name(&self) -> &str {
        self.spec
            .release_name
            .as_deref()
            .unwrap_or_else(|| self.name())
    }

    /// Load a plugin from a YAML file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSpec {
    /// Name of the PluginDefinition this plugin instantiates
    #[serde(default)]
    pub plugin_definition: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Target cluster, if the plugin is deployed remotely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_name: Option<String>,

    #[serde(default)]
    pub option_values: Vec<OptionValue>,
}

/// Declarative schema a Plugin instantiates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDefinition {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "definition_kind")]
    pub kind: String,

    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: PluginDefinitionSpec,
}

impl PluginDefinition {
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Find a declared option by name
    pub fn option(&self, name: &str) -> Option<&PluginOption> {
        self.spec.options.iter().find(|o| o.name == name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDefinitionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helm_chart: Option<ChartReference>,

    #[serde(default)]
    pub options: Vec<PluginOption>,
}

/// Reference to the chart backing a plugin definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartReference {
    pub name: String,
    pub repository: String,
    pub version: String,
}

/// A declared option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginOption {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,

    #[serde(rename = "type", default)]
    pub option_type: OptionType,
}

impl PluginOption {
    pub fn new(name: impl Into<String>, option_type: OptionType) -> Self {
        Self {
            name: name.into(),
            description: None,
            required: false,
            default: None,
            option_type,
        }
    }

    pub fn with_default(mut self, default: JsonValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Check a literal value against the declared type
    pub fn check_value(&self, value: &JsonValue) -> Result<()> {
        if self.option_type.accepts(value) {
            Ok(())
        } else {
            Err(CoreError::invalid_option(
                &self.name,
                format!("expected {}, got {}", self.option_type, type_name(value)),
            ))
        }
    }
}

/// Declared type of an option
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Bool,
    #[default]
    String,
    Int,
    List,
    Map,
    /// Sensitive string, only ever supplied via a secret reference
    Secret,
}

impl OptionType {
    /// Whether a literal value is acceptable for this type
    pub fn accepts(&self, value: &JsonValue) -> bool {
        match self {
            OptionType::Bool => value.is_boolean(),
            OptionType::String | OptionType::Secret => value.is_string(),
            OptionType::Int => value.is_i64() || value.is_u64(),
            OptionType::List => value.is_array(),
            OptionType::Map => value.is_object(),
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptionType::Bool => "bool",
            OptionType::String => "string",
            OptionType::Int => "int",
            OptionType::List => "list",
            OptionType::Map => "map",
            OptionType::Secret => "secret",
        };
        f.write_str(name)
    }
}
