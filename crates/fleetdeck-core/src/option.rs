//! Plugin option values and their sources
//!
//! On the wire an option value is a record with one of several mutually
//! exclusive source fields:
//!
//! ```yaml
//! - name: global.image.registry
//!   value: docker.io
//! - name: auth.password
//!   valueFrom:
//!     secret:
//!       name: db-credentials
//!       key: password
//! - name: ingress.host
//!   template: "{{ global.region }}.example.com"
//! - name: replicas
//!   expression: "global.region == 'eu-1' ? 3 : 1"
//! ```
//!
//! Once parsed, the source is a [`ValueSource`] and exactly one of them is
//! always present.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

use crate::error::CoreError;

/// Reference to a single key in a Secret living next to the plugin
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SecretKeyRef {
    /// Name of the Secret
    pub name: String,
    /// Key within the Secret's data
    pub key: String,
}

impl SecretKeyRef {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for SecretKeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "secret:{}/{}", self.name, self.key)
    }
}

/// Where an option value comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSource {
    /// Literal JSON value
    Literal(JsonValue),
    /// Value read from a Secret at resolution time
    SecretRef(SecretKeyRef),
    /// Text template rendered against the other values
    Template(String),
    /// Expression evaluated against the platform values
    Expression(String),
}

impl ValueSource {
    /// Short name of the source kind, for logs and errors
    pub fn kind(&self) -> &'static str {
        match self {
            ValueSource::Literal(_) => "value",
            ValueSource::SecretRef(_) => "secret",
            ValueSource::Template(_) => "template",
            ValueSource::Expression(_) => "expression",
        }
    }

    /// Whether resolving this source needs evaluation (template or expression)
    pub fn is_dynamic(&self) -> bool {
        matches!(self, ValueSource::Template(_) | ValueSource::Expression(_))
    }
}

/// A named option value; the name is a dotted path into the config tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawOptionValue", into = "RawOptionValue")]
pub struct OptionValue {
    pub name: String,
    pub source: ValueSource,
}

impl OptionValue {
    pub fn literal(name: impl Into<String>, value: JsonValue) -> Self {
        Self {
            name: name.into(),
            source: ValueSource::Literal(value),
        }
    }

    pub fn secret(name: impl Into<String>, secret: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: ValueSource::SecretRef(SecretKeyRef::new(secret, key)),
        }
    }

    pub fn template(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: ValueSource::Template(template.into()),
        }
    }

    pub fn expression(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: ValueSource::Expression(expression.into()),
        }
    }

    /// The literal value, if this is a literal
    pub fn literal_value(&self) -> Option<&JsonValue> {
        match &self.source {
            ValueSource::Literal(v) => Some(v),
            _ => None,
        }
    }
}

/// Wire representation with the optional source fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOptionValue {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value_from: Option<RawValueFrom>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expression: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawValueFrom {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secret: Option<SecretKeyRef>,
}

impl TryFrom<RawOptionValue> for OptionValue {
    type Error = CoreError;

    fn try_from(raw: RawOptionValue) -> Result<Self, Self::Error> {
        if raw.name.is_empty() {
            return Err(CoreError::validation("option value without a name"));
        }

        let secret = match raw.value_from {
            Some(RawValueFrom { secret: Some(s) }) => Some(s),
            Some(RawValueFrom { secret: None }) => {
                return Err(CoreError::invalid_option(
                    raw.name,
                    "valueFrom must reference a secret",
                ));
            }
            None => None,
        };

        let mut sources = Vec::with_capacity(1);
        if let Some(v) = raw.value {
            sources.push(ValueSource::Literal(v));
        }
        if let Some(s) = secret {
            sources.push(ValueSource::SecretRef(s));
        }
        if let Some(t) = raw.template {
            sources.push(ValueSource::Template(t));
        }
        if let Some(e) = raw.expression {
            sources.push(ValueSource::Expression(e));
        }

        if sources.len() > 1 {
            let kinds: Vec<&str> = sources.iter().map(ValueSource::kind).collect();
            return Err(CoreError::invalid_option(
                raw.name,
                format!("exactly one source expected, found {}", kinds.join(", ")),
            ));
        }

        match sources.pop() {
            Some(source) => Ok(OptionValue {
                name: raw.name,
                source,
            }),
            None => Err(CoreError::invalid_option(
                raw.name,
                "one of value, valueFrom, template or expression is required",
            )),
        }
    }
}

impl From<OptionValue> for RawOptionValue {
    fn from(option: OptionValue) -> Self {
        let mut raw = RawOptionValue {
            name: option.name,
            ..Default::default()
        };
        match option.source {
            ValueSource::Literal(v) => raw.value = Some(v),
            ValueSource::SecretRef(s) => {
                raw.value_from = Some(RawValueFrom { secret: Some(s) });
            }
            ValueSource::Template(t) => raw.template = Some(t),
            ValueSource::Expression(e) => raw.expression = Some(e),
        }
        raw
    }
}
