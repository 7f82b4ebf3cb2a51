//! Resource-scoped CEL evaluation
//!
//! Resources are serialized to JSON and converted to CEL values before they
//! are bound, so expressions only ever see plain maps, lists and scalars.
//! A single resource is bound as `plugin`, a list as `plugins`:
//!
//! ```text
//! plugin.metadata.name
//! plugins.filter(p, p.metadata.labels.app == 'x').size()
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine as _;
use cel_interpreter::objects::{Key, Map};
use cel_interpreter::{Context, Program, Value};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::{EngineError, Result};

/// Variable a single resource is bound to
pub const RESOURCE_VARIABLE: &str = "plugin";

/// Variable a list of resources is bound to
pub const RESOURCE_LIST_VARIABLE: &str = "plugins";

/// Evaluates expressions against Kubernetes-style resources
pub struct ResourceEvaluator {
    root: Context<'static>,
}

impl Default for ResourceEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceEvaluator {
    pub fn new() -> Self {
        Self {
            root: Context::default(),
        }
    }

    /// Evaluate `expression` with `resource` bound as `plugin`
    pub fn evaluate<T: Serialize>(&self, expression: &str, resource: &T) -> Result<JsonValue> {
        check_expression(expression)?;
        let data = serde_json::to_value(resource)?;
        if is_empty(&data) {
            return Err(EngineError::validation(
                "resource to evaluate against is empty",
            ));
        }

        execute(&self.root, expression, [(RESOURCE_VARIABLE, to_cel(&data))])
    }

    /// Evaluate `expression` with `resources` bound as the list `plugins`
    pub fn evaluate_all<T: Serialize>(&self, expression: &str, resources: &[T]) -> Result<JsonValue> {
        check_expression(expression)?;
        if resources.is_empty() {
            return Err(EngineError::validation(
                "resource list to evaluate against is empty",
            ));
        }

        let items = resources
            .iter()
            .map(|r| serde_json::to_value(r).map(|v| to_cel(&v)))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let list = Value::List(Arc::new(items));

        execute(&self.root, expression, [(RESOURCE_LIST_VARIABLE, list)])
    }
}

pub(crate) fn check_expression(expression: &str) -> Result<()> {
    if expression.trim().is_empty() {
        return Err(EngineError::validation("expression must not be empty"));
    }
    Ok(())
}

fn is_empty(data: &JsonValue) -> bool {
    match data {
        JsonValue::Null => true,
        JsonValue::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Compile and run `expression` in a child scope of `root`
pub(crate) fn execute<'a, I>(root: &Context<'static>, expression: &str, bindings: I) -> Result<JsonValue>
where
    I: IntoIterator<Item = (&'a str, Value)>,
{
    let program = Program::compile(expression).map_err(|e| EngineError::compile(expression, e))?;

    let mut scope = root.new_inner_scope();
    for (name, value) in bindings {
        scope.add_variable_from_value(name, value);
    }

    let value = program
        .execute(&scope)
        .map_err(|e| EngineError::eval(expression, e))?;

    to_json(&value).map_err(|message| EngineError::eval(expression, message))
}

/// Convert JSON into a CEL value; integers stay signed when they fit
pub(crate) fn to_cel(value: &JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                Value::UInt(u)
            } else {
                Value::Float(n.as_f64().unwrap_or_default())
            }
        }
        JsonValue::String(s) => Value::String(Arc::new(s.clone())),
        JsonValue::Array(items) => Value::List(Arc::new(items.iter().map(to_cel).collect())),
        JsonValue::Object(fields) => {
            let map: HashMap<Key, Value> = fields
                .iter()
                .map(|(k, v)| (Key::String(Arc::new(k.clone())), to_cel(v)))
                .collect();
            Value::Map(Map { map: Arc::new(map) })
        }
    }
}

/// Convert an evaluation result back to JSON
///
/// Lists are resolved element by element, bytes become base64 text.
pub(crate) fn to_json(value: &Value) -> std::result::Result<JsonValue, String> {
    match value {
        Value::List(items) => items
            .iter()
            .map(to_json)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(JsonValue::Array),
        Value::Map(map) => {
            let mut out = serde_json::Map::new();
            for (key, item) in map.map.iter() {
                out.insert(key_to_string(key), to_json(item)?);
            }
            Ok(JsonValue::Object(out))
        }
        Value::Int(i) => Ok(JsonValue::from(*i)),
        Value::UInt(u) => Ok(JsonValue::from(*u)),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .ok_or_else(|| format!("cannot represent {} as JSON", f)),
        Value::String(s) => Ok(JsonValue::String(s.to_string())),
        Value::Bytes(bytes) => Ok(JsonValue::String(
            base64::engine::general_purpose::STANDARD.encode(bytes.as_slice()),
        )),
        Value::Bool(b) => Ok(JsonValue::Bool(*b)),
        Value::Null => Ok(JsonValue::Null),
        other => Err(format!("unsupported result type: {:?}", other)),
    }
}

fn key_to_string(key: &Key) -> String {
    match key {
        Key::String(s) => s.to_string(),
        Key::Int(i) => i.to_string(),
        Key::Uint(u) => u.to_string(),
        Key::Bool(b) => b.to_string(),
    }
}
