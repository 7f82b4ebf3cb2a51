//! Pluggable evaluators for dynamic option values
//!
//! Templates and expressions are two syntaxes over the same data: the
//! configuration tree materialized so far. Both implement
//! [`ValueEvaluator`], and the resolution pipeline only talks to the trait,
//! so either can be swapped out.

use fleetdeck_core::Values;
use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::placeholder::{has_placeholders, resolve_yaml_value};
use crate::platform::{EvalContext, PlatformEvaluator};
use crate::template::TemplateResolver;

/// Turns the body of a dynamic option value into a concrete value
pub trait ValueEvaluator: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Evaluate `body` against the configuration tree built so far
    fn resolve_value(&self, body: &str, tree: &Values) -> Result<JsonValue>;
}

impl ValueEvaluator for TemplateResolver {
    fn name(&self) -> &'static str {
        "template"
    }

    /// Templates always produce a string
    fn resolve_value(&self, body: &str, tree: &Values) -> Result<JsonValue> {
        self.resolve(body, tree.inner()).map(JsonValue::String)
    }
}

impl ValueEvaluator for PlatformEvaluator {
    fn name(&self) -> &'static str {
        "expression"
    }

    /// A body containing `${...}` is a YAML document with placeholders;
    /// anything else is a single platform expression
    fn resolve_value(&self, body: &str, tree: &Values) -> Result<JsonValue> {
        let context = EvalContext::from_tree(tree);
        if has_placeholders(body) {
            resolve_yaml_value(body, self, &context)
        } else {
            self.evaluate(body, &context)
        }
    }
}
