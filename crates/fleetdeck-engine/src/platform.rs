//! Platform-scoped CEL evaluation
//!
//! Platform expressions see the `global` subtree of the configuration plus a
//! small set of string helpers:
//!
//! ```text
//! global.region.upperAscii()
//! global.clusters.join(',')
//! 'svc-' + global.region.replace('-', '')
//! ```
//!
//! The environment is built once by [`PlatformEvaluator::new`] and never
//! mutated afterwards; share it behind an `Arc`.

use std::collections::BTreeMap;

use cel_interpreter::Context;
use fleetdeck_core::Values;
use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::expression::{check_expression, execute, to_cel};
use crate::extensions;

/// Name of the platform values variable
pub const GLOBAL_VARIABLE: &str = "global";

/// Read-only variables bound into a platform evaluation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalContext {
    variables: BTreeMap<String, JsonValue>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context binding only `global`
    pub fn with_global(global: JsonValue) -> Self {
        Self::new().with_variable(GLOBAL_VARIABLE, global)
    }

    /// Bind `global` to the `global` subtree of a config tree
    ///
    /// A tree without a `global` key binds an empty map, so expressions that
    /// never touch it still evaluate.
    pub fn from_tree(tree: &Values) -> Self {
        let global = tree
            .get(GLOBAL_VARIABLE)
            .cloned()
            .unwrap_or_else(|| JsonValue::Object(Default::default()));
        Self::with_global(global)
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.variables.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// Immutable evaluation environment for platform expressions
pub struct PlatformEvaluator {
    root: Context<'static>,
}

impl Default for PlatformEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PlatformEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformEvaluator").finish_non_exhaustive()
    }
}

impl PlatformEvaluator {
    pub fn new() -> Self {
        let mut root = Context::default();
        extensions::register(&mut root);
        tracing::debug!("platform expression environment initialized");
        Self { root }
    }

    /// Evaluate `expression` against the variables of `context`
    pub fn evaluate(&self, expression: &str, context: &EvalContext) -> Result<JsonValue> {
        check_expression(expression)?;
        let bindings = context
            .variables
            .iter()
            .map(|(name, value)| (name.as_str(), to_cel(value)));
        execute(&self.root, expression, bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use serde_json::json;

    fn context() -> EvalContext {
        EvalContext::with_global(json!({
            "region": "eu-1",
            "clusters": ["a", "b"],
            "name": "  padded  ",
            "replicas": 3
        }))
    }

    fn eval(expression: &str) -> JsonValue {
        PlatformEvaluator::new().evaluate(expression, &context()).unwrap()
    }

    #[test]
    fn test_global_field() {
        assert_eq!(eval("global.region"), json!("eu-1"));
        assert_eq!(eval("global.replicas * 2"), json!(6));
    }

    #[test]
    fn test_case_functions() {
        assert_eq!(eval("global.region.upperAscii()"), json!("EU-1"));
        assert_eq!(eval("'EU'.lowerAscii()"), json!("eu"));
        assert_eq!(eval("global.region.upper()"), json!("EU-1"));
        assert_eq!(eval("'AbC'.lower()"), json!("abc"));
    }

    #[test]
    fn test_split_join() {
        assert_eq!(eval("'a,b,c'.split(',')"), json!(["a", "b", "c"]));
        assert_eq!(eval("global.clusters.join('-')"), json!("a-b"));
    }

    #[test]
    fn test_trim_replace() {
        assert_eq!(eval("global.name.trim()"), json!("padded"));
        assert_eq!(eval("global.region.replace('-', '')"), json!("eu1"));
    }

    #[test]
    fn test_standard_string_functions() {
        assert_eq!(eval("global.region.contains('u-')"), json!(true));
        assert_eq!(eval("global.region.startsWith('eu')"), json!(true));
        assert_eq!(eval("global.region.endsWith('2')"), json!(false));
    }

    #[test]
    fn test_join_rejects_non_strings() {
        let err = PlatformEvaluator::new()
            .evaluate("[1, 2].join(',')", &context())
            .unwrap_err();
        assert!(matches!(err, EngineError::Eval { .. }));
    }

    #[test]
    fn test_from_tree_binds_global_subtree() {
        let tree = Values(json!({"global": {"region": "us-2"}, "replicas": 1}));
        let ctx = EvalContext::from_tree(&tree);
        assert_eq!(ctx.get("global"), Some(&json!({"region": "us-2"})));
        assert!(ctx.get("replicas").is_none());

        let empty = EvalContext::from_tree(&Values::new());
        assert_eq!(empty.get("global"), Some(&json!({})));
    }

    #[test]
    fn test_unbound_variable_is_eval_error() {
        let err = PlatformEvaluator::new()
            .evaluate("global.region", &EvalContext::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::Eval { .. }));
    }

    #[test]
    fn test_shared_evaluator_is_pure() {
        let evaluator = std::sync::Arc::new(PlatformEvaluator::new());
        let ctx = context();
        let first = evaluator.evaluate("global.clusters", &ctx).unwrap();
        let second = evaluator.evaluate("global.clusters", &ctx).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, json!(["a", "b"]));
    }
}
