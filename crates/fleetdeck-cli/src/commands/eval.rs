//! Eval command - evaluate an expression against a resource, a list of
//! resources or platform values

use std::path::Path;

use fleetdeck_core::Values;
use fleetdeck_engine::{EvalContext, PlatformEvaluator, ResourceEvaluator};
use serde_json::Value as JsonValue;

use crate::error::{CliError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// The data is one resource, bound as `plugin`
    Resource,
    /// The data is a list of resources, bound as `plugins`
    List,
    /// The data is a values tree; its `global` key is bound as `global`
    Global,
}

pub fn run(expression: &str, data_path: Option<&Path>, binding: Binding) -> Result<()> {
    let data: JsonValue = match data_path {
        Some(path) => serde_yaml::from_str(&std::fs::read_to_string(path)?)?,
        None => JsonValue::Null,
    };

    let result = match binding {
        Binding::Resource => ResourceEvaluator::new().evaluate(expression, &data)?,
        Binding::List => {
            let JsonValue::Array(items) = data else {
                return Err(CliError::validation_with_help(
                    "--list needs a YAML or JSON sequence of resources",
                    "drop --list to bind a single resource as `plugin`",
                ));
            };
            ResourceEvaluator::new().evaluate_all(expression, &items)?
        }
        Binding::Global => {
            let context = EvalContext::from_tree(&Values::from_json_value(data)?);
            PlatformEvaluator::new().evaluate(expression, &context)?
        }
    };

    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}
