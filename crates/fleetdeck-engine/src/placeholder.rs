//! `${...}` placeholder resolution inside YAML documents
//!
//! Every placeholder body is a platform expression. Results are spliced into
//! the document text before it is parsed:
//!
//! - strings verbatim (unquoted)
//! - numbers and booleans as their canonical text, `null` for null
//! - maps and lists as YAML without the trailing newline
//!
//! The caller is responsible for the quoting and indentation context around a
//! placeholder.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::platform::{EvalContext, PlatformEvaluator};

/// A placeholder body cannot contain `}`
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid placeholder regex"));

/// Whether `text` contains at least one placeholder
pub fn has_placeholders(text: &str) -> bool {
    PLACEHOLDER.is_match(text)
}

/// Resolve placeholders in `yaml` and return the document as JSON bytes
pub fn resolve_yaml(
    yaml: &str,
    evaluator: &PlatformEvaluator,
    context: &EvalContext,
) -> Result<Vec<u8>> {
    let value = resolve_yaml_value(yaml, evaluator, context)?;
    Ok(serde_json::to_vec(&value)?)
}

/// Resolve placeholders in `yaml` and return the parsed document
pub fn resolve_yaml_value(
    yaml: &str,
    evaluator: &PlatformEvaluator,
    context: &EvalContext,
) -> Result<JsonValue> {
    if !has_placeholders(yaml) {
        debug!("no placeholders found, converting YAML directly");
        return Ok(serde_yaml::from_str(yaml)?);
    }

    // Placeholders may sit in flow context (`[${a}]`, `{k: ${b}}`), so the
    // document is only parsed once they are substituted
    let mut seen: Vec<&str> = Vec::new();
    let mut resolved = yaml.to_string();

    for captures in PLACEHOLDER.captures_iter(yaml) {
        let (Some(full), Some(body)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        if seen.contains(&full.as_str()) {
            continue;
        }
        seen.push(full.as_str());

        let expression = body.as_str();
        let substitution = evaluator
            .evaluate(expression, context)
            .and_then(|value| substitution_text(&value))
            .map_err(|source| EngineError::Placeholder {
                expression: expression.to_string(),
                source: Box::new(source),
            })?;

        resolved = resolved.replace(full.as_str(), &substitution);
    }

    debug!(count = seen.len(), "placeholders substituted");
    Ok(serde_yaml::from_str(&resolved)?)
}

fn substitution_text(value: &JsonValue) -> Result<String> {
    match value {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Null => Ok("null".to_string()),
        JsonValue::Bool(b) => Ok(b.to_string()),
        JsonValue::Number(n) => Ok(n.to_string()),
        structured => {
            let yaml = serde_yaml::to_string(structured)?;
            Ok(yaml.trim_end_matches('\n').to_string())
        }
    }
}
