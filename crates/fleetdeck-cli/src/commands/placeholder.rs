//! Placeholder command - resolve `${...}` placeholders in a YAML document

use std::io::Write;
use std::path::Path;

use fleetdeck_core::Values;
use fleetdeck_engine::{EvalContext, PlatformEvaluator, resolve_yaml};

use crate::error::Result;

pub fn run(document: &Path, values: Option<&Path>) -> Result<()> {
    let yaml = std::fs::read_to_string(document)?;
    let tree = match values {
        Some(path) => Values::from_file(path)?,
        None => Values::new(),
    };

    let evaluator = PlatformEvaluator::new();
    let json = resolve_yaml(&yaml, &evaluator, &EvalContext::from_tree(&tree))?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&json)?;
    stdout.write_all(b"\n")?;
    Ok(())
}
