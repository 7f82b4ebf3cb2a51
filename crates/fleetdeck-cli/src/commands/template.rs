//! Template command - render an option value template against a values tree

use std::path::Path;

use fleetdeck_core::Values;
use fleetdeck_engine::TemplateResolver;

use crate::error::Result;

/// `template` is the template text, or `@path` to read it from a file
pub fn run(template: &str, values: Option<&Path>) -> Result<()> {
    let source = match template.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)?,
        None => template.to_string(),
    };

    let tree = match values {
        Some(path) => Values::from_file(path)?,
        None => Values::new(),
    };

    let rendered = TemplateResolver::new().resolve(&source, tree.inner())?;
    println!("{}", rendered);
    Ok(())
}
