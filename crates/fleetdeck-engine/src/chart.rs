//! Chart rendering
//!
//! Drift detection only needs "values in, manifest out", so the chart
//! renderer is a trait. [`TemplateChart`] is an in-memory implementation
//! that renders MiniJinja templates with the helper library.

use std::collections::BTreeMap;
use std::path::Path;

use fleetdeck_core::release::split_hooks;
use fleetdeck_core::{HookManifest, Values};
use tracing::debug;

use crate::error::{EngineError, Result, TemplateError};
use crate::template::create_environment;

/// Output of a chart render
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedChart {
    /// Manifest without hook documents
    pub manifest: String,
    pub hooks: Vec<HookManifest>,
}

impl RenderedChart {
    /// Split a rendered multi-document stream into manifest and hooks
    pub fn from_manifest(rendered: &str) -> Self {
        let (manifest, hooks) = split_hooks(rendered);
        Self { manifest, hooks }
    }
}

/// Renders a chart against a configuration tree
pub trait ChartRenderer {
    fn render(&self, values: &Values) -> Result<RenderedChart>;
}

/// A chart held as named template sources
///
/// Files whose name starts with `_` are helpers: they can be included or
/// imported but are not rendered on their own. `NOTES.txt` is skipped.
#[derive(Debug, Clone, Default)]
pub struct TemplateChart {
    name: String,
    templates: BTreeMap<String, String>,
}

impl TemplateChart {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            templates: BTreeMap::new(),
        }
    }

    pub fn with_template(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.templates.insert(name.into(), source.into());
        self
    }

    /// Load every file of a templates directory (not recursive)
    pub fn from_dir(name: impl Into<String>, dir: &Path) -> Result<Self> {
        let mut chart = Self::new(name);
        let entries = std::fs::read_dir(dir)
            .map_err(|e| EngineError::render(format!("failed to read {}: {}", dir.display(), e)))?;

        for entry in entries {
            let path = entry
                .map_err(|e| EngineError::render(e.to_string()))?
                .path();
            if !path.is_file() {
                continue;
            }
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let source = std::fs::read_to_string(&path).map_err(|e| {
                EngineError::render(format!("failed to read {}: {}", path.display(), e))
            })?;
            chart.templates.insert(file_name, source);
        }

        Ok(chart)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn is_rendered(template_name: &str) -> bool {
        !template_name.starts_with('_') && !template_name.eq_ignore_ascii_case("NOTES.txt")
    }
}

impl ChartRenderer for TemplateChart {
    fn render(&self, values: &Values) -> Result<RenderedChart> {
        let mut env = create_environment();
        for (name, source) in &self.templates {
            env.add_template_owned(name.clone(), source.clone())
                .map_err(|e| EngineError::Template(TemplateError::from_minijinja(e, name, source)))?;
        }

        let context = serde_json::json!({
            "values": values.inner(),
            "chart": {"name": self.name},
        });

        let mut documents = Vec::new();
        for (name, source) in &self.templates {
            if !Self::is_rendered(name) {
                continue;
            }
            let rendered = env
                .get_template(name)
                .and_then(|tmpl| tmpl.render(&context))
                .map_err(|e| EngineError::Template(TemplateError::from_minijinja(e, name, source)))?;

            let trimmed = rendered.trim();
            if trimmed.is_empty() || trimmed == "---" {
                continue;
            }
            documents.push(format!("# Source: {}\n{}\n", name, trimmed));
        }

        debug!(chart = %self.name, templates = documents.len(), "chart rendered");
        Ok(RenderedChart::from_manifest(&documents.join("---\n")))
    }
}

/// Renders nothing but a fixed manifest, whatever the values
#[derive(Debug, Clone, Default)]
pub struct StaticChart {
    manifest: String,
}

impl StaticChart {
    pub fn new(manifest: impl Into<String>) -> Self {
        Self {
            manifest: manifest.into(),
        }
    }
}

impl ChartRenderer for StaticChart {
    fn render(&self, _values: &Values) -> Result<RenderedChart> {
        Ok(RenderedChart::from_manifest(&self.manifest))
    }
}
