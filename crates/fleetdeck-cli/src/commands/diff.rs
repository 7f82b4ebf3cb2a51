//! Diff command - compare a rendered release with the one deployed before it

use std::path::Path;

use fleetdeck_core::{FleetdeckConfig, Release, Values};
use fleetdeck_engine::TemplateChart;
use fleetdeck_kube::{DiffEngine, DiffList};

use crate::display::{print_diff_list, print_document};
use crate::error::{CliError, Result};

/// What the prior release is compared with
pub enum LocalSide<'a> {
    /// An already rendered manifest
    Rendered(&'a Path),
    /// A directory of chart templates, rendered with the given values
    Chart {
        templates: &'a Path,
        values: Option<&'a Path>,
    },
}

pub struct DiffArgs<'a> {
    pub prior: &'a Path,
    pub local: LocalSide<'a>,
    pub name: &'a str,
    pub namespace: &'a str,
    pub unified: bool,
    pub json: bool,
    pub exit_code: bool,
}

pub fn run(config: &FleetdeckConfig, args: DiffArgs<'_>) -> Result<()> {
    let prior = load_release(args.prior, args.name, args.namespace)?;
    let engine = DiffEngine::from_config(config);

    let list = match args.local {
        LocalSide::Rendered(path) => {
            let rendered = std::fs::read_to_string(path)?;
            let local = Release::from_rendered(args.name, args.namespace, &rendered);
            engine.diff_against_release(&local, &prior)?
        }
        LocalSide::Chart { templates, values } => {
            let values = match values {
                Some(path) => Values::from_file(path)?,
                None => Values::new(),
            };
            let chart = TemplateChart::from_dir(args.name, templates)?;
            engine.diff_chart_against_release(&chart, &values, &prior)?
        }
    };

    report(list.sorted(), args.unified, args.json, args.exit_code)
}

/// A stored release record, or a plain rendered manifest
fn load_release(path: &Path, name: &str, namespace: &str) -> Result<Release> {
    let content = std::fs::read_to_string(path)?;
    let looks_like_record = serde_yaml::from_str::<serde_yaml::Value>(&content)
        .ok()
        .and_then(|v| v.get("manifest").map(|m| m.is_string()))
        .unwrap_or(false);

    if looks_like_record {
        Ok(serde_yaml::from_str(&content)?)
    } else {
        Ok(Release::from_rendered(name, namespace, &content))
    }
}

/// Print a diff list and turn drift into an error when asked to
pub fn report(list: DiffList, unified: bool, json: bool, exit_code: bool) -> Result<()> {
    if json {
        print_document(&list, true)?;
    } else {
        print_diff_list(&list, unified);
    }

    if exit_code && !list.is_empty() {
        return Err(CliError::DriftDetected { count: list.len() });
    }
    Ok(())
}
