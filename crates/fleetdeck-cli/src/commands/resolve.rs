//! Resolve command - build the configuration tree for a plugin

use std::path::Path;
use std::sync::Arc;

use fleetdeck_core::{FleetdeckConfig, Plugin, PluginDefinition, ValueSource, Values};
use fleetdeck_engine::PlatformEvaluator;
use fleetdeck_kube::{KubeSecretSource, SecretSource, SecretValueRef, StaticSecretSource, ValueResolver};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::display::print_document;
use crate::error::Result;

/// Tree for a backend that reads secrets itself
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeclarativeValues {
    values: JsonValue,
    values_from: Vec<SecretValueRef>,
}

pub struct ResolveArgs<'a> {
    pub plugin: &'a Path,
    pub definition: Option<&'a Path>,
    pub defaults: Option<&'a Path>,
    pub secrets_file: Option<&'a Path>,
    pub export: bool,
    pub json: bool,
}

pub async fn run(config: &FleetdeckConfig, args: ResolveArgs<'_>) -> Result<()> {
    let plugin = Plugin::from_file(args.plugin)?;

    let options = match args.definition {
        Some(path) => PluginDefinition::from_file(path)?.spec.options,
        None => Vec::new(),
    };

    let chart_defaults = match args.defaults {
        Some(path) => Values::from_file(path)?,
        None => Values::new(),
    };

    let secrets = secret_source(&plugin, args.secrets_file).await?;
    let resolver = ValueResolver::new(secrets, Arc::new(PlatformEvaluator::new()))
        .with_timeout(config.timeout());

    let resolved = resolver
        .resolve(&chart_defaults, &options, &plugin.spec.option_values)
        .await?;

    if args.export {
        let (tree, values_from) = resolved.declarative_export()?;
        let export = DeclarativeValues {
            values: tree.into_inner(),
            values_from,
        };
        print_document(&export, args.json)
    } else {
        print_document(resolved.tree(), args.json)
    }
}

/// Static secrets from a file, the cluster when the plugin references
/// secrets, or nothing at all
async fn secret_source(plugin: &Plugin, secrets_file: Option<&Path>) -> Result<Arc<dyn SecretSource>> {
    if let Some(path) = secrets_file {
        return Ok(Arc::new(StaticSecretSource::from_file(path)?));
    }

    let references_secrets = plugin
        .spec
        .option_values
        .iter()
        .any(|v| matches!(v.source, ValueSource::SecretRef(_)));
    if !references_secrets {
        return Ok(Arc::new(StaticSecretSource::new()));
    }

    debug!(namespace = plugin.namespace(), "reading secrets from the cluster");
    let client = kube::Client::try_default().await?;
    Ok(Arc::new(KubeSecretSource::namespaced(client, plugin.namespace())))
}
