//! Drift command - compare a rendered manifest with live cluster objects

use std::path::Path;

use fleetdeck_core::{FleetdeckConfig, Release};
use fleetdeck_kube::crd::is_crd;
use fleetdeck_kube::{DiffEngine, KubeCrdLookup, KubeResourceStore, parse_manifest};
use tracing::info;

use crate::commands::diff::report;
use crate::error::Result;

pub struct DriftArgs<'a> {
    pub manifest: &'a Path,
    pub name: &'a str,
    pub namespace: Option<&'a str>,
    pub check_crds: bool,
    pub unified: bool,
    pub json: bool,
    pub exit_code: bool,
}

pub async fn run(config: &FleetdeckConfig, args: DriftArgs<'_>) -> Result<()> {
    let namespace = args.namespace.unwrap_or(&config.default_namespace);
    let rendered = std::fs::read_to_string(args.manifest)?;
    let local = Release::from_rendered(args.name, namespace, &rendered);

    let engine = DiffEngine::from_config(config);
    let client = kube::Client::try_default().await?;

    let mut list = if args.check_crds {
        let crds: Vec<_> = parse_manifest(&rendered)?
            .into_iter()
            .filter(is_crd)
            .collect();
        info!(count = crds.len(), "checking bundled CRDs");
        engine
            .diff_against_remote_crds(&crds, &KubeCrdLookup::new(client.clone()))
            .await?
    } else {
        Default::default()
    };

    let store = KubeResourceStore::new(client, namespace).await?;
    list.extend(engine.diff_against_live_objects(&local, namespace, &store).await?);

    report(list.sorted(), args.unified, args.json, args.exit_code)
}
