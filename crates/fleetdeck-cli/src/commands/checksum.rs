//! Checksum command - change detection over a plugin's option values

use std::path::Path;

use fleetdeck_core::{Plugin, checksum};

use crate::error::Result;

pub fn run(plugin_path: &Path) -> Result<()> {
    let plugin = Plugin::from_file(plugin_path)?;
    println!("{}", checksum(&plugin.spec.option_values));
    Ok(())
}
