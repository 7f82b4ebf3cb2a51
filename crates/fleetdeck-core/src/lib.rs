//! fleetdeck Core - data model for plugin configuration
//!
//! This crate provides the foundational types used throughout fleetdeck:
//! - `OptionValue`: a named value with exactly one source (literal, secret, template, expression)
//! - `Values`: the nested configuration tree with deep merge support
//! - `Plugin` / `PluginDefinition`: the resources option values come from
//! - `Release`: a deployed manifest plus its hook manifests
//! - `checksum`: change detection over option values without secret I/O
//! - `FleetdeckConfig`: user configuration

pub mod checksum;
pub mod config;
pub mod error;
pub mod option;
pub mod plugin;
pub mod release;
pub mod values;

pub use checksum::checksum;
pub use config::FleetdeckConfig;
pub use error::{CoreError, Result};
pub use option::{OptionValue, SecretKeyRef, ValueSource};
pub use plugin::{
    ChartReference, OptionType, Plugin, PluginDefinition, PluginDefinitionSpec, PluginOption,
    PluginSpec,
};
pub use release::{HookManifest, Release};
pub use values::Values;
