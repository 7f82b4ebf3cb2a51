//! fleetdeck CLI - resolve plugin option values and detect drift

use clap::{Parser, Subcommand};
use fleetdeck_core::FleetdeckConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod display;
mod error;
mod exit_codes;

use commands::diff::{DiffArgs, LocalSide};
use commands::drift::DriftArgs;
use commands::eval::Binding;
use commands::resolve::ResolveArgs;
use error::{CliError, Result};

#[derive(Parser)]
#[command(name = "fleetdeck")]
#[command(author = "fleetdeck Contributors")]
#[command(version)]
#[command(about = "Resolve plugin option values and detect configuration drift", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Configuration file (default: $FLEETDECK_CONFIG or ~/.config/fleetdeck/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a plugin's option values into the chart configuration tree
    Resolve {
        /// Plugin resource (YAML)
        plugin: PathBuf,

        /// PluginDefinition declaring the options
        #[arg(short, long)]
        definition: Option<PathBuf>,

        /// Chart default values
        #[arg(long)]
        defaults: Option<PathBuf>,

        /// Read secrets from a `{secret: {key: value}}` file instead of the cluster
        #[arg(long)]
        secrets_file: Option<PathBuf>,

        /// Print the tree without secret values plus the secret references
        #[arg(long)]
        export: bool,

        /// Output JSON instead of YAML
        #[arg(long)]
        json: bool,
    },

    /// Print the checksum of a plugin's option values
    Checksum {
        /// Plugin resource (YAML)
        plugin: PathBuf,
    },

    /// Evaluate an expression
    Eval {
        /// Expression to evaluate
        expression: String,

        /// Data to bind (YAML or JSON)
        #[arg(short = 'f', long = "data")]
        data: Option<PathBuf>,

        /// Bind the data as a list of resources (`plugins`)
        #[arg(long, conflicts_with = "global")]
        list: bool,

        /// Treat the data as a values tree and bind its `global` key
        #[arg(long)]
        global: bool,
    },

    /// Resolve `${...}` placeholders in a YAML document and print JSON
    Placeholder {
        /// YAML document with placeholders
        document: PathBuf,

        /// Values tree whose `global` key is bound
        #[arg(short = 'f', long = "values")]
        values: Option<PathBuf>,
    },

    /// Render an option value template
    Template {
        /// Template text, or @file
        template: String,

        /// Values tree the template sees
        #[arg(short = 'f', long = "values")]
        values: Option<PathBuf>,
    },

    /// Compare a rendered manifest (or chart) with a prior release
    Diff {
        /// Prior release record or manifest
        prior: PathBuf,

        /// Rendered manifest to compare
        #[arg(long, required_unless_present = "chart", conflicts_with = "chart")]
        rendered: Option<PathBuf>,

        /// Directory of chart templates to render and compare
        #[arg(long)]
        chart: Option<PathBuf>,

        /// Values for --chart
        #[arg(short = 'f', long = "values", requires = "chart")]
        values: Option<PathBuf>,

        /// Release name
        #[arg(long, default_value = "release")]
        name: String,

        /// Release namespace
        #[arg(short, long, default_value = "default")]
        namespace: String,

        /// Show line diffs instead of JSON patches
        #[arg(long)]
        unified: bool,

        /// Output JSON
        #[arg(long)]
        json: bool,

        /// Exit with a non-zero code when differences are found
        #[arg(long)]
        exit_code: bool,
    },

    /// Compare a rendered manifest with live cluster objects
    Drift {
        /// Rendered manifest
        manifest: PathBuf,

        /// Release name
        #[arg(long, default_value = "release")]
        name: String,

        /// Namespace for objects that name none (default from configuration)
        #[arg(short, long)]
        namespace: Option<String>,

        /// Also report bundled CRDs missing from the cluster
        #[arg(long)]
        crds: bool,

        /// Show line diffs instead of JSON patches
        #[arg(long)]
        unified: bool,

        /// Output JSON
        #[arg(long)]
        json: bool,

        /// Exit with a non-zero code when drift is found
        #[arg(long)]
        exit_code: bool,
    },
}

fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    let result = tokio::runtime::Runtime::new()
        .map_err(CliError::from)
        .and_then(|runtime| runtime.block_on(run(cli)));

    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Logs go to stderr; `RUST_LOG` wins over `--debug`
fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = FleetdeckConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Resolve {
            plugin,
            definition,
            defaults,
            secrets_file,
            export,
            json,
        } => {
            commands::resolve::run(
                &config,
                ResolveArgs {
                    plugin: &plugin,
                    definition: definition.as_deref(),
                    defaults: defaults.as_deref(),
                    secrets_file: secrets_file.as_deref(),
                    export,
                    json,
                },
            )
            .await
        }

        Commands::Checksum { plugin } => commands::checksum::run(&plugin),

        Commands::Eval {
            expression,
            data,
            list,
            global,
        } => {
            let binding = match (list, global) {
                (true, _) => Binding::List,
                (_, true) => Binding::Global,
                _ => Binding::Resource,
            };
            commands::eval::run(&expression, data.as_deref(), binding)
        }

        Commands::Placeholder { document, values } => {
            commands::placeholder::run(&document, values.as_deref())
        }

        Commands::Template { template, values } => {
            commands::template::run(&template, values.as_deref())
        }

        Commands::Diff {
            prior,
            rendered,
            chart,
            values,
            name,
            namespace,
            unified,
            json,
            exit_code,
        } => {
            let local = match (rendered.as_deref(), chart.as_deref()) {
                (Some(path), _) => LocalSide::Rendered(path),
                (None, Some(templates)) => LocalSide::Chart {
                    templates,
                    values: values.as_deref(),
                },
                (None, None) => {
                    return Err(CliError::validation("one of --rendered or --chart is required"));
                }
            };
            commands::diff::run(
                &config,
                DiffArgs {
                    prior: &prior,
                    local,
                    name: &name,
                    namespace: &namespace,
                    unified,
                    json,
                    exit_code,
                },
            )
        }

        Commands::Drift {
            manifest,
            name,
            namespace,
            crds,
            unified,
            json,
            exit_code,
        } => {
            commands::drift::run(
                &config,
                DriftArgs {
                    manifest: &manifest,
                    name: &name,
                    namespace: namespace.as_deref(),
                    check_crds: crds,
                    unified,
                    json,
                    exit_code,
                },
            )
            .await
        }
    }
}
