//! Bitsweep CLI: rebuild a program across compile-time parameter sweeps.

mod commands;
mod manifest;

use std::path::{Path, PathBuf};
use std::process;

use bitsweep_core::{BitRange, SelectionPolicy, SweepConfig};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "bitsweep",
    version,
    about = "Rebuild and archive a program for every point of a bit-width sweep"
)]
struct Cli {
    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
    /// Log debug details (commands run, hashes)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default bitsweep.toml in the current directory
    Init {
        /// Overwrite an existing bitsweep.toml
        #[arg(long)]
        force: bool,
    },
    /// Patch, rebuild and archive every configuration
    Run {
        #[command(flatten)]
        sweep: SweepArgs,
        /// Report format (human, json)
        #[arg(long)]
        report: Option<String>,
        /// Exit with an error if any step failed
        #[arg(long)]
        fail_on_error: bool,
    },
    /// Show the configurations and archive names a run would produce
    Plan {
        #[command(flatten)]
        sweep: SweepArgs,
    },
    /// Remove build-system cache files
    Clean {
        #[command(flatten)]
        sweep: SweepArgs,
        /// Also remove archives produced by the configured sweep
        #[arg(long)]
        archives: bool,
    },
    /// Check toolchain and template status
    Doctor {
        #[command(flatten)]
        sweep: SweepArgs,
    },
}

/// Overrides for values from bitsweep.toml.
#[derive(Args, Default)]
struct SweepArgs {
    /// Bit-width range (e.g. 16..25 or 16..=24)
    #[arg(long)]
    bits: Option<BitRange>,
    /// Selection policy (diagonal, product)
    #[arg(long)]
    policy: Option<SelectionPolicy>,
    /// Template file holding the definitions
    #[arg(long)]
    template: Option<PathBuf>,
    /// Token that starts a definition line
    #[arg(long)]
    marker: Option<String>,
    /// Parameter names, comma-separated
    #[arg(long, value_delimiter = ',')]
    params: Option<Vec<String>>,
    /// Parameter that names archives and sets the difficulty count
    #[arg(long)]
    primary: Option<String>,
    /// Build output binary
    #[arg(long)]
    output: Option<PathBuf>,
    /// Backend option passed to configure as -D <OPTION>
    #[arg(long)]
    backend: Option<String>,
    /// Directory for archived binaries
    #[arg(long)]
    archive_dir: Option<PathBuf>,
}

impl SweepArgs {
    fn apply(self, config: &mut SweepConfig) {
        if let Some(range) = self.bits {
            config.sweep.set_range(range);
        }
        if let Some(policy) = self.policy {
            config.sweep.policy = policy;
        }
        if let Some(path) = self.template {
            config.template.path = path;
        }
        if let Some(marker) = self.marker {
            config.template.marker = marker;
        }
        if let Some(params) = self.params {
            config.template.parameters = params;
            // A primary from the file may not exist in the new list.
            config.template.primary = None;
        }
        if let Some(primary) = self.primary {
            config.template.primary = Some(primary);
        }
        if let Some(output) = self.output {
            config.build.output = output;
        }
        if let Some(backend) = self.backend {
            config.build.backend_option = backend;
        }
        if let Some(dir) = self.archive_dir {
            config.archive.dir = dir;
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn init_logging(quiet: bool, verbose: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Init { force } => commands::init::run(&cwd, force),

        Commands::Run {
            sweep,
            report,
            fail_on_error,
        } => {
            let (config, workdir, _) = load_config(&cwd, sweep)?;
            commands::run::run(&workdir, config, report.as_deref(), fail_on_error)
        }

        Commands::Plan { sweep } => {
            let (config, workdir, _) = load_config(&cwd, sweep)?;
            commands::plan::run(&workdir, &config)
        }

        Commands::Clean { sweep, archives } => {
            let (config, workdir, _) = load_config(&cwd, sweep)?;
            commands::clean::run(&workdir, &config, archives)
        }

        Commands::Doctor { sweep } => {
            let (config, workdir, found) = load_config(&cwd, sweep)?;
            commands::doctor::run(&workdir, &config, found)
        }
    }
}

/// Load bitsweep.toml from `cwd` upward (defaults if absent) and apply CLI
/// overrides. Returns the config, the working directory and whether a file
/// was found.
fn load_config(cwd: &Path, overrides: SweepArgs) -> anyhow::Result<(SweepConfig, PathBuf, bool)> {
    let loaded = manifest::find_and_load(cwd)?;
    Ok(resolve_config(loaded, cwd, overrides))
}

/// Fall back to defaults rooted at `cwd` when no file was found, then apply
/// the overrides.
fn resolve_config(
    loaded: Option<(SweepConfig, PathBuf)>,
    cwd: &Path,
    overrides: SweepArgs,
) -> (SweepConfig, PathBuf, bool) {
    let (mut config, workdir, found) = match loaded {
        Some((config, dir)) => (config, dir, true),
        None => (SweepConfig::default(), cwd.to_path_buf(), false),
    };
    overrides.apply(&mut config);
    (config, workdir, found)
}
