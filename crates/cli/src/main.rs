use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use classweave::commands::{init_command, inspect_command, run_command, runs_command, status_command};

/// Incremental method-entry instrumentation pipeline for JVM class files.
///
/// This CLI is a thin wrapper around `weave-core` (exposed in code as
/// `weave_core`). All substantive logic lives in the library so it can be
/// tested thoroughly and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "classweave",
    version = weave_core::version(),
    about = "Incremental method-entry instrumentation for JVM class files",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a new classweave project at the given root.
    ///
    /// This will:
    /// - Create a `.classweave` metadata directory and state database.
    /// - Write a `classweave.yaml` config file with defaults.
    Init {
        /// Project root directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Optional project name. If omitted, derived from the root directory.
        #[arg(long)]
        name: Option<String>,
    },

    /// Execute one pipeline run over the configured containers.
    ///
    /// Runs incrementally against the state database by default; `--full`
    /// clears outputs and rebuilds everything.
    Run {
        /// Project root directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Force a full build (clear outputs, retransform everything).
        #[arg(long, default_value_t = false)]
        full: bool,

        /// Transform to run (overrides config; `none` disables the pass).
        #[arg(long)]
        transform: Option<String>,

        /// Print the computed change set without writing anything.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Show the change set the next incremental run would act on.
    Status {
        /// Project root directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List recorded pipeline runs.
    Runs {
        /// Project root directory. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print the classes and method signatures of a class file or jar.
    Inspect {
        /// Path to a `.class` file or `.jar` archive.
        #[arg(long)]
        path: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Init { root, name } => init_command(&root, name)?,
        Command::Run { root, full, transform, dry_run } => {
            run_command(&root, full, transform, dry_run)?
        }
        Command::Status { root, json } => status_command(&root, json)?,
        Command::Runs { root, json } => runs_command(&root, json)?,
        Command::Inspect { path, json } => inspect_command(&path, json)?,
    }

    Ok(())
}
