//! stackgen CLI tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "stackgen")]
#[command(about = "Synthesize CloudFormation stacks for container projects", long_about = None)]
struct Cli {
    /// Settings document (.json or .kdl)
    #[arg(long, global = true, env = "STACKGEN_SETTINGS", default_value = "settings.json")]
    settings: PathBuf,

    /// Cloud assembly directory
    #[arg(long, global = true, env = "STACKGEN_OUTPUT", default_value = "cdk.out")]
    output: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize templates and write the cloud assembly
    Synth {
        /// Only synthesize this stack
        #[arg(long)]
        stack: Option<String>,
    },
    /// List the stacks the settings produce
    List,
    /// Load and validate the settings document
    Validate,
    /// Compare synthesized templates with the assembly on disk
    Diff {
        /// Only compare this stack
        #[arg(long)]
        stack: Option<String>,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Synth { stack } => {
            commands::synth::run(&cli.settings, &cli.output, stack.as_deref())?;
        }
        Commands::List => {
            commands::list(&cli.settings)?;
        }
        Commands::Validate => {
            commands::validate(&cli.settings)?;
        }
        Commands::Diff { stack } => {
            let changed = commands::diff::run(&cli.settings, &cli.output, stack.as_deref())?;
            if changed {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
