//! Rigging CLI tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::Session;

#[derive(Parser)]
#[command(name = "rigging")]
#[command(about = "Resolve build and deploy plans from a Rigging project", long_about = None)]
struct Cli {
    /// Project file to start discovery from
    #[arg(short = 'f', long, global = true, env = "RIGGING_PROJECT_FILE")]
    project_file: Option<PathBuf>,

    /// Glob of executor documents loaded before the project
    #[arg(long, global = true, env = "RIGGING_EXECUTORS")]
    executors: Option<String>,

    /// Extra placeholder value, available as {{ .Params.KEY }}
    #[arg(long = "param", global = true, value_name = "KEY=VALUE", value_parser = commands::parse_param)]
    params: Vec<(String, String)>,

    /// Restrict the run to these services
    #[arg(short, long, global = true, value_delimiter = ',')]
    services: Vec<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the build plan of the selected services
    Build {
        /// Include the push phase
        #[arg(long)]
        push: bool,
        /// Write the plan to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Resolve the deploy plan for an environment
    Deploy {
        /// Target environment
        #[arg(short, long)]
        environment: String,
        /// Tag being deployed
        #[arg(short, long)]
        tag: Option<String>,
        /// Write the plan to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Load and validate the project
    Validate {
        /// Validate in deploy mode against this environment
        #[arg(short, long)]
        environment: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let session = Session {
        project_file: cli.project_file,
        executors: cli.executors,
        params: cli.params,
        services: cli.services,
    };

    match cli.command {
        Commands::Build { push, output } => {
            commands::build::run(&session, push, output.as_deref())?;
        }
        Commands::Deploy {
            environment,
            tag,
            output,
        } => {
            commands::deploy::run(&session, &environment, tag, output.as_deref())?;
        }
        Commands::Validate { environment } => {
            commands::validate::run(&session, environment.as_deref())?;
        }
    }

    Ok(())
}
