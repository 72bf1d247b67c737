#![deny(clippy::mod_module_files)]
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use resource_sync::{
    replay::{self, Script},
    SyncConfig,
};

#[derive(Parser, Debug)]
#[command(name = "resource-sync")]
#[command(about = "Replay resource synchronization scripts against a scripted transport")]
struct Args {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply the steps of a script and print the resulting snapshots
    Replay {
        script: PathBuf,

        /// Config file (defaults to ~/.config/resource-sync/config.yaml)
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = Format::Yaml)]
        format: Format,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Yaml,
    Json,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Commands::Replay {
            script,
            config,
            format,
        } => {
            let config = SyncConfig::load_or_default(config.as_deref())?;
            let script = Script::load(&script)?;
            tracing::info!("replaying {} steps", script.steps.len());

            let report = replay::run(&script, config, true).await?;
            print!("{}", replay::render(&report, format == Format::Json)?);
        }
    }

    Ok(())
}
