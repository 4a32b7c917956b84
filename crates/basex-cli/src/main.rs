mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::serve::ServeArgs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "basexservice",
    about = "Schema.org action gateway for the BaseX XML database",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service (default when no subcommand is given)
    Serve(ServeArgs),

    /// Show which handler an action document would be dispatched to
    Route {
        /// JSON-LD action file
        file: PathBuf,
        /// Output as JSON
        #[arg(long, short = 'j')]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        None | Some(Commands::Serve(_)) => tracing::Level::INFO,
        Some(Commands::Route { .. }) => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        // Bare invocation: serve with flags taken from the environment.
        None => cmd::serve::run(ServeArgs::parse_from(["basexservice"])),
        Some(Commands::Serve(args)) => cmd::serve::run(args),
        Some(Commands::Route { file, json }) => cmd::route::run(&file, json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
