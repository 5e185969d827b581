use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

/// rust-nrd Command Line Interface
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage routes in an in-process RIB
    Route {
        #[clap(subcommand)]
        cmd: RouteCommands,
    },

    /// Run a script of RIB commands against an in-process RIB
    Exec {
        /// Path to the script file
        script: PathBuf,
    },
}

#[derive(Subcommand)]
enum RouteCommands {
    /// Register a route
    Add {
        /// Name prefix (NDN URI format)
        prefix: String,

        /// Next-hop face ID
        face: u64,

        /// Route origin (app, autoreg, client, autoconf, nlsr, static)
        #[clap(short, long, default_value = "app")]
        origin: String,

        /// Route cost/metric
        #[clap(short, long, default_value = "0")]
        cost: u64,

        /// Inherit this route to descendant prefixes
        #[clap(long)]
        child_inherit: bool,

        /// Stop inheritance from ancestor prefixes
        #[clap(long)]
        capture: bool,

        /// Expiration period in milliseconds
        #[clap(long)]
        expires_ms: Option<u64>,
    },

    /// Unregister a route
    Remove {
        /// Name prefix (NDN URI format)
        prefix: String,

        /// Next-hop face ID
        face: u64,

        /// Route origin
        #[clap(short, long, default_value = "app")]
        origin: String,
    },

    /// Show the RIB
    Show,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if cli.verbose { "debug" } else { "info" },
    ))
    .init();

    // The RIB service is single-threaded; every task it spawns stays on
    // this thread's LocalSet.
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async move {
            match cli.command {
                Commands::Route { cmd } => commands::route::handle_command(cmd).await,
                Commands::Exec { script } => commands::exec::run_script(&script).await,
            }
        })
        .await
}
