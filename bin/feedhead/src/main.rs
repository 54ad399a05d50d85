mod commands;

use clap::{Parser, Subcommand};
use feedhead_core::Paths;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "feedhead")]
#[command(about = "Inspect and update a persisted feed HEAD", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Base directory (defaults to ~/.feedhead)
    #[arg(long, global = true)]
    home: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the configuration file and data directory
    Init {
        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Apply a JSONL file of stream structures to HEAD
    Import {
        /// File to import (all *.jsonl files in the imports directory if omitted)
        file: Option<PathBuf>,

        /// Clear HEAD before applying
        #[arg(long)]
        clear_head: bool,

        /// Schema version adopted when HEAD is cleared
        #[arg(long, default_value_t = 0)]
        schema_version: i32,
    },

    /// Print HEAD in traversal order
    Tree {
        /// Include nodes that have no payload
        #[arg(long)]
        all: bool,
    },

    /// Show journal and content counts
    Stats,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the current configuration
    Show,
    /// Get a config value by dot-separated key (e.g. feed.limitPageUpdates)
    Get { key: String },
    /// Set a config value by dot-separated key
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let paths = match cli.home {
        Some(base) => Paths::with_base(base),
        None => Paths::new(),
    };

    match cli.command {
        Commands::Init { force } => {
            commands::init::run(&paths, force).await?;
        }
        Commands::Import {
            file,
            clear_head,
            schema_version,
        } => {
            commands::import::run(&paths, file, clear_head, schema_version).await?;
        }
        Commands::Tree { all } => {
            commands::tree::run(&paths, all).await?;
        }
        Commands::Stats => {
            commands::stats::run(&paths).await?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                commands::config_cmd::show(&paths).await?;
            }
            ConfigCommands::Get { key } => {
                commands::config_cmd::get(&paths, &key).await?;
            }
            ConfigCommands::Set { key, value } => {
                commands::config_cmd::set(&paths, &key, &value).await?;
            }
        },
    }

    Ok(())
}
