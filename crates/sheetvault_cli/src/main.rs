//! SheetVault CLI
//!
//! Command-line tools for SheetVault record stores.
//!
//! # Commands
//!
//! - `inspect` - Display store statistics and a user's records
//! - `verify` - Rescan the record log and check every entry
//! - `compact` - Rewrite the log keeping only the latest record per key

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// SheetVault command-line store tools.
#[derive(Parser)]
#[command(name = "sheetvault")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the record log file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display store statistics
    Inspect {
        /// Also show this user's sheets and preferences
        #[arg(short, long)]
        user: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify record log integrity
    Verify,

    /// Rewrite the record log keeping only the latest record per key
    Compact {
        /// Dry run - show what would be done
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { user, format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, user.as_deref(), &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Store path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::Compact { dry_run } => {
            let path = cli.path.ok_or("Store path required for compact")?;
            commands::compact::run(&path, dry_run)?;
        }
        Commands::Version => {
            println!("SheetVault CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("SheetVault Core v{}", sheetvault_core::VERSION);
        }
    }

    Ok(())
}
