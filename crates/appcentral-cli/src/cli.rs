//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// AppCentral - Browse applications across every registered server
#[derive(Parser, Debug)]
#[command(name = "appcentral")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to appcentral.toml (defaults to the user config directory)
    #[arg(long, global = true, env = "APPCENTRAL_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// List every application version and where it is available
    ///
    /// Exits with status 2 when some servers could not be read.
    List {
        /// Bypass cached listings
        #[arg(long)]
        refresh: bool,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Show the versions and sources of one application
    Find {
        /// Application identifier
        application: String,

        /// Bypass cached listings
        #[arg(long)]
        refresh: bool,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Refresh every server's listings, reporting each repository
    Update,

    /// List the configured servers
    Servers,
}
