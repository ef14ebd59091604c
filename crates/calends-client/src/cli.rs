//! Command-line interface definition.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// calends - Your calendars, one week at a time
#[derive(Debug, Parser)]
#[command(name = "calends")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Calendar sources: .ics paths or http(s)/webcal URLs
    pub sources: Vec<String>,

    /// Path to configuration file (TOML, or JSON when ending in .json)
    #[arg(long, short, env = "CALENDS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Show the week containing this date (YYYY-MM-DD)
    #[arg(long, short)]
    pub date: Option<NaiveDate>,

    /// Display timezone: UTC, GMT, LOCAL, +HH:MM or an IANA name
    #[arg(long, visible_alias = "tz", env = "CALENDS_TIMEZONE")]
    pub timezone: Option<String>,

    /// Disable colors
    #[arg(long)]
    pub no_color: bool,

    /// Browse weeks interactively
    #[arg(long, short)]
    pub interactive: bool,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Write logs to this file (interactive mode logs nowhere otherwise)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Cache directory
    #[arg(long, env = "CALENDS_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Seconds between background refreshes in interactive mode (0 disables)
    #[arg(long)]
    pub refresh_interval: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Cache commands
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Cache actions.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Show entry count, size and fetch times
    Stats,

    /// Remove all cached calendars
    Clear,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump the effective configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}
