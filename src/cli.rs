//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "relaysync")]
#[command(
    author,
    version,
    about = "Keep a Cloudflare IP list in sync with relay egress feeds"
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path
    #[arg(
        short,
        long,
        default_value = "/etc/relaysync/config.yaml",
        global = true
    )]
    pub config: PathBuf,

    /// Quiet mode (for cron/systemd timer)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug output)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the status endpoint and reconcile on the configured schedule
    Serve,

    /// Reconcile once and exit
    Run {
        /// Compute the difference but don't write the list
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the configuration without touching the network
    Check,

    /// Show how entries would be normalized
    Normalize {
        /// Complete bare IPv6 addresses to /64 instead of rejecting them
        #[arg(long)]
        promote_ipv6: bool,

        /// Entries to normalize
        #[arg(required = true)]
        entries: Vec<String>,
    },

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show version
    Version,
}
