//! relaysync - keeps a Cloudflare IP list equal to the published relay
//! egress ranges.

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use relaysync::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Serve => relaysync::commands::serve::run(&cli.config).await,
        Commands::Run { dry_run } => relaysync::commands::run::run(dry_run, &cli.config).await,
        Commands::Check => relaysync::commands::check::run(&cli.config).await,
        Commands::Normalize {
            promote_ipv6,
            entries,
        } => relaysync::commands::normalize::run(&entries, promote_ipv6).await,
        Commands::Init { force } => relaysync::commands::init::run(&cli.config, force).await,
        Commands::Version => {
            println!("relaysync {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
