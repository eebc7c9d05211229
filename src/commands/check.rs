//! Check command: validate configuration without network access.

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::Config;

/// Run the check command
pub async fn run(config_path: &Path) -> Result<()> {
    let config = Config::load_or_env(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    let settings = config.settings()?;
    let interval = config.schedule_interval()?;

    println!();
    println!("Configuration OK: {}", config_path.display());
    println!("  List:      {} (account {})", settings.list_name, settings.account_id);
    println!("  IPv4 feed: {}", settings.ipv4_url);
    println!("  IPv6 feed: {}", settings.ipv6_url);
    println!(
        "  Schedule:  {} ({}s), status on {}",
        config.schedule,
        interval.as_secs(),
        config.listen
    );
    println!(
        "  Retry:     {} attempt(s), base delay {:?}",
        settings.retry.attempts, settings.retry.base_delay
    );
    if settings.normalize.promote_ipv6_to_slash64 {
        println!("  Bare IPv6 addresses are promoted to /64");
    }
    println!();

    Ok(())
}
