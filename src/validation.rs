//! Validation of configuration values.
//!
//! This module provides validation for:
//! - Trigger intervals (`30s`, `15m`, `1h`, `1d`)
//! - Cloudflare list names
//! - Source and webhook URLs

use anyhow::{bail, Result};
use reqwest::Url;
use std::time::Duration;

/// Cloudflare refuses list names longer than this
pub const MAX_LIST_NAME_LEN: usize = 50;

/// Timer interval check (e.g., "1h", "30m", "1d").
///
/// Returns `true` if the interval is valid. Non-ASCII input is rejected.
///
/// # Examples
/// ```
/// use relaysync::validation::is_valid_interval;
/// assert!(is_valid_interval("1h"));
/// assert!(is_valid_interval("30m"));
/// assert!(!is_valid_interval("4x"));
/// assert!(!is_valid_interval("0h"));
/// ```
pub fn is_valid_interval(interval: &str) -> bool {
    parse_interval(interval).is_ok()
}

/// Parse an interval into a [`Duration`] with a descriptive error.
///
/// Accepts a positive integer followed by `s`, `m`, `h` or `d`.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use relaysync::validation::parse_interval;
/// assert_eq!(parse_interval("90s").unwrap(), Duration::from_secs(90));
/// assert_eq!(parse_interval("2h").unwrap(), Duration::from_secs(7200));
/// assert!(parse_interval("invalid").is_err());
/// ```
pub fn parse_interval(interval: &str) -> Result<Duration> {
    if interval.is_empty() {
        bail!("Interval cannot be empty");
    }

    if !interval.is_ascii() {
        bail!("Invalid interval '{}'. Only ASCII characters allowed", interval);
    }

    if interval.len() < 2 {
        bail!("Invalid interval '{}'. Use format like '1h', '30m', '1d'", interval);
    }

    // ASCII-only, so the last byte is the last char
    let (num_part, suffix) = interval.split_at(interval.len() - 1);

    let unit_secs: u64 = match suffix {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        _ => bail!(
            "Invalid interval '{}'. Suffix must be s, m, h, or d",
            interval
        ),
    };

    let value: u32 = match num_part.parse() {
        Ok(v) if v > 0 && num_part.bytes().all(|b| b.is_ascii_digit()) => v,
        _ => bail!(
            "Invalid interval '{}'. Number part must be a positive integer",
            interval
        ),
    };

    Ok(Duration::from_secs(u64::from(value) * unit_secs))
}

/// Validate a list name: non-empty, at most 50 chars of `[A-Za-z0-9_]`.
///
/// # Examples
/// ```
/// use relaysync::validation::validate_list_name;
/// assert!(validate_list_name("icloud_private_relay").is_ok());
/// assert!(validate_list_name("bad name").is_err());
/// ```
pub fn validate_list_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("List name cannot be empty");
    }

    if name.len() > MAX_LIST_NAME_LEN {
        bail!(
            "List name '{}' is too long ({} chars, max {})",
            name,
            name.len(),
            MAX_LIST_NAME_LEN
        );
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!(
            "Invalid list name '{}'. Only letters, digits and '_' are allowed",
            name
        );
    }

    Ok(())
}

/// Validate that a URL is present and uses HTTPS.
pub fn validate_https_url(what: &str, url: &str) -> Result<()> {
    if url.trim().is_empty() {
        bail!("{} URL is not set", what);
    }
    if url.contains(char::is_whitespace) {
        bail!("{} URL contains whitespace: {}", what, url);
    }
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(e) => bail!("{} URL is invalid: {}: {}", what, url, e),
    };
    if parsed.scheme() != "https" {
        bail!("{} URL must use HTTPS: {}", what, url);
    }
    if parsed.host().is_none() {
        bail!("{} URL has no host: {}", what, url);
    }
    Ok(())
}
