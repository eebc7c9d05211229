//! Normalize command: show how the normalizer treats each entry.

use anyhow::Result;

use crate::cidr::{normalize_entry, NormalizeOptions};

/// One output line per entry, `OK` or `REJECT` with the reason
pub fn report_lines(entries: &[String], options: NormalizeOptions) -> Vec<String> {
    entries
        .iter()
        .map(|entry| match normalize_entry(entry, options) {
            Ok(cidr) => format!("OK      {} -> {}", entry, cidr),
            Err(reason) => format!("REJECT  {} ({})", entry, reason),
        })
        .collect()
}

/// Run the normalize command
pub async fn run(entries: &[String], promote_ipv6: bool) -> Result<()> {
    let options = NormalizeOptions {
        promote_ipv6_to_slash64: promote_ipv6,
    };
    for line in report_lines(entries, options) {
        println!("{}", line);
    }
    Ok(())
}
