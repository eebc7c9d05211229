//! Common utility functions used across modules.
//!
//! - [`format_count`] - Format counts with K/M suffix (1.5K, 2.3M)
//! - [`count_addresses`] - Number of addresses covered by a set of CIDRs

use ipnet::IpNet;

/// Format a count with K/M suffix for compact display.
///
/// # Examples
/// ```
/// use relaysync::utils::format_count;
/// assert_eq!(format_count(500), "500");
/// assert_eq!(format_count(1500), "1.5K");
/// assert_eq!(format_count(1_500_000), "1.5M");
/// ```
pub fn format_count(count: usize) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}

/// Total number of addresses covered by CIDR strings, counting overlaps twice.
///
/// Entries `ipnet` cannot read (e.g. IPv4 octets with leading zeros) are
/// skipped. Saturates instead of overflowing.
///
/// # Examples
/// ```
/// use relaysync::utils::count_addresses;
/// assert_eq!(count_addresses(["192.0.2.0/24", "198.51.100.7/32"]), 257);
/// ```
pub fn count_addresses<I, S>(cidrs: I) -> u128
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    cidrs
        .into_iter()
        .filter_map(|cidr| cidr.as_ref().parse::<IpNet>().ok())
        .map(|net| {
            let shift = u32::from(net.max_prefix_len() - net.prefix_len());
            1u128.checked_shl(shift).unwrap_or(u128::MAX)
        })
        .fold(0u128, |acc, count| acc.saturating_add(count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_count_boundaries() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1.0K");
        assert_eq!(format_count(1_000_000), "1.0M");
    }

    #[test]
    fn test_count_addresses_ipv4() {
        assert_eq!(count_addresses(["10.0.0.0/8"]), 1 << 24);
        assert_eq!(count_addresses(["10.0.0.1/32", "10.0.0.2/32"]), 2);
    }

    #[test]
    fn test_count_addresses_ipv6() {
        assert_eq!(count_addresses(["2001:db8::/64"]), 1u128 << 64);
    }

    #[test]
    fn test_count_addresses_skips_unparseable() {
        assert_eq!(count_addresses(["garbage", "192.0.2.0/31"]), 2);
    }

    #[test]
    fn test_count_addresses_empty() {
        assert_eq!(count_addresses(Vec::<String>::new()), 0);
    }
}
