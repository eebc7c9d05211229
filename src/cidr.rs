//! CIDR normalization for raw feed entries.
//!
//! Every raw entry is either turned into a canonical `ip/prefix` string whose
//! prefix lies inside the family bounds, or rejected with a [`ValidationError`].
//! The address text itself is never rewritten: `2001:DB8::` and `2001:db8::`
//! stay distinct strings.
//!
//! Bounds:
//! - IPv4: `/8` to `/32`, a missing prefix means `/32`
//! - IPv6: `/12` to `/64`, a missing prefix is rejected unless promotion to
//!   `/64` is enabled

use serde::Serialize;
use std::fmt;
use std::net::Ipv6Addr;

use crate::error::ValidationError;

pub const IPV4_MIN_PREFIX: u32 = 8;
pub const IPV4_MAX_PREFIX: u32 = 32;
pub const IPV6_MIN_PREFIX: u32 = 12;
pub const IPV6_MAX_PREFIX: u32 = 64;

/// Prefix applied to IPv6 entries without one when promotion is enabled
pub const IPV6_PROMOTED_PREFIX: u32 = 64;

/// Normalization switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Turn a bare IPv6 address into `addr/64` instead of dropping it
    pub promote_ipv6_to_slash64: bool,
}

/// Address family of the ip-part of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
    Unknown,
}

/// An entry split into its address text and optional prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedCidr<'a> {
    pub ip: &'a str,
    pub prefix: Option<u32>,
}

/// A validated `ip/prefix` string.
///
/// Ordering is plain lexicographic order of the text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NormalizedCidr(String);

impl NormalizedCidr {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedCidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedCidr {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a raw entry, returning `None` when it is rejected.
pub fn normalize(raw: &str, options: NormalizeOptions) -> Option<NormalizedCidr> {
    normalize_entry(raw, options).ok()
}

/// Normalize a raw entry, returning the reason when it is rejected.
pub fn normalize_entry(
    raw: &str,
    options: NormalizeOptions,
) -> Result<NormalizedCidr, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }

    let parsed = parse_cidr(trimmed)?;

    match classify(parsed.ip) {
        AddressFamily::Ipv4 => {
            let prefix = parsed.prefix.unwrap_or(IPV4_MAX_PREFIX);
            check_bounds("IPv4", prefix, IPV4_MIN_PREFIX, IPV4_MAX_PREFIX)?;
            // Re-check the octets before emitting anything
            if !is_ipv4_dotted(parsed.ip) {
                return Err(ValidationError::UnrecognizedAddress(parsed.ip.to_string()));
            }
            Ok(NormalizedCidr(format!("{}/{}", parsed.ip, prefix)))
        }
        AddressFamily::Ipv6 => {
            let prefix = match parsed.prefix {
                Some(prefix) => prefix,
                None if options.promote_ipv6_to_slash64 => IPV6_PROMOTED_PREFIX,
                None => return Err(ValidationError::MissingIpv6Prefix(parsed.ip.to_string())),
            };
            check_bounds("IPv6", prefix, IPV6_MIN_PREFIX, IPV6_MAX_PREFIX)?;
            Ok(NormalizedCidr(format!("{}/{}", parsed.ip, prefix)))
        }
        AddressFamily::Unknown => Err(ValidationError::UnrecognizedAddress(parsed.ip.to_string())),
    }
}

/// Split an entry on its first `/`.
///
/// The prefix must be plain decimal digits that survive a round trip through
/// `u32`, so `032`, `+24`, `-1`, ` 24` and `24/8` are all refused.
pub fn parse_cidr(entry: &str) -> Result<ParsedCidr<'_>, ValidationError> {
    let Some((ip, rest)) = entry.split_once('/') else {
        return Ok(ParsedCidr {
            ip: entry,
            prefix: None,
        });
    };

    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidPrefix(rest.to_string()));
    }

    let prefix: u32 = rest
        .parse()
        .map_err(|_| ValidationError::InvalidPrefix(rest.to_string()))?;
    if prefix.to_string() != rest {
        return Err(ValidationError::InvalidPrefix(rest.to_string()));
    }

    Ok(ParsedCidr {
        ip,
        prefix: Some(prefix),
    })
}

/// Decide which family an address text belongs to.
pub fn classify(ip: &str) -> AddressFamily {
    if is_ipv4_dotted(ip) {
        AddressFamily::Ipv4
    } else if is_ipv6_literal(ip) {
        AddressFamily::Ipv6
    } else {
        AddressFamily::Unknown
    }
}

/// Exactly four dot-separated groups of one to three digits, each 0-255.
fn is_ipv4_dotted(ip: &str) -> bool {
    let mut groups = 0;
    for group in ip.split('.') {
        groups += 1;
        if groups > 4
            || group.is_empty()
            || group.len() > 3
            || !group.bytes().all(|b| b.is_ascii_digit())
        {
            return false;
        }
        match group.parse::<u16>() {
            Ok(value) if value <= 255 => {}
            _ => return false,
        }
    }
    groups == 4
}

/// Any textual IPv6 form the standard parser accepts: full, `::`-compressed
/// or with a trailing dotted quad. Brackets and zone ids are refused.
fn is_ipv6_literal(ip: &str) -> bool {
    ip.contains(':') && ip.parse::<Ipv6Addr>().is_ok()
}

fn check_bounds(family: &'static str, prefix: u32, min: u32, max: u32) -> Result<(), ValidationError> {
    if (min..=max).contains(&prefix) {
        Ok(())
    } else {
        Err(ValidationError::PrefixOutOfRange {
            family,
            prefix,
            min,
            max,
        })
    }
}
