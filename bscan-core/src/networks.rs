//! Target address validation.
//!
//! A target must be a valid IPv4/IPv6 host literal or DNS hostname.
//! Network ranges (CIDR) are recognized only so that the CLI can reject
//! them with a clear "not implemented" message (network-range
//! expansion/ping-sweep is explicitly unimplemented).

use std::net::IpAddr;

/// Returns whether `s` parses as a bare IPv4 or IPv6 host address.
pub fn is_valid_host_addr(s: &str) -> bool {
    s.parse::<IpAddr>().is_ok()
}

/// Returns whether `s` looks like a CIDR network range (`<ip>/<prefix>`).
pub fn is_network_range(s: &str) -> bool {
    match s.split_once('/') {
        Some((addr, prefix)) => addr.parse::<IpAddr>().is_ok() && prefix.parse::<u8>().is_ok(),
        None => false,
    }
}

/// Returns whether `s` is a syntactically valid DNS hostname.
///
/// At most 255 total characters, each dot-separated label 1-63 characters,
/// alphanumeric or `-`, and never starting or ending a label with `-`.
pub fn is_valid_hostname(s: &str) -> bool {
    if s.is_empty() || s.len() > 255 {
        return false;
    }
    let trimmed = s.strip_suffix('.').unwrap_or(s);
    if trimmed.is_empty() {
        return false;
    }

    trimmed.split('.').all(|label| {
        if label.is_empty() || label.len() > 63 {
            return false;
        }
        if label.starts_with('-') || label.ends_with('-') {
            return false;
        }
        label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_ipv4_and_ipv6() {
        assert!(is_valid_host_addr("10.0.0.1"));
        assert!(is_valid_host_addr("::1"));
        assert!(!is_valid_host_addr("not-an-ip"));
    }

    #[test]
    fn recognizes_network_ranges() {
        assert!(is_network_range("10.0.0.0/24"));
        assert!(!is_network_range("10.0.0.1"));
        assert!(!is_network_range("example.com/24"));
    }

    #[test]
    fn validates_hostnames() {
        assert!(is_valid_hostname("example.com"));
        assert!(is_valid_hostname("sub.example.com."));
        assert!(!is_valid_hostname("-bad.example.com"));
        assert!(!is_valid_hostname(""));
        assert!(!is_valid_hostname(&"a".repeat(300)));
    }
}
