//! Free-text query classification.
//!
//! Search text may be an IP address, a hexadecimal identifier (hardware
//! address, client identifier or DUID), or a hostname. Classification
//! decides which lease lookup commands the engine issues and always
//! succeeds; hostname is the fallback.

use std::net::IpAddr;

/// Lease lookup strategy recognized from search text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    /// Text is an IPv4 address literal.
    Ipv4,
    /// Text is an IPv6 address (or prefix) literal.
    Ipv6,
    /// Text is a hexadecimal identifier: could be a hardware address,
    /// a client identifier, or a DUID. All are attempted.
    Identifier,
    /// Anything else, including the empty string.
    Hostname,
}

/// Classify search text, in strict precedence order: IP literal first,
/// then hexadecimal identifier, hostname otherwise.
pub fn classify(text: &str) -> SearchKind {
    let trimmed = text.trim();
    if let Ok(ip) = trimmed.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(_) => SearchKind::Ipv4,
            // An IPv4-mapped address converts to 4 octets, so it is
            // queried as IPv4.
            IpAddr::V6(v6) if v6.to_ipv4_mapped().is_some() => SearchKind::Ipv4,
            IpAddr::V6(_) => SearchKind::Ipv6,
        };
    }
    if is_hex_identifier(trimmed) {
        return SearchKind::Identifier;
    }
    SearchKind::Hostname
}

/// Check if the text is an identifier consisting of hexadecimal digit
/// pairs, optionally separated by whitespace or up to two colons, e.g.
/// `010203`, `01:02:03`, `01::02::03`, `01 02 03`.
pub fn is_hex_identifier(text: &str) -> bool {
    let mut chars = text.trim().chars().peekable();
    if !take_hex_pair(&mut chars) {
        return false;
    }
    while chars.peek().is_some() {
        // A separator is either a run of whitespace or up to two
        // colons; mixing the two between one pair is not accepted.
        if chars.peek().is_some_and(|c| c.is_whitespace()) {
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
        } else {
            let mut colons = 0;
            while colons < 2 && chars.peek() == Some(&':') {
                chars.next();
                colons += 1;
            }
        }
        if !take_hex_pair(&mut chars) {
            return false;
        }
    }
    true
}

fn take_hex_pair(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> bool {
    for _ in 0..2 {
        match chars.next() {
            Some(c) if c.is_ascii_hexdigit() => {}
            _ => return false,
        }
    }
    true
}

/// Canonicalize a hardware address to the colon-separated form Kea
/// expects, e.g. `010203040506` becomes `01:02:03:04:05:06`. Returns
/// `None` when the input is not a valid hexadecimal identifier.
pub fn format_mac_address(identifier: &str) -> Option<String> {
    let identifier = identifier.trim();
    if is_canonical_mac(identifier) {
        return Some(identifier.to_string());
    }
    if !is_hex_identifier(identifier) {
        return None;
    }
    let digits: String = identifier
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let mut formatted = String::with_capacity(digits.len() + digits.len() / 2);
    for (i, c) in digits.chars().enumerate() {
        formatted.push(c);
        if i % 2 == 1 && i < digits.len() - 1 {
            formatted.push(':');
        }
    }
    Some(formatted)
}

/// Check for the already-canonical form: hex pairs separated by single
/// colons.
fn is_canonical_mac(text: &str) -> bool {
    let mut chars = text.chars().peekable();
    if !take_hex_pair(&mut chars) {
        return false;
    }
    while chars.peek().is_some() {
        if chars.next() != Some(':') {
            return false;
        }
        if !take_hex_pair(&mut chars) {
            return false;
        }
    }
    true
}
