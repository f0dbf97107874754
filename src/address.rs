//! Address normalization and formatting
//!
//! Callers hand in either a number (taken as an IPv4 address value) or
//! text. Text is classified once, here, into [`NormalizedAddress`]; the
//! lookup engine never sees strings.
//!
//! IPv6 text follows the strict RFC 4291 grammar: at most one `::`, at
//! most eight groups, an optional trailing dotted quad, no zone id and no
//! brackets. Anything else is [`NormalizedAddress::Invalid`].
//!
//! Text starting with `::ffff:` or `0:0:0:0:0:ffff:` (any case) is an
//! IPv4-mapped address and is classified as IPv4.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Raw lookup input, decided once at the API boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressInput<'a> {
    /// Numeric IPv4 address value
    Numeric(u64),
    /// Textual IPv4 or IPv6 address
    Text(&'a str),
}

impl From<u32> for AddressInput<'_> {
    fn from(value: u32) -> Self {
        AddressInput::Numeric(u64::from(value))
    }
}

impl From<u64> for AddressInput<'_> {
    fn from(value: u64) -> Self {
        AddressInput::Numeric(value)
    }
}

impl<'a> From<&'a str> for AddressInput<'a> {
    fn from(value: &'a str) -> Self {
        AddressInput::Text(value)
    }
}

impl<'a> From<&'a String> for AddressInput<'a> {
    fn from(value: &'a String) -> Self {
        AddressInput::Text(value.as_str())
    }
}

/// Canonical numeric form of an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NormalizedAddress {
    /// IPv4 address value
    Ipv4(u32),
    /// IPv6 address as four big-endian 32-bit words
    Ipv6([u32; 4]),
    /// Not an address
    Invalid,
}

impl NormalizedAddress {
    /// The IPv6 address as a single 128-bit value
    pub fn as_u128(&self) -> Option<u128> {
        match self {
            NormalizedAddress::Ipv6(words) => Some(words_to_u128(*words)),
            _ => None,
        }
    }
}

impl From<IpAddr> for NormalizedAddress {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => NormalizedAddress::Ipv4(u32::from(v4)),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => NormalizedAddress::Ipv4(u32::from(v4)),
                None => NormalizedAddress::Ipv6(u128_to_words(u128::from(v6))),
            },
        }
    }
}

/// Private IPv4 blocks (RFC 1918) excluded from lookups
pub const PRIVATE_RANGES_V4: [(u32, u32); 3] = [
    (0x0A00_0000, 0x0AFF_FFFF), // 10.0.0.0/8
    (0xAC10_0000, 0xAC1F_FFFF), // 172.16.0.0/12
    (0xC0A8_0000, 0xC0A8_FFFF), // 192.168.0.0/16
];

const MAPPED_PREFIXES: [&str; 2] = ["::ffff:", "0:0:0:0:0:ffff:"];

/// Classify raw input into a canonical address
pub fn normalize(input: AddressInput<'_>) -> NormalizedAddress {
    match input {
        // Values beyond 32 bits can never fall inside an IPv4 table
        AddressInput::Numeric(value) => match u32::try_from(value) {
            Ok(v4) => NormalizedAddress::Ipv4(v4),
            Err(_) => NormalizedAddress::Invalid,
        },
        AddressInput::Text(text) => normalize_text(text),
    }
}

fn normalize_text(text: &str) -> NormalizedAddress {
    if text.is_empty() {
        return NormalizedAddress::Invalid;
    }

    if !text.contains(':') {
        return match aton4(text) {
            Some(v4) => NormalizedAddress::Ipv4(v4),
            None => NormalizedAddress::Invalid,
        };
    }

    let Ok(v6) = text.parse::<Ipv6Addr>() else {
        return NormalizedAddress::Invalid;
    };

    if is_mapped_text(text) {
        if let Some(v4) = v6.to_ipv4_mapped() {
            return NormalizedAddress::Ipv4(u32::from(v4));
        }
    }

    NormalizedAddress::Ipv6(u128_to_words(u128::from(v6)))
}

fn is_mapped_text(text: &str) -> bool {
    MAPPED_PREFIXES.iter().any(|prefix| {
        text.get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    })
}

/// Parse dotted-decimal text into an IPv4 address value
pub fn aton4(text: &str) -> Option<u32> {
    text.parse::<Ipv4Addr>().ok().map(u32::from)
}

/// Parse IPv6 text into four big-endian 32-bit words
pub fn aton6(text: &str) -> Option<[u32; 4]> {
    text.parse::<Ipv6Addr>()
        .ok()
        .map(|addr| u128_to_words(u128::from(addr)))
}

/// Format an IPv4 address value as dotted-decimal
pub fn ntoa4(value: u32) -> String {
    Ipv4Addr::from(value).to_string()
}

/// Format IPv6 words as a bracketed, zero-compressed literal
pub fn ntoa6(words: [u32; 4]) -> String {
    format!("[{}]", Ipv6Addr::from(words_to_u128(words)))
}

/// Whether an IPv4 address value lies in an RFC 1918 block
#[inline]
pub fn is_private_v4(value: u32) -> bool {
    PRIVATE_RANGES_V4
        .iter()
        .any(|&(first, last)| value >= first && value <= last)
}

/// Value accepted by [`pretty`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrettyValue<'a> {
    /// Returned unchanged
    Text(&'a str),
    /// Formatted as dotted-decimal
    Numeric(u32),
    /// Formatted as a bracketed IPv6 literal
    Groups([u32; 4]),
}

impl<'a> From<&'a str> for PrettyValue<'a> {
    fn from(value: &'a str) -> Self {
        PrettyValue::Text(value)
    }
}

impl From<u32> for PrettyValue<'_> {
    fn from(value: u32) -> Self {
        PrettyValue::Numeric(value)
    }
}

impl From<[u32; 4]> for PrettyValue<'_> {
    fn from(value: [u32; 4]) -> Self {
        PrettyValue::Groups(value)
    }
}

/// Human-readable form of an address value
///
/// Inverse of normalization: numbers become dotted-decimal, word arrays
/// become `[v6::literal]`, and text is passed through untouched.
///
/// ```
/// use geodat::pretty;
///
/// assert_eq!(pretty(16843009u32), "1.1.1.1");
/// assert_eq!(pretty([0x2001_0db8u32, 0, 0, 1]), "[2001:db8::1]");
/// assert_eq!(pretty("not an address"), "not an address");
/// ```
pub fn pretty<'a>(value: impl Into<PrettyValue<'a>>) -> String {
    match value.into() {
        PrettyValue::Text(text) => text.to_string(),
        PrettyValue::Numeric(v4) => ntoa4(v4),
        PrettyValue::Groups(words) => ntoa6(words),
    }
}

/// Join four big-endian words into a 128-bit value
#[inline]
pub fn words_to_u128(words: [u32; 4]) -> u128 {
    words
        .iter()
        .fold(0u128, |acc, &w| (acc << 32) | u128::from(w))
}

/// Split a 128-bit value into four big-endian words
#[inline]
pub fn u128_to_words(value: u128) -> [u32; 4] {
    [
        (value >> 96) as u32,
        (value >> 64) as u32,
        (value >> 32) as u32,
        value as u32,
    ]
}
