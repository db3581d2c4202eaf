//! Ethernet MAC addresses as used in fabric match keys and next-hop actions.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 48-bit Ethernet MAC address.
///
/// # Examples
///
/// ```
/// use fabric_types::MacAddress;
///
/// let mac: MacAddress = "00:00:00:00:00:1a".parse().unwrap();
/// assert_eq!(mac.to_string(), "00:00:00:00:00:1a");
///
/// let upper: MacAddress = "00-00-00-00-00-1A".parse().unwrap();
/// assert_eq!(mac, upper);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// ff:ff:ff:ff:ff:ff
    pub const BROADCAST: MacAddress = MacAddress([0xff; 6]);

    /// All-ones mask, i.e. a ternary match that behaves like an exact match.
    pub const EXACT_MASK: MacAddress = MacAddress([0xff; 6]);

    pub const ZERO: MacAddress = MacAddress([0; 6]);

    /// Value half of the IPv6 multicast destination MAC range (RFC 2464).
    pub const IPV6_MULTICAST: MacAddress = MacAddress([0x33, 0x33, 0, 0, 0, 0]);

    /// Mask half of the IPv6 multicast destination MAC range.
    pub const IPV6_MULTICAST_MASK: MacAddress = MacAddress([0xff, 0xff, 0, 0, 0, 0]);

    pub const fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Returns the address as the low 48 bits of a `u64`.
    pub const fn to_u64(&self) -> u64 {
        ((self.0[0] as u64) << 40)
            | ((self.0[1] as u64) << 32)
            | ((self.0[2] as u64) << 24)
            | ((self.0[3] as u64) << 16)
            | ((self.0[4] as u64) << 8)
            | (self.0[5] as u64)
    }

    /// Returns true if the group bit of the first octet is set.
    pub const fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    pub const fn is_broadcast(&self) -> bool {
        self.to_u64() == 0xffff_ffff_ffff
    }

    pub const fn is_zero(&self) -> bool {
        self.to_u64() == 0
    }

    /// Returns true if `self` falls inside the ternary range `value/mask`.
    pub fn matches_masked(&self, value: &MacAddress, mask: &MacAddress) -> bool {
        self.0
            .iter()
            .zip(value.0.iter())
            .zip(mask.0.iter())
            .all(|((b, v), m)| b & m == v & m)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let separator = if s.contains(':') { ':' } else { '-' };

        let parts: Vec<&str> = s.split(separator).collect();
        if parts.len() != 6 {
            return Err(ParseError::InvalidMacAddress(s.to_string()));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() || part.len() > 2 {
                return Err(ParseError::InvalidMacAddress(s.to_string()));
            }
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| ParseError::InvalidMacAddress(s.to_string()))?;
        }

        Ok(MacAddress(bytes))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> String {
        mac.to_string()
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }
}
