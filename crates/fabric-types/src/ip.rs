//! IP address and prefix types.
//!
//! Only IPv6 participates in fabric routing, but hosts and interfaces may
//! carry IPv4 addresses too, so parsing accepts both families.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// An IP address that can be either IPv4 or IPv6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IpAddress {
    V4(Ipv4Addr),
    V6(Ipv6Addr),
}

impl IpAddress {
    pub const fn is_ipv4(&self) -> bool {
        matches!(self, IpAddress::V4(_))
    }

    pub const fn is_ipv6(&self) -> bool {
        matches!(self, IpAddress::V6(_))
    }

    /// Returns the IPv6 address if this is V6, None otherwise.
    pub const fn as_ipv6(&self) -> Option<Ipv6Addr> {
        match self {
            IpAddress::V4(_) => None,
            IpAddress::V6(addr) => Some(*addr),
        }
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpAddress::V4(addr) => addr.fmt(f),
            IpAddress::V6(addr) => addr.fmt(f),
        }
    }
}

impl FromStr for IpAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = if s.contains(':') {
            s.parse::<Ipv6Addr>().map(IpAddress::V6)
        } else {
            s.parse::<Ipv4Addr>().map(IpAddress::V4)
        };
        parsed.map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
    }
}

impl From<Ipv4Addr> for IpAddress {
    fn from(addr: Ipv4Addr) -> Self {
        IpAddress::V4(addr)
    }
}

impl From<Ipv6Addr> for IpAddress {
    fn from(addr: Ipv6Addr) -> Self {
        IpAddress::V6(addr)
    }
}

/// An IPv6 network prefix in CIDR notation.
///
/// Host bits beyond `prefix_len` are always cleared, so `2001:1:1::ff/64`
/// and `2001:1:1::/64` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv6Prefix {
    address: Ipv6Addr,
    prefix_len: u8,
}

impl Ipv6Prefix {
    pub const MAX_LEN: u8 = 128;

    /// Creates a prefix, masking the host bits of `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if `prefix_len` exceeds 128.
    pub fn new(address: Ipv6Addr, prefix_len: u8) -> Result<Self, ParseError> {
        if prefix_len > Self::MAX_LEN {
            return Err(ParseError::InvalidIpPrefix(format!(
                "{}/{}: prefix length exceeds {}",
                address,
                prefix_len,
                Self::MAX_LEN
            )));
        }

        let bits = u128::from(address);
        let mask = match prefix_len {
            0 => 0,
            len => u128::MAX << (Self::MAX_LEN - len),
        };

        Ok(Ipv6Prefix {
            address: Ipv6Addr::from(bits & mask),
            prefix_len,
        })
    }

    /// Returns the /128 prefix covering exactly `address`.
    pub const fn host(address: Ipv6Addr) -> Self {
        Ipv6Prefix {
            address,
            prefix_len: Self::MAX_LEN,
        }
    }

    pub const fn address(&self) -> Ipv6Addr {
        self.address
    }

    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub const fn is_host_route(&self) -> bool {
        self.prefix_len == Self::MAX_LEN
    }

    /// Returns true if `addr` is covered by this prefix.
    pub fn contains(&self, addr: &Ipv6Addr) -> bool {
        match Ipv6Prefix::new(*addr, self.prefix_len) {
            Ok(masked) => masked.address == self.address,
            Err(_) => false,
        }
    }
}

impl fmt::Display for Ipv6Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for Ipv6Prefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, len_str) = s
            .rsplit_once('/')
            .ok_or_else(|| ParseError::InvalidIpPrefix(s.to_string()))?;

        let address: Ipv6Addr = addr_str
            .parse()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;
        let prefix_len: u8 = len_str
            .parse()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;

        Ipv6Prefix::new(address, prefix_len)
    }
}

impl TryFrom<String> for Ipv6Prefix {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Ipv6Prefix> for String {
    fn from(prefix: Ipv6Prefix) -> String {
        prefix.to_string()
    }
}

/// An interface address with its subnet length, e.g. `2001:1:1::ff/64`.
///
/// Unlike [`Ipv6Prefix`] the host bits are kept; [`InterfaceAddress::ipv6_subnet`]
/// yields the masked subnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InterfaceAddress {
    address: IpAddress,
    prefix_len: u8,
}

impl InterfaceAddress {
    pub const fn address(&self) -> IpAddress {
        self.address
    }

    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Returns the IPv6 subnet this address belongs to, if it is IPv6.
    pub fn ipv6_subnet(&self) -> Option<Ipv6Prefix> {
        self.address
            .as_ipv6()
            .and_then(|addr| Ipv6Prefix::new(addr, self.prefix_len).ok())
    }
}

impl fmt::Display for InterfaceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for InterfaceAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, len_str) = s
            .rsplit_once('/')
            .ok_or_else(|| ParseError::InvalidIpPrefix(s.to_string()))?;
        let address: IpAddress = addr_str.parse()?;
        let prefix_len: u8 = len_str
            .parse()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;

        let max_len = if address.is_ipv4() { 32 } else { 128 };
        if prefix_len > max_len {
            return Err(ParseError::InvalidIpPrefix(s.to_string()));
        }

        Ok(InterfaceAddress {
            address,
            prefix_len,
        })
    }
}

impl TryFrom<String> for InterfaceAddress {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<InterfaceAddress> for String {
    fn from(addr: InterfaceAddress) -> String {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ip_address_discrimination() {
        let v4: IpAddress = "10.0.0.1".parse().unwrap();
        assert!(v4.is_ipv4());
        assert!(v4.as_ipv6().is_none());

        let v6: IpAddress = "2001:db8:1::5".parse().unwrap();
        assert!(v6.is_ipv6());
        assert_eq!(v6.as_ipv6(), Some("2001:db8:1::5".parse().unwrap()));
    }

    #[test]
    fn test_prefix_masks_host_bits() {
        let a: Ipv6Prefix = "2001:1:1::ff/64".parse().unwrap();
        let b: Ipv6Prefix = "2001:1:1::/64".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "2001:1:1::/64");
    }

    #[test]
    fn test_host_prefix() {
        let addr: Ipv6Addr = "2001:db8:1::5".parse().unwrap();
        let prefix = Ipv6Prefix::host(addr);
        assert!(prefix.is_host_route());
        assert_eq!(prefix.to_string(), "2001:db8:1::5/128");
    }

    #[test]
    fn test_prefix_contains() {
        let subnet: Ipv6Prefix = "2001:db8:1::/64".parse().unwrap();
        assert!(subnet.contains(&"2001:db8:1::5".parse().unwrap()));
        assert!(!subnet.contains(&"2001:db8:2::5".parse().unwrap()));

        let default: Ipv6Prefix = "::/0".parse().unwrap();
        assert!(default.contains(&"fe80::1".parse().unwrap()));
    }

    #[test]
    fn test_invalid_prefix() {
        assert!("2001:db8::/129".parse::<Ipv6Prefix>().is_err());
        assert!("10.0.0.0/24".parse::<Ipv6Prefix>().is_err());
        assert!("2001:db8::".parse::<Ipv6Prefix>().is_err());
    }

    #[test]
    fn test_interface_address_subnet() {
        let v6: InterfaceAddress = "2001:1:2::ff/64".parse().unwrap();
        assert_eq!(v6.ipv6_subnet(), Some("2001:1:2::/64".parse().unwrap()));
        assert_eq!(v6.to_string(), "2001:1:2::ff/64");

        let v4: InterfaceAddress = "10.0.1.254/24".parse().unwrap();
        assert_eq!(v4.ipv6_subnet(), None);

        assert!("10.0.1.254/33".parse::<InterfaceAddress>().is_err());
    }
}
