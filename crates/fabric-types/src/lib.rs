//! Network primitives for leaf-spine fabric orchestration.
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses (station MACs, host MACs)
//! - [`IpAddress`], [`Ipv6Prefix`], [`InterfaceAddress`]: addressing used by
//!   host and subnet routes
//! - [`DeviceId`], [`PortNumber`], [`ConnectPoint`]: device attachment points

mod device;
mod ip;
mod mac;

pub use device::{ConnectPoint, DeviceId, PortNumber};
pub use ip::{InterfaceAddress, IpAddress, Ipv6Prefix};
pub use mac::MacAddress;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid port number: {0}")]
    InvalidPort(String),

    #[error("invalid connect point (expected device/port): {0}")]
    InvalidConnectPoint(String),
}
