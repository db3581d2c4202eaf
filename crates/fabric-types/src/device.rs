//! Device, port and attachment-point identifiers.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque device identifier, e.g. `device:leaf1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        DeviceId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        DeviceId(s.to_string())
    }
}

/// A device port number.
///
/// Reserved logical ports use the top of the 32-bit range, the same
/// encoding OpenFlow-derived controllers use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortNumber(u64);

impl PortNumber {
    /// Logical port towards the control plane (packet-in).
    pub const CONTROLLER: PortNumber = PortNumber(0xffff_fffd);

    pub const fn new(port: u64) -> Self {
        PortNumber(port)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    pub const fn is_logical(&self) -> bool {
        self.0 >= 0xffff_ff00
    }
}

impl fmt::Display for PortNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == PortNumber::CONTROLLER {
            f.write_str("CONTROLLER")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl FromStr for PortNumber {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("CONTROLLER") {
            return Ok(PortNumber::CONTROLLER);
        }
        s.parse::<u64>()
            .map(PortNumber)
            .map_err(|_| ParseError::InvalidPort(s.to_string()))
    }
}

impl From<u64> for PortNumber {
    fn from(port: u64) -> Self {
        PortNumber(port)
    }
}

/// A (device, port) attachment point, written `device/port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectPoint {
    pub device: DeviceId,
    pub port: PortNumber,
}

impl ConnectPoint {
    pub fn new(device: impl Into<DeviceId>, port: impl Into<PortNumber>) -> Self {
        Self {
            device: device.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for ConnectPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.port)
    }
}

impl FromStr for ConnectPoint {
    type Err = ParseError;

    /// Splits on the last `/`, since device ids may themselves contain `/`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (device, port) = s
            .rsplit_once('/')
            .ok_or_else(|| ParseError::InvalidConnectPoint(s.to_string()))?;
        if device.is_empty() {
            return Err(ParseError::InvalidConnectPoint(s.to_string()));
        }
        Ok(ConnectPoint {
            device: DeviceId::new(device),
            port: port.parse()?,
        })
    }
}
