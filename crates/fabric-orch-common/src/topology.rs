//! Topology model: devices, links, hosts, interfaces and change events.

use fabric_types::{ConnectPoint, DeviceId, InterfaceAddress, IpAddress, Ipv6Prefix, MacAddress, PortNumber};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv6Addr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub available: bool,
}

impl Device {
    pub fn new(id: DeviceId, available: bool) -> Self {
        Self { id, available }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceRole {
    Spine,
    Leaf,
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceRole::Spine => f.write_str("spine"),
            DeviceRole::Leaf => f.write_str("leaf"),
        }
    }
}

/// Per-device fabric configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleConfig {
    pub role: DeviceRole,
    /// MAC the device answers to as a router.
    pub station_mac: MacAddress,
    /// Segment identifier, reachable as a /128.
    pub sid: Option<Ipv6Addr>,
}

impl RoleConfig {
    pub fn is_spine(&self) -> bool {
        self.role == DeviceRole::Spine
    }
}

/// A unidirectional link between two connect points.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Link {
    pub src: ConnectPoint,
    pub dst: ConnectPoint,
}

impl Link {
    pub fn new(src: ConnectPoint, dst: ConnectPoint) -> Self {
        Self { src, dst }
    }

    pub fn reversed(&self) -> Self {
        Self {
            src: self.dst.clone(),
            dst: self.src.clone(),
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Host {
    pub mac: MacAddress,
    pub ips: Vec<IpAddress>,
    pub location: ConnectPoint,
}

impl Host {
    pub fn ipv6_addresses(&self) -> impl Iterator<Item = Ipv6Addr> + '_ {
        self.ips.iter().filter_map(IpAddress::as_ipv6)
    }
}

/// A configured edge interface. Its port is host-facing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    pub connect_point: ConnectPoint,
    pub ips: Vec<InterfaceAddress>,
}

impl Interface {
    pub fn ipv6_subnets(&self) -> impl Iterator<Item = Ipv6Prefix> + '_ {
        self.ips.iter().filter_map(InterfaceAddress::ipv6_subnet)
    }
}

/// Immutable point-in-time view of the network.
///
/// Collections are kept sorted so that anything computed by iterating a
/// snapshot is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologySnapshot {
    devices: BTreeMap<DeviceId, Device>,
    links: Vec<Link>,
    hosts: Vec<Host>,
    interfaces: Vec<Interface>,
}

impl TopologySnapshot {
    pub fn new(
        devices: impl IntoIterator<Item = Device>,
        links: impl IntoIterator<Item = Link>,
        hosts: impl IntoIterator<Item = Host>,
        interfaces: impl IntoIterator<Item = Interface>,
    ) -> Self {
        let devices = devices.into_iter().map(|d| (d.id.clone(), d)).collect();

        let mut links: Vec<Link> = links.into_iter().collect();
        links.sort();
        links.dedup();

        let mut hosts: Vec<Host> = hosts.into_iter().collect();
        hosts.sort_by(|a, b| a.mac.cmp(&b.mac).then_with(|| a.location.cmp(&b.location)));

        let mut interfaces: Vec<Interface> = interfaces.into_iter().collect();
        interfaces.sort_by(|a, b| a.connect_point.cmp(&b.connect_point).then(a.name.cmp(&b.name)));

        Self {
            devices,
            links,
            hosts,
            interfaces,
        }
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn device(&self, id: &DeviceId) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn is_available(&self, id: &DeviceId) -> bool {
        self.devices.get(id).is_some_and(|d| d.available)
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Links whose source is on `device`.
    pub fn egress_links<'a>(&'a self, device: &'a DeviceId) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.iter().filter(move |l| &l.src.device == device)
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn hosts_at<'a>(&'a self, device: &'a DeviceId) -> impl Iterator<Item = &'a Host> + 'a {
        self.hosts.iter().filter(move |h| &h.location.device == device)
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn interfaces_on<'a>(&'a self, device: &'a DeviceId) -> impl Iterator<Item = &'a Interface> + 'a {
        self.interfaces
            .iter()
            .filter(move |i| &i.connect_point.device == device)
    }

    /// Sorted, deduplicated ports carrying a configured interface.
    pub fn host_facing_ports(&self, device: &DeviceId) -> Vec<PortNumber> {
        let mut ports: Vec<PortNumber> = self
            .interfaces_on(device)
            .map(|i| i.connect_point.port)
            .collect();
        ports.sort();
        ports.dedup();
        ports
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceEventKind {
    Added,
    Updated,
    Removed,
    AvailabilityChanged,
    PortAdded,
    PortUpdated,
    PortRemoved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostEventKind {
    Added,
    Updated,
    Removed,
    Moved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkEventKind {
    Added,
    Updated,
    Removed,
}

/// A change notification delivered to topology listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyEvent {
    Device { kind: DeviceEventKind, device: Device },
    Host { kind: HostEventKind, host: Host },
    Link { kind: LinkEventKind, link: Link },
}

impl fmt::Display for TopologyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyEvent::Device { kind, device } => write!(f, "device {:?} {}", kind, device.id),
            TopologyEvent::Host { kind, host } => write!(f, "host {:?} {}", kind, host.mac),
            TopologyEvent::Link { kind, link } => write!(f, "link {:?} {}", kind, link),
        }
    }
}
