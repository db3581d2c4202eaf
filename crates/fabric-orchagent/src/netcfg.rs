//! Network configuration file loader.
//!
//! Reads a JSON document in the controller's netcfg layout and builds an
//! [`InMemoryTopology`] from it:
//!
//! ```json
//! {
//!   "devices": {
//!     "device:leaf1": {
//!       "fabricDeviceConfig": {
//!         "myStationMac": "00:aa:00:00:00:01",
//!         "mySid": "3:101:2::",
//!         "isSpine": false
//!       }
//!     }
//!   },
//!   "ports": {
//!     "device:leaf1/3": {
//!       "interfaces": [{ "name": "leaf1-3", "ips": ["2001:1:1::ff/64"] }]
//!     }
//!   },
//!   "links": [{ "src": "device:leaf1/1", "dst": "device:spine1/1" }],
//!   "hosts": [{ "mac": "00:00:00:00:00:1a", "ips": ["2001:1:1::a"], "location": "device:leaf1/3" }]
//! }
//! ```
//!
//! Links are bidirectional unless `"bidirectional": false` is given.

use crate::error::ConfigError;
use crate::memory::InMemoryTopology;
use fabric_orch_common::{DeviceRole, Host, Link, RoleConfig};
use fabric_types::{ConnectPoint, DeviceId, InterfaceAddress, IpAddress, MacAddress};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::net::Ipv6Addr;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NetworkConfig {
    #[serde(default)]
    devices: BTreeMap<DeviceId, DeviceEntry>,
    #[serde(default)]
    ports: BTreeMap<String, PortEntry>,
    #[serde(default)]
    links: Vec<LinkEntry>,
    #[serde(default)]
    hosts: Vec<HostEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceEntry {
    #[serde(default = "default_true")]
    available: bool,
    fabric_device_config: Option<FabricDeviceConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FabricDeviceConfig {
    my_station_mac: MacAddress,
    #[serde(default)]
    my_sid: Option<Ipv6Addr>,
    #[serde(default)]
    is_spine: bool,
}

#[derive(Debug, Deserialize)]
struct PortEntry {
    #[serde(default)]
    interfaces: Vec<InterfaceEntry>,
}

#[derive(Debug, Deserialize)]
struct InterfaceEntry {
    name: String,
    #[serde(default)]
    ips: Vec<InterfaceAddress>,
}

#[derive(Debug, Deserialize)]
struct LinkEntry {
    src: String,
    dst: String,
    #[serde(default = "default_true")]
    bidirectional: bool,
}

#[derive(Debug, Deserialize)]
struct HostEntry {
    mac: MacAddress,
    #[serde(default)]
    ips: Vec<IpAddress>,
    location: String,
}

fn default_true() -> bool {
    true
}

fn connect_point(s: &str) -> Result<ConnectPoint, ConfigError> {
    s.parse()
        .map_err(|e| ConfigError::Netcfg(format!("invalid connect point {s:?}: {e}")))
}

/// Parses a netcfg document into a populated topology.
pub fn from_json(content: &str) -> Result<InMemoryTopology, ConfigError> {
    let config: NetworkConfig = serde_json::from_str(content)?;
    let topology = InMemoryTopology::new();

    for (id, entry) in &config.devices {
        if let Some(cfg) = &entry.fabric_device_config {
            topology.set_role_config(
                id.clone(),
                RoleConfig {
                    role: if cfg.is_spine {
                        DeviceRole::Spine
                    } else {
                        DeviceRole::Leaf
                    },
                    station_mac: cfg.my_station_mac,
                    sid: cfg.my_sid,
                },
            );
        }
        topology.add_device(id.clone(), entry.available);
    }

    for (port, entry) in &config.ports {
        let cp = connect_point(port)?;
        for intf in &entry.interfaces {
            topology.add_interface(intf.name.clone(), cp.clone(), intf.ips.iter().copied());
        }
    }

    for link in &config.links {
        let src = connect_point(&link.src)?;
        let dst = connect_point(&link.dst)?;
        if link.bidirectional {
            topology.add_bidirectional_link(src, dst);
        } else {
            topology.add_link(Link::new(src, dst));
        }
    }

    for host in config.hosts {
        topology.add_host(Host {
            mac: host.mac,
            ips: host.ips,
            location: connect_point(&host.location)?,
        });
    }

    info!(
        devices = config.devices.len(),
        ports = config.ports.len(),
        links = config.links.len(),
        "loaded network config"
    );
    Ok(topology)
}

/// Reads and parses a netcfg file.
pub fn load(path: impl AsRef<Path>) -> Result<InMemoryTopology, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_json(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_orch_common::{NetworkConfigService, TopologyService};
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const NETCFG: &str = r#"{
        "devices": {
            "device:leaf1": {
                "fabricDeviceConfig": {
                    "myStationMac": "00:aa:00:00:00:01",
                    "mySid": "3:101:2::",
                    "isSpine": false
                }
            },
            "device:spine1": {
                "fabricDeviceConfig": {
                    "myStationMac": "00:bb:00:00:00:01",
                    "isSpine": true
                }
            },
            "device:leaf2": { "available": false }
        },
        "ports": {
            "device:leaf1/3": {
                "interfaces": [{ "name": "leaf1-3", "ips": ["2001:1:1::ff/64"] }]
            }
        },
        "links": [{ "src": "device:leaf1/1", "dst": "device:spine1/1" }],
        "hosts": [{
            "mac": "00:00:00:00:00:1a",
            "ips": ["2001:1:1::a"],
            "location": "device:leaf1/3"
        }]
    }"#;

    #[test]
    fn test_from_json() {
        let topo = from_json(NETCFG).unwrap();
        let snapshot = topo.snapshot();

        assert_eq!(snapshot.devices().count(), 3);
        assert!(!snapshot.is_available(&DeviceId::new("device:leaf2")));
        assert_eq!(snapshot.links().len(), 2);
        assert_eq!(snapshot.hosts().len(), 1);
        assert_eq!(
            snapshot.host_facing_ports(&DeviceId::new("device:leaf1")),
            vec![fabric_types::PortNumber::new(3)]
        );

        let leaf = topo.role_config(&DeviceId::new("device:leaf1")).unwrap();
        assert_eq!(leaf.role, DeviceRole::Leaf);
        assert_eq!(leaf.sid, Some("3:101:2::".parse().unwrap()));
        let spine = topo.role_config(&DeviceId::new("device:spine1")).unwrap();
        assert!(spine.is_spine());
        assert!(topo.role_config(&DeviceId::new("device:leaf2")).is_err());
    }

    #[test]
    fn test_unidirectional_link() {
        let topo = from_json(
            r#"{ "links": [{ "src": "device:a/1", "dst": "device:b/1", "bidirectional": false }] }"#,
        )
        .unwrap();
        assert_eq!(topo.snapshot().links().len(), 1);
    }

    #[test]
    fn test_invalid_connect_point() {
        let err = from_json(r#"{ "ports": { "leaf1": { "interfaces": [] } } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Netcfg(_)));
    }

    #[test]
    fn test_invalid_mac() {
        let err = from_json(
            r#"{ "devices": { "device:x": { "fabricDeviceConfig": { "myStationMac": "zz" } } } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(NETCFG.as_bytes()).unwrap();
        let topo = load(file.path()).unwrap();
        assert_eq!(topo.snapshot().devices().count(), 3);

        assert!(matches!(
            load("/nonexistent/netcfg.json"),
            Err(ConfigError::Io { .. })
        ));
    }
}
