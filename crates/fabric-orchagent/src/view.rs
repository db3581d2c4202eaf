//! Read-only topology view with resolved fabric roles.

use fabric_orch_common::{
    ConfigMissing, Link, NetworkConfigService, RoleConfig, TopologySnapshot,
};
use fabric_types::{DeviceId, Ipv6Prefix};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::warn;

/// A topology snapshot paired with the role configuration of every device
/// it mentions.
///
/// Roles are resolved once at construction, so all compilation against one
/// view sees the same configuration. Devices without configuration are
/// reported once, here.
#[derive(Debug, Clone)]
pub struct FabricView {
    snapshot: Arc<TopologySnapshot>,
    roles: BTreeMap<DeviceId, RoleConfig>,
    unconfigured: BTreeMap<DeviceId, ConfigMissing>,
}

impl FabricView {
    pub fn new(snapshot: Arc<TopologySnapshot>, config: &dyn NetworkConfigService) -> Self {
        let mut ids: BTreeSet<&DeviceId> = snapshot.devices().map(|d| &d.id).collect();
        for link in snapshot.links() {
            ids.insert(&link.src.device);
            ids.insert(&link.dst.device);
        }
        for host in snapshot.hosts() {
            ids.insert(&host.location.device);
        }
        for intf in snapshot.interfaces() {
            ids.insert(&intf.connect_point.device);
        }

        let mut roles = BTreeMap::new();
        let mut unconfigured = BTreeMap::new();
        for id in ids {
            match config.role_config(id) {
                Ok(cfg) => {
                    roles.insert(id.clone(), cfg);
                }
                Err(missing) => {
                    warn!(device = %id, error = %missing, "device has no fabric config");
                    unconfigured.insert(id.clone(), missing);
                }
            }
        }

        Self {
            snapshot,
            roles,
            unconfigured,
        }
    }

    pub fn snapshot(&self) -> &TopologySnapshot {
        &self.snapshot
    }

    /// Role of the device under reconciliation. Missing config is an error.
    pub fn role_config(&self, device: &DeviceId) -> Result<&RoleConfig, ConfigMissing> {
        if let Some(cfg) = self.roles.get(device) {
            return Ok(cfg);
        }
        Err(self
            .unconfigured
            .get(device)
            .cloned()
            .unwrap_or_else(|| ConfigMissing::new(device.clone(), "fabricDeviceConfig")))
    }

    /// Role of a peer device, `None` if it has no configuration.
    pub fn peer_config(&self, device: &DeviceId) -> Option<&RoleConfig> {
        self.roles.get(device)
    }

    /// Configured spines, sorted by device id. Devices without config are
    /// skipped.
    pub fn spines(&self) -> Vec<(&DeviceId, &RoleConfig)> {
        self.by_role(true)
    }

    /// Configured leaves, sorted by device id.
    pub fn leaves(&self) -> Vec<(&DeviceId, &RoleConfig)> {
        self.by_role(false)
    }

    fn by_role(&self, spine: bool) -> Vec<(&DeviceId, &RoleConfig)> {
        self.snapshot
            .devices()
            .filter_map(|d| self.peer_config(&d.id).map(|cfg| (&d.id, cfg)))
            .filter(|(_, cfg)| cfg.is_spine() == spine)
            .collect()
    }

    /// IPv6 subnets configured on the device's interfaces.
    pub fn ipv6_subnets(&self, device: &DeviceId) -> BTreeSet<Ipv6Prefix> {
        self.snapshot
            .interfaces_on(device)
            .flat_map(|intf| intf.ipv6_subnets())
            .collect()
    }

    pub fn egress_links<'a>(&'a self, device: &'a DeviceId) -> impl Iterator<Item = &'a Link> + 'a {
        self.snapshot.egress_links(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_orch_common::{Device, DeviceRole, Interface};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io;
    use std::sync::Mutex;

    struct MapConfig(HashMap<DeviceId, RoleConfig>);

    impl NetworkConfigService for MapConfig {
        fn role_config(&self, device: &DeviceId) -> Result<RoleConfig, ConfigMissing> {
            self.0
                .get(device)
                .cloned()
                .ok_or_else(|| ConfigMissing::new(device.clone(), "fabricDeviceConfig"))
        }
    }

    fn role(role: DeviceRole, mac: &str) -> RoleConfig {
        RoleConfig {
            role,
            station_mac: mac.parse().unwrap(),
            sid: None,
        }
    }

    fn view() -> FabricView {
        let snapshot = TopologySnapshot::new(
            vec![
                Device::new(DeviceId::new("device:spine1"), true),
                Device::new(DeviceId::new("device:leaf2"), true),
                Device::new(DeviceId::new("device:leaf1"), true),
                Device::new(DeviceId::new("device:orphan"), true),
            ],
            vec![],
            vec![],
            vec![Interface {
                name: "leaf1-3".to_string(),
                connect_point: "device:leaf1/3".parse().unwrap(),
                ips: vec!["2001:1:1::ff/64".parse().unwrap(), "2001:1:1::fe/64".parse().unwrap()],
            }],
        );
        let config = MapConfig(HashMap::from([
            (DeviceId::new("device:spine1"), role(DeviceRole::Spine, "00:bb:00:00:00:01")),
            (DeviceId::new("device:leaf1"), role(DeviceRole::Leaf, "00:aa:00:00:00:01")),
            (DeviceId::new("device:leaf2"), role(DeviceRole::Leaf, "00:aa:00:00:00:02")),
        ]));
        FabricView::new(Arc::new(snapshot), &config)
    }

    #[test]
    fn test_role_partition() {
        let view = view();
        let spines: Vec<_> = view.spines().into_iter().map(|(id, _)| id.as_str()).collect();
        let leaves: Vec<_> = view.leaves().into_iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(spines, vec!["device:spine1"]);
        assert_eq!(leaves, vec!["device:leaf1", "device:leaf2"]);
    }

    #[test]
    fn test_missing_config_is_error_for_self() {
        let view = view();
        let err = view.role_config(&DeviceId::new("device:orphan")).unwrap_err();
        assert_eq!(err.device, DeviceId::new("device:orphan"));
        assert!(view.peer_config(&DeviceId::new("device:orphan")).is_none());
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_missing_config_warned_once_per_view() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let view = view();
            for _ in 0..3 {
                view.spines();
                view.leaves();
                view.peer_config(&DeviceId::new("device:orphan"));
            }
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.matches("device has no fabric config").count(), 1);
        assert!(output.contains("device:orphan"));
    }

    #[test]
    fn test_subnets_deduplicated() {
        let view = view();
        let subnets: Vec<_> = view.ipv6_subnets(&DeviceId::new("device:leaf1")).into_iter().collect();
        assert_eq!(subnets, vec!["2001:1:1::/64".parse::<Ipv6Prefix>().unwrap()]);
    }
}
