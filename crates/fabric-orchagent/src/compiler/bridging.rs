//! L2 bridging state: CPU clone session, flooding and host MAC rules.

use super::{Compiler, InstallPlan};
use crate::error::Result;
use crate::view::FabricView;
use fabric_orch_common::{FabricTable, ForwardingRule, GroupId, GroupKind, GroupMember, Host, RuleAction, RuleMatch};
use fabric_types::{DeviceId, MacAddress, PortNumber};
use tracing::warn;

impl Compiler {
    /// Clone session to the controller on every device; on leaves also a
    /// broadcast group over host-facing ports and the ternary rules flooding
    /// broadcast and IPv6 multicast frames through it.
    pub fn compute_bridging_state(&self, view: &FabricView, device: &DeviceId) -> Result<Vec<InstallPlan>> {
        let cfg = view.role_config(device)?;

        let clone = self.group(
            device,
            GroupId::CPU_CLONE_SESSION,
            GroupKind::Clone,
            vec![GroupMember::Port(PortNumber::CONTROLLER)],
        );
        let mut plans = vec![InstallPlan::with_group(clone, Vec::new())];

        // Bridging is only done at the edge.
        if cfg.is_spine() {
            return Ok(plans);
        }

        let ports = view.snapshot().host_facing_ports(device);
        if ports.is_empty() {
            warn!(device = %device, "device has 0 host facing ports, skipping broadcast group");
            return Ok(plans);
        }

        let broadcast = self.group(
            device,
            GroupId::BROADCAST,
            GroupKind::Broadcast,
            ports.into_iter().map(GroupMember::Port).collect(),
        );
        let flood = |value: MacAddress, mask: MacAddress| {
            self.rule(
                device,
                FabricTable::L2Ternary,
                RuleMatch::EthDstTernary { value, mask },
                RuleAction::SetMulticastGroup(GroupId::BROADCAST),
            )
        };
        let rules = vec![
            flood(MacAddress::BROADCAST, MacAddress::EXACT_MASK),
            flood(MacAddress::IPV6_MULTICAST, MacAddress::IPV6_MULTICAST_MASK),
        ];
        plans.push(InstallPlan::with_group(broadcast, rules));

        Ok(plans)
    }

    /// Exact-match rule forwarding frames for the host MAC to its port.
    pub fn compute_host_bridging_rule(&self, host: &Host) -> ForwardingRule {
        self.rule(
            &host.location.device,
            FabricTable::L2Exact,
            RuleMatch::EthDstExact(host.mac),
            RuleAction::SetOutputPort(host.location.port),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryTopology;
    use fabric_orch_common::{AppId, DeviceRole, RoleConfig, TopologyService};
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> DeviceId {
        DeviceId::new(s)
    }

    fn ips(addrs: &[&str]) -> Vec<fabric_types::InterfaceAddress> {
        addrs.iter().map(|a| a.parse().unwrap()).collect()
    }

    fn compiler() -> Compiler {
        Compiler::new(AppId::new("org.fabric.test"))
    }

    fn topology() -> InMemoryTopology {
        let topo = InMemoryTopology::new();
        for (name, role, mac) in [
            ("device:leaf1", DeviceRole::Leaf, "00:aa:00:00:00:01"),
            ("device:leaf2", DeviceRole::Leaf, "00:aa:00:00:00:02"),
            ("device:spine1", DeviceRole::Spine, "00:bb:00:00:00:01"),
        ] {
            topo.add_device(id(name), true);
            topo.set_role_config(
                id(name),
                RoleConfig {
                    role,
                    station_mac: mac.parse().unwrap(),
                    sid: None,
                },
            );
        }
        topo.add_interface("leaf1-4", "device:leaf1/4".parse().unwrap(), ips(&["2001:db8:1::ff/64"]));
        topo.add_interface("leaf1-3", "device:leaf1/3".parse().unwrap(), ips(&["2001:db8:1::ff/64"]));
        topo
    }

    fn view(topo: &InMemoryTopology) -> FabricView {
        FabricView::new(topo.snapshot(), topo)
    }

    #[test]
    fn test_leaf_bridging_state() {
        let topo = topology();
        let plans = compiler()
            .compute_bridging_state(&view(&topo), &id("device:leaf1"))
            .unwrap();
        assert_eq!(plans.len(), 2);

        let clone = &plans[0];
        assert_eq!(clone.groups[0].id, GroupId::CPU_CLONE_SESSION);
        assert_eq!(clone.groups[0].kind, GroupKind::Clone);
        assert_eq!(clone.groups[0].members, vec![GroupMember::Port(PortNumber::CONTROLLER)]);
        assert!(clone.rules.is_empty());

        let broadcast = &plans[1];
        assert_eq!(broadcast.groups[0].id, GroupId::BROADCAST);
        assert_eq!(
            broadcast.groups[0].members,
            vec![
                GroupMember::Port(PortNumber::new(3)),
                GroupMember::Port(PortNumber::new(4)),
            ]
        );
        let matchers: Vec<_> = broadcast.rules.iter().map(|r| r.matcher.clone()).collect();
        assert_eq!(
            matchers,
            vec![
                RuleMatch::EthDstTernary {
                    value: "ff:ff:ff:ff:ff:ff".parse().unwrap(),
                    mask: "ff:ff:ff:ff:ff:ff".parse().unwrap(),
                },
                RuleMatch::EthDstTernary {
                    value: "33:33:00:00:00:00".parse().unwrap(),
                    mask: "ff:ff:00:00:00:00".parse().unwrap(),
                },
            ]
        );
        assert!(broadcast
            .rules
            .iter()
            .all(|r| r.table == FabricTable::L2Ternary
                && r.action == RuleAction::SetMulticastGroup(GroupId::BROADCAST)));
    }

    #[test]
    fn test_spine_gets_clone_group_only() {
        let topo = topology();
        let plans = compiler()
            .compute_bridging_state(&view(&topo), &id("device:spine1"))
            .unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].groups[0].id, GroupId::CPU_CLONE_SESSION);
    }

    #[test]
    fn test_leaf_without_host_ports_skips_broadcast() {
        let topo = topology();
        let plans = compiler()
            .compute_bridging_state(&view(&topo), &id("device:leaf2"))
            .unwrap();
        assert_eq!(plans.len(), 1);
        assert!(plans
            .iter()
            .flat_map(|p| p.groups.iter())
            .all(|g| g.id != GroupId::BROADCAST));
    }

    #[test]
    fn test_bridging_requires_config() {
        let topo = topology();
        topo.add_device(id("device:leaf9"), true);
        assert!(compiler()
            .compute_bridging_state(&view(&topo), &id("device:leaf9"))
            .is_err());
    }

    #[test]
    fn test_host_bridging_rule() {
        let host = Host {
            mac: "aa:bb:cc:dd:ee:ff".parse().unwrap(),
            ips: vec![],
            location: "device:leaf1/3".parse().unwrap(),
        };
        let rule = compiler().compute_host_bridging_rule(&host);
        assert_eq!(rule.device, id("device:leaf1"));
        assert_eq!(rule.table, FabricTable::L2Exact);
        assert_eq!(rule.matcher, RuleMatch::EthDstExact(host.mac));
        assert_eq!(rule.action, RuleAction::SetOutputPort(PortNumber::new(3)));
    }
}
