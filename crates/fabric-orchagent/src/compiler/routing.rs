//! IPv6 routing state: my-station, next-hop resolution and LPM routes.

use super::{Compiler, InstallPlan};
use crate::error::Result;
use crate::view::FabricView;
use fabric_orch_common::{
    DeviceRole, FabricTable, ForwardingRule, GroupId, GroupKind, GroupMember, Host, RuleAction,
    RuleMatch,
};
use fabric_types::{DeviceId, Ipv6Prefix, MacAddress};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

impl Compiler {
    /// Rule accepting frames addressed to the device's own station MAC.
    pub fn compute_my_station_rule(&self, view: &FabricView, device: &DeviceId) -> Result<ForwardingRule> {
        let cfg = view.role_config(device)?;
        Ok(self.rule(
            device,
            FabricTable::L2MyStation,
            RuleMatch::EthDstExact(cfg.station_mac),
            RuleAction::NoAction,
        ))
    }

    /// Rules sending frames for a directly linked neighbor's station MAC out
    /// of the link's source port.
    ///
    /// Unavailable neighbors and neighbors without config are skipped. With
    /// parallel links to the same neighbor the lowest port wins.
    pub fn compute_next_hop_rules(&self, view: &FabricView, device: &DeviceId) -> Result<Vec<ForwardingRule>> {
        let mut by_mac: BTreeMap<MacAddress, ForwardingRule> = BTreeMap::new();

        for link in view.egress_links(device) {
            if !view.snapshot().is_available(&link.dst.device) {
                debug!(device = %device, neighbor = %link.dst.device, "neighbor not available");
                continue;
            }
            let Some(neighbor) = view.peer_config(&link.dst.device) else {
                continue;
            };
            by_mac.entry(neighbor.station_mac).or_insert_with(|| {
                self.rule(
                    device,
                    FabricTable::L2Exact,
                    RuleMatch::EthDstExact(neighbor.station_mac),
                    RuleAction::SetOutputPort(link.src.port),
                )
            });
        }

        Ok(by_mac.into_values().collect())
    }

    /// A next-hop group for the host MAC and one /128 route per IPv6
    /// address of the host, installed on `device`.
    ///
    /// Hosts without IPv6 addresses produce nothing.
    pub fn compute_host_routes(&self, device: &DeviceId, host: &Host) -> Option<InstallPlan> {
        let prefixes: BTreeSet<Ipv6Prefix> = host.ipv6_addresses().map(Ipv6Prefix::host).collect();
        if prefixes.is_empty() {
            debug!(device = %device, host = %host.mac, "host has no IPv6 address, no routes");
            return None;
        }

        Some(self.lpm_plan(device, host.mac, prefixes))
    }

    /// On a spine: one next-hop group per leaf and routes for the leaf's
    /// subnets and SID.
    pub fn compute_spine_routes(&self, view: &FabricView, spine: &DeviceId) -> Result<Vec<InstallPlan>> {
        view.role_config(spine)?;

        let mut plans = Vec::new();
        for (leaf, leaf_cfg) in view.leaves() {
            let mut prefixes = view.ipv6_subnets(leaf);
            if let Some(sid) = leaf_cfg.sid {
                prefixes.insert(Ipv6Prefix::host(sid));
            }
            if prefixes.is_empty() {
                debug!(spine = %spine, leaf = %leaf, "leaf has no subnets or SID");
                continue;
            }
            plans.push(self.lpm_plan(spine, leaf_cfg.station_mac, prefixes));
        }

        Ok(plans)
    }

    /// On a leaf: an ECMP group over all spines carrying the other leaves'
    /// subnets, and a dedicated next-hop group per spine SID.
    pub fn compute_leaf_routes(&self, view: &FabricView, leaf: &DeviceId) -> Result<Vec<InstallPlan>> {
        view.role_config(leaf)?;

        let spines = view.spines();
        if spines.is_empty() {
            debug!(leaf = %leaf, "no spines configured, skipping routes via spines");
            return Ok(Vec::new());
        }

        let members: Vec<GroupMember> = spines
            .iter()
            .map(|(_, cfg)| GroupMember::NextHop(cfg.station_mac))
            .collect();
        let ecmp = self.group(leaf, GroupId::ECMP, GroupKind::Select, members);

        let remote_subnets: BTreeSet<Ipv6Prefix> = view
            .leaves()
            .into_iter()
            .filter(|(other, _)| *other != leaf)
            .flat_map(|(other, _)| view.ipv6_subnets(other))
            .collect();
        let rules = remote_subnets
            .into_iter()
            .map(|prefix| {
                self.rule(
                    leaf,
                    FabricTable::L3,
                    RuleMatch::Ipv6DstLpm(prefix),
                    RuleAction::ActionProfileGroup(GroupId::ECMP),
                )
            })
            .collect();

        let mut plans = vec![InstallPlan::with_group(ecmp, rules)];

        for (_, spine_cfg) in &spines {
            if let Some(sid) = spine_cfg.sid {
                plans.push(self.lpm_plan(
                    leaf,
                    spine_cfg.station_mac,
                    BTreeSet::from([Ipv6Prefix::host(sid)]),
                ));
            }
        }

        Ok(plans)
    }

    /// Routing state for `device` according to its role.
    pub fn compute_routes(&self, view: &FabricView, device: &DeviceId) -> Result<Vec<InstallPlan>> {
        match view.role_config(device)?.role {
            DeviceRole::Spine => self.compute_spine_routes(view, device),
            DeviceRole::Leaf => self.compute_leaf_routes(view, device),
        }
    }

    fn lpm_plan(&self, device: &DeviceId, next_hop: MacAddress, prefixes: BTreeSet<Ipv6Prefix>) -> InstallPlan {
        let group = self.next_hop_group(device, next_hop);
        let rules = prefixes
            .into_iter()
            .map(|prefix| {
                self.rule(
                    device,
                    FabricTable::L3,
                    RuleMatch::Ipv6DstLpm(prefix),
                    RuleAction::ActionProfileGroup(group.id),
                )
            })
            .collect();
        InstallPlan::with_group(group, rules)
    }
}
