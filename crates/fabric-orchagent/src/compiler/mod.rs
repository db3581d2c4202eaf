//! Rule and group compiler.
//!
//! Maps topology facts into rule and group descriptors. Compilation is
//! pure: it reads a [`FabricView`] and never touches a device. Output order
//! is fully determined by the view, so compiling the same view twice yields
//! identical plans.

mod bridging;
mod plan;
mod routing;

pub use plan::InstallPlan;

use crate::error::Result;
use crate::view::FabricView;
use fabric_orch_common::{
    AppId, FabricTable, ForwardingRule, GroupId, GroupKind, GroupMember, ReplicationGroup,
    RuleAction, RuleMatch,
};
use fabric_types::{DeviceId, MacAddress};

/// Compiles descriptors tagged with one application identity.
#[derive(Debug, Clone)]
pub struct Compiler {
    owner: AppId,
}

impl Compiler {
    pub fn new(owner: AppId) -> Self {
        Self { owner }
    }

    pub fn owner(&self) -> &AppId {
        &self.owner
    }

    /// Compiles the complete state of one device: my-station, routing,
    /// next-hop and bridging state plus rules for hosts already attached.
    ///
    /// Fails without producing anything if the device's own configuration is
    /// missing.
    pub fn compile_device(&self, view: &FabricView, device: &DeviceId) -> Result<Vec<InstallPlan>> {
        let mut direct_rules = vec![self.compute_my_station_rule(view, device)?];
        direct_rules.extend(self.compute_next_hop_rules(view, device)?);

        let mut plans = self.compute_routes(view, device)?;
        plans.extend(self.compute_bridging_state(view, device)?);

        for host in view.snapshot().hosts_at(device) {
            direct_rules.push(self.compute_host_bridging_rule(host));
            plans.extend(self.compute_host_routes(device, host));
        }

        plans.insert(0, InstallPlan::rules_only(device.clone(), direct_rules));
        Ok(plans)
    }

    fn rule(
        &self,
        device: &DeviceId,
        table: FabricTable,
        matcher: RuleMatch,
        action: RuleAction,
    ) -> ForwardingRule {
        ForwardingRule::new(device.clone(), table, matcher, action, self.owner.clone())
    }

    fn group(
        &self,
        device: &DeviceId,
        id: GroupId,
        kind: GroupKind,
        members: Vec<GroupMember>,
    ) -> ReplicationGroup {
        ReplicationGroup::new(device.clone(), id, kind, members, self.owner.clone())
    }

    /// Single-member select group rewriting to `next_hop`.
    fn next_hop_group(&self, device: &DeviceId, next_hop: MacAddress) -> ReplicationGroup {
        self.group(
            device,
            GroupId::from_mac(&next_hop),
            GroupKind::Select,
            vec![GroupMember::NextHop(next_hop)],
        )
    }
}
