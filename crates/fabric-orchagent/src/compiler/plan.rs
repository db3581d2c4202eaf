//! Install batches produced by the compiler.

use fabric_orch_common::{ForwardingRule, ReplicationGroup};
use fabric_types::DeviceId;

/// Groups and rules for one device that must be installed together.
///
/// The installer submits every group before any rule of the same plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    pub device: DeviceId,
    pub groups: Vec<ReplicationGroup>,
    pub rules: Vec<ForwardingRule>,
}

impl InstallPlan {
    /// A group with the rules that reference it.
    pub fn with_group(group: ReplicationGroup, rules: Vec<ForwardingRule>) -> Self {
        Self {
            device: group.device.clone(),
            groups: vec![group],
            rules,
        }
    }

    pub fn rules_only(device: DeviceId, rules: Vec<ForwardingRule>) -> Self {
        Self {
            device,
            groups: Vec::new(),
            rules,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_orch_common::{AppId, FabricTable, GroupId, GroupKind, GroupMember, RuleAction, RuleMatch};
    use fabric_types::PortNumber;

    #[test]
    fn test_plan_constructors() {
        let device = DeviceId::new("device:leaf1");
        let owner = AppId::new("app");
        let group = ReplicationGroup::new(
            device.clone(),
            GroupId::BROADCAST,
            GroupKind::Broadcast,
            vec![GroupMember::Port(PortNumber::new(3))],
            owner.clone(),
        );
        let rule = ForwardingRule::new(
            device.clone(),
            FabricTable::L2Ternary,
            RuleMatch::EthDstTernary {
                value: "ff:ff:ff:ff:ff:ff".parse().unwrap(),
                mask: "ff:ff:ff:ff:ff:ff".parse().unwrap(),
            },
            RuleAction::SetMulticastGroup(GroupId::BROADCAST),
            owner,
        );

        let plan = InstallPlan::with_group(group, vec![rule]);
        assert_eq!(plan.device, device);
        assert_eq!(plan.groups.len(), 1);
        assert!(!plan.is_empty());

        let empty = InstallPlan::rules_only(device.clone(), Vec::new());
        assert_eq!(empty.device, device);
        assert!(empty.is_empty());
    }
}
