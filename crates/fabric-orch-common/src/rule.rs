//! Forwarding rule descriptors.

use crate::group::GroupId;
use crate::pipeline;
use fabric_types::{DeviceId, Ipv6Prefix, MacAddress, PortNumber};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity tagging every rule and group this application installs.
///
/// Cleanup removes exactly the state carrying this tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(String);

impl AppId {
    pub fn new(name: impl Into<String>) -> Self {
        AppId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pipeline tables the reconciler writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FabricTable {
    /// Marks frames addressed to the device itself for routing.
    L2MyStation,
    /// Unicast bridging and next-hop resolution by destination MAC.
    L2Exact,
    /// Broadcast and multicast flooding by masked destination MAC.
    L2Ternary,
    /// IPv6 longest-prefix routing.
    L3,
}

impl FabricTable {
    pub const fn as_str(&self) -> &'static str {
        match self {
            FabricTable::L2MyStation => pipeline::TABLE_L2_MY_STATION,
            FabricTable::L2Exact => pipeline::TABLE_L2_EXACT,
            FabricTable::L2Ternary => pipeline::TABLE_L2_TERNARY,
            FabricTable::L3 => pipeline::TABLE_L3,
        }
    }
}

impl fmt::Display for FabricTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Match criteria of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RuleMatch {
    EthDstExact(MacAddress),
    EthDstTernary { value: MacAddress, mask: MacAddress },
    Ipv6DstLpm(Ipv6Prefix),
}

impl RuleMatch {
    pub const fn field_name(&self) -> &'static str {
        match self {
            RuleMatch::EthDstExact(_) | RuleMatch::EthDstTernary { .. } => pipeline::FIELD_ETH_DST,
            RuleMatch::Ipv6DstLpm(_) => pipeline::FIELD_IPV6_DST,
        }
    }
}

impl fmt::Display for RuleMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleMatch::EthDstExact(mac) => write!(f, "{}={}", self.field_name(), mac),
            RuleMatch::EthDstTernary { value, mask } => {
                write!(f, "{}={}&&&{}", self.field_name(), value, mask)
            }
            RuleMatch::Ipv6DstLpm(prefix) => write!(f, "{}={}", self.field_name(), prefix),
        }
    }
}

/// Action taken on a rule hit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RuleAction {
    NoAction,
    SetOutputPort(PortNumber),
    SetMulticastGroup(GroupId),
    /// Indirect action through a select group of the ECMP action profile.
    ActionProfileGroup(GroupId),
}

impl RuleAction {
    /// Returns the group this action depends on, if any.
    pub const fn group_dependency(&self) -> Option<GroupId> {
        match self {
            RuleAction::SetMulticastGroup(id) | RuleAction::ActionProfileGroup(id) => Some(*id),
            RuleAction::NoAction | RuleAction::SetOutputPort(_) => None,
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleAction::NoAction => f.write_str(pipeline::ACTION_NO_ACTION),
            RuleAction::SetOutputPort(port) => write!(
                f,
                "{}({}={})",
                pipeline::ACTION_SET_OUTPUT_PORT,
                pipeline::PARAM_PORT_NUM,
                port
            ),
            RuleAction::SetMulticastGroup(id) => write!(
                f,
                "{}({}={})",
                pipeline::ACTION_SET_MULTICAST_GROUP,
                pipeline::PARAM_GID,
                id
            ),
            RuleAction::ActionProfileGroup(id) => {
                write!(f, "{}[group={}]", pipeline::ECMP_SELECTOR, id)
            }
        }
    }
}

/// A single match/action entry destined for one device.
///
/// `(device, table, matcher)` identifies the rule on the device; installing
/// a rule with the same key overwrites the previous action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForwardingRule {
    pub device: DeviceId,
    pub table: FabricTable,
    pub matcher: RuleMatch,
    pub action: RuleAction,
    pub owner: AppId,
}

impl ForwardingRule {
    pub fn new(
        device: DeviceId,
        table: FabricTable,
        matcher: RuleMatch,
        action: RuleAction,
        owner: AppId,
    ) -> Self {
        Self {
            device,
            table,
            matcher,
            action,
            owner,
        }
    }

    pub fn key(&self) -> (&DeviceId, FabricTable, &RuleMatch) {
        (&self.device, self.table, &self.matcher)
    }
}

impl fmt::Display for ForwardingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}] -> {}",
            self.device, self.table, self.matcher, self.action
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_table_names() {
        assert_eq!(FabricTable::L2MyStation.to_string(), "FabricIngress.l2_my_station");
        assert_eq!(FabricTable::L3.as_str(), "FabricIngress.l3_table");
    }

    #[test]
    fn test_group_dependency() {
        let gid = GroupId::new(255);
        assert_eq!(RuleAction::SetMulticastGroup(gid).group_dependency(), Some(gid));
        assert_eq!(RuleAction::ActionProfileGroup(gid).group_dependency(), Some(gid));
        assert_eq!(RuleAction::NoAction.group_dependency(), None);
        assert_eq!(
            RuleAction::SetOutputPort(PortNumber::new(1)).group_dependency(),
            None
        );
    }

    #[test]
    fn test_rule_display() {
        let rule = ForwardingRule::new(
            DeviceId::new("device:leaf1"),
            FabricTable::L2Exact,
            RuleMatch::EthDstExact("00:00:00:00:00:1a".parse().unwrap()),
            RuleAction::SetOutputPort(PortNumber::new(3)),
            AppId::new("org.fabric.test"),
        );
        assert_eq!(
            rule.to_string(),
            "device:leaf1 FabricIngress.l2_exact_table [hdr.ethernet.dst_addr=00:00:00:00:00:1a] \
             -> FabricIngress.set_output_port(port_num=3)"
        );
    }

    #[test]
    fn test_rule_key_ignores_action() {
        let device = DeviceId::new("device:leaf1");
        let matcher = RuleMatch::Ipv6DstLpm("2001:1:2::/64".parse().unwrap());
        let a = ForwardingRule::new(
            device.clone(),
            FabricTable::L3,
            matcher.clone(),
            RuleAction::ActionProfileGroup(GroupId::new(1)),
            AppId::new("app"),
        );
        let b = ForwardingRule::new(
            device,
            FabricTable::L3,
            matcher,
            RuleAction::ActionProfileGroup(GroupId::new(2)),
            AppId::new("app"),
        );
        assert_eq!(a.key(), b.key());
        assert_ne!(a, b);
    }
}
