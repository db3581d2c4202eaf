//! Packet-replication and select group descriptors.

use crate::pipeline;
use crate::rule::AppId;
use fabric_types::{DeviceId, MacAddress, PortNumber};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Device-local group identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(u32);

impl GroupId {
    /// Clone session mirroring packets to the controller.
    pub const CPU_CLONE_SESSION: GroupId = GroupId(99);

    /// Multicast group flooding to host-facing ports.
    pub const BROADCAST: GroupId = GroupId(255);

    /// Select group balancing across all spines.
    pub const ECMP: GroupId = GroupId(0xec3b_0000);

    pub const fn new(id: u32) -> Self {
        GroupId(id)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Derives the id of a single-next-hop group from the next-hop MAC.
    ///
    /// The 48-bit address is folded to 32 bits and the sign bit cleared.
    /// Distinct MACs may collide; a collision makes two next hops share a
    /// group and the later install wins.
    pub const fn from_mac(mac: &MacAddress) -> Self {
        let v = mac.to_u64();
        GroupId(((v ^ (v >> 32)) & 0x7fff_ffff) as u32)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GroupKind {
    /// Clone session (packet copy to the listed ports).
    Clone,
    /// Multicast replication group.
    Broadcast,
    /// Action-profile select group (ECMP).
    Select,
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKind::Clone => f.write_str("clone"),
            GroupKind::Broadcast => f.write_str("broadcast"),
            GroupKind::Select => f.write_str("select"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GroupMember {
    /// Replicate to a port (clone and broadcast groups).
    Port(PortNumber),
    /// Rewrite destination MAC to the next hop (select groups).
    NextHop(MacAddress),
}

impl fmt::Display for GroupMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupMember::Port(port) => write!(f, "port {}", port),
            GroupMember::NextHop(mac) => write!(
                f,
                "{}({}={})",
                pipeline::ACTION_SET_L2_NEXT_HOP,
                pipeline::PARAM_DMAC,
                mac
            ),
        }
    }
}

/// A group programmed on one device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicationGroup {
    pub device: DeviceId,
    pub id: GroupId,
    pub kind: GroupKind,
    pub members: Vec<GroupMember>,
    pub owner: AppId,
}

impl ReplicationGroup {
    pub fn new(
        device: DeviceId,
        id: GroupId,
        kind: GroupKind,
        members: Vec<GroupMember>,
        owner: AppId,
    ) -> Self {
        Self {
            device,
            id,
            kind,
            members,
            owner,
        }
    }
}

impl fmt::Display for ReplicationGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} group {} [", self.device, self.kind, self.id)?;
        for (i, member) in self.members.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", member)?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reserved_ids() {
        assert_eq!(GroupId::CPU_CLONE_SESSION.as_u32(), 99);
        assert_eq!(GroupId::BROADCAST.as_u32(), 255);
        assert_eq!(GroupId::ECMP.as_u32(), 0xec3b0000);
    }

    #[test]
    fn test_from_mac_folds_high_bits() {
        let mac: MacAddress = "00:00:00:00:00:1a".parse().unwrap();
        assert_eq!(GroupId::from_mac(&mac).as_u32(), 0x1a);

        // 0xaabb_ccdd_eeff -> 0xccdd_eeff ^ 0xaabb = 0xccdd_4444, sign bit cleared
        let mac: MacAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        assert_eq!(GroupId::from_mac(&mac).as_u32(), 0x4cdd_4444);
    }

    #[test]
    fn test_from_mac_is_deterministic() {
        let mac: MacAddress = "00:aa:00:00:00:01".parse().unwrap();
        assert_eq!(GroupId::from_mac(&mac), GroupId::from_mac(&mac));
    }

    #[test]
    fn test_group_id_display() {
        assert_eq!(GroupId::BROADCAST.to_string(), "0xff");
    }

    #[test]
    fn test_group_display_lists_members() {
        let next_hop: MacAddress = "00:bb:00:00:00:01".parse().unwrap();
        let ecmp = ReplicationGroup::new(
            DeviceId::new("device:leaf1"),
            GroupId::new(7),
            GroupKind::Select,
            vec![GroupMember::NextHop(next_hop)],
            AppId::new("org.fabric.test"),
        );
        assert_eq!(
            ecmp.to_string(),
            "device:leaf1 select group 0x7 [FabricIngress.set_l2_next_hop(dmac=00:bb:00:00:00:01)]"
        );

        let flood = ReplicationGroup::new(
            DeviceId::new("device:leaf1"),
            GroupId::BROADCAST,
            GroupKind::Broadcast,
            vec![GroupMember::Port(PortNumber::new(3)), GroupMember::Port(PortNumber::new(4))],
            AppId::new("org.fabric.test"),
        );
        assert_eq!(flood.to_string(), "device:leaf1 broadcast group 0xff [port 3, port 4]");
    }
}
