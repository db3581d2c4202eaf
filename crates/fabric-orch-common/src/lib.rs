//! Shared abstractions for fabric forwarding-state orchestration.
//!
//! - [`ForwardingRule`] and [`ReplicationGroup`]: what gets written to a device
//! - [`TopologySnapshot`] and [`TopologyEvent`]: what the network looks like
//!   and how it changes
//! - [`TopologyService`], [`MastershipService`], [`NetworkConfigService`],
//!   [`DeviceProgrammer`]: the collaborators the reconciler is wired to
//!
//! # Architecture
//!
//! 1. Topology and configuration are owned by external services
//! 2. The reconciler compiles them into rule and group descriptors
//! 3. Descriptors are handed to a [`DeviceProgrammer`], groups first
//! 4. Topology events trigger incremental recompilation for the affected
//!    devices only

mod group;
pub mod pipeline;
mod program;
mod rule;
mod services;
mod topology;

pub use group::{GroupId, GroupKind, GroupMember, ReplicationGroup};
pub use program::{ConfigMissing, GroupAck, ProgramError, RuleFailure};
pub use rule::{AppId, FabricTable, ForwardingRule, RuleAction, RuleMatch};
pub use services::{
    DeviceProgrammer, ListenerId, MastershipService, NetworkConfigService, TopologyListener,
    TopologyService,
};
pub use topology::{
    Device, DeviceEventKind, DeviceRole, Host, HostEventKind, Interface, Link, LinkEventKind,
    RoleConfig, TopologyEvent, TopologySnapshot,
};
