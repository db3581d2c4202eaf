//! Collaborator traits the reconciler depends on.
//!
//! Topology discovery, mastership election, configuration storage and the
//! device programming transport all live outside this workspace; these
//! traits are the only way the reconciler reaches them.

use crate::group::{GroupId, ReplicationGroup};
use crate::program::{ConfigMissing, GroupAck, ProgramError, RuleFailure};
use crate::rule::{AppId, ForwardingRule};
use crate::topology::{RoleConfig, TopologyEvent, TopologySnapshot};
use async_trait::async_trait;
use fabric_types::DeviceId;
use std::sync::Arc;

/// Handle returned by [`TopologyService::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Receives topology change notifications.
///
/// Called on the notifier's thread; implementations must not block.
pub trait TopologyListener: Send + Sync {
    fn on_event(&self, event: &TopologyEvent);
}

pub trait TopologyService: Send + Sync {
    /// Returns the current topology.
    fn snapshot(&self) -> Arc<TopologySnapshot>;

    fn subscribe(&self, listener: Arc<dyn TopologyListener>) -> ListenerId;

    fn unsubscribe(&self, id: ListenerId);
}

pub trait MastershipService: Send + Sync {
    /// Returns true if this instance may write state to `device`.
    fn is_local_master(&self, device: &DeviceId) -> bool;
}

pub trait NetworkConfigService: Send + Sync {
    fn role_config(&self, device: &DeviceId) -> Result<RoleConfig, ConfigMissing>;
}

/// Writes rules and groups to devices.
#[async_trait]
pub trait DeviceProgrammer: Send + Sync {
    /// Installs or overwrites a batch of rules.
    ///
    /// Rules are applied independently; the error lists only the rules
    /// that failed.
    async fn apply_rules(&self, rules: &[ForwardingRule]) -> Result<(), Vec<RuleFailure>>;

    /// Installs or overwrites a group.
    async fn apply_group(&self, group: &ReplicationGroup) -> Result<GroupAck, ProgramError>;

    async fn remove_group(
        &self,
        device: &DeviceId,
        id: GroupId,
        owner: &AppId,
    ) -> Result<(), ProgramError>;

    /// Lists groups on `device` tagged with `owner`.
    async fn list_groups(
        &self,
        device: &DeviceId,
        owner: &AppId,
    ) -> Result<Vec<ReplicationGroup>, ProgramError>;

    /// Removes every rule on `device` tagged with `owner`.
    async fn remove_rules_by_owner(&self, device: &DeviceId, owner: &AppId) -> Result<(), ProgramError>;
}
