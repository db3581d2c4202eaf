//! In-memory collaborators.
//!
//! Used by the daemon's dry-run mode and by tests. [`InMemoryTopology`]
//! doubles as topology and configuration service, [`StaticMastership`]
//! answers mastership from a mutable set and [`RecordingProgrammer`] keeps
//! the installed state plus an ordered log of every call.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use fabric_orch_common::{
    AppId, ConfigMissing, Device, DeviceEventKind, DeviceProgrammer, FabricTable, ForwardingRule,
    GroupAck, GroupId, Host, HostEventKind, Interface, Link, LinkEventKind, ListenerId,
    MastershipService, NetworkConfigService, ProgramError, ReplicationGroup, RoleConfig,
    RuleFailure, RuleMatch, TopologyEvent, TopologyListener, TopologyService, TopologySnapshot,
};
use fabric_types::{ConnectPoint, DeviceId, InterfaceAddress, MacAddress};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::time::Instant;
use tracing::debug;

// ============================================================================
// Topology and configuration
// ============================================================================

#[derive(Default)]
struct TopologyState {
    devices: BTreeMap<DeviceId, Device>,
    links: BTreeSet<Link>,
    hosts: BTreeMap<MacAddress, Host>,
    interfaces: Vec<Interface>,
    roles: HashMap<DeviceId, RoleConfig>,
}

/// Mutable topology that notifies subscribers on every change.
///
/// Listeners are called synchronously on the mutating thread, after the
/// change is visible in [`TopologyService::snapshot`].
#[derive(Default)]
pub struct InMemoryTopology {
    state: RwLock<TopologyState>,
    listeners: DashMap<u64, Arc<dyn TopologyListener>>,
    next_listener: AtomicU64,
}

impl InMemoryTopology {
    pub fn new() -> Self {
        Self::default()
    }

    fn write<R>(&self, f: impl FnOnce(&mut TopologyState) -> R) -> R {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Delivers `event` to every subscribed listener.
    pub fn emit(&self, event: TopologyEvent) {
        let listeners: Vec<Arc<dyn TopologyListener>> =
            self.listeners.iter().map(|entry| Arc::clone(entry.value())).collect();
        debug!(%event, listeners = listeners.len(), "topology event");
        for listener in listeners {
            listener.on_event(&event);
        }
    }

    pub fn add_device(&self, id: DeviceId, available: bool) {
        let device = Device::new(id, available);
        self.write(|s| s.devices.insert(device.id.clone(), device.clone()));
        self.emit(TopologyEvent::Device {
            kind: DeviceEventKind::Added,
            device,
        });
    }

    /// Changes availability of a known device. Unknown devices are ignored.
    pub fn set_available(&self, id: &DeviceId, available: bool) {
        let device = self.write(|s| {
            s.devices.get_mut(id).map(|d| {
                d.available = available;
                d.clone()
            })
        });
        if let Some(device) = device {
            self.emit(TopologyEvent::Device {
                kind: DeviceEventKind::AvailabilityChanged,
                device,
            });
        }
    }

    pub fn add_link(&self, link: Link) {
        let added = self.write(|s| s.links.insert(link.clone()));
        if added {
            self.emit(TopologyEvent::Link {
                kind: LinkEventKind::Added,
                link,
            });
        }
    }

    /// Adds the link in both directions.
    pub fn add_bidirectional_link(&self, a: ConnectPoint, b: ConnectPoint) {
        let link = Link::new(a, b);
        let reverse = link.reversed();
        self.add_link(link);
        self.add_link(reverse);
    }

    /// Adds or replaces a host. Replacing emits `Moved` if the location
    /// changed and `Updated` otherwise.
    pub fn add_host(&self, host: Host) {
        let previous = self.write(|s| s.hosts.insert(host.mac, host.clone()));
        let kind = match previous {
            None => HostEventKind::Added,
            Some(old) if old.location != host.location => HostEventKind::Moved,
            Some(_) => HostEventKind::Updated,
        };
        self.emit(TopologyEvent::Host { kind, host });
    }

    pub fn add_interface(
        &self,
        name: impl Into<String>,
        connect_point: ConnectPoint,
        ips: impl IntoIterator<Item = InterfaceAddress>,
    ) {
        let interface = Interface {
            name: name.into(),
            connect_point,
            ips: ips.into_iter().collect(),
        };
        self.write(|s| s.interfaces.push(interface));
    }

    pub fn set_role_config(&self, device: DeviceId, config: RoleConfig) {
        self.write(|s| s.roles.insert(device, config));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl fmt::Debug for InMemoryTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("InMemoryTopology")
            .field("devices", &state.devices.len())
            .field("links", &state.links.len())
            .field("hosts", &state.hosts.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl TopologyService for InMemoryTopology {
    fn snapshot(&self) -> Arc<TopologySnapshot> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Arc::new(TopologySnapshot::new(
            state.devices.values().cloned(),
            state.links.iter().cloned(),
            state.hosts.values().cloned(),
            state.interfaces.iter().cloned(),
        ))
    }

    fn subscribe(&self, listener: Arc<dyn TopologyListener>) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.listeners.insert(id, listener);
        ListenerId(id)
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.listeners.remove(&id.0);
    }
}

impl NetworkConfigService for InMemoryTopology {
    fn role_config(&self, device: &DeviceId) -> Result<RoleConfig, ConfigMissing> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .roles
            .get(device)
            .cloned()
            .ok_or_else(|| ConfigMissing::new(device.clone(), "fabricDeviceConfig"))
    }
}

// ============================================================================
// Mastership
// ============================================================================

/// Mastership answered from a set that tests can change at any time.
#[derive(Debug, Default)]
pub struct StaticMastership {
    all: AtomicBool,
    owned: DashSet<DeviceId>,
}

impl StaticMastership {
    /// Master for every device.
    pub fn all() -> Self {
        Self {
            all: AtomicBool::new(true),
            owned: DashSet::new(),
        }
    }

    /// Master for exactly `devices`.
    pub fn of(devices: impl IntoIterator<Item = DeviceId>) -> Self {
        let owned = DashSet::new();
        for device in devices {
            owned.insert(device);
        }
        Self {
            all: AtomicBool::new(false),
            owned,
        }
    }

    pub fn grant(&self, device: DeviceId) {
        self.owned.insert(device);
    }

    /// Revokes mastership of `device`, including implicit mastership from
    /// [`StaticMastership::all`].
    pub fn revoke(&self, device: &DeviceId) {
        if self.all.swap(false, Ordering::SeqCst) {
            debug!(device = %device, "revoking from master-of-all, other devices stay unowned");
        }
        self.owned.remove(device);
    }
}

impl MastershipService for StaticMastership {
    fn is_local_master(&self, device: &DeviceId) -> bool {
        self.all.load(Ordering::SeqCst) || self.owned.contains(device)
    }
}

// ============================================================================
// Device programming
// ============================================================================

/// One call made against a [`RecordingProgrammer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramOp {
    ApplyGroup(ReplicationGroup),
    ApplyRules(Vec<ForwardingRule>),
    RemoveGroup { device: DeviceId, id: GroupId },
    ListGroups { device: DeviceId },
    RemoveRulesByOwner { device: DeviceId },
}

impl ProgramOp {
    pub fn device(&self) -> Option<&DeviceId> {
        match self {
            ProgramOp::ApplyGroup(group) => Some(&group.device),
            ProgramOp::ApplyRules(rules) => rules.first().map(|r| &r.device),
            ProgramOp::RemoveGroup { device, .. }
            | ProgramOp::ListGroups { device }
            | ProgramOp::RemoveRulesByOwner { device } => Some(device),
        }
    }

    /// Returns true for calls that change device state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, ProgramOp::ListGroups { .. })
    }
}

type RuleKey = (DeviceId, FabricTable, RuleMatch);
type Hook = Box<dyn Fn(&ProgramOp) + Send + Sync>;

/// Programmer that applies everything to in-memory tables and records the
/// call sequence.
#[derive(Default)]
pub struct RecordingProgrammer {
    log: Mutex<Vec<(Instant, ProgramOp)>>,
    groups: DashMap<(DeviceId, GroupId), ReplicationGroup>,
    rules: DashMap<RuleKey, ForwardingRule>,
    failing_groups: DashSet<(DeviceId, GroupId)>,
    failing_rules: DashSet<RuleKey>,
    failing_rule_removals: DashSet<DeviceId>,
    acknowledge: AtomicBool,
    hook: RwLock<Option<Hook>>,
}

impl RecordingProgrammer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports group submissions as acknowledged instead of submitted.
    pub fn with_acknowledgement(self) -> Self {
        self.acknowledge.store(true, Ordering::SeqCst);
        self
    }

    /// Installs a callback run after each call is recorded, before it
    /// takes effect.
    pub fn set_hook(&self, hook: impl Fn(&ProgramOp) + Send + Sync + 'static) {
        *self.hook.write().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
    }

    pub fn fail_group(&self, device: DeviceId, id: GroupId) {
        self.failing_groups.insert((device, id));
    }

    pub fn fail_rule(&self, device: DeviceId, table: FabricTable, matcher: RuleMatch) {
        self.failing_rules.insert((device, table, matcher));
    }

    /// Makes `remove_rules_by_owner` fail on `device`, leaving its rules.
    pub fn fail_rule_removal(&self, device: DeviceId) {
        self.failing_rule_removals.insert(device);
    }

    /// Places a group on a device without recording a call, as if left
    /// behind by an earlier run.
    pub fn preload_group(&self, group: ReplicationGroup) {
        self.groups.insert((group.device.clone(), group.id), group);
    }

    pub fn preload_rule(&self, rule: ForwardingRule) {
        self.rules.insert(
            (rule.device.clone(), rule.table, rule.matcher.clone()),
            rule,
        );
    }

    pub fn operations(&self) -> Vec<ProgramOp> {
        self.timed_operations().into_iter().map(|(_, op)| op).collect()
    }

    pub fn timed_operations(&self) -> Vec<(Instant, ProgramOp)> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear_log(&self) {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Installed rules on `device`, sorted.
    pub fn installed_rules(&self, device: &DeviceId) -> Vec<ForwardingRule> {
        let mut rules: Vec<ForwardingRule> = self
            .rules
            .iter()
            .filter(|entry| &entry.key().0 == device)
            .map(|entry| entry.value().clone())
            .collect();
        rules.sort();
        rules
    }

    /// Installed groups on `device`, sorted by id.
    pub fn installed_groups(&self, device: &DeviceId) -> Vec<ReplicationGroup> {
        let mut groups: Vec<ReplicationGroup> = self
            .groups
            .iter()
            .filter(|entry| &entry.key().0 == device)
            .map(|entry| entry.value().clone())
            .collect();
        groups.sort_by_key(|g| g.id);
        groups
    }

    fn record(&self, op: ProgramOp) {
        if let Some(hook) = self.hook.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            hook(&op);
        }
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((Instant::now(), op));
    }
}

#[async_trait]
impl DeviceProgrammer for RecordingProgrammer {
    async fn apply_rules(&self, rules: &[ForwardingRule]) -> Result<(), Vec<RuleFailure>> {
        self.record(ProgramOp::ApplyRules(rules.to_vec()));

        let mut failures = Vec::new();
        for rule in rules {
            let key = (rule.device.clone(), rule.table, rule.matcher.clone());
            if self.failing_rules.contains(&key) {
                failures.push(RuleFailure::new(
                    rule.clone(),
                    ProgramError::rejected(rule.device.clone(), "injected rule failure"),
                ));
                continue;
            }
            self.rules.insert(key, rule.clone());
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures)
        }
    }

    async fn apply_group(&self, group: &ReplicationGroup) -> Result<GroupAck, ProgramError> {
        self.record(ProgramOp::ApplyGroup(group.clone()));

        let key = (group.device.clone(), group.id);
        if self.failing_groups.contains(&key) {
            return Err(ProgramError::rejected(group.device.clone(), "injected group failure"));
        }
        self.groups.insert(key, group.clone());

        if self.acknowledge.load(Ordering::SeqCst) {
            Ok(GroupAck::Acknowledged)
        } else {
            Ok(GroupAck::Submitted)
        }
    }

    async fn remove_group(&self, device: &DeviceId, id: GroupId, owner: &AppId) -> Result<(), ProgramError> {
        self.record(ProgramOp::RemoveGroup {
            device: device.clone(),
            id,
        });
        self.groups
            .remove_if(&(device.clone(), id), |_, group| &group.owner == owner);
        Ok(())
    }

    async fn list_groups(&self, device: &DeviceId, owner: &AppId) -> Result<Vec<ReplicationGroup>, ProgramError> {
        self.record(ProgramOp::ListGroups {
            device: device.clone(),
        });
        Ok(self
            .installed_groups(device)
            .into_iter()
            .filter(|g| &g.owner == owner)
            .collect())
    }

    async fn remove_rules_by_owner(&self, device: &DeviceId, owner: &AppId) -> Result<(), ProgramError> {
        self.record(ProgramOp::RemoveRulesByOwner {
            device: device.clone(),
        });
        if self.failing_rule_removals.contains(device) {
            return Err(ProgramError::transport("injected rule removal failure"));
        }
        self.rules
            .retain(|(rule_device, _, _), rule| !(rule_device == device && &rule.owner == owner));
        Ok(())
    }
}
