//! Topology event classification.

use crate::ownership::OwnershipFilter;
use fabric_orch_common::{
    DeviceEventKind, Host, HostEventKind, LinkEventKind, TopologyEvent, TopologyListener,
};
use fabric_types::DeviceId;
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Incremental work queued for the worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// Install bridging state on a device that became available.
    BridgeDevice(DeviceId),
    /// Install bridging and routing state for a newly attached host.
    LearnHost(Host),
    /// Refresh my-station, route and next-hop state of a link endpoint.
    LinkEndpoint(DeviceId),
}

impl WorkItem {
    pub fn device(&self) -> &DeviceId {
        match self {
            WorkItem::BridgeDevice(device) | WorkItem::LinkEndpoint(device) => device,
            WorkItem::LearnHost(host) => &host.location.device,
        }
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkItem::BridgeDevice(device) => write!(f, "bridge {}", device),
            WorkItem::LearnHost(host) => write!(f, "learn host {} at {}", host.mac, host.location),
            WorkItem::LinkEndpoint(device) => write!(f, "link endpoint {}", device),
        }
    }
}

/// Maps an event to the work it requires.
///
/// Only device added/availability-changed, host added and link added
/// events are relevant. Work is produced only for devices this instance
/// owns; a link yields one item per owned endpoint.
pub fn classify(event: &TopologyEvent, ownership: &OwnershipFilter) -> Vec<WorkItem> {
    match event {
        TopologyEvent::Device {
            kind: DeviceEventKind::Added | DeviceEventKind::AvailabilityChanged,
            device,
        } if ownership.is_owned(&device.id) => vec![WorkItem::BridgeDevice(device.id.clone())],
        TopologyEvent::Host {
            kind: HostEventKind::Added,
            host,
        } if ownership.is_owned(&host.location.device) => vec![WorkItem::LearnHost(host.clone())],
        TopologyEvent::Link {
            kind: LinkEventKind::Added,
            link,
        } => [&link.src.device, &link.dst.device]
            .into_iter()
            .filter(|device| ownership.is_owned(device))
            .map(|device| WorkItem::LinkEndpoint(device.clone()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Topology listener that classifies events and queues the resulting work.
///
/// Never blocks the notifying thread.
pub struct ReconcileListener {
    ownership: OwnershipFilter,
    queue: UnboundedSender<WorkItem>,
}

impl ReconcileListener {
    pub fn new(ownership: OwnershipFilter, queue: UnboundedSender<WorkItem>) -> Self {
        Self { ownership, queue }
    }
}

impl TopologyListener for ReconcileListener {
    fn on_event(&self, event: &TopologyEvent) {
        let items = classify(event, &self.ownership);
        if items.is_empty() {
            debug!(%event, "ignoring event");
            return;
        }
        info!(%event, items = items.len(), "event received");
        for item in items {
            if self.queue.send(item).is_err() {
                warn!(%event, "work queue closed, dropping event");
                return;
            }
        }
    }
}
