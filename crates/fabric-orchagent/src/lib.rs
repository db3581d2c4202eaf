//! Fabric Orchagent - leaf-spine forwarding state reconciler
//!
//! Computes the forwarding rules and replication groups that provide L2
//! bridging at the edge and IPv6 routing across a leaf-spine fabric, and
//! keeps them installed on the devices this instance is master for as the
//! topology changes.
//!
//! # Architecture
//!
//! ```text
//! [TopologyService] ──events──> [ReconcileListener] ──> [WorkerPool]
//!         │                                                  │
//!         └──snapshot──> [FabricView] ──> [Compiler] <───────┘
//!                                             │
//!                                        [Installer] ──> [DeviceProgrammer]
//!                                             │
//!                                    [OwnershipFilter] <── [MastershipService]
//! ```
//!
//! # Key Components
//!
//! - [`compiler::Compiler`]: pure mapping from a topology view to install plans
//! - [`installer::Installer`]: group-before-rule installation per device
//! - [`reconciler::Reconciler`]: full pass, incremental handlers and cleanup
//! - [`daemon::FabricDaemon`]: start/stop lifecycle

pub mod audit;
pub mod compiler;
pub mod config;
pub mod daemon;
pub mod error;
pub mod installer;
pub mod memory;
pub mod netcfg;
pub mod ownership;
pub mod reconciler;
pub mod view;

// ============================================================================
// Re-exports
// ============================================================================

pub use compiler::{Compiler, InstallPlan};
pub use config::FabricConfig;
pub use daemon::{Collaborators, DaemonState, FabricDaemon};
pub use error::{ConfigError, InstallError, InstallTarget, ReconcileError, Result};
pub use installer::{InstallReport, Installer};
pub use ownership::OwnershipFilter;
pub use reconciler::{CleanupReport, PassReport, Reconciler, WorkItem};
pub use view::FabricView;

pub use fabric_orch_common::{AppId, ForwardingRule, ReplicationGroup};
pub use fabric_types::{ConnectPoint, DeviceId, MacAddress};
