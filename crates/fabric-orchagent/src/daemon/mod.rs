//! Reconciler lifecycle.

mod fabricdaemon;

pub use fabricdaemon::{Collaborators, DaemonState, FabricDaemon};
