//! Reconciliation drivers.
//!
//! [`Reconciler`] owns the full convergence pass, the incremental handlers
//! and the cleanup driver. Topology events reach it through
//! [`ReconcileListener`], which queues [`WorkItem`]s for a [`WorkerPool`].

mod cleanup;
mod events;
mod orch;
mod worker;

pub use cleanup::CleanupReport;
pub use events::{classify, ReconcileListener, WorkItem};
pub use orch::{PassReport, Reconciler};
pub use worker::WorkerPool;
