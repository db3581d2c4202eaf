//! Fixed-size worker pool draining the work queue.

use super::{Reconciler, WorkItem};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Tasks that pull [`WorkItem`]s off a shared queue and hand them to the
/// reconciler. Items for different devices may run in parallel.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `workers` tasks on the current runtime. At least one worker is
    /// always spawned.
    pub fn spawn(workers: usize, reconciler: Arc<Reconciler>, queue: UnboundedReceiver<WorkItem>) -> Self {
        let queue = Arc::new(Mutex::new(queue));
        let handles = (0..workers.max(1))
            .map(|worker| {
                let queue = Arc::clone(&queue);
                let reconciler = Arc::clone(&reconciler);
                tokio::spawn(async move {
                    loop {
                        let item = queue.lock().await.recv().await;
                        let Some(item) = item else {
                            debug!(worker, "work queue closed");
                            break;
                        };
                        debug!(worker, %item, "processing");
                        if let Err(e) = reconciler.handle(item.clone()).await {
                            warn!(worker, %item, error = %e, "work item failed");
                        }
                    }
                })
            })
            .collect();
        Self { handles }
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Aborts all workers. In-flight items are not awaited.
    pub fn shutdown(self) {
        for handle in self.handles {
            handle.abort();
        }
    }
}
