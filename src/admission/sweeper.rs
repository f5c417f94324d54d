//! Periodic eviction of reclaimable admission state.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::backend::Sweep;

/// Handle to a background task sweeping admission state on a fixed interval.
pub struct Sweeper {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn the sweep loop on the current tokio runtime.
    ///
    /// The first sweep runs one full `period` after spawning.
    pub fn spawn(targets: Vec<Arc<dyn Sweep>>, period: Duration) -> Self {
        let (shutdown, mut stop) = oneshot::channel();

        info!(
            targets = targets.len(),
            period_ms = period.as_millis() as u64,
            "Starting admission sweeper"
        );

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted: usize = targets.iter().map(|target| target.sweep()).sum();
                        debug!(evicted, "Admission sweep finished");
                    }
                    _ = &mut stop => break,
                }
            }

            info!("Admission sweeper stopped");
        });

        Self { shutdown, task }
    }

    /// Stop the sweep loop and wait for it to exit.
    pub async fn shutdown(self) {
        // The task may already be gone if it panicked
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "Admission sweeper exited abnormally");
        }
    }
}
