//! Background retention sweeper.
//!
//! One owned task per store. It sweeps both partitions immediately on start
//! and then once per interval, until its [`CancellationToken`] is cancelled.
//! Nothing that happens during a sweep stops the loop.

use crate::store::{EphemeralStore, Partition, SweepReport};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How often to sweep and how old entries may get.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPolicy {
    pub interval: Duration,
    pub inbound_max_age: Duration,
    pub outbound_max_age: Duration,
}

impl SweepPolicy {
    pub fn max_age(&self, partition: Partition) -> Duration {
        match partition {
            Partition::Inbound => self.inbound_max_age,
            Partition::Outbound => self.outbound_max_age,
        }
    }
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10 * 60),
            inbound_max_age: Duration::from_secs(30 * 60),
            outbound_max_age: Duration::from_secs(30 * 60),
        }
    }
}

/// Running sweeper. Dropping the handle does not stop the task; call
/// [`SweeperHandle::shutdown`].
pub struct SweeperHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Token that stops the sweeper when cancelled.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Cancel the sweeper and wait for its task to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            warn!("Sweeper task ended abnormally: {}", e);
        }
    }
}

pub struct Sweeper;

impl Sweeper {
    /// Start the sweeper on the current runtime.
    pub fn spawn(store: EphemeralStore, policy: SweepPolicy, token: CancellationToken) -> SweeperHandle {
        let task_token = token.clone();
        let task = tokio::spawn(async move {
            info!(
                interval_secs = policy.interval.as_secs(),
                inbound_max_age_secs = policy.inbound_max_age.as_secs(),
                outbound_max_age_secs = policy.outbound_max_age.as_secs(),
                "Retention sweeper started"
            );

            let mut ticker = tokio::time::interval(policy.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    // The first tick completes immediately.
                    _ = ticker.tick() => {
                        sweep_all(&store, &policy, &task_token).await;
                    }
                }
            }

            info!("Retention sweeper stopped");
        });
        SweeperHandle { token, task }
    }
}

/// Sweep both partitions once. Returns the reports of the partitions that
/// were swept before any cancellation.
pub async fn sweep_all(
    store: &EphemeralStore,
    policy: &SweepPolicy,
    token: &CancellationToken,
) -> Vec<(Partition, SweepReport)> {
    let mut reports = Vec::with_capacity(Partition::ALL.len());
    for partition in Partition::ALL {
        if token.is_cancelled() {
            debug!("Sweep cancelled before {}", partition);
            break;
        }
        let report = store.sweep(partition, policy.max_age(partition)).await;
        reports.push((partition, report));
    }
    reports
}
