use chrono::{DateTime, Utc};
use pkg_metrics::LeaseMetrics;
use pkg_state::LeaseStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Background controller that reclaims leases whose holder stopped heartbeating.
/// Each tick moves every stale HELD lease to EXPIRED in one atomic store write.
pub struct ExpirySweeper {
    store: Arc<dyn LeaseStore>,
    metrics: Arc<LeaseMetrics>,
    check_interval: Duration,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn LeaseStore>, metrics: Arc<LeaseMetrics>, check_interval: Duration) -> Self {
        Self {
            store,
            metrics,
            check_interval,
        }
    }

    /// Start the sweep loop as a background task.
    /// The loop exits once `shutdown` flips to `true` or its sender is dropped.
    pub fn start(self, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "ExpirySweeper started (interval={}ms)",
                self.check_interval.as_millis()
            );
            let mut interval = tokio::time::interval(self.check_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => self.tick().await,
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("ExpirySweeper stopped");
        })
    }

    /// One tick: a failed sweep is logged and left for the next interval.
    async fn tick(&self) {
        match self.sweep_at(Utc::now()).await {
            Ok(0) => debug!("ExpirySweeper: no stale leases"),
            Ok(n) => info!("ExpirySweeper expired {} stale lease(s)", n),
            Err(e) => {
                self.metrics.sweep_failed();
                warn!("ExpirySweeper tick failed: {:#}", e);
            }
        }
    }

    /// Expire every lease that is stale as of `now`.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> anyhow::Result<u64> {
        let expired = self.store.expire_stale(now).await?;
        self.metrics.swept(expired);
        Ok(expired)
    }
}
