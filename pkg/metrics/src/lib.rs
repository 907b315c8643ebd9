use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Process-local lease counters, rendered in Prometheus text exposition format.
#[derive(Default)]
pub struct LeaseMetrics {
    acquire_total: AtomicU64,
    acquire_conflicts_total: AtomicU64,
    release_total: AtomicU64,
    heartbeat_total: AtomicU64,
    leases_expired_total: AtomicU64,
    sweep_failures_total: AtomicU64,
    sweeps_last_expired: AtomicI64,
}

impl LeaseMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A lease was granted or refreshed through acquire.
    pub fn acquired(&self) {
        self.acquire_total.fetch_add(1, Ordering::Relaxed);
    }

    /// An acquire lost to another holder.
    pub fn conflicted(&self) {
        self.acquire_conflicts_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn released(&self) {
        self.release_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn heartbeat(&self) {
        self.heartbeat_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of one sweep tick.
    pub fn swept(&self, expired: u64) {
        self.leases_expired_total.fetch_add(expired, Ordering::Relaxed);
        self.sweeps_last_expired
            .store(i64::try_from(expired).unwrap_or(i64::MAX), Ordering::Relaxed);
    }

    pub fn sweep_failed(&self) {
        self.sweep_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let counters = [
            (
                "leasehold_acquire_total",
                "Successful lease acquisitions",
                &self.acquire_total,
            ),
            (
                "leasehold_acquire_conflicts_total",
                "Acquire attempts refused because another owner holds the lease",
                &self.acquire_conflicts_total,
            ),
            (
                "leasehold_release_total",
                "Leases released by their owner",
                &self.release_total,
            ),
            (
                "leasehold_heartbeat_total",
                "Accepted lease heartbeats",
                &self.heartbeat_total,
            ),
            (
                "leasehold_leases_expired_total",
                "Stale leases moved to EXPIRED by the sweeper",
                &self.leases_expired_total,
            ),
            (
                "leasehold_sweep_failures_total",
                "Sweeper ticks skipped because the store failed",
                &self.sweep_failures_total,
            ),
        ];

        let mut output = String::new();
        for (name, help, value) in counters {
            let _ = writeln!(output, "# HELP {} {}", name, help);
            let _ = writeln!(output, "# TYPE {} counter", name);
            let _ = writeln!(output, "{} {}", name, value.load(Ordering::Relaxed));
        }

        let name = "leasehold_sweeps_last_expired";
        let _ = writeln!(output, "# HELP {} Leases expired by the most recent sweep", name);
        let _ = writeln!(output, "# TYPE {} gauge", name);
        let _ = writeln!(
            output,
            "{} {}",
            name,
            self.sweeps_last_expired.load(Ordering::Relaxed)
        );

        output
    }
}
