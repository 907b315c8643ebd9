//! Lease lifecycle constants.

/// TTL applied when an acquire request does not name one.
pub const DEFAULT_TTL_SECS: u64 = 300;

/// Upper bound accepted for a lease TTL (one week).
pub const MAX_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// How often the expiry sweeper scans for stale leases.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 5;

/// Clients holding a lease heartbeat every `TTL / HEARTBEAT_INTERVAL_DIVISOR` seconds.
pub const HEARTBEAT_INTERVAL_DIVISOR: u64 = 3;

/// Longest owner id, resource type or external identifier accepted.
pub const MAX_NAME_LEN: usize = 255;
