use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pkg_constants::lease::DEFAULT_TTL_SECS;

/// Stored status of a lease row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaseStatus {
    Held,
    Released,
    Expired,
}

impl std::fmt::Display for LeaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeaseStatus::Held => f.pad("HELD"),
            LeaseStatus::Released => f.pad("RELEASED"),
            LeaseStatus::Expired => f.pad("EXPIRED"),
        }
    }
}

/// Custody of one resource by one owner.
/// Stored at `/registry/leases/<resource-id>`; one row per resource, rewritten in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lease {
    /// Stable row id, kept across re-acquisitions
    pub id: Uuid,
    pub resource_id: Uuid,
    /// Opaque caller-supplied owner identifier
    pub owner_id: String,
    pub status: LeaseStatus,
    /// Maximum allowed gap between heartbeats
    pub ttl_seconds: u64,
    /// When the current holder acquired the lease
    pub created_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
}

impl Lease {
    /// A fresh HELD lease for `owner_id`, acquired at `now`.
    pub fn new_held(resource_id: Uuid, owner_id: &str, ttl_seconds: u64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            resource_id,
            owner_id: owner_id.to_string(),
            status: LeaseStatus::Held,
            ttl_seconds,
            created_at: now,
            last_heartbeat: now,
        }
    }

    /// Whether the heartbeat gap exceeds the TTL at `now`, regardless of status.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        let elapsed = now.signed_duration_since(self.last_heartbeat);
        match i64::try_from(self.ttl_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
        {
            Some(ttl) => elapsed > ttl,
            None => false,
        }
    }

    /// The lease is live: status HELD and the last heartbeat is within the TTL.
    /// Conflict decisions and the expiry sweep both go through this.
    pub fn is_effectively_held(&self, now: DateTime<Utc>) -> bool {
        self.status == LeaseStatus::Held && !self.is_overdue(now)
    }

    /// HELD on paper but past its TTL; the sweeper moves these to EXPIRED.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.status == LeaseStatus::Held && !self.is_effectively_held(now)
    }

    /// Seconds between acquisition and the last heartbeat.
    pub fn held_duration_secs(&self) -> f64 {
        let held = self.last_heartbeat.signed_duration_since(self.created_at);
        held.num_milliseconds() as f64 / 1000.0
    }
}

// --- Wire messages ---

fn default_ttl() -> u64 {
    DEFAULT_TTL_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquireRequest {
    pub resource_id: Uuid,
    pub owner_id: String,
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub resource_id: Uuid,
    pub owner_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub resource_id: Uuid,
    pub owner_id: String,
}

/// Plain acknowledgement body for release and heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
