use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use pkg_constants::state::{LEASES_PREFIX, RESOURCES_PREFIX};
use pkg_types::lease::{Lease, LeaseStatus};

use crate::client::StateStore;
use crate::locks::KeyGuard;

pub fn lease_key(resource_id: Uuid) -> String {
    format!("{}{}", LEASES_PREFIX, resource_id)
}

pub fn resource_key(resource_id: Uuid) -> String {
    format!("{}{}", RESOURCES_PREFIX, resource_id)
}

/// A resource's lease row, read while holding its exclusive guard.
///
/// Every other critical section on the same resource waits until this row is
/// committed or dropped.
pub struct LeaseRow {
    resource_id: Uuid,
    current: Option<Lease>,
    _guard: KeyGuard,
}

impl LeaseRow {
    pub fn resource_id(&self) -> Uuid {
        self.resource_id
    }

    /// The row as it stood when the guard was taken.
    pub fn current(&self) -> Option<&Lease> {
        self.current.as_ref()
    }
}

/// Durable lease storage: what the lease manager and the sweeper need from a store.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Whether a resource with this id has been registered.
    async fn resource_exists(&self, resource_id: Uuid) -> anyhow::Result<bool>;

    /// Take the resource's row guard and read its lease under it.
    async fn lock_lease(&self, resource_id: Uuid) -> anyhow::Result<LeaseRow>;

    /// Write `lease` as the row's new value and release the guard.
    async fn commit_lease(&self, row: LeaseRow, lease: &Lease) -> anyhow::Result<()>;

    /// Unguarded snapshot read of one row.
    async fn get_lease(&self, resource_id: Uuid) -> anyhow::Result<Option<Lease>>;

    /// Unguarded snapshot of every readable row, in no particular order.
    async fn list_leases(&self) -> anyhow::Result<Vec<Lease>>;

    /// Move every stale HELD lease to EXPIRED in one atomic write.
    /// Returns how many rows changed.
    async fn expire_stale(&self, now: DateTime<Utc>) -> anyhow::Result<u64>;
}

impl StateStore {
    async fn read_lease(&self, key: &str) -> anyhow::Result<Option<Lease>> {
        match self.get(key).await? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl LeaseStore for StateStore {
    async fn resource_exists(&self, resource_id: Uuid) -> anyhow::Result<bool> {
        Ok(self.get(&resource_key(resource_id)).await?.is_some())
    }

    async fn lock_lease(&self, resource_id: Uuid) -> anyhow::Result<LeaseRow> {
        let key = lease_key(resource_id);
        let guard = self.lock_key(&key).await;
        let current = self.read_lease(&key).await?;
        Ok(LeaseRow {
            resource_id,
            current,
            _guard: guard,
        })
    }

    async fn commit_lease(&self, row: LeaseRow, lease: &Lease) -> anyhow::Result<()> {
        anyhow::ensure!(
            lease.resource_id == row.resource_id,
            "lease for resource {} committed through the row of {}",
            lease.resource_id,
            row.resource_id
        );
        let data = serde_json::to_vec(lease)?;
        self.put(&lease_key(row.resource_id), &data).await
    }

    async fn get_lease(&self, resource_id: Uuid) -> anyhow::Result<Option<Lease>> {
        self.read_lease(&lease_key(resource_id)).await
    }

    async fn list_leases(&self) -> anyhow::Result<Vec<Lease>> {
        let entries = self.list_prefix(LEASES_PREFIX).await?;
        Ok(entries
            .into_iter()
            .filter_map(|(key, value)| match serde_json::from_slice::<Lease>(&value) {
                Ok(lease) => Some(lease),
                Err(e) => {
                    warn!("Skipping unreadable lease at {}: {}", key, e);
                    None
                }
            })
            .collect())
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> anyhow::Result<u64> {
        // Candidates come back in key order; guards are taken in that order so
        // the sweep never deadlocks against single-row critical sections.
        let candidates: Vec<String> = self
            .list_prefix(LEASES_PREFIX)
            .await?
            .into_iter()
            .filter(|(_, value)| {
                serde_json::from_slice::<Lease>(value)
                    .map(|lease| lease.is_stale(now))
                    .unwrap_or(false)
            })
            .map(|(key, _)| key)
            .collect();
        if candidates.is_empty() {
            return Ok(0);
        }

        let mut guards = Vec::with_capacity(candidates.len());
        let mut updates = Vec::with_capacity(candidates.len());
        for key in candidates {
            guards.push(self.lock_key(&key).await);
            // An acquire or heartbeat may have landed since the scan.
            let Some(mut lease) = self.read_lease(&key).await? else {
                continue;
            };
            if !lease.is_stale(now) {
                debug!("Lease {} revived before sweep, skipping", key);
                continue;
            }
            lease.status = LeaseStatus::Expired;
            updates.push((key, serde_json::to_vec(&lease)?));
        }

        self.put_all(&updates).await?;
        drop(guards);
        Ok(updates.len() as u64)
    }
}
