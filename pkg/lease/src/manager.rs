use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use pkg_state::LeaseStore;
use pkg_types::lease::{Lease, LeaseStatus};
use pkg_types::validate::{validate_name, validate_ttl};

use crate::error::{LeaseError, LeaseResult};

/// Acquire / heartbeat / release / inspect against a durable lease store.
///
/// Holds no mutable state of its own: every decision is made inside a
/// per-resource critical section provided by the store, so any number of
/// managers may share one store.
#[derive(Clone)]
pub struct LeaseManager {
    store: Arc<dyn LeaseStore>,
}

impl LeaseManager {
    pub fn new(store: Arc<dyn LeaseStore>) -> Self {
        Self { store }
    }

    /// Acquire `resource_id` for `owner_id`, or refresh it if the owner already holds it.
    pub async fn acquire(
        &self,
        resource_id: Uuid,
        owner_id: &str,
        ttl_seconds: u64,
    ) -> LeaseResult<Lease> {
        self.acquire_at(resource_id, owner_id, ttl_seconds, Utc::now())
            .await
    }

    pub async fn acquire_at(
        &self,
        resource_id: Uuid,
        owner_id: &str,
        ttl_seconds: u64,
        now: DateTime<Utc>,
    ) -> LeaseResult<Lease> {
        validate_name("owner_id", owner_id)
            .map_err(|e| LeaseError::InvalidRequest(e.to_string()))?;
        validate_ttl(ttl_seconds).map_err(|e| LeaseError::InvalidRequest(e.to_string()))?;

        if !self.store.resource_exists(resource_id).await? {
            return Err(LeaseError::ResourceNotFound(resource_id));
        }

        let row = self.store.lock_lease(resource_id).await?;
        let lease = match row.current() {
            None => {
                info!(
                    "Lease on {} created for {} (ttl={}s)",
                    resource_id, owner_id, ttl_seconds
                );
                Lease::new_held(resource_id, owner_id, ttl_seconds, now)
            }
            Some(current) if current.is_effectively_held(now) => {
                if current.owner_id != owner_id {
                    debug!(
                        "Acquire of {} by {} refused, held by {}",
                        resource_id, owner_id, current.owner_id
                    );
                    return Err(LeaseError::LockConflict {
                        resource_id,
                        holder: current.owner_id.clone(),
                    });
                }
                debug!("Lease on {} re-acquired by {}", resource_id, owner_id);
                Lease {
                    last_heartbeat: now,
                    ttl_seconds,
                    ..current.clone()
                }
            }
            Some(current) => {
                // RELEASED, EXPIRED, or HELD past its TTL: take the row over.
                info!(
                    "Lease on {} taken over by {} (was {}{} by {})",
                    resource_id,
                    owner_id,
                    current.status,
                    if current.status == LeaseStatus::Held { ", stale" } else { "" },
                    current.owner_id
                );
                Lease {
                    owner_id: owner_id.to_string(),
                    status: LeaseStatus::Held,
                    ttl_seconds,
                    created_at: now,
                    last_heartbeat: now,
                    ..current.clone()
                }
            }
        };

        self.store.commit_lease(row, &lease).await?;
        Ok(lease)
    }

    /// Release the lease if `owner_id` is its stored owner.
    pub async fn release(&self, resource_id: Uuid, owner_id: &str) -> LeaseResult<Lease> {
        let row = self.store.lock_lease(resource_id).await?;
        let mut lease = match row.current() {
            Some(current) => current.clone(),
            None => return Err(LeaseError::LockNotFound(resource_id)),
        };
        if lease.owner_id != owner_id {
            debug!(
                "Release of {} by {} refused, owned by {}",
                resource_id, owner_id, lease.owner_id
            );
            return Err(LeaseError::OwnerMismatch { resource_id });
        }

        lease.status = LeaseStatus::Released;
        self.store.commit_lease(row, &lease).await?;
        info!("Lease on {} released by {}", resource_id, owner_id);
        Ok(lease)
    }

    /// Refresh the heartbeat of a HELD lease owned by `owner_id`.
    pub async fn heartbeat(&self, resource_id: Uuid, owner_id: &str) -> LeaseResult<Lease> {
        self.heartbeat_at(resource_id, owner_id, Utc::now()).await
    }

    /// Staleness is not checked: a stale lease the sweeper has not
    /// reached yet can still be renewed by its owner.
    pub async fn heartbeat_at(
        &self,
        resource_id: Uuid,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> LeaseResult<Lease> {
        let row = self.store.lock_lease(resource_id).await?;
        let mut lease = match row.current() {
            Some(current)
                if current.owner_id == owner_id && current.status == LeaseStatus::Held =>
            {
                current.clone()
            }
            _ => return Err(LeaseError::LockNotFound(resource_id)),
        };

        lease.last_heartbeat = now;
        self.store.commit_lease(row, &lease).await?;
        debug!("Heartbeat on {} from {}", resource_id, owner_id);
        Ok(lease)
    }

    /// Raw stored lease for a resource.
    pub async fn inspect(&self, resource_id: Uuid) -> LeaseResult<Lease> {
        self.store
            .get_lease(resource_id)
            .await?
            .ok_or(LeaseError::LockNotFound(resource_id))
    }

    /// Every lease row, most recently acquired first.
    pub async fn list_all(&self) -> LeaseResult<Vec<Lease>> {
        let mut leases = self.store.list_leases().await?;
        leases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(leases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ResourceRegistry;
    use async_trait::async_trait;
    use chrono::Duration;
    use pkg_state::{LeaseRow, StateStore};

    async fn setup() -> (LeaseManager, StateStore, Uuid) {
        let store = StateStore::in_memory().await.unwrap();
        let registry = ResourceRegistry::new(store.clone());
        let resource = registry.create("bed", "ward-3/12").await.unwrap();
        (LeaseManager::new(Arc::new(store.clone())), store, resource.id)
    }

    #[tokio::test]
    async fn test_acquire_creates_held_lease() {
        let (mgr, _, rid) = setup().await;
        let now = Utc::now();
        let lease = mgr.acquire_at(rid, "a", 60, now).await.unwrap();
        assert_eq!(lease.resource_id, rid);
        assert_eq!(lease.owner_id, "a");
        assert_eq!(lease.status, LeaseStatus::Held);
        assert_eq!(lease.ttl_seconds, 60);
        assert_eq!(lease.created_at, now);
        assert_eq!(lease.last_heartbeat, now);
        assert_eq!(mgr.inspect(rid).await.unwrap(), lease);
    }

    #[tokio::test]
    async fn test_acquire_unknown_resource() {
        let (mgr, _, _) = setup().await;
        let missing = Uuid::new_v4();
        let err = mgr.acquire(missing, "a", 60).await.unwrap_err();
        assert!(matches!(err, LeaseError::ResourceNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn test_acquire_validates_input() {
        let (mgr, _, rid) = setup().await;
        assert!(matches!(
            mgr.acquire(rid, "", 60).await,
            Err(LeaseError::InvalidRequest(_))
        ));
        assert!(matches!(
            mgr.acquire(rid, "a", 0).await,
            Err(LeaseError::InvalidRequest(_))
        ));
        assert!(mgr.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reacquire_by_holder_refreshes_in_place() {
        let (mgr, _, rid) = setup().await;
        let t0 = Utc::now();
        let first = mgr.acquire_at(rid, "a", 60, t0).await.unwrap();
        let t1 = t0 + Duration::seconds(30);
        let second = mgr.acquire_at(rid, "a", 120, t1).await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, t0);
        assert_eq!(second.last_heartbeat, t1);
        assert_eq!(second.ttl_seconds, 120);
        assert_eq!(mgr.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_conflict_leaves_lease_untouched() {
        let (mgr, _, rid) = setup().await;
        let now = Utc::now();
        let held = mgr.acquire_at(rid, "a", 60, now).await.unwrap();
        let err = mgr
            .acquire_at(rid, "b", 60, now + Duration::seconds(10))
            .await
            .unwrap_err();
        assert!(matches!(err, LeaseError::LockConflict { ref holder, .. } if holder == "a"));
        assert_eq!(mgr.inspect(rid).await.unwrap(), held);
    }

    #[tokio::test]
    async fn test_release_then_other_owner_reuses_row() {
        let (mgr, _, rid) = setup().await;
        let a = mgr.acquire(rid, "a", 60).await.unwrap();
        assert!(matches!(
            mgr.acquire(rid, "b", 60).await,
            Err(LeaseError::LockConflict { .. })
        ));

        let released = mgr.release(rid, "a").await.unwrap();
        assert_eq!(released.status, LeaseStatus::Released);
        assert_eq!(released.last_heartbeat, a.last_heartbeat);

        let b = mgr.acquire(rid, "b", 60).await.unwrap();
        assert_eq!(b.owner_id, "b");
        assert_eq!(b.status, LeaseStatus::Held);
        assert_eq!(b.id, a.id, "row is reused, not appended");
        assert_eq!(mgr.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_lease_taken_over_by_acquire() {
        let (mgr, _, rid) = setup().await;
        let t0 = Utc::now();
        let a = mgr.acquire_at(rid, "a", 5, t0).await.unwrap();
        let t1 = t0 + Duration::seconds(6);
        let b = mgr.acquire_at(rid, "b", 10, t1).await.unwrap();
        assert_eq!(b.id, a.id);
        assert_eq!(b.owner_id, "b");
        assert_eq!(b.created_at, t1);
        assert_eq!(b.ttl_seconds, 10);
    }

    #[tokio::test]
    async fn test_release_by_non_owner_is_rejected() {
        let (mgr, _, rid) = setup().await;
        let held = mgr.acquire(rid, "a", 60).await.unwrap();
        let err = mgr.release(rid, "b").await.unwrap_err();
        assert!(matches!(err, LeaseError::OwnerMismatch { .. }));
        assert_eq!(mgr.inspect(rid).await.unwrap(), held);
    }

    #[tokio::test]
    async fn test_release_checks_stored_owner_even_when_stale() {
        let (mgr, _, rid) = setup().await;
        let t0 = Utc::now() - Duration::seconds(600);
        mgr.acquire_at(rid, "a", 5, t0).await.unwrap();
        assert!(matches!(
            mgr.release(rid, "b").await,
            Err(LeaseError::OwnerMismatch { .. })
        ));
        assert_eq!(
            mgr.release(rid, "a").await.unwrap().status,
            LeaseStatus::Released
        );
    }

    #[tokio::test]
    async fn test_release_from_expired_and_released_rows() {
        let (mgr, store, rid) = setup().await;
        let t0 = Utc::now();
        mgr.acquire_at(rid, "a", 5, t0).await.unwrap();
        assert_eq!(store.expire_stale(t0 + Duration::seconds(6)).await.unwrap(), 1);
        assert_eq!(mgr.inspect(rid).await.unwrap().status, LeaseStatus::Expired);

        // Owner is still checked on an EXPIRED row.
        assert!(matches!(
            mgr.release(rid, "b").await,
            Err(LeaseError::OwnerMismatch { .. })
        ));
        assert_eq!(mgr.inspect(rid).await.unwrap().status, LeaseStatus::Expired);

        let released = mgr.release(rid, "a").await.unwrap();
        assert_eq!(released.status, LeaseStatus::Released);
        assert_eq!(released.owner_id, "a");
        assert_eq!(released.created_at, t0);

        // Releasing again leaves the row RELEASED.
        assert_eq!(
            mgr.release(rid, "a").await.unwrap().status,
            LeaseStatus::Released
        );
        assert!(matches!(
            mgr.release(rid, "b").await,
            Err(LeaseError::OwnerMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_release_without_lease() {
        let (mgr, _, rid) = setup().await;
        assert!(matches!(
            mgr.release(rid, "a").await,
            Err(LeaseError::LockNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_heartbeat_refreshes_timestamp() {
        let (mgr, _, rid) = setup().await;
        let t0 = Utc::now();
        mgr.acquire_at(rid, "a", 60, t0).await.unwrap();
        let t1 = t0 + Duration::seconds(20);
        let lease = mgr.heartbeat_at(rid, "a", t1).await.unwrap();
        assert_eq!(lease.last_heartbeat, t1);
        assert_eq!(lease.created_at, t0);
    }

    #[tokio::test]
    async fn test_heartbeat_revives_unswept_stale_lease() {
        let (mgr, _, rid) = setup().await;
        let t0 = Utc::now();
        mgr.acquire_at(rid, "a", 5, t0).await.unwrap();
        let t1 = t0 + Duration::seconds(30);
        let lease = mgr.heartbeat_at(rid, "a", t1).await.unwrap();
        assert!(lease.is_effectively_held(t1));
    }

    #[tokio::test]
    async fn test_heartbeat_scoping() {
        let (mgr, store, rid) = setup().await;
        let t0 = Utc::now();
        assert!(matches!(
            mgr.heartbeat(rid, "a").await,
            Err(LeaseError::LockNotFound(_))
        ));

        mgr.acquire_at(rid, "a", 5, t0).await.unwrap();
        assert!(matches!(
            mgr.heartbeat(rid, "b").await,
            Err(LeaseError::LockNotFound(_))
        ));

        // Expired by the sweep: heartbeat must not resurrect it.
        store.expire_stale(t0 + Duration::seconds(6)).await.unwrap();
        assert!(matches!(
            mgr.heartbeat(rid, "a").await,
            Err(LeaseError::LockNotFound(_))
        ));
        assert_eq!(mgr.inspect(rid).await.unwrap().status, LeaseStatus::Expired);

        // Released: same answer.
        mgr.acquire(rid, "a", 60).await.unwrap();
        mgr.release(rid, "a").await.unwrap();
        assert!(matches!(
            mgr.heartbeat(rid, "a").await,
            Err(LeaseError::LockNotFound(_))
        ));
        assert_eq!(mgr.inspect(rid).await.unwrap().status, LeaseStatus::Released);
    }

    #[tokio::test]
    async fn test_sweep_then_acquire_scenario() {
        let (mgr, store, rid) = setup().await;
        let t0 = Utc::now();
        mgr.acquire_at(rid, "a", 5, t0).await.unwrap();

        let t1 = t0 + Duration::seconds(6);
        assert_eq!(store.expire_stale(t1).await.unwrap(), 1);
        assert_eq!(mgr.inspect(rid).await.unwrap().status, LeaseStatus::Expired);

        let b = mgr.acquire_at(rid, "b", 10, t1).await.unwrap();
        assert_eq!(b.owner_id, "b");
        assert_eq!(b.status, LeaseStatus::Held);
        assert_eq!(mgr.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_all_newest_first() {
        let store = StateStore::in_memory().await.unwrap();
        let registry = ResourceRegistry::new(store.clone());
        let mgr = LeaseManager::new(Arc::new(store));
        let t0 = Utc::now();

        let mut ids = Vec::new();
        for i in 0..3 {
            let res = registry.create("room", &format!("r-{}", i)).await.unwrap();
            mgr.acquire_at(res.id, "a", 60, t0 + Duration::seconds(i))
                .await
                .unwrap();
            ids.push(res.id);
        }

        let listed: Vec<Uuid> = mgr
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.resource_id)
            .collect();
        ids.reverse();
        assert_eq!(listed, ids);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_exactly_one_winner_under_contention() {
        let (mgr, _, rid) = setup().await;
        let attempts = (0..50).map(|i| {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.acquire(rid, &format!("owner-{}", i), 60).await })
        });
        let results = futures_util::future::join_all(attempts).await;

        let mut winners = Vec::new();
        let mut conflicts = 0;
        for result in results {
            match result.unwrap() {
                Ok(lease) => winners.push(lease),
                Err(LeaseError::LockConflict { .. }) => conflicts += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(winners.len(), 1, "exactly one acquire must win");
        assert_eq!(conflicts, 49);
        assert_eq!(mgr.inspect(rid).await.unwrap(), winners[0]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stale_reclaim_races_with_sweep() {
        let (mgr, store, rid) = setup().await;
        let t0 = Utc::now() - Duration::seconds(60);
        mgr.acquire_at(rid, "a", 5, t0).await.unwrap();

        let sweeper = {
            let store = store.clone();
            tokio::spawn(async move { store.expire_stale(Utc::now()).await })
        };
        let acquirer = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.acquire(rid, "b", 60).await })
        };
        sweeper.await.unwrap().unwrap();
        // Whichever ran first, the acquire finds a row it may take over.
        let lease = acquirer.await.unwrap().unwrap();
        assert_eq!(lease.owner_id, "b");

        let rows = mgr.list_all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, LeaseStatus::Held);
        assert_eq!(rows[0].owner_id, "b");
    }

    struct UnavailableStore;

    #[async_trait]
    impl LeaseStore for UnavailableStore {
        async fn resource_exists(&self, _: Uuid) -> anyhow::Result<bool> {
            anyhow::bail!("connection refused")
        }
        async fn lock_lease(&self, _: Uuid) -> anyhow::Result<LeaseRow> {
            anyhow::bail!("connection refused")
        }
        async fn commit_lease(&self, _: LeaseRow, _: &Lease) -> anyhow::Result<()> {
            anyhow::bail!("connection refused")
        }
        async fn get_lease(&self, _: Uuid) -> anyhow::Result<Option<Lease>> {
            anyhow::bail!("connection refused")
        }
        async fn list_leases(&self) -> anyhow::Result<Vec<Lease>> {
            anyhow::bail!("connection refused")
        }
        async fn expire_stale(&self, _: DateTime<Utc>) -> anyhow::Result<u64> {
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_as_transient() {
        let mgr = LeaseManager::new(Arc::new(UnavailableStore));
        let rid = Uuid::new_v4();
        for err in [
            mgr.acquire(rid, "a", 60).await.unwrap_err(),
            mgr.release(rid, "a").await.unwrap_err(),
            mgr.heartbeat(rid, "a").await.unwrap_err(),
            mgr.inspect(rid).await.unwrap_err(),
        ] {
            assert!(err.is_transient(), "{} should be transient", err);
        }
    }
}
