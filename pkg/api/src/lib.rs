pub mod error;
pub mod extract;
pub mod handlers;
pub mod request_id;
pub mod server;

use std::sync::Arc;

use pkg_lease::{LeaseAdvisor, LeaseManager, ResourceRegistry};
use pkg_metrics::LeaseMetrics;
use pkg_state::{LeaseStore, StateStore};

/// Shared application state injected into all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub leases: LeaseManager,
    pub registry: ResourceRegistry,
    pub advisor: LeaseAdvisor,
    pub metrics: Arc<LeaseMetrics>,
}

impl AppState {
    /// Wire every component to the one shared store handle.
    pub fn new(store: StateStore, metrics: Arc<LeaseMetrics>) -> Self {
        let lease_store: Arc<dyn LeaseStore> = Arc::new(store.clone());
        Self {
            leases: LeaseManager::new(lease_store.clone()),
            registry: ResourceRegistry::new(store),
            advisor: LeaseAdvisor::new(lease_store),
            metrics,
        }
    }
}
