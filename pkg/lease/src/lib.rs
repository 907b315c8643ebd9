//! Lease lifecycle engine: acquisition, heartbeat, release and inspection of
//! exclusive resource leases, plus the resource registry and TTL advisor that
//! sit beside it.

pub mod advisor;
pub mod error;
pub mod manager;
pub mod registry;

pub use advisor::LeaseAdvisor;
pub use error::{LeaseError, LeaseResult};
pub use manager::LeaseManager;
pub use registry::ResourceRegistry;
