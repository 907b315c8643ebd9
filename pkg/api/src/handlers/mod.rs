pub mod advisor;
pub mod health;
pub mod leases;
pub mod resources;
