pub mod advisor;
pub mod config;
pub mod lease;
pub mod resource;
pub mod validate;
