//! Centralized constants for the leasehold project.
//!
//! All project-wide constant values live here.
//! Change a value in one place and it applies everywhere.

pub mod advisor;
pub mod lease;
pub mod network;
pub mod paths;
pub mod state;
