pub mod client;
pub mod locks;
pub mod store;

pub use client::StateStore;
pub use store::{LeaseRow, LeaseStore};
