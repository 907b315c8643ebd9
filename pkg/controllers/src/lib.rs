//! Background controllers that run beside the API server.

pub mod sweeper;

pub use sweeper::ExpirySweeper;
