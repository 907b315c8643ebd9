//! Network-related constants.

/// Default port for the leasehold API server.
pub const DEFAULT_API_PORT: u16 = 8000;

/// Default API server address (HTTP).
pub const DEFAULT_API_ADDR: &str = "http://127.0.0.1:8000";

/// Response header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";
