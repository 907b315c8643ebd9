//! State store key layout.

/// Prefix under which resource records are stored, keyed by resource UUID.
pub const RESOURCES_PREFIX: &str = "/registry/resources/";

/// Prefix of the `(type, identifier)` uniqueness index.
/// Full key = `RESOURCE_INDEX_PREFIX + type + "/" + identifier`.
pub const RESOURCE_INDEX_PREFIX: &str = "/registry/resource-index/";

/// Prefix under which lease rows are stored, keyed by resource UUID.
pub const LEASES_PREFIX: &str = "/registry/leases/";
