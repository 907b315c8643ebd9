//! TTL advisor constants.

/// How many past leases the advisor looks at.
pub const HISTORY_LIMIT: usize = 10;

/// Suggested TTL = average held duration times this factor.
pub const TTL_HEADROOM_FACTOR: f64 = 1.2;

/// Lower clamp for a suggested TTL.
pub const MIN_SUGGESTED_TTL_SECS: u64 = 60;

/// Upper clamp for a suggested TTL.
pub const MAX_SUGGESTED_TTL_SECS: u64 = 3600;

/// Suggestion returned when there is no history and the caller gave no hint.
pub const FALLBACK_TTL_SECS: u64 = 300;
