use anyhow::{Result, bail};
use pkg_constants::lease::{MAX_NAME_LEN, MAX_TTL_SECS};

/// Validate an opaque caller-supplied name (owner id, resource type, external identifier).
/// Rules: non-empty, at most 255 bytes, no control characters.
pub fn validate_name(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{} must not be empty", field);
    }
    if value.len() > MAX_NAME_LEN {
        bail!(
            "{} exceeds {} bytes (got {})",
            field,
            MAX_NAME_LEN,
            value.len()
        );
    }
    if value.chars().any(|c| c.is_control()) {
        bail!("{} must not contain control characters", field);
    }
    Ok(())
}

/// Validate a lease TTL in seconds: `1..=MAX_TTL_SECS`.
pub fn validate_ttl(ttl_seconds: u64) -> Result<()> {
    if ttl_seconds == 0 {
        bail!("ttl_seconds must be at least 1");
    }
    if ttl_seconds > MAX_TTL_SECS {
        bail!(
            "ttl_seconds {} exceeds the maximum of {}",
            ttl_seconds,
            MAX_TTL_SECS
        );
    }
    Ok(())
}
