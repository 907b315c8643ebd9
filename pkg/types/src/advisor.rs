use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestRequest {
    pub resource_id: Uuid,
    /// TTL to fall back to when the resource has no lease history
    #[serde(default)]
    pub historical_ttl: Option<u64>,
}

/// Advisory TTL recommendation derived from past lease durations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TtlSuggestion {
    pub suggested_ttl: u64,
    /// 0.0 for a steady usage pattern, up to 1.0 for a highly irregular one
    pub anomaly_score: f64,
    /// Number of past leases the suggestion is based on
    #[serde(default)]
    pub samples: usize,
}
