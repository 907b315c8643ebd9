use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use pkg_constants::advisor::{
    FALLBACK_TTL_SECS, HISTORY_LIMIT, MAX_SUGGESTED_TTL_SECS, MIN_SUGGESTED_TTL_SECS,
    TTL_HEADROOM_FACTOR,
};
use pkg_state::LeaseStore;
use pkg_types::advisor::TtlSuggestion;
use pkg_types::lease::{Lease, LeaseStatus};

use crate::error::{LeaseError, LeaseResult};

/// Recommends a TTL from how long past leases on a resource were actually held.
/// Read-only; lease operations never depend on it.
#[derive(Clone)]
pub struct LeaseAdvisor {
    store: Arc<dyn LeaseStore>,
}

impl LeaseAdvisor {
    pub fn new(store: Arc<dyn LeaseStore>) -> Self {
        Self { store }
    }

    pub async fn suggest(
        &self,
        resource_id: Uuid,
        historical_ttl: Option<u64>,
    ) -> LeaseResult<TtlSuggestion> {
        if !self.store.resource_exists(resource_id).await? {
            return Err(LeaseError::ResourceNotFound(resource_id));
        }

        let mut history: Vec<Lease> = self
            .store
            .list_leases()
            .await?
            .into_iter()
            .filter(|l| {
                l.resource_id == resource_id
                    && matches!(l.status, LeaseStatus::Released | LeaseStatus::Expired)
            })
            .collect();
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        history.truncate(HISTORY_LIMIT);

        let durations: Vec<f64> = history.iter().map(Lease::held_duration_secs).collect();
        let suggestion = suggest_from_durations(&durations, historical_ttl);
        debug!(
            "TTL suggestion for {}: {}s (anomaly={}, samples={})",
            resource_id, suggestion.suggested_ttl, suggestion.anomaly_score, suggestion.samples
        );
        Ok(suggestion)
    }
}

/// Average held duration plus headroom, clamped, with a variance-based anomaly score.
pub fn suggest_from_durations(durations: &[f64], historical_ttl: Option<u64>) -> TtlSuggestion {
    if durations.is_empty() {
        return TtlSuggestion {
            suggested_ttl: historical_ttl.filter(|t| *t > 0).unwrap_or(FALLBACK_TTL_SECS),
            anomaly_score: 0.0,
            samples: 0,
        };
    }

    let n = durations.len() as f64;
    let avg = durations.iter().sum::<f64>() / n;
    let variance = durations.iter().map(|d| (d - avg).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    let raw = (avg * TTL_HEADROOM_FACTOR).max(0.0) as u64;
    let suggested_ttl = raw.clamp(MIN_SUGGESTED_TTL_SECS, MAX_SUGGESTED_TTL_SECS);
    let anomaly = (std_dev / (avg + 1.0)).min(1.0);

    TtlSuggestion {
        suggested_ttl,
        anomaly_score: (anomaly * 1000.0).round() / 1000.0,
        samples: durations.len(),
    }
}
