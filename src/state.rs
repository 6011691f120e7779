use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::request::RideRequest;
use crate::models::response::OfferRecord;
use crate::models::rider::Rider;
use crate::observability::metrics::Metrics;

/// Limits applied by the matching queries.
#[derive(Debug, Clone, Copy)]
pub struct MatchingLimits {
    pub default_radius_km: f64,
    pub max_radius_km: f64,
    pub offer_timeout_secs: u64,
}

pub struct AppState {
    pub riders: DashMap<Uuid, Rider>,
    pub requests: DashMap<Uuid, RideRequest>,
    /// Response ledger, keyed by (request id, rider id).
    pub offers: DashMap<(Uuid, Uuid), OfferRecord>,
    pub request_events_tx: broadcast::Sender<RideRequest>,
    pub limits: MatchingLimits,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(limits: MatchingLimits, event_buffer_size: usize) -> Self {
        let (request_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            riders: DashMap::new(),
            requests: DashMap::new(),
            offers: DashMap::new(),
            request_events_tx,
            limits,
            metrics: Metrics::new(),
        }
    }

    /// Publish a lifecycle update; nobody listening is fine.
    pub fn publish_update(&self, request: &RideRequest) {
        let _ = self.request_events_tx.send(request.clone());
    }
}

impl MatchingLimits {
    pub fn clamp_radius(&self, radius_km: f64) -> f64 {
        radius_km.min(self.max_radius_km)
    }
}
