use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration};
use tracing::info;
use uuid::Uuid;

use crate::models::request::RideStatus;
use crate::models::response::OfferReply;
use crate::state::AppState;

/// Expires offers whose rider never answered. Clients report their own
/// 30 second countdown as an explicit timeout decline; this task only
/// covers clients that disappeared mid-offer, so the request can reach
/// other riders again.
pub async fn run_offer_sweep(state: Arc<AppState>, period: Duration) {
    info!(period_secs = period.as_secs(), "offer sweep started");

    let mut tick = interval(period);
    loop {
        tick.tick().await;

        let expired = sweep_once(&state);
        if expired > 0 {
            info!(expired, "expired unanswered offers");
        }
    }
}

/// One pass over the ledger; returns how many offers were expired.
pub fn sweep_once(state: &AppState) -> usize {
    let deadline = Utc::now() - chrono::Duration::seconds(state.limits.offer_timeout_secs as i64);

    // Collect first, then re-check each entry under its own guard, so no
    // shard lock is held while touching the request map.
    let overdue: Vec<(Uuid, Uuid)> = state
        .offers
        .iter()
        .filter(|entry| entry.reply == OfferReply::Shown && entry.shown_at < deadline)
        .map(|entry| *entry.key())
        .collect();

    let mut expired = 0;
    for key in overdue {
        let still_pending = state
            .requests
            .get(&key.0)
            .map(|request| request.status == RideStatus::Pending)
            .unwrap_or(false);
        if !still_pending {
            continue;
        }

        if let Some(mut offer) = state.offers.get_mut(&key) {
            if offer.reply == OfferReply::Shown {
                offer.reply = OfferReply::Timeout;
                offer.replied_at = Some(Utc::now());
                expired += 1;
            }
        }
    }

    if expired > 0 {
        state.metrics.offers_expired_total.inc_by(expired as u64);
    }

    expired
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::sweep_once;
    use crate::models::request::{Place, RideRequest, RideStatus};
    use crate::models::response::{OfferRecord, OfferReply};
    use crate::models::rider::{GeoPoint, VehicleType};
    use crate::state::{AppState, MatchingLimits};

    fn state() -> AppState {
        AppState::new(
            MatchingLimits {
                default_radius_km: 5.0,
                max_radius_km: 25.0,
                offer_timeout_secs: 30,
            },
            16,
        )
    }

    fn add_request(state: &AppState, status: RideStatus) -> Uuid {
        let place = Place {
            point: GeoPoint {
                lat: 6.9271,
                lng: 79.8612,
            },
            address: "somewhere".to_string(),
        };
        let request = RideRequest {
            id: Uuid::new_v4(),
            passenger_id: Uuid::new_v4(),
            rider_id: None,
            pickup: place.clone(),
            dropoff: place,
            vehicle: VehicleType::Car,
            status,
            fare_estimate: 500.0,
            distance_km: 3.0,
            requested_at: Utc::now(),
            accepted_at: None,
            completed_at: None,
        };
        let id = request.id;
        state.requests.insert(id, request);
        id
    }

    fn add_offer(state: &AppState, request_id: Uuid, age_secs: i64) -> (Uuid, Uuid) {
        let rider_id = Uuid::new_v4();
        let mut offer = OfferRecord::shown(request_id, rider_id);
        offer.shown_at = Utc::now() - Duration::seconds(age_secs);
        state.offers.insert((request_id, rider_id), offer);
        (request_id, rider_id)
    }

    #[test]
    fn expires_only_overdue_offers_of_pending_requests() {
        let state = state();
        let pending = add_request(&state, RideStatus::Pending);
        let cancelled = add_request(&state, RideStatus::Cancelled);

        let overdue = add_offer(&state, pending, 60);
        let fresh = add_offer(&state, pending, 5);
        let stale_but_closed = add_offer(&state, cancelled, 60);

        assert_eq!(sweep_once(&state), 1);

        assert_eq!(
            state.offers.get(&overdue).unwrap().reply,
            OfferReply::Timeout
        );
        assert_eq!(state.offers.get(&fresh).unwrap().reply, OfferReply::Shown);
        assert_eq!(
            state.offers.get(&stale_but_closed).unwrap().reply,
            OfferReply::Shown
        );
    }

    #[test]
    fn expired_offer_keeps_request_pending_for_others() {
        let state = state();
        let pending = add_request(&state, RideStatus::Pending);
        add_offer(&state, pending, 60);

        sweep_once(&state);

        assert_eq!(
            state.requests.get(&pending).unwrap().status,
            RideStatus::Pending
        );
    }
}
