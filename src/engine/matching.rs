use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::haversine_km;
use crate::models::request::{RideRequest, RideStatus};
use crate::models::response::OfferRecord;
use crate::models::rider::{GeoPoint, Rider, VehicleType};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct NearbyRider {
    pub rider: Rider,
    pub distance_km: f64,
}

/// Online, available riders within `radius_km` of `pickup`, nearest first.
pub fn nearby_riders(
    state: &AppState,
    pickup: &GeoPoint,
    radius_km: f64,
    vehicle: Option<VehicleType>,
) -> Vec<NearbyRider> {
    let mut hits: Vec<NearbyRider> = state
        .riders
        .iter()
        .filter_map(|entry| {
            let rider = entry.value();
            if !rider.is_matchable() {
                return None;
            }
            if vehicle.is_some_and(|wanted| rider.vehicle != wanted) {
                return None;
            }

            let distance_km = haversine_km(&rider.location, pickup);
            if distance_km <= radius_km {
                Some(NearbyRider {
                    rider: rider.clone(),
                    distance_km,
                })
            } else {
                None
            }
        })
        .collect();

    hits.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    hits
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenRequest {
    pub request: RideRequest,
    pub pickup_distance_km: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PollResult {
    pub requests: Vec<OpenRequest>,
    /// The radius that actually produced this result set, after escalation.
    pub recommended_radius_km: f64,
}

/// Pending requests a rider should be offered right now: vehicle match,
/// pickup within radius, not previously declined or timed out by this
/// rider. An empty rung doubles the radius until something matches or the
/// configured maximum is reached. Every surfaced request gets a ledger
/// entry at `Shown` if it has none yet.
pub fn poll_requests_for_rider(
    state: &AppState,
    rider_id: Uuid,
    radius_km: f64,
) -> Result<PollResult, AppError> {
    let rider = state
        .riders
        .get(&rider_id)
        .ok_or_else(|| AppError::NotFound(format!("rider {} not found", rider_id)))?
        .clone();

    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(AppError::Validation(format!(
            "radius must be a positive number of km, got {radius_km}"
        )));
    }

    let mut radius = state.limits.clamp_radius(radius_km);

    if !rider.is_matchable() {
        return Ok(PollResult {
            requests: Vec::new(),
            recommended_radius_km: radius,
        });
    }

    let requests = loop {
        let rung = open_requests_within(state, &rider, radius);
        if !rung.is_empty() || radius >= state.limits.max_radius_km {
            break rung;
        }
        radius = state.limits.clamp_radius(radius * 2.0);
    };

    for open in &requests {
        state
            .offers
            .entry((open.request.id, rider_id))
            .or_insert_with(|| OfferRecord::shown(open.request.id, rider_id));
    }

    Ok(PollResult {
        requests,
        recommended_radius_km: radius,
    })
}

fn open_requests_within(state: &AppState, rider: &Rider, radius_km: f64) -> Vec<OpenRequest> {
    let mut open: Vec<OpenRequest> = state
        .requests
        .iter()
        .filter_map(|entry| {
            let request = entry.value();
            if request.status != RideStatus::Pending || request.vehicle != rider.vehicle {
                return None;
            }

            let suppressed = state
                .offers
                .get(&(request.id, rider.id))
                .is_some_and(|offer| offer.reply.suppresses());
            if suppressed {
                return None;
            }

            let pickup_distance_km = haversine_km(&rider.location, &request.pickup.point);
            if pickup_distance_km <= radius_km {
                Some(OpenRequest {
                    request: request.clone(),
                    pickup_distance_km,
                })
            } else {
                None
            }
        })
        .collect();

    open.sort_by(|a, b| a.pickup_distance_km.total_cmp(&b.pickup_distance_km));
    open
}
