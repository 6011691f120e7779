use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::request::{Place, RideRequest, RideStatus};
use crate::models::response::{OfferRecord, OfferReply};
use crate::models::rider::VehicleType;
use crate::state::AppState;

/// Everything a passenger supplies when asking for a ride.
#[derive(Debug, Clone)]
pub struct NewRideRequest {
    pub passenger_id: Uuid,
    pub pickup: Place,
    pub dropoff: Place,
    pub vehicle: VehicleType,
    pub fare_estimate: f64,
    pub distance_km: f64,
}

pub fn create_request(state: &AppState, new: NewRideRequest) -> Result<RideRequest, AppError> {
    if !new.pickup.point.is_valid() {
        return Err(AppError::Validation(format!(
            "pickup coordinates out of range: ({}, {})",
            new.pickup.point.lat, new.pickup.point.lng
        )));
    }
    if !new.dropoff.point.is_valid() {
        return Err(AppError::Validation(format!(
            "dropoff coordinates out of range: ({}, {})",
            new.dropoff.point.lat, new.dropoff.point.lng
        )));
    }
    if !new.fare_estimate.is_finite() || new.fare_estimate < 0.0 {
        return Err(AppError::Validation(format!(
            "fare estimate must be non-negative, got {}",
            new.fare_estimate
        )));
    }
    if !new.distance_km.is_finite() || new.distance_km < 0.0 {
        return Err(AppError::Validation(format!(
            "trip distance must be non-negative, got {}",
            new.distance_km
        )));
    }

    let request = RideRequest {
        id: Uuid::new_v4(),
        passenger_id: new.passenger_id,
        rider_id: None,
        pickup: new.pickup,
        dropoff: new.dropoff,
        vehicle: new.vehicle,
        status: RideStatus::Pending,
        fare_estimate: new.fare_estimate,
        distance_km: new.distance_km,
        requested_at: Utc::now(),
        accepted_at: None,
        completed_at: None,
    };

    state.requests.insert(request.id, request.clone());
    state
        .metrics
        .requests_total
        .with_label_values(&["created"])
        .inc();
    state.publish_update(&request);

    info!(
        request_id = %request.id,
        passenger_id = %request.passenger_id,
        "ride request created"
    );

    Ok(request)
}

/// First accept wins. The assigned-rider check and the assignment itself
/// happen while holding the request's map entry guard, so a concurrent
/// accept from another rider resolves to exactly one winner.
pub fn accept_request(
    state: &AppState,
    request_id: Uuid,
    rider_id: Uuid,
) -> Result<RideRequest, AppError> {
    if !state.riders.contains_key(&rider_id) {
        return Err(AppError::NotFound(format!("rider {} not found", rider_id)));
    }

    let already_replied = state
        .offers
        .get(&(request_id, rider_id))
        .is_some_and(|offer| offer.reply.suppresses());
    if already_replied {
        state
            .metrics
            .accept_attempts_total
            .with_label_values(&["rejected"])
            .inc();
        return Err(AppError::InvalidTransition(format!(
            "rider {} already declined or timed out on request {}",
            rider_id, request_id
        )));
    }

    let accepted = {
        let mut request = state
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| AppError::NotFound(format!("request {} not found", request_id)))?;

        if request.status != RideStatus::Pending {
            return Err(if request.rider_id.is_some() {
                state
                    .metrics
                    .accept_attempts_total
                    .with_label_values(&["conflict"])
                    .inc();
                AppError::AlreadyAssigned(format!(
                    "request {} is already assigned to another rider",
                    request_id
                ))
            } else {
                state
                    .metrics
                    .accept_attempts_total
                    .with_label_values(&["rejected"])
                    .inc();
                AppError::InvalidTransition(format!(
                    "cannot accept a request in state {:?}",
                    request.status
                ))
            });
        }

        request.status = RideStatus::Accepted;
        request.rider_id = Some(rider_id);
        request.accepted_at = Some(Utc::now());
        request.clone()
    };

    let now = Utc::now();
    state
        .offers
        .entry((request_id, rider_id))
        .and_modify(|offer| {
            offer.reply = OfferReply::Accepted;
            offer.replied_at = Some(now);
        })
        .or_insert_with(|| OfferRecord {
            request_id,
            rider_id,
            reply: OfferReply::Accepted,
            shown_at: now,
            replied_at: Some(now),
        });

    if let Some(mut rider) = state.riders.get_mut(&rider_id) {
        rider.is_available = false;
        rider.updated_at = now;
    }

    state
        .metrics
        .accept_attempts_total
        .with_label_values(&["won"])
        .inc();
    state.publish_update(&accepted);

    info!(request_id = %request_id, rider_id = %rider_id, "ride request accepted");

    Ok(accepted)
}

/// A decline, or the client-reported expiry of the 30 second offer
/// countdown when `timed_out` is set. Terminal for the (request, rider)
/// pair; the request itself stays pending for everyone else.
pub fn decline_request(
    state: &AppState,
    request_id: Uuid,
    rider_id: Uuid,
    timed_out: bool,
) -> Result<(), AppError> {
    if !state.requests.contains_key(&request_id) {
        return Err(AppError::NotFound(format!(
            "request {} not found",
            request_id
        )));
    }
    if !state.riders.contains_key(&rider_id) {
        return Err(AppError::NotFound(format!("rider {} not found", rider_id)));
    }

    let reply = if timed_out {
        OfferReply::Timeout
    } else {
        OfferReply::Declined
    };

    let mut offer = state
        .offers
        .entry((request_id, rider_id))
        .or_insert_with(|| OfferRecord::shown(request_id, rider_id));

    if offer.reply == OfferReply::Accepted {
        return Err(AppError::InvalidTransition(format!(
            "rider {} already accepted request {}",
            rider_id, request_id
        )));
    }

    // Repeating a decline (or following a timeout with an explicit
    // decline) keeps the first recorded reply.
    if offer.reply == OfferReply::Shown {
        offer.reply = reply;
        offer.replied_at = Some(Utc::now());
    }

    info!(request_id = %request_id, rider_id = %rider_id, reply = ?offer.reply, "offer closed for rider");

    Ok(())
}

/// Passenger cancel, allowed only while the request is still unassigned.
pub fn cancel_request(state: &AppState, request_id: Uuid) -> Result<RideRequest, AppError> {
    let cancelled = {
        let mut request = state
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| AppError::NotFound(format!("request {} not found", request_id)))?;

        if request.status != RideStatus::Pending {
            return Err(AppError::InvalidTransition(format!(
                "cannot cancel a request in state {:?}",
                request.status
            )));
        }

        request.status = RideStatus::Cancelled;
        request.clone()
    };

    state
        .metrics
        .requests_total
        .with_label_values(&["cancelled"])
        .inc();
    state.publish_update(&cancelled);

    info!(request_id = %request_id, "ride request cancelled by passenger");

    Ok(cancelled)
}

pub fn mark_arrived(state: &AppState, request_id: Uuid) -> Result<RideRequest, AppError> {
    advance(state, request_id, RideStatus::Accepted, RideStatus::Arrived)
}

pub fn start_trip(state: &AppState, request_id: Uuid) -> Result<RideRequest, AppError> {
    advance(state, request_id, RideStatus::Arrived, RideStatus::PickedUp)
}

/// Only the assigned rider can complete the trip; doing so frees the
/// rider for matching again, provided they are still online.
pub fn complete_request(
    state: &AppState,
    request_id: Uuid,
    rider_id: Uuid,
) -> Result<RideRequest, AppError> {
    let completed = {
        let mut request = state
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| AppError::NotFound(format!("request {} not found", request_id)))?;

        if request.rider_id != Some(rider_id) {
            return Err(AppError::AlreadyAssigned(format!(
                "request {} is not assigned to rider {}",
                request_id, rider_id
            )));
        }
        if request.status != RideStatus::PickedUp {
            return Err(AppError::InvalidTransition(format!(
                "cannot complete a request in state {:?}",
                request.status
            )));
        }

        request.status = RideStatus::Completed;
        request.completed_at = Some(Utc::now());
        request.clone()
    };

    match state.riders.get_mut(&rider_id) {
        Some(mut rider) => {
            if rider.is_online {
                rider.is_available = true;
            }
            rider.updated_at = Utc::now();
        }
        None => warn!(rider_id = %rider_id, "completing rider no longer registered"),
    }

    state
        .metrics
        .requests_total
        .with_label_values(&["completed"])
        .inc();
    state.publish_update(&completed);

    info!(request_id = %request_id, rider_id = %rider_id, "trip completed");

    Ok(completed)
}

/// A transition is legal only from its exact predecessor state; anything
/// else, including repeating the transition, is rejected unchanged.
fn advance(
    state: &AppState,
    request_id: Uuid,
    from: RideStatus,
    to: RideStatus,
) -> Result<RideRequest, AppError> {
    let updated = {
        let mut request = state
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| AppError::NotFound(format!("request {} not found", request_id)))?;

        if request.status != from {
            return Err(AppError::InvalidTransition(format!(
                "cannot move request from {:?} to {:?}",
                request.status, to
            )));
        }

        request.status = to;
        request.clone()
    };

    state.publish_update(&updated);

    info!(request_id = %request_id, status = ?updated.status, "ride request advanced");

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{
        accept_request, cancel_request, complete_request, create_request, decline_request,
        mark_arrived, start_trip, NewRideRequest,
    };
    use crate::error::AppError;
    use crate::models::request::{Place, RideStatus};
    use crate::models::rider::{GeoPoint, Rider, VehicleType};
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

    fn add_rider(state: &AppState) -> Uuid {
        let rider = Rider {
            id: Uuid::new_v4(),
            name: "test-rider".to_string(),
            vehicle: VehicleType::Car,
            location: GeoPoint {
                lat: 6.9271,
                lng: 79.8612,
            },
            is_online: true,
            is_available: true,
            updated_at: Utc::now(),
        };
        let id = rider.id;
        state.riders.insert(id, rider);
        id
    }

    fn place(lat: f64, lng: f64) -> Place {
        Place {
            point: GeoPoint { lat, lng },
            address: "somewhere".to_string(),
        }
    }

    fn new_request() -> NewRideRequest {
        NewRideRequest {
            passenger_id: Uuid::new_v4(),
            pickup: place(6.9271, 79.8612),
            dropoff: place(6.7951, 79.9009),
            vehicle: VehicleType::Car,
            fare_estimate: 1250.0,
            distance_km: 18.5,
        }
    }

    fn add_request(state: &AppState) -> Uuid {
        create_request(state, new_request()).expect("valid request").id
    }

    #[test]
    fn create_rejects_out_of_range_coordinates() {
        let state = state();
        let mut bad = new_request();
        bad.pickup.point.lat = 200.0;

        let result = create_request(&state, bad);
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(state.requests.is_empty());
    }

    #[test]
    fn create_rejects_negative_fare() {
        let state = state();
        let mut bad = new_request();
        bad.fare_estimate = -10.0;

        assert!(matches!(
            create_request(&state, bad),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn accept_assigns_rider_and_marks_them_busy() {
        let state = state();
        let rider = add_rider(&state);
        let request = add_request(&state);

        let accepted = accept_request(&state, request, rider).unwrap();
        assert_eq!(accepted.status, RideStatus::Accepted);
        assert_eq!(accepted.rider_id, Some(rider));
        assert!(accepted.accepted_at.is_some());

        let stored = state.riders.get(&rider).unwrap();
        assert!(!stored.is_available);
    }

    #[test]
    fn second_accept_is_already_assigned() {
        let state = state();
        let first = add_rider(&state);
        let second = add_rider(&state);
        let request = add_request(&state);

        accept_request(&state, request, first).unwrap();
        let result = accept_request(&state, request, second);

        assert!(matches!(result, Err(AppError::AlreadyAssigned(_))));
        assert_eq!(
            state.requests.get(&request).unwrap().rider_id,
            Some(first)
        );
    }

    #[test]
    fn concurrent_accepts_have_exactly_one_winner() {
        let state = state();
        let riders: Vec<Uuid> = (0..8).map(|_| add_rider(&state)).collect();
        let request = add_request(&state);

        let outcomes: Vec<bool> = std::thread::scope(|scope| {
            let handles: Vec<_> = riders
                .iter()
                .map(|rider| {
                    let state = &state;
                    let rider = *rider;
                    scope.spawn(move || accept_request(state, request, rider).is_ok())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(outcomes.iter().filter(|won| **won).count(), 1);

        let stored = state.requests.get(&request).unwrap();
        assert_eq!(stored.status, RideStatus::Accepted);
        assert!(stored.rider_id.is_some());
    }

    #[test]
    fn declined_rider_cannot_accept() {
        let state = state();
        let rider = add_rider(&state);
        let request = add_request(&state);

        decline_request(&state, request, rider, false).unwrap();
        let result = accept_request(&state, request, rider);

        assert!(matches!(result, Err(AppError::InvalidTransition(_))));
        assert_eq!(state.requests.get(&request).unwrap().status, RideStatus::Pending);
    }

    #[test]
    fn decline_is_idempotent_and_keeps_first_reply() {
        let state = state();
        let rider = add_rider(&state);
        let request = add_request(&state);

        decline_request(&state, request, rider, true).unwrap();
        decline_request(&state, request, rider, false).unwrap();

        let offer = state.offers.get(&(request, rider)).unwrap();
        assert_eq!(offer.reply, crate::models::response::OfferReply::Timeout);
    }

    #[test]
    fn cancel_is_pending_only() {
        let state = state();
        let rider = add_rider(&state);
        let request = add_request(&state);

        accept_request(&state, request, rider).unwrap();
        let result = cancel_request(&state, request);

        assert!(matches!(result, Err(AppError::InvalidTransition(_))));
        assert_eq!(
            state.requests.get(&request).unwrap().status,
            RideStatus::Accepted
        );
    }

    #[test]
    fn start_without_arrival_is_rejected() {
        let state = state();
        let rider = add_rider(&state);
        let request = add_request(&state);

        accept_request(&state, request, rider).unwrap();
        let result = start_trip(&state, request);

        assert!(matches!(result, Err(AppError::InvalidTransition(_))));
        assert_eq!(
            state.requests.get(&request).unwrap().status,
            RideStatus::Accepted
        );
    }

    #[test]
    fn double_arrival_is_rejected() {
        let state = state();
        let rider = add_rider(&state);
        let request = add_request(&state);

        accept_request(&state, request, rider).unwrap();
        mark_arrived(&state, request).unwrap();
        let result = mark_arrived(&state, request);

        assert!(matches!(result, Err(AppError::InvalidTransition(_))));
        assert_eq!(
            state.requests.get(&request).unwrap().status,
            RideStatus::Arrived
        );
    }

    #[test]
    fn complete_frees_the_rider() {
        let state = state();
        let rider = add_rider(&state);
        let request = add_request(&state);

        accept_request(&state, request, rider).unwrap();
        mark_arrived(&state, request).unwrap();
        start_trip(&state, request).unwrap();
        let completed = complete_request(&state, request, rider).unwrap();

        assert_eq!(completed.status, RideStatus::Completed);
        assert!(completed.completed_at.is_some());
        assert!(state.riders.get(&rider).unwrap().is_available);
    }

    #[test]
    fn only_the_assigned_rider_can_complete() {
        let state = state();
        let rider = add_rider(&state);
        let intruder = add_rider(&state);
        let request = add_request(&state);

        accept_request(&state, request, rider).unwrap();
        mark_arrived(&state, request).unwrap();
        start_trip(&state, request).unwrap();

        let result = complete_request(&state, request, intruder);
        assert!(matches!(result, Err(AppError::AlreadyAssigned(_))));
        assert_eq!(
            state.requests.get(&request).unwrap().status,
            RideStatus::PickedUp
        );
    }
}
