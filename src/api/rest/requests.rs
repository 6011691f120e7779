use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::engine::lifecycle::{self, NewRideRequest};
use crate::error::AppError;
use crate::models::request::{Place, RideRequest};
use crate::models::rider::VehicleType;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/requests", post(create_request).get(list_requests))
        .route("/requests/:id", get(get_request))
        .route("/requests/:id/accept", post(accept))
        .route("/requests/:id/decline", post(decline))
        .route("/requests/:id/cancel", post(cancel))
        .route("/requests/:id/arrived", post(arrived))
        .route("/requests/:id/start", post(start))
        .route("/requests/:id/complete", post(complete))
}

#[derive(Deserialize)]
pub struct CreateRequestPayload {
    pub passenger_id: Uuid,
    pub pickup: Place,
    pub dropoff: Place,
    pub vehicle: VehicleType,
    pub fare_estimate: f64,
    pub distance_km: f64,
}

#[derive(Deserialize)]
pub struct RiderAction {
    pub rider_id: Uuid,
}

#[derive(Deserialize)]
pub struct DeclinePayload {
    pub rider_id: Uuid,
    /// Set when the client's offer countdown elapsed without a tap.
    #[serde(default)]
    pub timed_out: bool,
}

async fn create_request(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateRequestPayload>,
) -> Result<Json<RideRequest>, AppError> {
    let request = lifecycle::create_request(
        &state,
        NewRideRequest {
            passenger_id: payload.passenger_id,
            pickup: payload.pickup,
            dropoff: payload.dropoff,
            vehicle: payload.vehicle,
            fare_estimate: payload.fare_estimate,
            distance_km: payload.distance_km,
        },
    )?;

    Ok(Json(request))
}

async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RideRequest>, AppError> {
    let request = state
        .requests
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("request {} not found", id)))?;

    Ok(Json(request.value().clone()))
}

async fn list_requests(State(state): State<Arc<AppState>>) -> Json<Vec<RideRequest>> {
    let requests = state
        .requests
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(requests)
}

async fn accept(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RiderAction>,
) -> Result<Json<RideRequest>, AppError> {
    let request = lifecycle::accept_request(&state, id, payload.rider_id)?;
    Ok(Json(request))
}

async fn decline(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DeclinePayload>,
) -> Result<Json<Value>, AppError> {
    lifecycle::decline_request(&state, id, payload.rider_id, payload.timed_out)?;
    Ok(Json(json!({ "status": "ok" })))
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RideRequest>, AppError> {
    let request = lifecycle::cancel_request(&state, id)?;
    Ok(Json(request))
}

async fn arrived(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RideRequest>, AppError> {
    let request = lifecycle::mark_arrived(&state, id)?;
    Ok(Json(request))
}

async fn start(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RideRequest>, AppError> {
    let request = lifecycle::start_trip(&state, id)?;
    Ok(Json(request))
}

async fn complete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RiderAction>,
) -> Result<Json<RideRequest>, AppError> {
    let request = lifecycle::complete_request(&state, id, payload.rider_id)?;
    Ok(Json(request))
}
