use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::matching::{self, NearbyRider, PollResult};
use crate::error::AppError;
use crate::models::rider::{GeoPoint, Rider, VehicleType};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/riders", post(register_rider).get(list_riders))
        .route("/riders/nearby", get(nearby_riders))
        .route("/riders/:id/status", patch(update_rider_status))
        .route("/riders/:id/location", patch(update_rider_location))
        .route("/riders/:id/requests", get(poll_requests))
}

#[derive(Deserialize)]
pub struct RegisterRiderRequest {
    pub name: String,
    pub vehicle: VehicleType,
    pub location: GeoPoint,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub is_online: bool,
    pub is_available: bool,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

async fn register_rider(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRiderRequest>,
) -> Result<Json<Rider>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }

    if !payload.location.is_valid() {
        return Err(AppError::Validation(format!(
            "coordinates out of range: ({}, {})",
            payload.location.lat, payload.location.lng
        )));
    }

    // New riders come up offline; the client toggles them online once the
    // app is ready to take offers.
    let rider = Rider {
        id: Uuid::new_v4(),
        name: payload.name,
        vehicle: payload.vehicle,
        location: payload.location,
        is_online: false,
        is_available: false,
        updated_at: Utc::now(),
    };

    state.riders.insert(rider.id, rider.clone());
    Ok(Json(rider))
}

async fn list_riders(State(state): State<Arc<AppState>>) -> Json<Vec<Rider>> {
    let riders = state
        .riders
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    Json(riders)
}

async fn update_rider_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Rider>, AppError> {
    let mut rider = state
        .riders
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("rider {} not found", id)))?;

    if rider.is_online != payload.is_online {
        if payload.is_online {
            state.metrics.riders_online.inc();
        } else {
            state.metrics.riders_online.dec();
        }
    }

    rider.is_online = payload.is_online;
    rider.is_available = payload.is_available;
    rider.updated_at = Utc::now();

    Ok(Json(rider.clone()))
}

async fn update_rider_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Rider>, AppError> {
    if !payload.location.is_valid() {
        return Err(AppError::Validation(format!(
            "coordinates out of range: ({}, {})",
            payload.location.lat, payload.location.lng
        )));
    }

    let mut rider = state
        .riders
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("rider {} not found", id)))?;

    rider.location = payload.location;
    rider.updated_at = Utc::now();

    Ok(Json(rider.clone()))
}

#[derive(Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    pub radius_km: Option<f64>,
    pub vehicle: Option<VehicleType>,
}

async fn nearby_riders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<Vec<NearbyRider>>, AppError> {
    let pickup = GeoPoint {
        lat: query.lat,
        lng: query.lng,
    };
    if !pickup.is_valid() {
        return Err(AppError::Validation(format!(
            "coordinates out of range: ({}, {})",
            query.lat, query.lng
        )));
    }

    let radius_km = query.radius_km.unwrap_or(state.limits.default_radius_km);
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(AppError::Validation(format!(
            "radius must be a positive number of km, got {radius_km}"
        )));
    }

    let radius_km = state.limits.clamp_radius(radius_km);
    Ok(Json(matching::nearby_riders(
        &state,
        &pickup,
        radius_km,
        query.vehicle,
    )))
}

#[derive(Deserialize)]
pub struct PollQuery {
    pub radius_km: Option<f64>,
}

async fn poll_requests(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<PollQuery>,
) -> Result<Json<PollResult>, AppError> {
    let radius_km = query.radius_km.unwrap_or(state.limits.default_radius_km);

    let start = Instant::now();
    let result = matching::poll_requests_for_rider(&state, id, radius_km)?;

    let outcome = if result.requests.is_empty() {
        "empty"
    } else {
        "matched"
    };
    state
        .metrics
        .poll_latency_seconds
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());

    Ok(Json(result))
}
