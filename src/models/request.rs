use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::rider::{GeoPoint, VehicleType};

/// A pickup or dropoff point with its display address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub point: GeoPoint,
    pub address: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RideStatus {
    Pending,
    Accepted,
    Arrived,
    PickedUp,
    Completed,
    Cancelled,
}

impl RideStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideRequest {
    pub id: Uuid,
    pub passenger_id: Uuid,
    pub rider_id: Option<Uuid>,
    pub pickup: Place,
    pub dropoff: Place,
    pub vehicle: VehicleType,
    pub status: RideStatus,
    pub fare_estimate: f64,
    pub distance_km: f64,
    pub requested_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}
