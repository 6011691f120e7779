use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Finite and inside the WGS84 coordinate ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VehicleType {
    Car,
    Bike,
    Tuk,
    Van,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rider {
    pub id: Uuid,
    pub name: String,
    pub vehicle: VehicleType,
    pub location: GeoPoint,
    pub is_online: bool,
    pub is_available: bool,
    pub updated_at: DateTime<Utc>,
}

impl Rider {
    /// Eligible for matching: online and not on an active trip.
    pub fn is_matchable(&self) -> bool {
        self.is_online && self.is_available
    }
}
