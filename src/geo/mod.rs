use crate::models::rider::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

#[cfg(test)]
mod tests {
    use super::haversine_km;
    use crate::models::rider::GeoPoint;

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            lat: 6.9271,
            lng: 79.8612,
        };
        let distance = haversine_km(&p, &p);
        assert!(distance < 1e-9);
    }

    #[test]
    fn distance_is_symmetric() {
        let fort = GeoPoint {
            lat: 6.9271,
            lng: 79.8612,
        };
        let moratuwa = GeoPoint {
            lat: 6.7951,
            lng: 79.9009,
        };
        let out = haversine_km(&fort, &moratuwa);
        let back = haversine_km(&moratuwa, &fort);
        assert!((out - back).abs() < 1e-12);
    }

    #[test]
    fn colombo_to_kandy_is_around_94_km() {
        let colombo = GeoPoint {
            lat: 6.9271,
            lng: 79.8612,
        };
        let kandy = GeoPoint {
            lat: 7.2906,
            lng: 80.6337,
        };
        let distance = haversine_km(&colombo, &kandy);
        assert!((distance - 94.0).abs() < 5.0);
    }
}
