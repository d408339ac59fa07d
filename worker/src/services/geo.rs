//! Geographic calculations

use crate::types::Coordinates;

/// Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Calculate Haversine distance between two points in kilometers
pub fn haversine_distance(from: &Coordinates, to: &Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lng - from.lng).to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Travel time in minutes for a distance at a constant speed
pub fn travel_time_minutes(distance_km: f64, speed_kmh: f64) -> f64 {
    if speed_kmh <= 0.0 {
        return 0.0;
    }
    distance_km / speed_kmh * 60.0
}

/// Mean latitude/longitude of the points, `None` for an empty slice
pub fn centroid(points: &[Coordinates]) -> Option<Coordinates> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (lat, lng) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lng), p| (lat + p.lat, lng + p.lng));
    Some(Coordinates { lat: lat / n, lng: lng / n })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_santiago_valparaiso() {
        let santiago = Coordinates { lat: -33.4489, lng: -70.6693 };
        let valparaiso = Coordinates { lat: -33.0472, lng: -71.6127 };

        let distance = haversine_distance(&santiago, &valparaiso);

        // Straight line is roughly 98 km
        assert!((distance - 98.0).abs() < 3.0);
    }

    #[test]
    fn test_haversine_same_point() {
        let point = Coordinates { lat: -33.0, lng: -70.0 };
        let distance = haversine_distance(&point, &point);
        assert!((distance - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let a = Coordinates { lat: 0.0, lng: 0.0 };
        let b = Coordinates { lat: 1.0, lng: 0.0 };
        // 6371 * pi / 180
        assert!((haversine_distance(&a, &b) - 111.195).abs() < 0.01);
    }

    #[test]
    fn test_travel_time() {
        assert!((travel_time_minutes(40.0, 40.0) - 60.0).abs() < 1e-9);
        assert!((travel_time_minutes(10.0, 40.0) - 15.0).abs() < 1e-9);
        assert_eq!(travel_time_minutes(10.0, 0.0), 0.0);
    }

    #[test]
    fn test_centroid() {
        let points = vec![
            Coordinates { lat: -33.0, lng: -70.0 },
            Coordinates { lat: -34.0, lng: -71.0 },
        ];
        let c = centroid(&points).unwrap();
        assert!((c.lat + 33.5).abs() < 1e-9);
        assert!((c.lng + 70.5).abs() < 1e-9);
        assert!(centroid(&[]).is_none());
    }
}
