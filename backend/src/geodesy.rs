use crate::models::Coordinate;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum GeodesyError {
    #[error("cannot compute a midpoint of zero coordinates")]
    EmptyInput,
}

/// Arithmetic mean of latitudes and longitudes.
///
/// Not geodesically exact, but stable at city scale where meeting points live.
pub fn midpoint(coords: &[Coordinate]) -> Result<Coordinate, GeodesyError> {
    if coords.is_empty() {
        return Err(GeodesyError::EmptyInput);
    }
    let n = coords.len() as f64;
    let (lat_sum, lon_sum) = coords
        .iter()
        .fold((0.0, 0.0), |(lat, lon), c| (lat + c.lat, lon + c.lon));
    Ok(Coordinate {
        lat: lat_sum / n,
        lon: lon_sum / n,
    })
}

/// Haversine great-circle distance in meters.
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Circular search area around a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub center: Coordinate,
    pub radius_m: f64,
}

impl Region {
    pub fn new(center: Coordinate, radius_m: f64) -> Self {
        Self { center, radius_m }
    }

    pub fn scaled(self, factor: f64) -> Self {
        Self {
            center: self.center,
            radius_m: self.radius_m * factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_same_point() {
        let point = Coordinate { lat: 45.0, lon: 5.0 };
        assert_eq!(distance(point, point), 0.0);
    }

    #[test]
    fn test_distance_known_value() {
        // Paris to London, ~343 km
        let paris = Coordinate::new(48.8566, 2.3522);
        let london = Coordinate::new(51.5074, -0.1278);
        assert!((distance(paris, london) - 343_500.0).abs() < 2_000.0);
    }

    #[test]
    fn test_midpoint_empty_fails() {
        assert_eq!(midpoint(&[]), Err(GeodesyError::EmptyInput));
    }

    #[test]
    fn test_midpoint_single_point() {
        let point = Coordinate::new(12.5, -3.25);
        assert_eq!(midpoint(&[point]).unwrap(), point);
    }

    #[test]
    fn test_midpoint_westminster_covent_garden() {
        let a = Coordinate::new(51.5007, -0.1246);
        let b = Coordinate::new(51.5155, -0.1419);
        let mid = midpoint(&[a, b]).unwrap();
        assert!((mid.lat - 51.5081).abs() < 1e-4);
        assert!((mid.lon + 0.13325).abs() < 1e-4);
    }

    #[test]
    fn test_region_scaled() {
        let region = Region::new(Coordinate::new(0.0, 0.0), 1_000.0).scaled(2.0);
        assert_eq!(region.radius_m, 2_000.0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn valid_coord() -> impl Strategy<Value = Coordinate> {
            (-90.0..=90.0, -180.0..=180.0).prop_map(|(lat, lon)| Coordinate { lat, lon })
        }

        fn city_coord() -> impl Strategy<Value = Coordinate> {
            (-60.0..=60.0, -170.0..=170.0).prop_map(|(lat, lon)| Coordinate { lat, lon })
        }

        proptest! {
            #[test]
            fn prop_distance_non_negative(a in valid_coord(), b in valid_coord()) {
                prop_assert!(distance(a, b) >= 0.0);
            }

            #[test]
            fn prop_distance_symmetric(a in valid_coord(), b in valid_coord()) {
                prop_assert!((distance(a, b) - distance(b, a)).abs() < 1e-6);
            }

            #[test]
            fn prop_distance_same_point_is_zero(coord in valid_coord()) {
                prop_assert_eq!(distance(coord, coord), 0.0);
            }

            #[test]
            fn prop_distance_bounded_by_half_circumference(a in valid_coord(), b in valid_coord()) {
                let max_distance = std::f64::consts::PI * EARTH_RADIUS_M;
                prop_assert!(distance(a, b) <= max_distance + 1.0);
            }

            #[test]
            fn prop_midpoint_of_nearby_pair_is_equidistant(
                a in city_coord(),
                dlat in -0.05f64..0.05,
                dlon in -0.05f64..0.05
            ) {
                let b = Coordinate { lat: a.lat + dlat, lon: a.lon + dlon };
                let mid = midpoint(&[a, b]).unwrap();
                let da = distance(mid, a);
                let db = distance(mid, b);
                let total = distance(a, b);
                // Equidistant and on the path, within city-scale tolerance
                prop_assert!((da - db).abs() <= total * 1e-3 + 1e-6);
                prop_assert!((da + db - total).abs() <= total * 1e-3 + 1e-6);
            }

            #[test]
            fn prop_midpoint_within_bounds(coords in prop::collection::vec(valid_coord(), 1..6)) {
                let mid = midpoint(&coords).unwrap();
                let min_lat = coords.iter().map(|c| c.lat).fold(f64::INFINITY, f64::min);
                let max_lat = coords.iter().map(|c| c.lat).fold(f64::NEG_INFINITY, f64::max);
                prop_assert!(mid.lat >= min_lat - 1e-9 && mid.lat <= max_lat + 1e-9);
            }
        }
    }
}
