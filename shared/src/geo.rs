use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("Latitude {0} is out of valid range [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("Longitude {0} is out of valid range [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("Coordinate value is not finite (NaN or Infinity)")]
    NonFinite,
}

/// Validated latitude/longitude pair in decimal degrees.
///
/// Serialized as a `[lat, lon]` array, the layout used by the intake service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "(f64, f64)", into = "(f64, f64)")]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(CoordinateError::NonFinite);
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(CoordinateError::LongitudeOutOfRange(lon));
        }
        Ok(Self { lat, lon })
    }

    /// For compile-time constants already known to be in range.
    pub(crate) const fn from_trusted(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    #[must_use]
    pub const fn lat(self) -> f64 {
        self.lat
    }

    #[must_use]
    pub const fn lon(self) -> f64 {
        self.lon
    }

    #[must_use]
    pub fn distance_km(self, other: Self) -> f64 {
        distance_km(self, other)
    }

    /// `"lat, lon"`, the address shown when reverse geocoding is unavailable.
    #[must_use]
    pub fn to_display_string(self) -> String {
        format!("{}, {}", self.lat, self.lon)
    }
}

impl TryFrom<(f64, f64)> for Coordinate {
    type Error = CoordinateError;

    fn try_from((lat, lon): (f64, f64)) -> Result<Self, Self::Error> {
        Self::new(lat, lon)
    }
}

impl From<Coordinate> for (f64, f64) {
    fn from(c: Coordinate) -> Self {
        (c.lat, c.lon)
    }
}

/// Great-circle distance in kilometres, unrounded.
#[must_use]
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lon - a.lon).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let h = h.clamp(0.0, 1.0);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Haversine distance rounded to two decimals, as displayed next to requests.
#[must_use]
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    round2(haversine_km(a, b))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[must_use]
pub fn format_distance_km(km: f64) -> String {
    if !km.is_finite() || km < 0.0 {
        return "Unknown".to_string();
    }
    format!("{km:.2} km")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("a route needs at least two waypoints, got {0}")]
pub struct RouteError(pub usize);

/// Ordered waypoints from an origin to a destination. Always at least two.
///
/// Serialized as the bare waypoint array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Coordinate>", into = "Vec<Coordinate>")]
pub struct Route {
    waypoints: Vec<Coordinate>,
}

impl Route {
    #[must_use]
    pub fn origin(&self) -> Coordinate {
        self.waypoints[0]
    }

    #[must_use]
    pub fn destination(&self) -> Coordinate {
        self.waypoints[self.waypoints.len() - 1]
    }

    #[must_use]
    pub fn waypoints(&self) -> &[Coordinate] {
        &self.waypoints
    }

    #[must_use]
    pub fn length_km(&self) -> f64 {
        let total: f64 = self
            .waypoints
            .windows(2)
            .map(|pair| haversine_km(pair[0], pair[1]))
            .sum();
        round2(total)
    }

    /// GeoJSON positions are `[lon, lat]`.
    #[must_use]
    pub fn to_geojson(&self) -> geojson::Geometry {
        let line = self
            .waypoints
            .iter()
            .map(|c| vec![c.lon, c.lat])
            .collect::<Vec<_>>();
        geojson::Geometry::new(geojson::Value::LineString(line))
    }
}

impl TryFrom<Vec<Coordinate>> for Route {
    type Error = RouteError;

    fn try_from(waypoints: Vec<Coordinate>) -> Result<Self, Self::Error> {
        if waypoints.len() < 2 {
            return Err(RouteError(waypoints.len()));
        }
        Ok(Self { waypoints })
    }
}

impl From<Route> for Vec<Coordinate> {
    fn from(route: Route) -> Self {
        route.waypoints
    }
}

/// Straight-line stand-in for a routing service. Always two waypoints.
#[must_use]
pub fn directions(from: Coordinate, to: Coordinate) -> Route {
    Route {
        waypoints: vec![from, to],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn rejects_invalid_coordinates() {
        assert!(matches!(
            Coordinate::new(91.0, 0.0),
            Err(CoordinateError::LatitudeOutOfRange(_))
        ));
        assert!(matches!(
            Coordinate::new(0.0, -181.0),
            Err(CoordinateError::LongitudeOutOfRange(_))
        ));
        assert!(matches!(
            Coordinate::new(f64::NAN, 0.0),
            Err(CoordinateError::NonFinite)
        ));
        assert!(Coordinate::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn same_point_is_zero() {
        let p = coord(10.7769, 106.7009);
        assert_eq!(distance_km(p, p), 0.0);
    }

    #[test]
    fn ho_chi_minh_city_sample_distance() {
        let a = coord(10.7769, 106.7009);
        let b = coord(10.7859, 106.6960);
        let d = distance_km(a, b);
        assert!((d - 1.16).abs() <= 0.05, "got {d}");
    }

    #[test]
    fn london_paris_distance() {
        let london = coord(51.5074, -0.1278);
        let paris = coord(48.8566, 2.3522);
        assert!((distance_km(london, paris) - 343.5).abs() < 10.0);
    }

    #[test]
    fn antipodal_distance_is_half_circumference() {
        let d = haversine_km(coord(0.0, 0.0), coord(0.0, 180.0));
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn directions_is_origin_then_destination() {
        let from = coord(10.7769, 106.7009);
        let to = coord(10.7730, 106.7100);
        let route = directions(from, to);
        assert_eq!(route.waypoints().len(), 2);
        assert_eq!(route.origin(), from);
        assert_eq!(route.destination(), to);
        assert_eq!(route.length_km(), distance_km(from, to));
    }

    #[test]
    fn geojson_uses_lon_lat_order() {
        let route = directions(coord(1.0, 2.0), coord(3.0, 4.0));
        match route.to_geojson().value {
            geojson::Value::LineString(points) => {
                assert_eq!(points, vec![vec![2.0, 1.0], vec![4.0, 3.0]]);
            }
            other => panic!("unexpected geometry {other:?}"),
        }
    }

    #[test]
    fn serde_uses_pair_layout() {
        let c: Coordinate = serde_json::from_str("[10.5, 106.25]").unwrap();
        assert_eq!(c, coord(10.5, 106.25));
        assert!(serde_json::from_str::<Coordinate>("[100.0, 0.0]").is_err());
        assert_eq!(serde_json::to_string(&c).unwrap(), "[10.5,106.25]");
    }

    #[test]
    fn route_needs_two_waypoints() {
        assert!(serde_json::from_str::<Route>("[]").is_err());
        assert!(serde_json::from_str::<Route>("[[10.5, 106.25]]").is_err());

        let route: Route = serde_json::from_str("[[10.5, 106.25], [10.6, 106.3]]").unwrap();
        assert_eq!(route.destination(), coord(10.6, 106.3));
        assert_eq!(Route::try_from(Vec::<Coordinate>::new()), Err(RouteError(0)));
    }

    #[test]
    fn format_distance() {
        assert_eq!(format_distance_km(1.159), "1.16 km");
        assert_eq!(format_distance_km(0.0), "0.00 km");
        assert_eq!(format_distance_km(f64::NAN), "Unknown");
    }

    fn any_coordinate() -> impl Strategy<Value = Coordinate> {
        (-90.0f64..=90.0, -180.0f64..=180.0).prop_map(|(lat, lon)| coord(lat, lon))
    }

    proptest! {
        #[test]
        fn distance_to_self_is_zero(a in any_coordinate()) {
            prop_assert_eq!(distance_km(a, a), 0.0);
        }

        #[test]
        fn distance_is_symmetric(a in any_coordinate(), b in any_coordinate()) {
            prop_assert_eq!(distance_km(a, b), distance_km(b, a));
        }

        #[test]
        fn triangle_inequality(a in any_coordinate(), b in any_coordinate(), c in any_coordinate()) {
            let direct = haversine_km(a, c);
            let detour = haversine_km(a, b) + haversine_km(b, c);
            prop_assert!(direct <= detour + 1e-3, "{} > {}", direct, detour);
        }
    }
}
