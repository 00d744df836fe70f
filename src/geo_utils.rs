//! # Geographic Utilities
//!
//! Small geographic helpers shared by the region scorer and the route synthesizer.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points |
//! | [`polyline_length`] | Total length of a GPS track in meters |
//! | [`meters_to_degrees`] | Convert meters to approximate degrees at a latitude |
//! | [`geometry_bounds`] | Bounding box of any geo geometry |
//! | [`to_line_string`] | GPS points to a 2D `LineString` (lon/lat) |
//!
//! ## Coordinate System
//!
//! All functions expect WGS84 coordinates in degrees. geo types store longitude in
//! `x` and latitude in `y`; [`GpsPoint`] keeps named fields so the two are never
//! confused at the API boundary.
//!
//! ## Example
//!
//! ```rust
//! use auto_route::{GpsPoint, geo_utils};
//!
//! let track = vec![
//!     GpsPoint::new(51.5074, -0.1278),
//!     GpsPoint::new(51.5080, -0.1290),
//!     GpsPoint::new(51.5090, -0.1300),
//! ];
//!
//! let length = geo_utils::polyline_length(&track);
//! assert!(length > 100.0 && length < 300.0);
//! ```

use geo::{BoundingRect, Coord, Distance, Haversine, LineString, Point, Rect};

use crate::{Bounds, GpsPoint};

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two GPS points in meters.
///
/// ```rust
/// use auto_route::{GpsPoint, geo_utils};
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 5000.0);
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine.distance(point1, point2)
}

/// Total length of a polyline in meters. Empty or single-point input returns 0.0.
pub fn polyline_length(points: &[GpsPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Convert meters to approximate degrees at a given latitude.
///
/// Uses the longitude scale at `latitude`, which is the larger of the two degree
/// values there. A distance converted this way covers at least `meters` in every
/// direction, so a region buffered with it never falls short of the requested
/// tolerance.
///
/// # Notes
///
/// - At the equator, 1 degree ≈ 111,320 meters
/// - The cosine factor is clamped at 0.1 so polar latitudes stay finite
#[inline]
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let lat_rad = latitude.to_radians();
    let meters_per_degree = 111_320.0 * lat_rad.cos().max(0.1);
    meters / meters_per_degree
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Bounding box of a geo geometry, or `None` for an empty geometry.
pub fn geometry_bounds<G>(geometry: &G) -> Option<Bounds>
where
    G: BoundingRect<f64, Output = Option<Rect<f64>>>,
{
    geometry.bounding_rect().map(|rect| Bounds {
        min_lat: rect.min().y,
        max_lat: rect.max().y,
        min_lng: rect.min().x,
        max_lng: rect.max().x,
    })
}

// =============================================================================
// Conversions
// =============================================================================

/// Build a 2D `LineString` (x = longitude, y = latitude). Elevation is dropped.
pub fn to_line_string(points: &[GpsPoint]) -> LineString<f64> {
    LineString::new(points.iter().map(GpsPoint::to_coord).collect())
}

/// Convert `[lon, lat]` pairs back into GPS points.
pub fn from_lon_lat(coords: &[[f64; 2]]) -> Vec<GpsPoint> {
    coords
        .iter()
        .map(|c| GpsPoint::from_coord(Coord { x: c[0], y: c[1] }))
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Geometry, MultiPolygon};

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = GpsPoint::new(51.5074, -0.1278);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_distance_known_value() {
        // London to Paris is approximately 344 km
        let london = GpsPoint::new(51.5074, -0.1278);
        let paris = GpsPoint::new(48.8566, 2.3522);
        let dist = haversine_distance(&london, &paris);
        assert!(approx_eq(dist, 343_560.0, 5000.0));
    }

    #[test]
    fn test_polyline_length_short_input() {
        let empty: Vec<GpsPoint> = vec![];
        assert_eq!(polyline_length(&empty), 0.0);
        assert_eq!(polyline_length(&[GpsPoint::new(51.5, -0.1)]), 0.0);
    }

    #[test]
    fn test_polyline_length_two_points() {
        let track = vec![
            GpsPoint::new(51.5074, -0.1278),
            GpsPoint::new(51.5080, -0.1280),
        ];
        let length = polyline_length(&track);
        assert!(length > 0.0);
        assert!(length < 100.0);
    }

    #[test]
    fn test_meters_to_degrees() {
        let deg = meters_to_degrees(111_320.0, 0.0);
        assert!(approx_eq(deg, 1.0, 0.01));

        // Same distance spans more degrees away from the equator
        let deg_45 = meters_to_degrees(111_320.0, 45.0);
        assert!(deg_45 > 1.0);

        assert_eq!(meters_to_degrees(0.0, 51.5), 0.0);
    }

    #[test]
    fn test_geometry_bounds() {
        let poly = polygon![
            (x: -0.13, y: 51.50),
            (x: -0.12, y: 51.50),
            (x: -0.12, y: 51.51),
            (x: -0.13, y: 51.51),
        ];
        let bounds = geometry_bounds(&Geometry::Polygon(poly)).unwrap();
        assert_eq!(bounds.min_lat, 51.50);
        assert_eq!(bounds.max_lat, 51.51);
        assert_eq!(bounds.min_lng, -0.13);
        assert_eq!(bounds.max_lng, -0.12);

        let empty = MultiPolygon::<f64>::new(vec![]);
        assert!(geometry_bounds(&empty).is_none());
    }

    #[test]
    fn test_line_string_drops_elevation() {
        let points = vec![
            GpsPoint::new(51.5, -0.1).with_elevation(12.0),
            GpsPoint::new(51.6, -0.2),
        ];
        let line = to_line_string(&points);
        assert_eq!(line.0.len(), 2);
        assert_eq!(line.0[0], Coord { x: -0.1, y: 51.5 });

        let back = from_lon_lat(&[[-0.1, 51.5]]);
        assert_eq!(back[0], GpsPoint::new(51.5, -0.1));
    }
}
