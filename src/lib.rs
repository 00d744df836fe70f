//! # Auto Route
//!
//! Turn a raw GPS history into a single clean route inside the region it was driven in.
//!
//! This library provides:
//! - Point extraction from mixed point/path track geometry
//! - Region scoring: buffer each candidate polygon and count the track points inside
//! - Route synthesis: Douglas-Peucker smoothing, or snapping to a road network through
//!   a map-matching service with a local fallback
//!
//! ## Features
//!
//! - **`parallel`** - Score large region sets in parallel with rayon
//! - **`http`** - Enable the OSRM map-matching client ([`OsrmMatcher`])
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use auto_route::{
//!     extract_points, score_regions, synthesize_direct, GpsPoint, RegionDecision,
//!     RegionGeometry, RouteConfig, TrackFeature, TrackGeometry,
//! };
//! use geo::{polygon, Geometry};
//!
//! let track = TrackGeometry::new(vec![TrackFeature::Path(vec![
//!     GpsPoint::new(51.5010, -0.1290),
//!     GpsPoint::new(51.5020, -0.1280),
//!     GpsPoint::new(51.5030, -0.1270),
//! ])]);
//! let ward = RegionGeometry::named(
//!     "Ward 7",
//!     Geometry::Polygon(polygon![
//!         (x: -0.1300, y: 51.5000),
//!         (x: -0.1260, y: 51.5000),
//!         (x: -0.1260, y: 51.5040),
//!         (x: -0.1300, y: 51.5040),
//!     ]),
//! );
//!
//! let config = RouteConfig::default();
//! let points = extract_points(&track).unwrap();
//! let score = score_regions(&points, &[ward], config.buffer_meters).unwrap();
//!
//! if let RegionDecision::AutoSelect(candidate) = score.decision {
//!     let generated = synthesize_direct(&candidate.buffered, &points, &config).unwrap();
//!     assert_eq!(generated.stats.filtered_point_count, 3);
//! }
//! ```

use geo::{Coord, Geometry};
use std::collections::HashMap;
use std::time::Duration;

pub mod geo_utils;

// Point extraction from heterogeneous track geometry
pub mod extract;
pub use extract::extract_points;

// Region buffering, containment scoring and selection
pub mod regions;
#[cfg(feature = "parallel")]
pub use regions::score_regions_parallel;
pub use regions::{
    buffer_region, score_regions, BufferedRegion, PointIndex, RegionCandidate, RegionDecision,
    RegionScore,
};

// Line-matching service contract
pub mod matcher;
pub use matcher::{downsample, LineMatcher, MatchError, MatchedLine, NoNetwork};

// Route synthesis and generation statistics
pub mod route;
pub use route::{
    filter_points, snap_to_network, synthesize, synthesize_direct, GeneratedRoute,
    GenerationStats, RouteGeometry, RouteSource, SnapResult,
};

// End-to-end flow with the disambiguation boundary
pub mod pipeline;
pub use pipeline::{Analysis, AutoRouter, Selection};

// HTTP client for OSRM map matching
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{OsrmConfig, OsrmMatcher};

// ============================================================================
// Errors
// ============================================================================

/// Fatal errors. Each one halts the current operation with no partial output.
///
/// Network matching failures are not here: they are recovered locally and
/// reported as [`MatchError`] on the produced route.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("No points found in track")]
    EmptyTrack,

    #[error("No track points inside any region (buffer {buffer_meters}m)")]
    NoMatch { buffer_meters: f64 },

    #[error("Not enough points inside {region} to build a route: found {found}, need 2")]
    InsufficientPoints { region: String, found: usize },

    #[error("Malformed geometry: {0}")]
    MalformedGeometry(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, RouteError>;

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude, longitude and optional elevation.
///
/// Elevation is carried through extraction but ignored by every geometric step.
///
/// # Example
/// ```
/// use auto_route::GpsPoint;
/// let point = GpsPoint::new(51.5074, -0.1278); // London
/// assert_eq!(point.lon_lat(), [-0.1278, 51.5074]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude, elevation: None }
    }

    /// Attach an elevation in meters.
    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    /// The 2D `[longitude, latitude]` pair sent to matching services.
    pub fn lon_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }

    pub fn to_coord(&self) -> Coord<f64> {
        Coord { x: self.longitude, y: self.latitude }
    }

    pub fn from_coord(coord: Coord<f64>) -> Self {
        Self::new(coord.y, coord.x)
    }
}

/// Bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from GPS points.
    pub fn from_points(points: &[GpsPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self { min_lat, max_lat, min_lng, max_lng })
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// One feature of a raw track.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackFeature {
    /// A single GPS fix.
    Point(GpsPoint),
    /// An ordered run of fixes, exploded into its vertices on extraction.
    Path(Vec<GpsPoint>),
}

impl TrackFeature {
    /// Number of samples this feature contributes to extraction.
    pub fn sample_count(&self) -> usize {
        match self {
            TrackFeature::Point(_) => 1,
            TrackFeature::Path(vertices) => vertices.len(),
        }
    }
}

/// The raw positional history to analyze, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackGeometry {
    pub features: Vec<TrackFeature>,
}

impl TrackGeometry {
    pub fn new(features: Vec<TrackFeature>) -> Self {
        Self { features }
    }

    /// Build a track from generic geo geometries.
    ///
    /// `Point` and `LineString` map to point and path features; `MultiPoint` and
    /// `MultiLineString` contribute their members in order. Any other shape is
    /// rejected with [`RouteError::MalformedGeometry`].
    pub fn from_geometries<I>(geometries: I) -> Result<Self>
    where
        I: IntoIterator<Item = Geometry<f64>>,
    {
        let mut features = Vec::new();
        for (index, geometry) in geometries.into_iter().enumerate() {
            match geometry {
                Geometry::Point(p) => features.push(TrackFeature::Point(GpsPoint::from_coord(p.0))),
                Geometry::LineString(line) => features.push(path_feature(&line)),
                Geometry::MultiPoint(points) => features.extend(
                    points
                        .iter()
                        .map(|p| TrackFeature::Point(GpsPoint::from_coord(p.0))),
                ),
                Geometry::MultiLineString(lines) => {
                    features.extend(lines.iter().map(path_feature))
                }
                other => {
                    return Err(RouteError::MalformedGeometry(format!(
                        "track feature {} is a {}, expected a point or path",
                        index,
                        geometry_kind(&other)
                    )))
                }
            }
        }
        Ok(Self { features })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl FromIterator<TrackFeature> for TrackGeometry {
    fn from_iter<I: IntoIterator<Item = TrackFeature>>(iter: I) -> Self {
        Self { features: iter.into_iter().collect() }
    }
}

fn path_feature(line: &geo::LineString<f64>) -> TrackFeature {
    TrackFeature::Path(line.coords().map(|c| GpsPoint::from_coord(*c)).collect())
}

pub(crate) fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Fallback display name for regions without a name.
pub const UNNAMED_REGION: &str = "Unnamed Region";

/// A candidate boundary the track may have occurred in.
///
/// Only `Polygon` and `MultiPolygon` geometries take part in scoring; anything
/// else in a region set is skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionGeometry {
    pub name: Option<String>,
    pub geometry: Geometry<f64>,
}

impl RegionGeometry {
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self { name: None, geometry }
    }

    pub fn named(name: impl Into<String>, geometry: Geometry<f64>) -> Self {
        Self { name: Some(name.into()), geometry }
    }

    /// Take the display name from feature properties: `name`, then `Name`.
    pub fn with_properties(geometry: Geometry<f64>, properties: &HashMap<String, String>) -> Self {
        let name = properties
            .get("name")
            .or_else(|| properties.get("Name"))
            .filter(|n| !n.is_empty())
            .cloned();
        Self { name, geometry }
    }

    /// Name shown to the caller when presenting candidates.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNNAMED_REGION)
    }

    pub fn is_polygonal(&self) -> bool {
        matches!(self.geometry, Geometry::Polygon(_) | Geometry::MultiPolygon(_))
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for region scoring and route synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteConfig {
    /// Outward expansion of every region before containment tests, in meters.
    /// Tolerates points on roads along the boundary. Default: 20.0
    pub buffer_meters: f64,

    /// Douglas-Peucker tolerance for the direct strategy, in degrees.
    /// Zero keeps every filtered point. Default: 0.0001 (~11 meters)
    pub smoothing_tolerance: f64,

    /// Snap the route to a road network through a [`LineMatcher`].
    /// Default: false
    pub snap_to_network: bool,

    /// Maximum coordinates sent in one matching request.
    /// Default: 90 (public OSRM servers reject much larger traces)
    pub match_request_limit: usize,

    /// Upper bound on one matching request, after which the fallback line is used.
    /// Default: 30 seconds
    pub match_timeout: Duration,

    /// Travel-profile hint passed to the matching service. Default: "driving"
    pub match_profile: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            buffer_meters: 20.0,
            smoothing_tolerance: 0.0001,
            snap_to_network: false,
            match_request_limit: 90,
            match_timeout: Duration::from_secs(30),
            match_profile: "driving".to_string(),
        }
    }
}

impl RouteConfig {
    /// Reject values no run can use.
    pub fn validate(&self) -> Result<()> {
        if !self.buffer_meters.is_finite() || self.buffer_meters < 0.0 {
            return Err(RouteError::InvalidConfig(format!(
                "buffer_meters must be a non-negative number, got {}",
                self.buffer_meters
            )));
        }
        if !self.smoothing_tolerance.is_finite() || self.smoothing_tolerance < 0.0 {
            return Err(RouteError::InvalidConfig(format!(
                "smoothing_tolerance must be a non-negative number, got {}",
                self.smoothing_tolerance
            )));
        }
        if self.match_request_limit < 2 {
            return Err(RouteError::InvalidConfig(format!(
                "match_request_limit must be at least 2, got {}",
                self.match_request_limit
            )));
        }
        if self.match_timeout.is_zero() {
            return Err(RouteError::InvalidConfig("match_timeout must be non-zero".to_string()));
        }
        if self.match_profile.is_empty() {
            return Err(RouteError::InvalidConfig("match_profile must not be empty".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point, polygon, MultiPoint};

    #[test]
    fn test_bounds_from_points() {
        assert!(Bounds::from_points(&[]).is_none());

        let bounds = Bounds::from_points(&[
            GpsPoint::new(51.50, -0.10),
            GpsPoint::new(51.52, -0.12),
        ])
        .unwrap();
        let center = bounds.center();
        assert!((center.latitude - 51.51).abs() < 1e-9);
        assert!((center.longitude + 0.11).abs() < 1e-9);
    }

    #[test]
    fn test_track_from_geometries() {
        let track = TrackGeometry::from_geometries(vec![
            Geometry::Point(point!(x: -0.1, y: 51.5)),
            Geometry::LineString(line_string![(x: -0.2, y: 51.6), (x: -0.3, y: 51.7)]),
            Geometry::MultiPoint(MultiPoint::from(vec![(-0.4, 51.8), (-0.5, 51.9)])),
        ])
        .unwrap();

        assert_eq!(track.len(), 4);
        assert_eq!(track.features[0], TrackFeature::Point(GpsPoint::new(51.5, -0.1)));
        assert_eq!(track.features[1].sample_count(), 2);
    }

    #[test]
    fn test_track_rejects_polygon_feature() {
        let result = TrackGeometry::from_geometries(vec![
            Geometry::Point(point!(x: -0.1, y: 51.5)),
            Geometry::Polygon(polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]),
        ]);
        match result {
            Err(RouteError::MalformedGeometry(msg)) => {
                assert!(msg.contains("feature 1"));
                assert!(msg.contains("Polygon"));
            }
            other => panic!("expected MalformedGeometry, got {:?}", other),
        }
    }

    #[test]
    fn test_region_display_name() {
        let square = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ]);

        assert_eq!(RegionGeometry::new(square.clone()).display_name(), UNNAMED_REGION);

        let mut props = HashMap::new();
        props.insert("Name".to_string(), "Ward 12".to_string());
        assert_eq!(RegionGeometry::with_properties(square.clone(), &props).display_name(), "Ward 12");

        props.insert("name".to_string(), "Ward 3".to_string());
        let region = RegionGeometry::with_properties(square, &props);
        assert_eq!(region.display_name(), "Ward 3");
        assert!(region.is_polygonal());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(RouteConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_rejects_bad_values() {
        let negative_buffer = RouteConfig { buffer_meters: -1.0, ..RouteConfig::default() };
        assert!(matches!(negative_buffer.validate(), Err(RouteError::InvalidConfig(_))));

        let nan_smoothing = RouteConfig { smoothing_tolerance: f64::NAN, ..RouteConfig::default() };
        assert!(nan_smoothing.validate().is_err());

        let tiny_limit = RouteConfig { match_request_limit: 1, ..RouteConfig::default() };
        assert!(tiny_limit.validate().is_err());

        let no_timeout = RouteConfig { match_timeout: Duration::ZERO, ..RouteConfig::default() };
        assert!(no_timeout.validate().is_err());
    }
}
