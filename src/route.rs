//! # Route Synthesis
//!
//! Build one route from the track points inside a selected region.
//!
//! The points are filtered against the buffered region again (the region handed
//! in after disambiguation need not be the one that was scored), then turned into a
//! line by one of two strategies:
//!
//! - **Direct**: the filtered points in order, optionally thinned with
//!   Douglas-Peucker at `smoothing_tolerance` degrees. Synchronous.
//! - **Network snap**: a downsampled copy of the points is sent to a
//!   [`LineMatcher`]. Matched segments are concatenated in response order. On any
//!   failure, including a timeout, the route falls back to the full filtered point
//!   set without smoothing and carries the failure as a warning.

use geo::{LineString, SimplifyIdx};
use log::{debug, info, warn};

use crate::geo_utils::{from_lon_lat, polyline_length, to_line_string};
use crate::matcher::{downsample, LineMatcher, MatchError, MatchedLine};
use crate::regions::{BufferedRegion, PointIndex};
use crate::{Bounds, GpsPoint, Result, RouteConfig, RouteError};

// ============================================================================
// Output types
// ============================================================================

/// How the route line was produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteSource {
    /// Built directly from the filtered points.
    Direct,
    /// Aligned to the road network; `segments` matchings were merged.
    Snapped { segments: usize },
    /// Snapping was requested but failed; the raw filtered line was used.
    Fallback(MatchError),
}

/// The generated route and its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteGeometry {
    pub name: String,
    pub description: String,
    /// Name of the region the route was generated for
    pub region_name: String,
    /// Route vertices in travel order
    pub points: Vec<GpsPoint>,
    /// Number of track points the route was generated from
    pub source_point_count: usize,
    /// Route length in meters
    pub length_meters: f64,
    pub bounds: Bounds,
    pub source: RouteSource,
}

impl RouteGeometry {
    fn build(region: &BufferedRegion, points: Vec<GpsPoint>, used: usize, source: RouteSource) -> Result<Self> {
        let bounds = Bounds::from_points(&points).ok_or_else(|| {
            RouteError::MalformedGeometry(format!("route for {} has no vertices", region.name))
        })?;

        let mut description = format!("Generated from {} points inside {}.", used, region.name);
        match &source {
            RouteSource::Direct => {}
            RouteSource::Snapped { .. } => description.push_str(" Snapped to road network."),
            RouteSource::Fallback(_) => {
                description.push_str(" Network matching failed; raw line used.")
            }
        }

        Ok(Self {
            name: format!("Route - {}", region.name),
            description,
            region_name: region.name.clone(),
            length_meters: polyline_length(&points),
            points,
            source_point_count: used,
            bounds,
            source,
        })
    }

    /// The route as a 2D `LineString` (x = longitude, y = latitude).
    pub fn to_line_string(&self) -> LineString<f64> {
        to_line_string(&self.points)
    }

    pub fn is_snapped(&self) -> bool {
        matches!(self.source, RouteSource::Snapped { .. })
    }
}

/// Point counts before and after filtering to the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationStats {
    pub original_point_count: usize,
    pub filtered_point_count: usize,
}

impl GenerationStats {
    /// Share of the track inside the region, as a whole percentage.
    pub fn efficiency(&self) -> u32 {
        if self.original_point_count == 0 {
            return 0;
        }
        (self.filtered_point_count as f64 / self.original_point_count as f64 * 100.0).round() as u32
    }
}

/// Result of a synthesis run.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedRoute {
    pub route: RouteGeometry,
    pub stats: GenerationStats,
}

impl GeneratedRoute {
    /// The non-fatal matching failure, if the route fell back to the raw line.
    pub fn warning(&self) -> Option<&MatchError> {
        match &self.route.source {
            RouteSource::Fallback(err) => Some(err),
            _ => None,
        }
    }
}

/// Outcome of a network-snap attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapResult {
    /// The service matched the line.
    Matched(MatchedLine),
    /// The service failed; `line` is the full filtered point set, unsmoothed.
    Fallback { line: Vec<GpsPoint>, reason: MatchError },
}

// ============================================================================
// Synthesis
// ============================================================================

/// Points of `points` inside `region`, in their original order.
///
/// Fails with [`RouteError::InsufficientPoints`] when fewer than two remain.
pub fn filter_points(region: &BufferedRegion, points: &[GpsPoint]) -> Result<Vec<GpsPoint>> {
    if region.geometry.0.is_empty() {
        return Err(RouteError::MalformedGeometry(format!(
            "region {} has no polygons",
            region.name
        )));
    }

    let filtered: Vec<GpsPoint> = PointIndex::new(points)
        .indices_within(region)
        .into_iter()
        .map(|i| points[i])
        .collect();

    debug!(
        "[RouteSynth] {}/{} points inside '{}'",
        filtered.len(),
        points.len(),
        region.name
    );

    if filtered.len() < 2 {
        return Err(RouteError::InsufficientPoints {
            region: region.name.clone(),
            found: filtered.len(),
        });
    }
    Ok(filtered)
}

/// Synthesize a route with the direct strategy, ignoring `snap_to_network`.
///
/// # Example
/// ```
/// use auto_route::{buffer_region, synthesize_direct, GpsPoint, RegionGeometry, RouteConfig};
/// use geo::{polygon, Geometry};
///
/// let region = RegionGeometry::named("Block", Geometry::Polygon(polygon![
///     (x: -1.0, y: -1.0), (x: 3.0, y: -1.0), (x: 3.0, y: 3.0), (x: -1.0, y: 3.0),
/// ]));
/// let buffered = buffer_region(&region, 0, 0.0).unwrap();
/// let points = vec![
///     GpsPoint::new(0.0, 0.0),
///     GpsPoint::new(0.0, 1.0),
///     GpsPoint::new(0.0, 2.0),
///     GpsPoint::new(1.0, 1.0),
/// ];
///
/// let config = RouteConfig { smoothing_tolerance: 10.0, ..RouteConfig::default() };
/// let generated = synthesize_direct(&buffered, &points, &config).unwrap();
/// assert!(generated.route.points.len() < 4);
/// assert_eq!(generated.route.points.first(), Some(&GpsPoint::new(0.0, 0.0)));
/// assert_eq!(generated.route.points.last(), Some(&GpsPoint::new(1.0, 1.0)));
/// ```
pub fn synthesize_direct(
    region: &BufferedRegion,
    points: &[GpsPoint],
    config: &RouteConfig,
) -> Result<GeneratedRoute> {
    config.validate()?;
    let filtered = filter_points(region, points)?;
    let line = direct_line(&filtered, config.smoothing_tolerance);
    finish(region, points, &filtered, line, RouteSource::Direct)
}

/// Synthesize a route for `region`, snapping to the network when
/// `config.snap_to_network` is set.
///
/// Matching failures never fail this call; see [`GeneratedRoute::warning`].
pub async fn synthesize<M: LineMatcher>(
    region: &BufferedRegion,
    points: &[GpsPoint],
    config: &RouteConfig,
    matcher: &M,
) -> Result<GeneratedRoute> {
    if !config.snap_to_network {
        return synthesize_direct(region, points, config);
    }

    config.validate()?;
    let filtered = filter_points(region, points)?;

    let (line, source) = match snap_to_network(&filtered, config, matcher).await {
        SnapResult::Matched(matched) => {
            let segments = matched.segments.len();
            (from_lon_lat(&matched.merged()), RouteSource::Snapped { segments })
        }
        SnapResult::Fallback { line, reason } => (line, RouteSource::Fallback(reason)),
    };

    finish(region, points, &filtered, line, source)
}

/// Ask `matcher` to align `filtered` to the network.
///
/// At most `config.match_request_limit` 2D coordinates are sent. The request is
/// bounded by `config.match_timeout` and never retried.
pub async fn snap_to_network<M: LineMatcher>(
    filtered: &[GpsPoint],
    config: &RouteConfig,
    matcher: &M,
) -> SnapResult {
    let sampled: Vec<[f64; 2]> = downsample(filtered, config.match_request_limit)
        .iter()
        .map(GpsPoint::lon_lat)
        .collect();

    debug!(
        "[RouteSynth] Matching {} of {} points (profile {}, timeout {:?})",
        sampled.len(),
        filtered.len(),
        config.match_profile,
        config.match_timeout
    );

    let request = matcher.match_line(&sampled, &config.match_profile);
    let outcome = match tokio::time::timeout(config.match_timeout, request).await {
        Ok(Ok(matched)) => check_matched(matched),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(MatchError::Timeout(config.match_timeout)),
    };

    match outcome {
        Ok(matched) => SnapResult::Matched(matched),
        Err(reason) => {
            warn!(
                "[RouteSynth] Network matching failed, falling back to raw line of {} points: {}",
                filtered.len(),
                reason
            );
            SnapResult::Fallback { line: filtered.to_vec(), reason }
        }
    }
}

fn check_matched(matched: MatchedLine) -> std::result::Result<MatchedLine, MatchError> {
    if matched.segments.is_empty() {
        return Err(MatchError::NoMatchings);
    }
    let merged = matched.merged();
    if merged.len() < 2 {
        return Err(MatchError::Malformed(format!(
            "matched line has {} coordinate(s)",
            merged.len()
        )));
    }
    if merged.iter().flatten().any(|v| !v.is_finite()) {
        return Err(MatchError::Malformed("non-finite coordinate in matched line".to_string()));
    }
    Ok(matched)
}

fn direct_line(filtered: &[GpsPoint], tolerance: f64) -> Vec<GpsPoint> {
    if tolerance <= 0.0 {
        return filtered.to_vec();
    }
    // Index-based so kept vertices retain their elevation
    to_line_string(filtered)
        .simplify_idx(tolerance)
        .into_iter()
        .map(|i| filtered[i])
        .collect()
}

fn finish(
    region: &BufferedRegion,
    points: &[GpsPoint],
    filtered: &[GpsPoint],
    line: Vec<GpsPoint>,
    source: RouteSource,
) -> Result<GeneratedRoute> {
    let route = RouteGeometry::build(region, line, filtered.len(), source)?;
    let stats = GenerationStats {
        original_point_count: points.len(),
        filtered_point_count: filtered.len(),
    };

    info!(
        "[RouteSynth] '{}': {} vertices from {}/{} points, {:.0}m ({:?})",
        route.name,
        route.points.len(),
        stats.filtered_point_count,
        stats.original_point_count,
        route.length_meters,
        route.source
    );

    Ok(GeneratedRoute { route, stats })
}

// ============================================================================
// Tests
// ============================================================================
