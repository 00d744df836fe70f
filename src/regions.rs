//! # Region Scoring
//!
//! Decide which candidate region a track was recorded in.
//!
//! Each polygonal region is expanded outward by the buffer tolerance, then the
//! extracted track points falling inside it are counted. Regions with no points
//! are dropped and the rest are ranked by count:
//!
//! - no survivors: [`RegionDecision::NoMatch`]
//! - one survivor: [`RegionDecision::AutoSelect`]
//! - several: [`RegionDecision::Ambiguous`], the caller picks one
//!
//! Points are loaded once into an R-tree so each region only tests the points
//! inside its bounding box. Nothing is cached between calls: buffers are always
//! rebuilt from the region and the tolerance given.

use geo::{Area, Buffer, Geometry, Intersects, LineString, MultiPolygon, Point, Polygon};
use log::{debug, info};
use rstar::{primitives::GeomWithData, RTree, AABB};

use crate::geo_utils::{geometry_bounds, meters_to_degrees};
use crate::{geometry_kind, Bounds, GpsPoint, RegionGeometry, Result, RouteError};

// ============================================================================
// Buffered regions
// ============================================================================

/// A region expanded outward by a buffer tolerance.
///
/// Always tied to the one region and the one tolerance it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedRegion {
    /// Position of the source region in the scored region set
    pub region_index: usize,
    /// Display name of the source region
    pub name: String,
    /// Tolerance the buffer was built with, in meters
    pub buffer_meters: f64,
    /// Buffered boundary (lon/lat degrees)
    pub geometry: MultiPolygon<f64>,
    /// Bounding box of the buffered boundary
    pub bounds: Bounds,
}

impl BufferedRegion {
    /// Point-in-polygon test. Points on the boundary count as inside, and a point
    /// inside any member polygon of a multi-polygon is inside the region.
    pub fn contains(&self, point: &GpsPoint) -> bool {
        self.contains_lon_lat(point.lon_lat())
    }

    fn contains_lon_lat(&self, lon_lat: [f64; 2]) -> bool {
        let [lng, lat] = lon_lat;
        if lat < self.bounds.min_lat
            || lat > self.bounds.max_lat
            || lng < self.bounds.min_lng
            || lng > self.bounds.max_lng
        {
            return false;
        }
        self.geometry.intersects(&Point::new(lng, lat))
    }

    fn envelope(&self) -> AABB<[f64; 2]> {
        AABB::from_corners(
            [self.bounds.min_lng, self.bounds.min_lat],
            [self.bounds.max_lng, self.bounds.max_lat],
        )
    }
}

/// Expand a polygonal region outward by `buffer_meters`.
///
/// The distance is converted to degrees at the centre latitude of the region
/// with [`meters_to_degrees`], so the buffer reaches at least `buffer_meters` in
/// every direction. A zero buffer returns the region unchanged.
///
/// Degenerate rings are dropped first, at every tolerance: a hole with fewer
/// than three distinct vertices, no area or a non-finite coordinate removes
/// nothing, and a member whose exterior ring is like that covers nothing.
///
/// Fails with [`RouteError::MalformedGeometry`] for non-polygonal regions and for
/// regions with no usable member, and [`RouteError::InvalidConfig`] for a
/// negative tolerance.
pub fn buffer_region(
    region: &RegionGeometry,
    region_index: usize,
    buffer_meters: f64,
) -> Result<BufferedRegion> {
    check_buffer(buffer_meters)?;

    let base = match usable_polygons(region, region_index)? {
        Some(base) => base,
        None => {
            return Err(RouteError::MalformedGeometry(format!(
                "region {} has no polygon with area",
                region_index
            )))
        }
    };
    expand(region, region_index, base, buffer_meters)
}

/// Polygon members of `region` with their degenerate rings removed, or `None`
/// when no member is left.
fn usable_polygons(region: &RegionGeometry, region_index: usize) -> Result<Option<MultiPolygon<f64>>> {
    let members: Vec<&Polygon<f64>> = match &region.geometry {
        Geometry::Polygon(polygon) => vec![polygon],
        Geometry::MultiPolygon(multi) => multi.0.iter().collect(),
        other => {
            return Err(RouteError::MalformedGeometry(format!(
                "region {} is a {}, expected a polygon",
                region_index,
                geometry_kind(other)
            )))
        }
    };

    let mut kept = Vec::with_capacity(members.len());
    for (member, polygon) in members.into_iter().enumerate() {
        if !has_area(polygon.exterior()) {
            debug!(
                "[RegionScorer] Region {} member {}: degenerate exterior ring dropped",
                region_index, member
            );
            continue;
        }
        let holes: Vec<LineString<f64>> = polygon
            .interiors()
            .iter()
            .filter(|ring| has_area(ring))
            .cloned()
            .collect();
        kept.push(Polygon::new(polygon.exterior().clone(), holes));
    }

    Ok((!kept.is_empty()).then(|| MultiPolygon::new(kept)))
}

/// A closed ring with at least three distinct vertices, finite coordinates and
/// non-zero area.
fn has_area(ring: &LineString<f64>) -> bool {
    ring.0.len() >= 4
        && ring.coords().all(|c| c.x.is_finite() && c.y.is_finite())
        && Polygon::new(ring.clone(), vec![]).unsigned_area() > 0.0
}

fn expand(
    region: &RegionGeometry,
    region_index: usize,
    base: MultiPolygon<f64>,
    buffer_meters: f64,
) -> Result<BufferedRegion> {
    let source_bounds = geometry_bounds(&base).ok_or_else(|| {
        RouteError::MalformedGeometry(format!("region {} has no coordinates", region_index))
    })?;

    let geometry = if buffer_meters > 0.0 {
        let distance = meters_to_degrees(buffer_meters, source_bounds.center().latitude);
        base.buffer(distance)
    } else {
        base
    };

    let bounds = geometry_bounds(&geometry).ok_or_else(|| {
        RouteError::MalformedGeometry(format!(
            "region {} is empty after buffering by {}m",
            region_index, buffer_meters
        ))
    })?;

    Ok(BufferedRegion {
        region_index,
        name: region.display_name().to_string(),
        buffer_meters,
        geometry,
        bounds,
    })
}

fn check_buffer(buffer_meters: f64) -> Result<()> {
    if !buffer_meters.is_finite() || buffer_meters < 0.0 {
        return Err(RouteError::InvalidConfig(format!(
            "buffer_meters must be a non-negative number, got {}",
            buffer_meters
        )));
    }
    Ok(())
}

// ============================================================================
// Point index
// ============================================================================

/// R-tree over track points, keyed by their position in the source sequence.
pub struct PointIndex {
    tree: RTree<GeomWithData<[f64; 2], usize>>,
}

impl PointIndex {
    pub fn new(points: &[GpsPoint]) -> Self {
        let entries = points
            .iter()
            .enumerate()
            .map(|(i, p)| GeomWithData::new(p.lon_lat(), i))
            .collect();
        Self { tree: RTree::bulk_load(entries) }
    }

    /// Source indices of the points inside `region`, ascending.
    pub fn indices_within(&self, region: &BufferedRegion) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .tree
            .locate_in_envelope(&region.envelope())
            .filter(|entry| region.contains_lon_lat(*entry.geom()))
            .map(|entry| entry.data)
            .collect();
        indices.sort_unstable();
        indices
    }

    /// Number of points inside `region`.
    pub fn count_within(&self, region: &BufferedRegion) -> usize {
        self.tree
            .locate_in_envelope(&region.envelope())
            .filter(|entry| region.contains_lon_lat(*entry.geom()))
            .count()
    }
}

// ============================================================================
// Scoring
// ============================================================================

/// A region that contains at least one track point.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionCandidate {
    /// Position of the region in the scored region set
    pub region_index: usize,
    pub name: String,
    /// Track points inside the buffered region (always >= 1)
    pub point_count: usize,
    /// `point_count` as a percentage of all extracted points, one decimal.
    /// Reporting only, never used for ranking.
    pub match_percentage: f64,
    /// The buffered region this candidate was scored against
    pub buffered: BufferedRegion,
}

/// What the scorer concluded about the region set.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionDecision {
    /// Exactly one region holds track points.
    AutoSelect(RegionCandidate),
    /// Several regions hold track points, ranked by count. The caller chooses.
    Ambiguous(Vec<RegionCandidate>),
    /// No region holds any track point, even after buffering.
    NoMatch,
}

/// Output of [`score_regions`].
#[derive(Debug, Clone, PartialEq)]
pub struct RegionScore {
    /// Number of extracted points scored
    pub total_points: usize,
    /// Buffer tolerance used, in meters
    pub buffer_meters: f64,
    pub decision: RegionDecision,
}

impl RegionScore {
    /// Ranked candidates, best first. Empty for [`RegionDecision::NoMatch`].
    pub fn candidates(&self) -> &[RegionCandidate] {
        match &self.decision {
            RegionDecision::AutoSelect(candidate) => std::slice::from_ref(candidate),
            RegionDecision::Ambiguous(candidates) => candidates,
            RegionDecision::NoMatch => &[],
        }
    }
}

/// Score every polygonal region against the track points.
///
/// Non-polygonal regions and regions without a polygon that has area are
/// skipped. Candidates are ranked by contained-point count, highest first;
/// equal counts keep their input order.
///
/// Fails with [`RouteError::EmptyTrack`] for an empty point set and
/// [`RouteError::InvalidConfig`] for a negative buffer.
///
/// # Example
/// ```
/// use auto_route::{score_regions, GpsPoint, RegionDecision, RegionGeometry};
/// use geo::{polygon, Geometry};
///
/// let square = RegionGeometry::named("Square", Geometry::Polygon(polygon![
///     (x: 0.0, y: 0.0), (x: 0.01, y: 0.0), (x: 0.01, y: 0.01), (x: 0.0, y: 0.01),
/// ]));
/// let points = vec![GpsPoint::new(0.005, 0.005), GpsPoint::new(0.5, 0.5)];
///
/// let score = score_regions(&points, &[square], 0.0).unwrap();
/// match score.decision {
///     RegionDecision::AutoSelect(c) => assert_eq!(c.point_count, 1),
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
pub fn score_regions(
    points: &[GpsPoint],
    regions: &[RegionGeometry],
    buffer_meters: f64,
) -> Result<RegionScore> {
    let index = prepare(points, buffer_meters)?;

    let mut candidates = Vec::new();
    for (i, region) in regions.iter().enumerate() {
        if let Some(candidate) = score_one(&index, points.len(), region, i, buffer_meters)? {
            candidates.push(candidate);
        }
    }

    Ok(rank(candidates, points.len(), buffer_meters))
}

/// Score regions using parallel processing.
///
/// Same result as [`score_regions`] but buffers and counts each region on the
/// rayon pool. Worth it for large ward sets.
#[cfg(feature = "parallel")]
pub fn score_regions_parallel(
    points: &[GpsPoint],
    regions: &[RegionGeometry],
    buffer_meters: f64,
) -> Result<RegionScore> {
    use rayon::prelude::*;

    let index = prepare(points, buffer_meters)?;

    let scored: Vec<Option<RegionCandidate>> = regions
        .par_iter()
        .enumerate()
        .map(|(i, region)| score_one(&index, points.len(), region, i, buffer_meters))
        .collect::<Result<_>>()?;

    Ok(rank(scored.into_iter().flatten().collect(), points.len(), buffer_meters))
}

fn prepare(points: &[GpsPoint], buffer_meters: f64) -> Result<PointIndex> {
    if points.is_empty() {
        return Err(RouteError::EmptyTrack);
    }
    check_buffer(buffer_meters)?;
    Ok(PointIndex::new(points))
}

fn score_one(
    index: &PointIndex,
    total: usize,
    region: &RegionGeometry,
    region_index: usize,
    buffer_meters: f64,
) -> Result<Option<RegionCandidate>> {
    if !region.is_polygonal() {
        debug!(
            "[RegionScorer] Skipping region {} ({}): not a polygon",
            region_index,
            geometry_kind(&region.geometry)
        );
        return Ok(None);
    }

    let Some(base) = usable_polygons(region, region_index)? else {
        debug!(
            "[RegionScorer] Skipping region {}: no polygon with area",
            region_index
        );
        return Ok(None);
    };

    let buffered = expand(region, region_index, base, buffer_meters)?;
    let point_count = index.count_within(&buffered);

    debug!(
        "[RegionScorer] Region {} '{}': {}/{} points inside (buffer {}m)",
        region_index, buffered.name, point_count, total, buffer_meters
    );

    if point_count == 0 {
        return Ok(None);
    }

    Ok(Some(RegionCandidate {
        region_index,
        name: buffered.name.clone(),
        point_count,
        match_percentage: percentage(point_count, total),
        buffered,
    }))
}

fn rank(mut candidates: Vec<RegionCandidate>, total: usize, buffer_meters: f64) -> RegionScore {
    // Stable: equal counts keep input order
    candidates.sort_by(|a, b| b.point_count.cmp(&a.point_count));

    info!(
        "[RegionScorer] {} candidate region(s) for {} points (buffer {}m)",
        candidates.len(),
        total,
        buffer_meters
    );

    let decision = match candidates.len() {
        0 => RegionDecision::NoMatch,
        1 => RegionDecision::AutoSelect(candidates.remove(0)),
        _ => RegionDecision::Ambiguous(candidates),
    };

    RegionScore { total_points: total, buffer_meters, decision }
}

/// `count / total` as a percentage rounded to one decimal.
fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 1000.0).round() / 10.0
}

// ============================================================================
// Tests
// ============================================================================
