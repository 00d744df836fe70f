//! Integration tests for the public pipeline API.
//!
//! Run with: cargo test --test pipeline

use auto_route::{
    buffer_region, extract_points, score_regions, synthesize, synthesize_direct, Analysis,
    AutoRouter, GpsPoint, LineMatcher, MatchError, MatchedLine, RegionDecision, RegionGeometry,
    RouteConfig, RouteError, RouteSource, TrackFeature, TrackGeometry,
};
use geo::{polygon, Geometry};
use std::sync::atomic::{AtomicUsize, Ordering};

// Ward square in London: lng -0.13..-0.12, lat 51.50..51.51
const MIN_LNG: f64 = -0.13;
const MAX_LNG: f64 = -0.12;
const MIN_LAT: f64 = 51.50;
const MAX_LAT: f64 = 51.51;

fn ward(name: &str, lng_offset: f64) -> RegionGeometry {
    RegionGeometry::named(
        name,
        Geometry::Polygon(polygon![
            (x: MIN_LNG + lng_offset, y: MIN_LAT),
            (x: MAX_LNG + lng_offset, y: MIN_LAT),
            (x: MAX_LNG + lng_offset, y: MAX_LAT),
            (x: MIN_LNG + lng_offset, y: MAX_LAT),
        ]),
    )
}

/// Ten point features looping around the ward, ~20-30m outside its edge.
fn loop_outside_ward() -> TrackGeometry {
    let lo_lng = MIN_LNG - 0.0003;
    let hi_lng = MAX_LNG + 0.0003;
    let lo_lat = MIN_LAT - 0.0002;
    let hi_lat = MAX_LAT + 0.0002;
    let mid_lng = (MIN_LNG + MAX_LNG) / 2.0;
    let mid_lat = (MIN_LAT + MAX_LAT) / 2.0;

    [
        (lo_lat, lo_lng),
        (lo_lat, MIN_LNG + 0.0025),
        (lo_lat, mid_lng),
        (lo_lat, hi_lng),
        (mid_lat, hi_lng),
        (hi_lat, hi_lng),
        (hi_lat, mid_lng),
        (hi_lat, MIN_LNG + 0.0025),
        (hi_lat, lo_lng),
        (mid_lat, lo_lng),
    ]
    .into_iter()
    .map(|(lat, lng)| TrackFeature::Point(GpsPoint::new(lat, lng)))
    .collect()
}

/// A drive through the middle of the ward, `n` fixes.
fn drive_through(n: usize) -> Vec<GpsPoint> {
    (0..n)
        .map(|i| {
            let t = i as f64 / n as f64;
            GpsPoint::new(MIN_LAT + 0.001 + 0.008 * t, MIN_LNG + 0.001 + 0.008 * t * t)
        })
        .collect()
}

/// Counts requests and answers with a fixed result.
struct CountingMatcher {
    calls: AtomicUsize,
    largest_request: AtomicUsize,
    answer: Result<MatchedLine, MatchError>,
}

impl CountingMatcher {
    fn new(answer: Result<MatchedLine, MatchError>) -> Self {
        Self { calls: AtomicUsize::new(0), largest_request: AtomicUsize::new(0), answer }
    }
}

impl LineMatcher for CountingMatcher {
    async fn match_line(
        &self,
        coordinates: &[[f64; 2]],
        _profile: &str,
    ) -> Result<MatchedLine, MatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.largest_request.fetch_max(coordinates.len(), Ordering::SeqCst);
        self.answer.clone()
    }
}

#[test]
fn test_buffer_turns_no_match_into_auto_select() {
    let points = extract_points(&loop_outside_ward()).unwrap();
    assert_eq!(points.len(), 10);
    let regions = vec![ward("Ward 9", 0.0)];

    let tight = score_regions(&points, &regions, 0.0).unwrap();
    assert_eq!(tight.decision, RegionDecision::NoMatch);

    let loose = score_regions(&points, &regions, 50.0).unwrap();
    match loose.decision {
        RegionDecision::AutoSelect(candidate) => {
            assert_eq!(candidate.name, "Ward 9");
            assert_eq!(candidate.point_count, 10);
            assert_eq!(candidate.match_percentage, 100.0);
            assert_eq!(candidate.buffered.buffer_meters, 50.0);
        }
        other => panic!("expected AutoSelect, got {:?}", other),
    }
}

#[tokio::test]
async fn test_router_reports_no_match_with_tight_buffer() {
    let regions = vec![ward("Ward 9", 0.0)];
    let tight = AutoRouter::new(RouteConfig { buffer_meters: 0.0, ..RouteConfig::default() }).unwrap();

    match tight.analyze(&loop_outside_ward(), &regions).await {
        Err(RouteError::NoMatch { buffer_meters }) => assert_eq!(buffer_meters, 0.0),
        other => panic!("expected NoMatch, got {:?}", other),
    }

    let loose = AutoRouter::new(RouteConfig { buffer_meters: 50.0, ..RouteConfig::default() }).unwrap();
    assert!(matches!(
        loose.analyze(&loop_outside_ward(), &regions).await,
        Ok(Analysis::Generated(_))
    ));
}

#[test]
fn test_direct_route_identity_without_smoothing() {
    let points = drive_through(40);
    let region = buffer_region(&ward("Ward 9", 0.0), 0, 20.0).unwrap();
    let config = RouteConfig { smoothing_tolerance: 0.0, ..RouteConfig::default() };

    let generated = synthesize_direct(&region, &points, &config).unwrap();
    assert_eq!(generated.route.points.len(), generated.stats.filtered_point_count);
    assert_eq!(generated.route.points, points);
}

#[test]
fn test_smoothing_reduces_vertices_and_keeps_endpoints() {
    let points = drive_through(40);
    let region = buffer_region(&ward("Ward 9", 0.0), 0, 20.0).unwrap();

    let generated = synthesize_direct(&region, &points, &RouteConfig::default()).unwrap();
    let route = &generated.route.points;
    assert!(route.len() < points.len());
    assert_eq!(route.first(), points.first());
    assert_eq!(route.last(), points.last());
}

#[tokio::test]
async fn test_snap_sends_bounded_request_and_uses_match() {
    let matcher = CountingMatcher::new(Ok(MatchedLine::new(vec![
        vec![[-0.129, 51.501], [-0.125, 51.505]],
        vec![[-0.125, 51.505], [-0.122, 51.508]],
    ])));
    let points = drive_through(1_000);
    let region = buffer_region(&ward("Ward 9", 0.0), 0, 20.0).unwrap();
    let config = RouteConfig { snap_to_network: true, ..RouteConfig::default() };

    let generated = synthesize(&region, &points, &config, &matcher).await.unwrap();

    assert_eq!(matcher.calls.load(Ordering::SeqCst), 1);
    assert!(matcher.largest_request.load(Ordering::SeqCst) <= 90);
    assert_eq!(generated.route.source, RouteSource::Snapped { segments: 2 });
    assert_eq!(generated.route.points.len(), 4);
    assert_eq!(generated.stats.filtered_point_count, 1_000);
}

#[tokio::test]
async fn test_snap_failure_is_not_fatal() {
    let matcher = CountingMatcher::new(Err(MatchError::Transport("connection refused".to_string())));
    let points = drive_through(300);
    let region = buffer_region(&ward("Ward 9", 0.0), 0, 20.0).unwrap();
    let config = RouteConfig { snap_to_network: true, ..RouteConfig::default() };

    let generated = synthesize(&region, &points, &config, &matcher).await.unwrap();

    // One attempt, no retry, then the full unsmoothed set
    assert_eq!(matcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(matcher.largest_request.load(Ordering::SeqCst), 75);
    assert_eq!(generated.route.points, points);
    assert!(matches!(generated.warning(), Some(MatchError::Transport(_))));
}

#[tokio::test]
async fn test_disambiguation_and_concurrent_generation() {
    // Same drive shifted into an eastern ward, plus a longer western one
    let west = drive_through(30);
    let east: Vec<GpsPoint> = drive_through(12)
        .into_iter()
        .map(|p| GpsPoint::new(p.latitude, p.longitude + 0.02))
        .collect();
    let track = TrackGeometry::new(vec![TrackFeature::Path(west), TrackFeature::Path(east)]);
    let regions = vec![ward("East", 0.02), ward("West", 0.0), ward("Nowhere", 1.0)];

    let router = AutoRouter::with_matcher(
        RouteConfig { smoothing_tolerance: 0.0, ..RouteConfig::default() },
        CountingMatcher::new(Err(MatchError::Unavailable)),
    )
    .unwrap();

    let selection = match router.analyze(&track, &regions).await.unwrap() {
        Analysis::NeedsSelection(selection) => selection,
        other => panic!("expected NeedsSelection, got {:?}", other),
    };
    let names: Vec<&str> = selection.candidates.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["West", "East"]);
    assert_eq!(selection.candidates[0].match_percentage, 71.4);

    let (west_route, east_route) = tokio::join!(
        router.generate_for_candidate(&selection, &selection.candidates[0]),
        router.generate_for_candidate(&selection, &selection.candidates[1]),
    );
    let west_route = west_route.unwrap();
    let east_route = east_route.unwrap();

    assert_eq!(west_route.stats.filtered_point_count, 30);
    assert_eq!(east_route.stats.filtered_point_count, 12);
    assert_eq!(west_route.stats.original_point_count, 42);
    assert_eq!(east_route.route.name, "Route - East");
    assert_eq!(router.matcher().calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_selected_region_is_refiltered_with_its_own_buffer() {
    // Candidate scored with a 50m buffer, but the host hands back a zero-buffer region
    let track = loop_outside_ward();
    let points = extract_points(&track).unwrap();
    let matcher = CountingMatcher::new(Err(MatchError::Unavailable));
    let config = RouteConfig::default();

    let unbuffered = buffer_region(&ward("Ward 9", 0.0), 0, 0.0).unwrap();
    let result = synthesize(&unbuffered, &points, &config, &matcher).await;
    assert!(matches!(result, Err(RouteError::InsufficientPoints { found: 0, .. })));
}
