//! Point extraction: flatten a track into one ordered sequence of samples.

use log::debug;

use crate::{GpsPoint, Result, RouteError, TrackFeature, TrackGeometry};

/// Explode a track into its positional samples.
///
/// Point features contribute their position; path features contribute every
/// vertex in order. Feature order is preserved and nothing is deduplicated.
///
/// Returns [`RouteError::EmptyTrack`] when no sample can be extracted.
///
/// # Example
/// ```
/// use auto_route::{extract_points, GpsPoint, TrackFeature, TrackGeometry};
///
/// let track = TrackGeometry::new(vec![
///     TrackFeature::Point(GpsPoint::new(51.50, -0.12)),
///     TrackFeature::Path(vec![GpsPoint::new(51.51, -0.13), GpsPoint::new(51.52, -0.14)]),
/// ]);
/// let points = extract_points(&track).unwrap();
/// assert_eq!(points.len(), 3);
/// ```
pub fn extract_points(track: &TrackGeometry) -> Result<Vec<GpsPoint>> {
    let total: usize = track.features.iter().map(TrackFeature::sample_count).sum();
    let mut points = Vec::with_capacity(total);

    for feature in &track.features {
        match feature {
            TrackFeature::Point(p) => points.push(*p),
            TrackFeature::Path(vertices) => points.extend_from_slice(vertices),
        }
    }

    if points.is_empty() {
        return Err(RouteError::EmptyTrack);
    }

    debug!(
        "[Extract] {} features -> {} points",
        track.features.len(),
        points.len()
    );
    Ok(points)
}
