//! Contract for external line-matching (snap-to-road) services.
//!
//! A [`LineMatcher`] takes an ordered list of `[longitude, latitude]` pairs and a
//! travel-profile hint and answers with one or more matched segments. Every failure
//! is a [`MatchError`]; the route synthesizer recovers from all of them by falling
//! back to the raw line, so implementations never need to retry.

use std::future::Future;
use std::time::Duration;

/// Why a matching request produced no usable line.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatchError {
    /// The service answered with a non-success status or result code.
    #[error("Matching service returned {0}")]
    Status(String),

    /// The request never completed (connection, TLS, body download).
    #[error("Request error: {0}")]
    Transport(String),

    /// The response could not be understood.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// No response within the configured bound.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Success status but no matched segment.
    #[error("No matchings returned")]
    NoMatchings,

    /// No service configured.
    #[error("No matching service available")]
    Unavailable,
}

/// Matched segments in response order, each a run of `[lon, lat]` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchedLine {
    pub segments: Vec<Vec<[f64; 2]>>,
}

impl MatchedLine {
    pub fn new(segments: Vec<Vec<[f64; 2]>>) -> Self {
        Self { segments }
    }

    /// All segments concatenated in order. Boundary points shared by consecutive
    /// segments are kept twice.
    pub fn merged(&self) -> Vec<[f64; 2]> {
        self.segments.iter().flatten().copied().collect()
    }
}

/// A remote service that aligns a raw line to a road or path network.
///
/// Futures must be `Send` so several syntheses can run on a multi-threaded runtime.
pub trait LineMatcher {
    fn match_line(
        &self,
        coordinates: &[[f64; 2]],
        profile: &str,
    ) -> impl Future<Output = Result<MatchedLine, MatchError>> + Send;
}

/// A matcher for hosts without network access. Every request fails with
/// [`MatchError::Unavailable`], so snapping always falls back to the raw line.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNetwork;

impl LineMatcher for NoNetwork {
    async fn match_line(
        &self,
        _coordinates: &[[f64; 2]],
        _profile: &str,
    ) -> Result<MatchedLine, MatchError> {
        Err(MatchError::Unavailable)
    }
}

/// Keep every Nth item, N = ceil(len / limit), so at most `limit` items remain.
///
/// Order is preserved and the first item is always kept. A `limit` of zero
/// yields nothing.
///
/// ```
/// use auto_route::downsample;
///
/// let items: Vec<u32> = (0..200).collect();
/// let sampled = downsample(&items, 90);
/// assert_eq!(sampled.len(), 67); // step 3
/// assert_eq!(&sampled[..3], &[0, 3, 6]);
/// ```
pub fn downsample<T: Copy>(items: &[T], limit: usize) -> Vec<T> {
    if limit == 0 {
        return Vec::new();
    }
    let step = items.len().div_ceil(limit).max(1);
    items.iter().step_by(step).copied().collect()
}
