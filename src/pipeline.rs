//! End-to-end flow: extract → score → select → synthesize.
//!
//! [`AutoRouter::analyze`] finishes the route when exactly one region matches.
//! When several do, it returns [`Analysis::NeedsSelection`] and does nothing more
//! until the host hands one candidate back to [`AutoRouter::generate_for_candidate`].

use log::info;

use crate::extract::extract_points;
use crate::matcher::{LineMatcher, NoNetwork};
use crate::regions::{score_regions, BufferedRegion, RegionCandidate, RegionDecision};
use crate::route::{synthesize, GeneratedRoute};
use crate::{GpsPoint, RegionGeometry, Result, RouteConfig, RouteError, TrackGeometry};

/// Result of [`AutoRouter::analyze`].
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    /// A single region matched and its route was generated.
    Generated(GeneratedRoute),
    /// Several regions matched; the caller must choose one.
    NeedsSelection(Selection),
}

/// Everything needed to finish a run once the caller has picked a region.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// All points extracted from the track, in source order
    pub points: Vec<GpsPoint>,
    /// Matching regions, most points first
    pub candidates: Vec<RegionCandidate>,
}

impl Selection {
    /// Candidate by display name (first match in rank order).
    pub fn find(&self, name: &str) -> Option<&RegionCandidate> {
        self.candidates.iter().find(|c| c.name == name)
    }
}

/// Runs the whole pipeline with one configuration and one matching service.
pub struct AutoRouter<M = NoNetwork> {
    config: RouteConfig,
    matcher: M,
}

impl AutoRouter<NoNetwork> {
    /// A router without a matching service. Snapping, if enabled, always falls back.
    pub fn new(config: RouteConfig) -> Result<Self> {
        Self::with_matcher(config, NoNetwork)
    }
}

impl<M: LineMatcher> AutoRouter<M> {
    pub fn with_matcher(config: RouteConfig, matcher: M) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, matcher })
    }

    pub fn matcher(&self) -> &M {
        &self.matcher
    }

    /// Extract the track, score the regions and, when the choice is unambiguous,
    /// generate the route.
    ///
    /// Fails with [`RouteError::EmptyTrack`] before any scoring and with
    /// [`RouteError::NoMatch`] when no region holds a track point.
    pub async fn analyze(
        &self,
        track: &TrackGeometry,
        regions: &[RegionGeometry],
    ) -> Result<Analysis> {
        let points = extract_points(track)?;
        info!(
            "[AutoRouter] Extracted {} points from {} features, scoring {} regions",
            points.len(),
            track.len(),
            regions.len()
        );

        let score = score_regions(&points, regions, self.config.buffer_meters)?;
        match score.decision {
            RegionDecision::NoMatch => Err(RouteError::NoMatch {
                buffer_meters: self.config.buffer_meters,
            }),
            RegionDecision::AutoSelect(candidate) => {
                let generated = self.generate(&points, &candidate.buffered).await?;
                Ok(Analysis::Generated(generated))
            }
            RegionDecision::Ambiguous(candidates) => {
                info!(
                    "[AutoRouter] {} regions match, waiting for a selection",
                    candidates.len()
                );
                Ok(Analysis::NeedsSelection(Selection { points, candidates }))
            }
        }
    }

    /// Finish a run with the caller's chosen candidate.
    pub async fn generate_for_candidate(
        &self,
        selection: &Selection,
        candidate: &RegionCandidate,
    ) -> Result<GeneratedRoute> {
        self.generate(&selection.points, &candidate.buffered).await
    }

    /// Synthesize a route for any buffered region over the given points.
    pub async fn generate(
        &self,
        points: &[GpsPoint],
        region: &BufferedRegion,
    ) -> Result<GeneratedRoute> {
        synthesize(region, points, &self.config, &self.matcher).await
    }
}
