//! OSRM map-matching client.
//!
//! Implements [`LineMatcher`] against the OSRM `match` service:
//! `GET {base_url}/match/v1/{profile}/{lon,lat;lon,lat;...}?overview=full&geometries=geojson`
//!
//! One request per call, no retries. Every failure (HTTP status, transport,
//! undecodable body, non-`Ok` code, empty matchings) is returned as a
//! [`MatchError`] so the synthesizer can fall back to the raw line.

use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};

use crate::matcher::{LineMatcher, MatchError, MatchedLine};

/// Public demo server. Fine for light use; run your own for production.
pub const DEFAULT_OSRM_URL: &str = "https://router.project-osrm.org";

/// Connection settings for [`OsrmMatcher`].
#[derive(Debug, Clone, PartialEq)]
pub struct OsrmConfig {
    /// Server root, without trailing slash. Default: [`DEFAULT_OSRM_URL`]
    pub base_url: String,
    /// Whole-request timeout (connect + body). Default: 30 seconds
    pub timeout: Duration,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OSRM_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// API response for the match endpoint
#[derive(Debug, Deserialize)]
struct MatchApiResponse {
    code: String,
    message: Option<String>,
    #[serde(default)]
    matchings: Vec<ApiMatching>,
}

#[derive(Debug, Deserialize)]
struct ApiMatching {
    geometry: ApiGeometry,
}

#[derive(Debug, Deserialize)]
struct ApiGeometry {
    coordinates: Vec<Vec<f64>>,
}

/// Map-matching client for an OSRM server.
pub struct OsrmMatcher {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl OsrmMatcher {
    pub fn new(config: OsrmConfig) -> Result<Self, MatchError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(config.timeout)
            .build()
            .map_err(|e| MatchError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
        })
    }

    fn request_error(&self, err: reqwest::Error) -> MatchError {
        if err.is_timeout() {
            MatchError::Timeout(self.timeout)
        } else {
            MatchError::Transport(err.to_string())
        }
    }

    fn match_url(&self, coordinates: &[[f64; 2]], profile: &str) -> String {
        format!(
            "{}/match/v1/{}/{}?overview=full&geometries=geojson",
            self.base_url,
            profile,
            encode_coordinates(coordinates)
        )
    }
}

impl LineMatcher for OsrmMatcher {
    async fn match_line(
        &self,
        coordinates: &[[f64; 2]],
        profile: &str,
    ) -> Result<MatchedLine, MatchError> {
        let url = self.match_url(coordinates, profile);
        let req_start = Instant::now();

        debug!("[OsrmMatcher] Requesting match for {} coordinates", coordinates.len());

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;
        let status = resp.status();
        let headers_elapsed = req_start.elapsed();

        let bytes = resp.bytes().await.map_err(|e| self.request_error(e))?;

        // OSRM reports matching failures as 4xx with a JSON code, keep the code when present
        if !status.is_success() {
            let detail = serde_json::from_slice::<MatchApiResponse>(&bytes)
                .map(|r| r.code)
                .unwrap_or_else(|_| format!("HTTP {}", status));
            warn!("[OsrmMatcher] {} after {:?}", detail, headers_elapsed);
            return Err(MatchError::Status(detail));
        }

        let line = parse_response(&bytes)?;

        info!(
            "[OsrmMatcher] headers={:?} total={:?} body={:.1}KB segments={} points={}",
            headers_elapsed,
            req_start.elapsed(),
            bytes.len() as f64 / 1024.0,
            line.segments.len(),
            line.segments.iter().map(Vec::len).sum::<usize>()
        );

        Ok(line)
    }
}

/// `lon,lat;lon,lat;...` as OSRM expects in the path.
fn encode_coordinates(coordinates: &[[f64; 2]]) -> String {
    coordinates
        .iter()
        .map(|[lon, lat]| format!("{},{}", lon, lat))
        .collect::<Vec<_>>()
        .join(";")
}

fn parse_response(body: &[u8]) -> Result<MatchedLine, MatchError> {
    let data: MatchApiResponse = serde_json::from_slice(body)
        .map_err(|e| MatchError::Malformed(format!("JSON parse error: {}", e)))?;

    if data.code != "Ok" {
        let detail = match data.message {
            Some(message) => format!("{}: {}", data.code, message),
            None => data.code,
        };
        return Err(MatchError::Status(detail));
    }
    if data.matchings.is_empty() {
        return Err(MatchError::NoMatchings);
    }

    let mut segments = Vec::with_capacity(data.matchings.len());
    for (i, matching) in data.matchings.into_iter().enumerate() {
        let coords = matching
            .geometry
            .coordinates
            .into_iter()
            .map(|c| match c.as_slice() {
                [lon, lat, ..] => Ok([*lon, *lat]),
                _ => Err(MatchError::Malformed(format!(
                    "matching {} has a coordinate with {} value(s)",
                    i,
                    c.len()
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        segments.push(coords);
    }

    Ok(MatchedLine::new(segments))
}
