//! Upstream route responses to canonical [`Path`]s.
//!
//! Responses arrive in several shapes: `pathPoints` at the top level,
//! nested under a wrapper object, or the routing provider's own
//! `routes[0].steps[*].path` layout. Extraction strategies are tried in
//! order and the first one that finds a point array wins; results are
//! never merged across locations.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::geo_key::Coordinate;
use crate::haversine::{self, DEFAULT_SPEED_KMH};
use crate::path::{Path, PathPoint};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Speed used to estimate time when the response has none.
    pub average_speed_kmh: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            average_speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

/// A normalized path plus what was thrown away to produce it.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPath {
    pub path: Path,
    /// Points dropped for missing or non-numeric coordinates.
    pub dropped_points: usize,
    /// Where the points were found, `None` when nothing matched.
    pub source: Option<&'static str>,
}

impl NormalizedPath {
    fn empty() -> Self {
        Self {
            path: Path::empty(),
            dropped_points: 0,
            source: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Strategy {
    TopLevel,
    Wrapped(&'static str),
    ProviderRoutes,
}

const STRATEGIES: &[Strategy] = &[
    Strategy::TopLevel,
    Strategy::Wrapped("route"),
    Strategy::Wrapped("data"),
    Strategy::Wrapped("result"),
    Strategy::ProviderRoutes,
];

/// Raw points and any explicit totals found alongside them.
struct Candidate<'a> {
    points: Vec<&'a Value>,
    distance_km: Option<f64>,
    time_minutes: Option<f64>,
}

impl Strategy {
    fn label(self) -> &'static str {
        match self {
            Strategy::TopLevel => "pathPoints",
            Strategy::Wrapped("route") => "route.pathPoints",
            Strategy::Wrapped("data") => "data.pathPoints",
            Strategy::Wrapped("result") => "result.pathPoints",
            Strategy::Wrapped(_) => "wrapped.pathPoints",
            Strategy::ProviderRoutes => "routes.steps",
        }
    }

    fn extract(self, raw: &Value) -> Option<Candidate<'_>> {
        match self {
            Strategy::TopLevel => path_points_candidate(raw, raw),
            Strategy::Wrapped(key) => path_points_candidate(raw, raw.get(key)?),
            Strategy::ProviderRoutes => provider_candidate(raw),
        }
    }
}

fn path_points_candidate<'a>(raw: &'a Value, holder: &'a Value) -> Option<Candidate<'a>> {
    let points = holder.get("pathPoints")?.as_array()?;
    Some(Candidate {
        points: points.iter().collect(),
        distance_km: explicit_total(raw, holder, "totalDistance"),
        time_minutes: explicit_total(raw, holder, "estimatedTime"),
    })
}

/// Looks at the top level, then the holder, then `route`.
fn explicit_total(raw: &Value, holder: &Value, field: &str) -> Option<f64> {
    [Some(raw), Some(holder), raw.get("route")]
        .into_iter()
        .flatten()
        .find_map(|value| non_negative(value.get(field)?))
}

/// `routes[0]` from the provider: metres and seconds.
fn provider_candidate(raw: &Value) -> Option<Candidate<'_>> {
    let route = raw.get("routes")?.as_array()?.first()?;
    let steps = route.get("steps")?.as_array()?;
    let mut points: Vec<&Value> = Vec::new();
    for step in steps {
        let Some(step_points) = step.get("path").and_then(Value::as_array) else {
            continue;
        };
        for point in step_points {
            // consecutive steps share their boundary point
            if points.last().is_some_and(|last| *last == point) {
                continue;
            }
            points.push(point);
        }
    }
    Some(Candidate {
        points,
        distance_km: route
            .get("distance")
            .and_then(non_negative)
            .map(|metres| metres / 1000.0),
        time_minutes: route
            .get("time")
            .and_then(non_negative)
            .map(|seconds| (seconds / 60.0).round()),
    })
}

fn non_negative(value: &Value) -> Option<f64> {
    value.as_f64().filter(|number| number.is_finite() && *number >= 0.0)
}

fn finite(value: Option<&Value>) -> Option<f64> {
    value?.as_f64().filter(|number| number.is_finite())
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        _ => String::new(),
    }
}

/// Accepts `{longitude, latitude, stationId?, stationName?}` or `[lon, lat]`.
fn parse_point(value: &Value) -> Option<PathPoint> {
    match value {
        Value::Object(fields) => Some(PathPoint {
            station_id: text(fields.get("stationId")),
            station_name: text(fields.get("stationName")),
            longitude: finite(fields.get("longitude"))?,
            latitude: finite(fields.get("latitude"))?,
        }),
        Value::Array(pair) if pair.len() >= 2 => Some(PathPoint {
            station_id: String::new(),
            station_name: String::new(),
            longitude: finite(pair.first())?,
            latitude: finite(pair.get(1))?,
        }),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathNormalizer {
    config: NormalizerConfig,
}

impl PathNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Never fails: anything unusable becomes an empty, well-formed path.
    pub fn normalize(&self, raw: Option<&Value>) -> NormalizedPath {
        let Some(raw) = raw.filter(|value| !value.is_null()) else {
            return NormalizedPath::empty();
        };
        let Some((strategy, candidate)) = STRATEGIES
            .iter()
            .find_map(|strategy| strategy.extract(raw).map(|found| (*strategy, found)))
        else {
            debug!("no path points found in route response");
            return NormalizedPath::empty();
        };

        let total = candidate.points.len();
        let path_points: Vec<PathPoint> = candidate
            .points
            .into_iter()
            .filter_map(parse_point)
            .collect();
        let dropped_points = total - path_points.len();
        if dropped_points > 0 {
            debug!(dropped_points, source = strategy.label(), "invalid path points dropped");
        }

        let total_distance = candidate.distance_km.unwrap_or_else(|| {
            let coordinates: Vec<Coordinate> =
                path_points.iter().map(PathPoint::coordinate).collect();
            haversine::path_length_km(&coordinates)
        });
        let estimated_time = candidate.time_minutes.unwrap_or_else(|| {
            haversine::estimate_minutes(total_distance, self.config.average_speed_kmh)
        });

        NormalizedPath {
            path: Path {
                path_points,
                total_distance,
                estimated_time,
                is_default: false,
                error: false,
            },
            dropped_points,
            source: Some(strategy.label()),
        }
    }
}

/// [`PathNormalizer::normalize`] with default settings.
pub fn normalize(raw: Option<&Value>) -> NormalizedPath {
    PathNormalizer::default().normalize(raw)
}
