//! Cache keys derived from the geographic shape of a route request.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Decimal places kept per coordinate component (~0.1 m).
const KEY_PRECISION: usize = 6;

/// A point as `(longitude, latitude)` in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinate {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.longitude.is_finite() && self.latitude.is_finite()
    }
}

impl From<(f64, f64)> for Coordinate {
    /// Interprets the tuple as `(lon, lat)`.
    fn from((longitude, latitude): (f64, f64)) -> Self {
        Self::new(longitude, latitude)
    }
}

/// Strategy the routing provider uses to pick among candidate routes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingPolicy {
    #[default]
    Fastest,
    Shortest,
    Cheapest,
    TrafficAware,
}

impl RoutingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingPolicy::Fastest => "fastest",
            RoutingPolicy::Shortest => "shortest",
            RoutingPolicy::Cheapest => "cheapest",
            RoutingPolicy::TrafficAware => "traffic_aware",
        }
    }
}

impl fmt::Display for RoutingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutingPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "fastest" => Ok(RoutingPolicy::Fastest),
            "shortest" => Ok(RoutingPolicy::Shortest),
            "cheapest" => Ok(RoutingPolicy::Cheapest),
            "traffic_aware" => Ok(RoutingPolicy::TrafficAware),
            other => Err(format!("unknown routing policy '{other}'")),
        }
    }
}

/// Key under which a routing result is cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wraps an already formatted key, e.g. one read back from storage.
    pub fn from_raw(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Builds `lon,lat|lon,lat|[lon,lat|...]|policy`.
///
/// Waypoint order and policy are part of the key. Coordinates are not
/// validated; a non-finite component simply yields a key no real route
/// will ever be stored under.
pub fn build_key(
    origin: Coordinate,
    destination: Coordinate,
    waypoints: &[Coordinate],
    policy: &RoutingPolicy,
) -> CacheKey {
    let mut parts = Vec::with_capacity(waypoints.len() + 3);
    parts.push(format_pair(origin));
    parts.push(format_pair(destination));
    parts.extend(waypoints.iter().copied().map(format_pair));
    parts.push(policy.as_str().to_string());
    CacheKey(parts.join("|"))
}

fn format_pair(coordinate: Coordinate) -> String {
    format!(
        "{},{}",
        format_component(coordinate.longitude),
        format_component(coordinate.latitude)
    )
}

fn format_component(value: f64) -> String {
    let formatted = format!("{:.*}", KEY_PRECISION, value);
    // "-0.000000" and "0.000000" are the same place
    if formatted.starts_with('-') && formatted[1..].bytes().all(|b| b == b'0' || b == b'.') {
        formatted[1..].to_string()
    } else {
        formatted
    }
}
