//! Canonical path representation handed to the path-rendering service.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geo_key::Coordinate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathPoint {
    #[serde(default)]
    pub station_id: String,
    #[serde(default)]
    pub station_name: String,
    pub longitude: f64,
    pub latitude: f64,
}

impl PathPoint {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.longitude, self.latitude)
    }
}

/// Ordered route geometry with distance in km and time in minutes.
///
/// `is_default` marks a synthesized placeholder, `error` one synthesized
/// because the routing call failed. Neither is a real route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Path {
    pub path_points: Vec<PathPoint>,
    pub total_distance: f64,
    pub estimated_time: f64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub error: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Path {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Two or more points; anything shorter cannot be drawn as a route.
    pub fn is_renderable(&self) -> bool {
        self.path_points.len() >= 2
    }

    /// True only for provider-backed data.
    pub fn is_authoritative(&self) -> bool {
        !self.is_default && !self.error
    }

    /// Distance rounded to one decimal place for display.
    pub fn display_distance_km(&self) -> f64 {
        (self.total_distance * 10.0).round() / 10.0
    }

    /// Straight-line placeholder between two stations.
    pub fn fallback(
        from_station_id: &str,
        to_station_id: &str,
        kind: FallbackKind,
        config: &FallbackConfig,
    ) -> Self {
        let from = config.anchor;
        let to = Coordinate::new(
            config.anchor.longitude + config.offset.longitude,
            config.anchor.latitude + config.offset.latitude,
        );
        Self {
            path_points: vec![
                PathPoint {
                    station_id: from_station_id.to_string(),
                    station_name: format!("Station {from_station_id}"),
                    longitude: from.longitude,
                    latitude: from.latitude,
                },
                PathPoint {
                    station_id: to_station_id.to_string(),
                    station_name: format!("Station {to_station_id}"),
                    longitude: to.longitude,
                    latitude: to.latitude,
                },
            ],
            total_distance: config.distance_km,
            estimated_time: config.time_minutes,
            is_default: kind == FallbackKind::NoData,
            error: kind == FallbackKind::RequestFailed,
        }
    }

    /// Human-readable description, surfacing placeholder routes.
    pub fn status(&self) -> String {
        if self.error {
            "routing failed; showing a straight-line placeholder".to_string()
        } else if self.is_default {
            "no route data; showing a straight-line placeholder".to_string()
        } else if !self.is_renderable() {
            "no drawable route".to_string()
        } else {
            format!(
                "{} points, {:.1} km, {} min",
                self.path_points.len(),
                self.display_distance_km(),
                self.estimated_time
            )
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.status())
    }
}

/// Why a placeholder path was synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKind {
    /// The provider answered but nothing usable could be extracted.
    NoData,
    /// The provider call itself failed.
    RequestFailed,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Where the origin placeholder point sits.
    pub anchor: Coordinate,
    /// Destination placeholder = anchor + offset.
    pub offset: Coordinate,
    pub distance_km: f64,
    pub time_minutes: f64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            anchor: Coordinate::new(116.397428, 39.90923),
            offset: Coordinate::new(0.01, 0.01),
            distance_km: 5.0,
            time_minutes: 15.0,
        }
    }
}
