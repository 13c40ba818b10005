//! OSRM HTTP adapter for route geometry.
//!
//! Calls `/route/v1` and reshapes the answer into the provider layout the
//! normalizer understands: `{status, routes: [{distance, time, steps: [{path, instruction}]}]}`.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::geo_key::{Coordinate, RoutingPolicy};
use crate::traits::{RoutingError, RoutingProvider};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    fn route_url(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        waypoints: &[Coordinate],
        policy: &RoutingPolicy,
    ) -> String {
        // OSRM wants waypoints between origin and destination
        let coords = std::iter::once(origin)
            .chain(waypoints.iter().copied())
            .chain(std::iter::once(destination))
            .map(|point| format!("{:.6},{:.6}", point.longitude, point.latitude))
            .collect::<Vec<_>>()
            .join(";");

        let mut url = format!(
            "{}/route/v1/{}/{}?overview=false&steps=true&geometries=geojson",
            self.config.base_url, self.config.profile, coords
        );
        if *policy == RoutingPolicy::Cheapest {
            url.push_str("&exclude=toll");
        }
        url
    }
}

impl RoutingProvider for OsrmClient {
    fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        waypoints: &[Coordinate],
        policy: &RoutingPolicy,
    ) -> Result<Value, RoutingError> {
        let url = self.route_url(origin, destination, waypoints, policy);
        let body = self
            .client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OsrmRouteResponse>())?;

        into_provider_shape(body)
    }
}

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    #[serde(default)]
    steps: Vec<OsrmStep>,
}

#[derive(Debug, Deserialize)]
struct OsrmStep {
    geometry: OsrmGeometry,
    #[serde(default)]
    name: String,
    maneuver: OsrmManeuver,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct OsrmManeuver {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    modifier: Option<String>,
}

fn instruction(step: &OsrmStep) -> String {
    let mut parts = vec![step.maneuver.kind.as_str()];
    if let Some(modifier) = step.maneuver.modifier.as_deref() {
        parts.push(modifier);
    }
    if !step.name.is_empty() {
        parts.push("onto");
        parts.push(step.name.as_str());
    }
    parts.join(" ")
}

fn into_provider_shape(body: OsrmRouteResponse) -> Result<Value, RoutingError> {
    if body.code != "Ok" {
        return Err(RoutingError::Status(body.code));
    }
    if body.routes.is_empty() {
        return Err(RoutingError::NoRoute);
    }

    let routes: Vec<Value> = body
        .routes
        .iter()
        .map(|route| {
            let steps: Vec<Value> = route
                .legs
                .iter()
                .flat_map(|leg| leg.steps.iter())
                .map(|step| {
                    json!({
                        "path": step.geometry.coordinates,
                        "instruction": instruction(step),
                    })
                })
                .collect();
            json!({
                "distance": route.distance,
                "time": route.duration,
                "steps": steps,
            })
        })
        .collect();

    Ok(json!({ "status": body.code, "routes": routes }))
}
