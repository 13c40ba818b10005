//! Test fixtures for dispatch-routing.
//!
//! Provides:
//! - Real Las Vegas / Henderson stations (from OpenStreetMap)
//! - A scripted routing provider and canned upstream responses

pub mod stations;

use std::cell::{Cell, RefCell};

use serde_json::{Value, json};

use dispatch_routing::geo_key::{Coordinate, RoutingPolicy};
use dispatch_routing::traits::{RoutingError, RoutingProvider};

pub use stations::*;

/// What the scripted provider answers with.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Fail,
}

/// Routing provider replaying a fixed reply and counting calls.
#[derive(Debug)]
pub struct ScriptedProvider {
    reply: RefCell<Reply>,
    calls: Cell<usize>,
}

impl ScriptedProvider {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply: RefCell::new(reply),
            calls: Cell::new(0),
        }
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.reply.borrow_mut() = reply;
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl RoutingProvider for &ScriptedProvider {
    fn route(
        &self,
        _origin: Coordinate,
        _destination: Coordinate,
        _waypoints: &[Coordinate],
        _policy: &RoutingPolicy,
    ) -> Result<Value, RoutingError> {
        self.calls.set(self.calls.get() + 1);
        match &*self.reply.borrow() {
            Reply::Json(value) => Ok(value.clone()),
            Reply::Fail => Err(RoutingError::Status("Timeout".to_string())),
        }
    }
}

/// Provider-shaped response covering the given stations in order.
pub fn provider_route(stations: &[Station], distance_m: f64, time_s: f64) -> Value {
    let path: Vec<[f64; 2]> = stations.iter().map(|station| [station.lng, station.lat]).collect();
    json!({
        "status": "1",
        "routes": [{
            "distance": distance_m,
            "time": time_s,
            "steps": [{"instruction": "follow the route", "path": path}]
        }]
    })
}

/// Backend-shaped response with `pathPoints` nested under `data`.
pub fn backend_route(stations: &[Station]) -> Value {
    let points: Vec<Value> = stations
        .iter()
        .map(|station| {
            json!({
                "stationId": station.id,
                "stationName": station.name,
                "longitude": station.lng,
                "latitude": station.lat,
            })
        })
        .collect();
    json!({ "data": { "pathPoints": points } })
}
