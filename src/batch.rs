//! Batch route requests built from selected orders.

use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::traits::OrderLookup;
use crate::weights::CriteriaWeights;

/// Station pair stored for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRoute {
    pub from_station_id: String,
    pub to_station_id: String,
    #[serde(default)]
    pub priority: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequestEntry {
    pub from_station_id: String,
    pub to_station_id: String,
    pub priority: i64,
}

/// Payload for the batch routing call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRouteRequest {
    pub routes: Vec<RouteRequestEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<CriteriaWeights>,
}

/// The request plus the orders that could not be resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchBuild {
    pub request: BatchRouteRequest,
    pub unresolved: Vec<String>,
}

impl BatchBuild {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

impl fmt::Display for BatchBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} routes requested", self.request.routes.len())?;
        if !self.unresolved.is_empty() {
            write!(
                f,
                ", {} orders skipped ({})",
                self.unresolved.len(),
                self.unresolved.join(", ")
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Priority for orders without one when priority ordering is off.
    pub default_priority: i64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            default_priority: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchRouteRequestBuilder<L> {
    lookup: L,
    config: BatchConfig,
    weights: Option<CriteriaWeights>,
}

impl<L: OrderLookup> BatchRouteRequestBuilder<L> {
    pub fn new(lookup: L) -> Self {
        Self::with_config(lookup, BatchConfig::default())
    }

    pub fn with_config(lookup: L, config: BatchConfig) -> Self {
        Self {
            lookup,
            config,
            weights: None,
        }
    }

    /// Attaches criteria weights to every request built afterwards.
    pub fn with_weights(mut self, weights: CriteriaWeights) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Resolves orders in parallel; the output keeps `order_ids` order.
    ///
    /// With `priority_order`, an order without an explicit priority gets
    /// `order_ids.len() - index`, so the first selected ranks highest.
    /// Unresolvable orders still consume their index.
    pub fn build(
        &self,
        order_ids: &[String],
        traffic_factor: Option<f64>,
        priority_order: bool,
    ) -> BatchBuild {
        let resolved: Vec<Option<OrderRoute>> = order_ids
            .par_iter()
            .map(|order_id| self.lookup.order_by_id(order_id))
            .collect();

        let count = order_ids.len() as i64;
        let mut routes = Vec::with_capacity(resolved.len());
        let mut unresolved = Vec::new();
        for (index, (order_id, order)) in order_ids.iter().zip(resolved).enumerate() {
            let Some(order) = order else {
                unresolved.push(order_id.clone());
                continue;
            };
            let priority = match order.priority {
                Some(explicit) => explicit,
                None if priority_order => count - index as i64,
                None => self.config.default_priority,
            };
            routes.push(RouteRequestEntry {
                from_station_id: order.from_station_id,
                to_station_id: order.to_station_id,
                priority,
            });
        }

        if !unresolved.is_empty() {
            warn!(
                skipped = unresolved.len(),
                orders = ?unresolved,
                "orders could not be resolved for batch routing"
            );
        }

        let traffic_factor = traffic_factor.filter(|factor| {
            let usable = factor.is_finite() && *factor > 0.0;
            if !usable {
                warn!(factor, "ignoring invalid traffic factor");
            }
            usable
        });

        BatchBuild {
            request: BatchRouteRequest {
                routes,
                traffic_factor,
                weights: self.weights,
            },
            unresolved,
        }
    }
}
