//! Route requests end to end: cache lookup, provider call, normalization
//! and placeholder synthesis.

use std::fmt;

use tracing::{debug, warn};

use crate::cache::{PutOutcome, RouteCacheStore};
use crate::codec::TextCodec;
use crate::geo_key::{CacheKey, Coordinate, RoutingPolicy, build_key};
use crate::normalize::PathNormalizer;
use crate::path::{FallbackConfig, FallbackKind, Path};
use crate::traits::{Clock, KeyValueSlot, RoutingProvider};

/// One station-to-station route request.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub from_station_id: String,
    pub to_station_id: String,
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub waypoints: Vec<Coordinate>,
    pub policy: RoutingPolicy,
}

impl RouteRequest {
    pub fn key(&self) -> CacheKey {
        build_key(self.origin, self.destination, &self.waypoints, &self.policy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSource {
    Cache,
    Provider,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRoute {
    pub path: Path,
    pub source: RouteSource,
    pub dropped_points: usize,
    /// Set when a provider result was offered to the cache.
    pub cached: Option<PutOutcome>,
}

impl fmt::Display for PlannedRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = match self.source {
            RouteSource::Cache => "cached",
            RouteSource::Provider => "live",
            RouteSource::Fallback => "fallback",
        };
        write!(f, "{origin}: {}", self.path)?;
        if self.dropped_points > 0 {
            write!(f, " ({} invalid points dropped)", self.dropped_points)?;
        }
        Ok(())
    }
}

pub struct RoutePlanner<P, S, K, C> {
    provider: P,
    cache: RouteCacheStore<S, K, C>,
    normalizer: PathNormalizer,
    fallback: FallbackConfig,
}

impl<P, S, K, C> RoutePlanner<P, S, K, C>
where
    P: RoutingProvider,
    S: KeyValueSlot,
    K: Clock,
    C: TextCodec,
{
    pub fn new(provider: P, cache: RouteCacheStore<S, K, C>) -> Self {
        Self {
            provider,
            cache,
            normalizer: PathNormalizer::default(),
            fallback: FallbackConfig::default(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: PathNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackConfig) -> Self {
        self.fallback = fallback;
        self
    }

    /// Always returns something drawable; placeholders are flagged.
    ///
    /// Provider failures are not retried. Only renderable provider results
    /// are cached, and cached payloads go through the normalizer again.
    pub fn plan(&mut self, request: &RouteRequest) -> PlannedRoute {
        let key = request.key();

        if let Some(cached) = self.cache.get(&key) {
            let normalized = self.normalizer.normalize(Some(&cached));
            if normalized.path.is_renderable() {
                return PlannedRoute {
                    path: normalized.path,
                    source: RouteSource::Cache,
                    dropped_points: normalized.dropped_points,
                    cached: None,
                };
            }
            debug!(%key, "cached route not renderable, asking provider");
        }

        let raw = match self.provider.route(
            request.origin,
            request.destination,
            &request.waypoints,
            &request.policy,
        ) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%key, error = %err, "routing call failed, using placeholder");
                return self.fallback_route(request, FallbackKind::RequestFailed);
            }
        };

        let normalized = self.normalizer.normalize(Some(&raw));
        if !normalized.path.is_renderable() {
            warn!(
                %key,
                dropped_points = normalized.dropped_points,
                "routing response unusable, using placeholder"
            );
            return self.fallback_route(request, FallbackKind::NoData);
        }

        let outcome = self.cache.put(key, raw);
        PlannedRoute {
            path: normalized.path,
            source: RouteSource::Provider,
            dropped_points: normalized.dropped_points,
            cached: Some(outcome),
        }
    }

    fn fallback_route(&self, request: &RouteRequest, kind: FallbackKind) -> PlannedRoute {
        PlannedRoute {
            path: Path::fallback(
                &request.from_station_id,
                &request.to_station_id,
                kind,
                &self.fallback,
            ),
            source: RouteSource::Fallback,
            dropped_points: 0,
            cached: None,
        }
    }

    pub fn cache(&self) -> &RouteCacheStore<S, K, C> {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut RouteCacheStore<S, K, C> {
        &mut self.cache
    }
}
