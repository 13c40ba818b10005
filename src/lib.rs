//! dispatch-routing core
//!
//! Route-result caching and path normalization behind the dispatch map:
//! cache keys from request geometry, a size- and age-bounded persistent
//! cache, canonical paths from heterogeneous routing responses, and
//! multi-criteria batch route requests.

pub mod traits;
pub mod geo_key;
pub mod codec;
pub mod storage;
pub mod clock;
pub mod cache;
pub mod haversine;
pub mod path;
pub mod normalize;
pub mod weights;
pub mod batch;
pub mod planner;
pub mod osrm;
