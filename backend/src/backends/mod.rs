//! Ports to the external services the meeting-point pipeline depends on.
//!
//! The orchestrator only ever sees these traits; HTTP adapters for public
//! OpenStreetMap services live in the submodules and tests plug in fakes.

pub mod cached;
pub mod nominatim;
pub mod osrm;
pub mod overpass;

use std::time::Duration;

use async_trait::async_trait;

use crate::geodesy::Region;
use crate::models::{Coordinate, TravelMode};

pub use cached::CachedGeocoder;
pub use nominatim::NominatimGeocoder;
pub use osrm::OsrmDirections;
pub use overpass::OverpassSearch;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend responded with status {0}")]
    Status(u16),
    #[error("unexpected backend payload: {0}")]
    Decode(String),
    #[error("no match found")]
    NotFound,
    #[error("no route between the given points")]
    NoRoute,
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedAddress {
    pub coordinate: Coordinate,
    pub display_name: String,
}

/// A place as reported by a search backend, before aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPlace {
    pub id: String,
    pub name: String,
    /// Backend type string, e.g. `"fast_food_restaurant"` or `"amenity=cafe"`.
    pub category: String,
    pub coordinate: Coordinate,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteEstimate {
    pub expected_duration_s: f64,
}

impl RouteEstimate {
    pub fn minutes(&self) -> f64 {
        self.expected_duration_s / 60.0
    }
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve free text to a coordinate; `BackendError::NotFound` when nothing matches.
    async fn resolve(&self, address: &str) -> Result<GeocodedAddress, BackendError>;
}

#[async_trait]
pub trait PlaceSearchBackend: Send + Sync {
    /// Short name recorded on every candidate this backend produces.
    fn name(&self) -> &str;

    /// Search `region` for places matching `query`, returning at most `limit`.
    async fn search(
        &self,
        region: Region,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RawPlace>, BackendError>;
}

#[async_trait]
pub trait DirectionsBackend: Send + Sync {
    async fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TravelMode,
    ) -> Result<RouteEstimate, BackendError>;
}

/// Run a backend call under `timeout`, mapping expiry to `BackendError::Timeout`.
pub async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T, BackendError>
where
    F: std::future::Future<Output = Result<T, BackendError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout(timeout)),
    }
}

pub(crate) fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(BackendError::Status(status.as_u16()))
    }
}
