use thiserror::Error;

use crate::backends::BackendError;
use crate::geodesy::GeodesyError;

#[derive(Debug, Error)]
pub enum HalfwayError {
    #[error("could not find a location for {address:?}")]
    GeocodeFailed {
        address: String,
        #[source]
        source: BackendError,
    },
    #[error("place search for {query:?} failed: {source}")]
    SearchBackendUnavailable {
        query: String,
        #[source]
        source: BackendError,
    },
    #[error("no places found within {radius_m:.0} m of the midpoint")]
    NoResultsFound { radius_m: f64 },
    #[error("travel time unavailable: {source}")]
    DirectionsUnavailable {
        #[source]
        source: BackendError,
    },
    #[error("result belongs to superseded search generation {generation}")]
    StaleResult { generation: u64 },
    #[error("origin slot {slot} is out of range (max {max})")]
    InvalidSlot { slot: usize, max: usize },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error(transparent)]
    Geodesy(#[from] GeodesyError),
    #[error("configuration error: {0}")]
    Config(String),
}
