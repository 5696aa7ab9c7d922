#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use halfway::backends::{
    BackendError, DirectionsBackend, GeocodedAddress, Geocoder, PlaceSearchBackend, RawPlace,
    RouteEstimate,
};
use halfway::geodesy::{Region, distance};
use halfway::models::{Coordinate, Origin, OriginSource, TravelMode};
use halfway::session::{Session, SessionBackends, SessionConfig};
use tokio::sync::oneshot;

pub const WESTMINSTER: Coordinate = Coordinate {
    lat: 51.5007,
    lon: -0.1246,
};
pub const COVENT_GARDEN: Coordinate = Coordinate {
    lat: 51.5155,
    lon: -0.1419,
};
pub const MIDPOINT: Coordinate = Coordinate {
    lat: 51.5081,
    lon: -0.13325,
};

/// Offset from the test midpoint by roughly `north_m` meters.
pub fn north_of_midpoint(north_m: f64) -> Coordinate {
    Coordinate {
        lat: MIDPOINT.lat + north_m / 111_195.0,
        lon: MIDPOINT.lon,
    }
}

pub fn raw_place(id: &str, category: &str, coordinate: Coordinate) -> RawPlace {
    RawPlace {
        id: id.to_string(),
        name: format!("{category} {id}"),
        category: category.to_string(),
        coordinate,
        address: None,
    }
}

pub fn origin(name: &str, coordinate: Coordinate) -> Origin {
    Origin::new(name, coordinate, OriginSource::Address)
}

#[derive(Default)]
pub struct FakeGeocoder {
    known: HashMap<String, Coordinate>,
}

impl FakeGeocoder {
    pub fn with(mut self, address: &str, coordinate: Coordinate) -> Self {
        self.known.insert(address.to_string(), coordinate);
        self
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn resolve(&self, address: &str) -> Result<GeocodedAddress, BackendError> {
        self.known
            .get(address)
            .map(|coordinate| GeocodedAddress {
                coordinate: *coordinate,
                display_name: address.to_string(),
            })
            .ok_or(BackendError::NotFound)
    }
}

/// Serves canned places per query, honouring the region like a real backend.
#[derive(Default)]
pub struct FakeSearch {
    places: HashMap<String, Vec<RawPlace>>,
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, f64)>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeSearch {
    pub fn with(mut self, query: &str, places: Vec<RawPlace>) -> Self {
        self.places.insert(query.to_string(), places);
        self
    }

    pub fn failing(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    /// The first search call blocks until the returned sender fires.
    pub fn gated(self) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx);
        (self, tx)
    }

    pub fn calls(&self) -> Vec<(String, f64)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlaceSearchBackend for FakeSearch {
    fn name(&self) -> &str {
        "fake"
    }

    async fn search(
        &self,
        region: Region,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RawPlace>, BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), region.radius_m));
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.failing.contains(query) {
            return Err(BackendError::Status(503));
        }
        Ok(self
            .places
            .get(query)
            .map(|places| {
                places
                    .iter()
                    .filter(|p| distance(region.center, p.coordinate) <= region.radius_m)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Driving takes 4 minutes, walking 15; destinations listed in `failing` have no route.
#[derive(Default)]
pub struct FakeDirections {
    calls: AtomicUsize,
    failing: Vec<Coordinate>,
}

impl FakeDirections {
    pub fn failing_for(mut self, destination: Coordinate) -> Self {
        self.failing.push(destination);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectionsBackend for FakeDirections {
    async fn route(
        &self,
        _origin: Coordinate,
        destination: Coordinate,
        mode: TravelMode,
    ) -> Result<RouteEstimate, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&destination) {
            return Err(BackendError::NoRoute);
        }
        let minutes = match mode {
            TravelMode::Driving => 4.0,
            TravelMode::Walking => 15.0,
        };
        Ok(RouteEstimate {
            expected_duration_s: minutes * 60.0,
        })
    }
}

pub struct Harness {
    pub session: Arc<Session>,
    pub search: Arc<FakeSearch>,
    pub directions: Arc<FakeDirections>,
}

pub fn harness(search: FakeSearch) -> Harness {
    harness_with(search, FakeDirections::default(), FakeGeocoder::default())
}

pub fn harness_with(search: FakeSearch, directions: FakeDirections, geocoder: FakeGeocoder) -> Harness {
    let search = Arc::new(search);
    let directions = Arc::new(directions);
    let session = Session::new(
        SessionConfig {
            request_timeout: Duration::from_secs(10),
            ..SessionConfig::default()
        },
        SessionBackends {
            geocoder: Arc::new(geocoder),
            search: search.clone(),
            directions: directions.clone(),
        },
    );
    Harness {
        session: Arc::new(session),
        search,
        directions,
    }
}
