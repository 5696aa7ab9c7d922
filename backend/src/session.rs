//! Session orchestration: origins in, ranked meeting places out.
//!
//! Every change to the origins or search parameters starts a new generation.
//! Searches run on their own task without holding the state lock and only
//! commit if their generation is still current, so the last request always
//! wins and a dropped caller never leaves the session in `Searching`.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::aggregate::Aggregation;
use crate::backends::{DirectionsBackend, Geocoder, PlaceSearchBackend, with_timeout};
use crate::enrichment::{EnrichmentQueue, EnrichmentWorker, TravelTimeSink, TravelTimeUpdate};
use crate::error::HalfwayError;
use crate::geodesy;
use crate::models::{
    CandidatePlace, Category, CategoryFilter, Coordinate, Origin, OriginSlot, OriginSource,
    SearchParameters, SessionPhase, SessionSnapshot, UpdateSearchRequest,
};
use crate::search::{DEFAULT_PER_QUERY_LIMIT, PlaceSearchAdapter};

pub const MIN_RADIUS_M: f64 = 100.0;
/// Radius multiplier for the automatic retry and for `expand_radius`.
pub const RADIUS_GROWTH: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub max_origins: usize,
    pub default_radius_m: f64,
    pub max_radius_m: f64,
    pub per_query_limit: usize,
    pub enrichment_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_origins: 5,
            default_radius_m: shared::DEFAULT_RADIUS_M,
            max_radius_m: 5_000.0,
            per_query_limit: DEFAULT_PER_QUERY_LIMIT,
            enrichment_interval: crate::enrichment::DEFAULT_INTERVAL,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// The external services a session talks to.
#[derive(Clone)]
pub struct SessionBackends {
    pub geocoder: Arc<dyn Geocoder>,
    pub search: Arc<dyn PlaceSearchBackend>,
    pub directions: Arc<dyn DirectionsBackend>,
}

#[derive(Debug)]
struct SessionState {
    generation: u64,
    phase: SessionPhase,
    /// Indexed by slot; the slot number is the origin index for travel times.
    origins: Vec<Option<Origin>>,
    midpoint: Option<Coordinate>,
    results: Vec<CandidatePlace>,
    parameters: SearchParameters,
    message: Option<String>,
}

impl SessionState {
    fn active_origins(&self) -> Vec<(usize, Coordinate)> {
        self.origins
            .iter()
            .enumerate()
            .filter_map(|(slot, origin)| origin.as_ref().map(|o| (slot, o.coordinate)))
            .collect()
    }
}

/// Session state shared with the enrichment worker.
struct SharedState {
    inner: RwLock<SessionState>,
}

impl SharedState {
    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl TravelTimeSink for SharedState {
    fn deliver(&self, update: TravelTimeUpdate) -> bool {
        let mut state = self.write();
        if state.generation != update.generation {
            return false;
        }
        match state.results.iter_mut().find(|p| p.id == update.place_id) {
            Some(place) => {
                place
                    .travel_times
                    .record(update.origin_index, update.mode, update.minutes);
                true
            }
            None => {
                tracing::debug!("travel time for {} arrived after it left the results", update.place_id);
                false
            }
        }
    }
}

/// Everything one search needs, captured under the lock.
#[derive(Debug, Clone)]
struct SearchPlan {
    generation: u64,
    midpoint: Coordinate,
    radius_m: f64,
    categories: Vec<Category>,
    only: Option<Category>,
    query: Option<String>,
    origins: Vec<(usize, Coordinate)>,
}

struct SearchOutcome {
    places: Vec<CandidatePlace>,
    radius_m: f64,
}

fn snapshot_of(state: &SessionState, pending_enrichment: usize) -> SessionSnapshot {
    SessionSnapshot {
        generation: state.generation,
        phase: state.phase,
        origins: state
            .origins
            .iter()
            .enumerate()
            .filter_map(|(slot, origin)| {
                origin.clone().map(|origin| OriginSlot { slot, origin })
            })
            .collect(),
        midpoint: state.midpoint,
        results: state.results.clone(),
        loading: state.phase == SessionPhase::Searching,
        message: state.message.clone(),
        parameters: state.parameters.clone(),
        pending_enrichment,
    }
}

pub struct Session {
    config: SessionConfig,
    state: Arc<SharedState>,
    geocoder: Arc<dyn Geocoder>,
    search: PlaceSearchAdapter,
    enrichment: EnrichmentQueue,
}

impl Session {
    pub fn new(config: SessionConfig, backends: SessionBackends) -> Self {
        let search = PlaceSearchAdapter::new(
            backends.search,
            config.per_query_limit,
            config.request_timeout,
        );
        let enrichment = EnrichmentQueue::new(
            backends.directions,
            config.enrichment_interval,
            config.request_timeout,
        );
        let state = SessionState {
            generation: 0,
            phase: SessionPhase::NoOrigins,
            origins: vec![None; config.max_origins],
            midpoint: None,
            results: Vec::new(),
            parameters: SearchParameters {
                radius_m: config.default_radius_m,
                ..SearchParameters::default()
            },
            message: None,
        };
        Self {
            config,
            state: Arc::new(SharedState {
                inner: RwLock::new(state),
            }),
            geocoder: backends.geocoder,
            search,
            enrichment,
        }
    }

    /// Start draining the enrichment queue into this session's results.
    pub fn start_enrichment(&self) -> EnrichmentWorker {
        let sink: Arc<dyn TravelTimeSink> = self.state.clone();
        self.enrichment.spawn(Arc::downgrade(&sink))
    }

    /// Run one enrichment tick against this session's results.
    pub async fn enrich_once(&self) -> crate::enrichment::TickOutcome {
        self.enrichment.tick(self.state.as_ref()).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read();
        snapshot_of(&state, self.enrichment.pending())
    }

    fn check_slot(&self, slot: usize) -> Result<(), HalfwayError> {
        if slot >= self.config.max_origins {
            return Err(HalfwayError::InvalidSlot {
                slot,
                max: self.config.max_origins,
            });
        }
        Ok(())
    }

    pub async fn set_origin(&self, slot: usize, origin: Origin) -> Result<SessionSnapshot, HalfwayError> {
        self.check_slot(slot)?;
        if !origin.coordinate.is_valid() {
            return Err(HalfwayError::InvalidParameter(format!(
                "coordinate out of range: {:?}",
                origin.coordinate
            )));
        }
        tracing::info!("origin {slot} set to {:?} at {:?}", origin.name, origin.coordinate);
        self.state.write().origins[slot] = Some(origin);
        self.refresh().await
    }

    /// Geocode `address` and place it in `slot`. Nothing changes if it does not resolve.
    pub async fn set_origin_from_address(
        &self,
        slot: usize,
        address: &str,
    ) -> Result<SessionSnapshot, HalfwayError> {
        self.check_slot(slot)?;
        let resolved = with_timeout(self.config.request_timeout, self.geocoder.resolve(address))
            .await
            .map_err(|source| {
                tracing::warn!("geocoding {address:?} failed: {source}");
                HalfwayError::GeocodeFailed {
                    address: address.to_string(),
                    source,
                }
            })?;
        let origin = Origin::new(resolved.display_name, resolved.coordinate, OriginSource::Address);
        self.set_origin(slot, origin).await
    }

    pub async fn clear_origin(&self, slot: usize) -> Result<SessionSnapshot, HalfwayError> {
        self.check_slot(slot)?;
        tracing::info!("origin {slot} cleared");
        self.state.write().origins[slot] = None;
        self.refresh().await
    }

    pub async fn set_radius(&self, radius_m: f64) -> Result<SessionSnapshot, HalfwayError> {
        self.update_search(UpdateSearchRequest {
            radius_m: Some(radius_m),
            ..UpdateSearchRequest::default()
        })
        .await
    }

    pub async fn set_category(&self, category: CategoryFilter) -> Result<SessionSnapshot, HalfwayError> {
        self.update_search(UpdateSearchRequest {
            category: Some(category),
            ..UpdateSearchRequest::default()
        })
        .await
    }

    /// `None` or blank text goes back to category search.
    pub async fn set_query(&self, query: Option<String>) -> Result<SessionSnapshot, HalfwayError> {
        self.update_search(UpdateSearchRequest {
            query: Some(query.unwrap_or_default()),
            ..UpdateSearchRequest::default()
        })
        .await
    }

    /// Apply several parameter changes as a single new search.
    pub async fn update_search(&self, update: UpdateSearchRequest) -> Result<SessionSnapshot, HalfwayError> {
        let radius_m = update
            .radius_m
            .map(|radius| self.validate_radius(radius))
            .transpose()?;
        {
            let mut state = self.state.write();
            if let Some(radius_m) = radius_m {
                state.parameters.radius_m = radius_m;
            }
            if let Some(category) = update.category {
                state.parameters.category = category;
            }
            if let Some(query) = update.query {
                let query = query.trim();
                state.parameters.query = (!query.is_empty()).then(|| query.to_string());
            }
            tracing::info!("search parameters now {:?}", state.parameters);
        }
        self.refresh().await
    }

    /// Grow the radius after an empty result, up to the configured maximum.
    pub async fn expand_radius(&self) -> Result<SessionSnapshot, HalfwayError> {
        let current = self.state.read().parameters.radius_m;
        let expanded = (current * RADIUS_GROWTH).min(self.config.max_radius_m);
        if expanded <= current {
            return Err(HalfwayError::InvalidParameter(format!(
                "radius is already at the maximum of {:.0} m",
                self.config.max_radius_m
            )));
        }
        self.set_radius(expanded).await
    }

    fn validate_radius(&self, radius_m: f64) -> Result<f64, HalfwayError> {
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(HalfwayError::InvalidParameter(format!(
                "radius must be a positive number of meters, got {radius_m}"
            )));
        }
        Ok(radius_m.clamp(MIN_RADIUS_M, self.config.max_radius_m))
    }

    /// Start a new generation and, with two or more origins, search again.
    async fn refresh(&self) -> Result<SessionSnapshot, HalfwayError> {
        let plan = {
            let mut state = self.state.write();
            state.generation += 1;
            let generation = state.generation;
            self.enrichment.reset(generation);
            state.results.clear();
            state.message = None;

            let origins = state.active_origins();
            if origins.len() < 2 {
                state.midpoint = None;
                state.phase = if origins.is_empty() {
                    SessionPhase::NoOrigins
                } else {
                    SessionPhase::PartialOrigins
                };
                return Ok(snapshot_of(&state, self.enrichment.pending()));
            }

            let coords: Vec<Coordinate> = origins.iter().map(|(_, c)| *c).collect();
            let midpoint = geodesy::midpoint(&coords)?;
            state.midpoint = Some(midpoint);
            state.phase = SessionPhase::OriginsSet;

            let filter = state.parameters.category;
            SearchPlan {
                generation,
                midpoint,
                radius_m: state.parameters.radius_m,
                categories: filter.categories(),
                only: filter.as_category(),
                query: state.parameters.query.clone(),
                origins,
            }
        };

        if !self.mark_searching(plan.generation) {
            return Ok(self.snapshot());
        }
        let generation = plan.generation;
        let task = SearchTask {
            state: self.state.clone(),
            search: self.search.clone(),
            enrichment: self.enrichment.clone(),
            max_radius_m: self.config.max_radius_m,
        };
        // The task commits on its own; dropping this future only stops waiting for it.
        match tokio::spawn(task.run(plan)).await {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => {
                tracing::error!("search for generation {generation} aborted: {err}");
                Ok(self.abandon(generation))
            }
        }
    }

    fn mark_searching(&self, generation: u64) -> bool {
        let mut state = self.state.write();
        if state.generation != generation {
            return false;
        }
        state.phase = SessionPhase::Searching;
        true
    }

    /// Leave `Searching` for a generation whose search task died.
    fn abandon(&self, generation: u64) -> SessionSnapshot {
        let mut state = self.state.write();
        if state.generation == generation && state.phase == SessionPhase::Searching {
            state.phase = SessionPhase::Empty;
            state.message = Some("The search failed. Try again.".to_string());
        }
        snapshot_of(&state, self.enrichment.pending())
    }
}

/// One generation's search and commit, detached from the caller.
struct SearchTask {
    state: Arc<SharedState>,
    search: PlaceSearchAdapter,
    enrichment: EnrichmentQueue,
    max_radius_m: f64,
}

impl SearchTask {
    async fn run(self, plan: SearchPlan) -> SessionSnapshot {
        let outcome = self.run_search(&plan).await;
        self.commit(&plan, outcome)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state.read().generation == generation
    }

    async fn run_search(&self, plan: &SearchPlan) -> SearchOutcome {
        let places = self.search_at(plan, plan.radius_m).await;
        if !places.is_empty() {
            return SearchOutcome {
                places,
                radius_m: plan.radius_m,
            };
        }

        let enlarged = (plan.radius_m * RADIUS_GROWTH).min(self.max_radius_m);
        if enlarged <= plan.radius_m || !self.is_current(plan.generation) {
            return SearchOutcome {
                places,
                radius_m: plan.radius_m,
            };
        }
        tracing::info!(
            "no places within {:.0} m, retrying at {:.0} m",
            plan.radius_m,
            enlarged
        );
        SearchOutcome {
            places: self.search_at(plan, enlarged).await,
            radius_m: enlarged,
        }
    }

    async fn search_at(&self, plan: &SearchPlan, radius_m: f64) -> Vec<CandidatePlace> {
        let raw = self
            .search
            .search(plan.midpoint, radius_m, &plan.categories, plan.query.as_deref())
            .await;
        // Free text can match any kind of place, so the category filter only
        // narrows keyword searches.
        let only = if plan.query.is_some() { None } else { plan.only };
        Aggregation {
            midpoint: plan.midpoint,
            radius_m,
            only,
        }
        .apply(raw, self.search.backend_name())
    }

    fn commit(&self, plan: &SearchPlan, outcome: SearchOutcome) -> SessionSnapshot {
        let mut state = self.state.write();
        if state.generation != plan.generation {
            let stale = HalfwayError::StaleResult {
                generation: plan.generation,
            };
            tracing::debug!("{stale}, current is {}", state.generation);
            return snapshot_of(&state, self.enrichment.pending());
        }

        if outcome.places.is_empty() {
            let err = HalfwayError::NoResultsFound {
                radius_m: outcome.radius_m,
            };
            tracing::info!("{err}");
            state.phase = SessionPhase::Empty;
            state.message = Some(format!("{err}. Try expanding the search radius."));
            return snapshot_of(&state, self.enrichment.pending());
        }

        if outcome.radius_m > state.parameters.radius_m {
            state.parameters.radius_m = outcome.radius_m;
            state.message = Some(format!(
                "Nothing nearby, showing places within {:.0} m.",
                outcome.radius_m
            ));
        }
        let queued = self
            .enrichment
            .enqueue_for(plan.generation, &outcome.places, &plan.origins);
        tracing::info!(
            "generation {}: {} place(s) around {:?}, {} travel-time lookups queued",
            plan.generation,
            outcome.places.len(),
            plan.midpoint,
            queued
        );
        state.results = outcome.places;
        state.phase = SessionPhase::Results;
        snapshot_of(&state, self.enrichment.pending())
    }
}
