use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_RADIUS_M: f64 = 1_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Opaque identity of an origin, stable for the origin's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OriginId(Uuid);

impl OriginId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OriginId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OriginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginSource {
    #[default]
    Address,
    CurrentLocation,
}

/// A named location supplied by a user. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    pub id: OriginId,
    pub name: String,
    pub coordinate: Coordinate,
    pub source: OriginSource,
}

impl Origin {
    pub fn new(name: impl Into<String>, coordinate: Coordinate, source: OriginSource) -> Self {
        Self {
            id: OriginId::new(),
            name: name.into(),
            coordinate,
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Restaurant,
    Cafe,
    Bar,
    Park,
    Other,
}

impl Category {
    /// Categories that have a backend search keyword.
    pub const SEARCHABLE: [Category; 4] = [
        Category::Restaurant,
        Category::Cafe,
        Category::Bar,
        Category::Park,
    ];

    pub fn keyword(self) -> Option<&'static str> {
        match self {
            Category::Restaurant => Some("restaurant"),
            Category::Cafe => Some("cafe"),
            Category::Bar => Some("bar"),
            Category::Park => Some("park"),
            Category::Other => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryFilter {
    #[default]
    All,
    Restaurant,
    Cafe,
    Bar,
    Park,
}

impl CategoryFilter {
    /// The single category this filter narrows to, `None` for "all".
    pub fn as_category(self) -> Option<Category> {
        match self {
            CategoryFilter::All => None,
            CategoryFilter::Restaurant => Some(Category::Restaurant),
            CategoryFilter::Cafe => Some(Category::Cafe),
            CategoryFilter::Bar => Some(Category::Bar),
            CategoryFilter::Park => Some(Category::Park),
        }
    }

    pub fn categories(self) -> Vec<Category> {
        match self.as_category() {
            Some(category) => vec![category],
            None => Category::SEARCHABLE.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    Driving,
    Walking,
}

impl TravelMode {
    pub const ALL: [TravelMode; 2] = [TravelMode::Driving, TravelMode::Walking];
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TravelTimeEntry {
    pub origin_index: usize,
    pub mode: TravelMode,
    pub minutes: f64,
}

/// Travel durations of one place, keyed by origin slot and mode.
///
/// Entries are only ever added; a missing entry means "unknown", not zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<TravelTimeEntry>", into = "Vec<TravelTimeEntry>")]
pub struct TravelTimes {
    entries: BTreeMap<(usize, TravelMode), f64>,
}

impl TravelTimes {
    pub fn get(&self, origin_index: usize, mode: TravelMode) -> Option<f64> {
        self.entries.get(&(origin_index, mode)).copied()
    }

    pub fn record(&mut self, origin_index: usize, mode: TravelMode, minutes: f64) {
        self.entries.insert((origin_index, mode), minutes);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = TravelTimeEntry> + '_ {
        self.entries
            .iter()
            .map(|(&(origin_index, mode), &minutes)| TravelTimeEntry {
                origin_index,
                mode,
                minutes,
            })
    }
}

impl From<Vec<TravelTimeEntry>> for TravelTimes {
    fn from(entries: Vec<TravelTimeEntry>) -> Self {
        let mut times = TravelTimes::default();
        for entry in entries {
            times.record(entry.origin_index, entry.mode, entry.minutes);
        }
        times
    }
}

impl From<TravelTimes> for Vec<TravelTimeEntry> {
    fn from(times: TravelTimes) -> Self {
        times.iter().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePlace {
    pub id: String,
    pub name: String,
    pub coordinate: Coordinate,
    pub category: Category,
    /// Type string as reported by the search backend.
    pub raw_category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Name of the backend that produced this place.
    pub source: String,
    pub distance_m: f64,
    #[serde(default)]
    pub travel_times: TravelTimes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParameters {
    #[serde(default = "default_radius_m")]
    pub radius_m: f64,
    #[serde(default)]
    pub category: CategoryFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl Default for SearchParameters {
    fn default() -> Self {
        Self {
            radius_m: DEFAULT_RADIUS_M,
            category: CategoryFilter::All,
            query: None,
        }
    }
}

pub fn default_radius_m() -> f64 {
    DEFAULT_RADIUS_M
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    NoOrigins,
    PartialOrigins,
    OriginsSet,
    Searching,
    Results,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginSlot {
    pub slot: usize,
    pub origin: Origin,
}

/// Everything a presentation layer needs to render the current session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub generation: u64,
    pub phase: SessionPhase,
    pub origins: Vec<OriginSlot>,
    pub midpoint: Option<Coordinate>,
    pub results: Vec<CandidatePlace>,
    pub loading: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub parameters: SearchParameters,
    pub pending_enrichment: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetOriginRequest {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub source: OriginSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeOriginRequest {
    pub address: String,
}

/// Partial update of the search parameters. An empty `query` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSearchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}
