use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::backends::{PlaceSearchBackend, RawPlace, with_timeout};
use crate::error::HalfwayError;
use crate::geodesy::Region;
use crate::models::{Category, Coordinate};

/// Backends under-fill small regions, so queries cover twice the requested radius.
pub const REGION_FACTOR: f64 = 2.0;
pub const DEFAULT_PER_QUERY_LIMIT: usize = 5;

/// Fans one query per category (or one free-text query) out to a search backend.
#[derive(Clone)]
pub struct PlaceSearchAdapter {
    backend: Arc<dyn PlaceSearchBackend>,
    per_query_limit: usize,
    timeout: Duration,
}

impl PlaceSearchAdapter {
    pub fn new(backend: Arc<dyn PlaceSearchBackend>, per_query_limit: usize, timeout: Duration) -> Self {
        Self {
            backend,
            per_query_limit,
            timeout,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Run all queries concurrently and concatenate what succeeded, in query order.
    ///
    /// A failed or timed-out query contributes nothing; it never fails the search.
    pub async fn search(
        &self,
        center: Coordinate,
        radius_m: f64,
        categories: &[Category],
        free_text: Option<&str>,
    ) -> Vec<RawPlace> {
        let region = Region::new(center, radius_m).scaled(REGION_FACTOR);
        let queries = build_queries(categories, free_text);

        let pending = queries.iter().map(|query| async move {
            let result = with_timeout(
                self.timeout,
                self.backend.search(region, query, self.per_query_limit),
            )
            .await;
            (query, result)
        });

        let mut places = Vec::new();
        for (query, result) in join_all(pending).await {
            match result {
                Ok(mut found) => {
                    found.truncate(self.per_query_limit);
                    tracing::debug!("query {query:?} returned {} place(s)", found.len());
                    places.extend(found);
                }
                Err(source) => {
                    let err = HalfwayError::SearchBackendUnavailable {
                        query: query.clone(),
                        source,
                    };
                    tracing::warn!("{err}");
                }
            }
        }
        places
    }
}

/// One query per searchable category, or the free text alone when present.
pub fn build_queries(categories: &[Category], free_text: Option<&str>) -> Vec<String> {
    if let Some(text) = free_text.map(str::trim).filter(|t| !t.is_empty()) {
        return vec![text.to_string()];
    }
    let mut queries: Vec<String> = Vec::with_capacity(categories.len());
    for keyword in categories.iter().filter_map(|c| c.keyword()) {
        if !queries.iter().any(|q| q == keyword) {
            queries.push(keyword.to_string());
        }
    }
    queries
}
