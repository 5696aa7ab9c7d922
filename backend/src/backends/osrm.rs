use async_trait::async_trait;
use serde::Deserialize;

use super::{BackendError, DirectionsBackend, RouteEstimate, check_status};
use crate::models::{Coordinate, TravelMode};

/// Directions from an OSRM routing server.
#[derive(Clone)]
pub struct OsrmDirections {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    duration: f64,
}

impl OsrmDirections {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn route_url(&self, origin: Coordinate, destination: Coordinate, mode: TravelMode) -> String {
        // OSRM takes lon,lat pairs
        format!(
            "{}/route/v1/{}/{:.6},{:.6};{:.6},{:.6}",
            self.base_url,
            profile(mode),
            origin.lon,
            origin.lat,
            destination.lon,
            destination.lat
        )
    }
}

fn profile(mode: TravelMode) -> &'static str {
    match mode {
        TravelMode::Driving => "driving",
        TravelMode::Walking => "foot",
    }
}

#[async_trait]
impl DirectionsBackend for OsrmDirections {
    async fn route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TravelMode,
    ) -> Result<RouteEstimate, BackendError> {
        let url = self.route_url(origin, destination, mode);
        let response = self
            .client
            .get(&url)
            .query(&[("overview", "false")])
            .send()
            .await?;
        // OSRM reports NoRoute with a 400 and a JSON body
        if response.status().as_u16() == 400 {
            let body: OsrmResponse = response.json().await?;
            return estimate_from(body);
        }
        let body: OsrmResponse = check_status(response)?.json().await?;
        estimate_from(body)
    }
}

fn estimate_from(body: OsrmResponse) -> Result<RouteEstimate, BackendError> {
    match body.code.as_str() {
        "Ok" => body
            .routes
            .first()
            .map(|route| RouteEstimate {
                expected_duration_s: route.duration,
            })
            .ok_or(BackendError::NoRoute),
        "NoRoute" | "NoSegment" => Err(BackendError::NoRoute),
        other => Err(BackendError::Decode(format!("OSRM code {other}"))),
    }
}
