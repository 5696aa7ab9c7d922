use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::{BackendError, PlaceSearchBackend, RawPlace, check_status};
use crate::geodesy::Region;
use crate::models::Coordinate;

/// Tag keys inspected, in order, to describe what kind of place an element is.
const TYPE_TAG_KEYS: [&str; 4] = ["amenity", "leisure", "shop", "tourism"];

/// Place search over the OpenStreetMap Overpass API.
#[derive(Clone)]
pub struct OverpassSearch {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(rename = "type")]
    kind: String,
    id: u64,
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<OverpassCenter>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct OverpassCenter {
    lat: f64,
    lon: f64,
}

impl OverpassSearch {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl PlaceSearchBackend for OverpassSearch {
    fn name(&self) -> &str {
        "overpass"
    }

    async fn search(
        &self,
        region: Region,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RawPlace>, BackendError> {
        let ql = build_query(region, query, limit);
        tracing::debug!("overpass query: {ql}");
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("data", ql.as_str())])
            .send()
            .await?;
        let body: OverpassResponse = check_status(response)?.json().await?;
        Ok(into_places(body, limit))
    }
}

/// Tag filter for a category keyword, or a case-insensitive name match for free text.
fn tag_filter(query: &str) -> String {
    match query.trim().to_lowercase().as_str() {
        "restaurant" => r#"["amenity"~"^(restaurant|fast_food|food_court)$"]"#.to_string(),
        "cafe" => r#"["amenity"="cafe"]"#.to_string(),
        "bar" => r#"["amenity"~"^(bar|pub|nightclub)$"]"#.to_string(),
        "park" => r#"["leisure"~"^(park|garden)$"]"#.to_string(),
        _ => format!(r#"["name"~"{}",i]"#, escape_regex(query.trim())),
    }
}

fn escape_regex(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if "\\^$.|?*+()[]{}\"".contains(ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn build_query(region: Region, query: &str, limit: usize) -> String {
    let filter = tag_filter(query);
    let around = format!(
        "(around:{:.0},{:.6},{:.6})",
        region.radius_m, region.center.lat, region.center.lon
    );
    format!(
        "[out:json][timeout:10];(node{filter}{around};way{filter}{around};);out center {limit};"
    )
}

fn into_places(body: OverpassResponse, limit: usize) -> Vec<RawPlace> {
    body.elements
        .into_iter()
        .filter_map(element_to_place)
        .take(limit)
        .collect()
}

fn element_to_place(element: OverpassElement) -> Option<RawPlace> {
    let coordinate = match (element.lat, element.lon, &element.center) {
        (Some(lat), Some(lon), _) => Coordinate { lat, lon },
        (_, _, Some(center)) => Coordinate {
            lat: center.lat,
            lon: center.lon,
        },
        _ => return None,
    };
    // Unnamed features are not useful meeting places.
    let name = element.tags.get("name")?.clone();
    let category = TYPE_TAG_KEYS
        .iter()
        .find_map(|key| element.tags.get(*key).map(|value| format!("{key}={value}")))
        .unwrap_or_default();
    let address = match (
        element.tags.get("addr:housenumber"),
        element.tags.get("addr:street"),
    ) {
        (Some(number), Some(street)) => Some(format!("{number} {street}")),
        (None, Some(street)) => Some(street.clone()),
        _ => None,
    };

    Some(RawPlace {
        id: format!("{}/{}", element.kind, element.id),
        name,
        category,
        coordinate,
        address,
    })
}
