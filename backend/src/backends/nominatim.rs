use async_trait::async_trait;
use serde::Deserialize;

use super::{BackendError, GeocodedAddress, Geocoder, check_status};
use crate::models::Coordinate;

/// Forward geocoding against a Nominatim instance.
#[derive(Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

/// Nominatim returns coordinates as strings.
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}

impl NominatimGeocoder {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn resolve(&self, address: &str) -> Result<GeocodedAddress, BackendError> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", address), ("format", "jsonv2"), ("limit", "1")])
            .send()
            .await?;
        let places: Vec<NominatimPlace> = check_status(response)?.json().await?;
        first_match(places)
    }
}

fn first_match(places: Vec<NominatimPlace>) -> Result<GeocodedAddress, BackendError> {
    let place = places.into_iter().next().ok_or(BackendError::NotFound)?;
    let lat = place
        .lat
        .parse::<f64>()
        .map_err(|e| BackendError::Decode(format!("latitude {:?}: {e}", place.lat)))?;
    let lon = place
        .lon
        .parse::<f64>()
        .map_err(|e| BackendError::Decode(format!("longitude {:?}: {e}", place.lon)))?;
    Ok(GeocodedAddress {
        coordinate: Coordinate { lat, lon },
        display_name: place.display_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_result() {
        let body = r#"[
            {"place_id": 1, "lat": "51.5007292", "lon": "-0.1246254", "display_name": "Big Ben, London"},
            {"place_id": 2, "lat": "0", "lon": "0", "display_name": "Elsewhere"}
        ]"#;
        let places: Vec<NominatimPlace> = serde_json::from_str(body).unwrap();
        let resolved = first_match(places).unwrap();
        assert_eq!(resolved.display_name, "Big Ben, London");
        assert!((resolved.coordinate.lat - 51.5007292).abs() < 1e-9);
        assert!((resolved.coordinate.lon + 0.1246254).abs() < 1e-9);
    }

    #[test]
    fn empty_result_is_not_found() {
        assert!(matches!(first_match(Vec::new()), Err(BackendError::NotFound)));
    }

    #[test]
    fn malformed_coordinate_is_decode_error() {
        let places = vec![NominatimPlace {
            lat: "north".into(),
            lon: "0".into(),
            display_name: "Nowhere".into(),
        }];
        assert!(matches!(first_match(places), Err(BackendError::Decode(_))));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let geocoder = NominatimGeocoder::new(reqwest::Client::new(), "https://example.org/");
        assert_eq!(geocoder.base_url, "https://example.org");
    }
}
