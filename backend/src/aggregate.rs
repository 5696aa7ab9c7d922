use std::collections::HashSet;

use crate::backends::RawPlace;
use crate::geodesy::distance;
use crate::models::{CandidatePlace, Category, Coordinate, TravelTimes};

/// Substring rules checked in order; the first rule with a matching needle wins.
const CATEGORY_RULES: [(&[&str], Category); 4] = [
    (&["restaurant", "food"], Category::Restaurant),
    (&["cafe", "coffee"], Category::Cafe),
    (&["bar", "pub", "nightlife"], Category::Bar),
    (&["park", "garden"], Category::Park),
];

pub fn categorize(raw_category: &str) -> Category {
    let lowered = raw_category.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|needle| lowered.contains(needle)))
        .map(|(_, category)| *category)
        .unwrap_or(Category::Other)
}

/// Parameters a raw result set is reduced against.
#[derive(Debug, Clone, Copy)]
pub struct Aggregation {
    pub midpoint: Coordinate,
    pub radius_m: f64,
    /// When set, candidates of any other category are dropped.
    pub only: Option<Category>,
}

impl Aggregation {
    /// Dedupe by backend id, measure from the midpoint, drop anything outside
    /// the requested radius and sort nearest first.
    pub fn apply(&self, raw: Vec<RawPlace>, source: &str) -> Vec<CandidatePlace> {
        let mut seen = HashSet::new();
        let mut places: Vec<CandidatePlace> = raw
            .into_iter()
            .filter(|place| seen.insert(place.id.clone()))
            .filter_map(|place| {
                let distance_m = distance(self.midpoint, place.coordinate);
                if distance_m > self.radius_m {
                    return None;
                }
                let category = categorize(&place.category);
                if self.only.is_some_and(|only| only != category) {
                    return None;
                }
                Some(CandidatePlace {
                    id: place.id,
                    name: place.name,
                    coordinate: place.coordinate,
                    category,
                    raw_category: place.category,
                    address: place.address,
                    source: source.to_string(),
                    distance_m,
                    travel_times: TravelTimes::default(),
                })
            })
            .collect();

        places.sort_by(|a, b| {
            a.distance_m
                .partial_cmp(&b.distance_m)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        places
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, category: &str, lat: f64, lon: f64) -> RawPlace {
        RawPlace {
            id: id.to_string(),
            name: format!("Place {id}"),
            category: category.to_string(),
            coordinate: Coordinate { lat, lon },
            address: None,
        }
    }

    fn around_origin(radius_m: f64) -> Aggregation {
        Aggregation {
            midpoint: Coordinate::new(0.0, 0.0),
            radius_m,
            only: None,
        }
    }

    #[test]
    fn categorizes_by_priority() {
        assert_eq!(categorize("fast_food_restaurant"), Category::Restaurant);
        assert_eq!(categorize("coffee_house"), Category::Cafe);
        assert_eq!(categorize("amenity=pub"), Category::Bar);
        assert_eq!(categorize("Beer Garden"), Category::Park);
        assert_eq!(categorize("NIGHTLIFE"), Category::Bar);
        assert_eq!(categorize("laundromat"), Category::Other);
        assert_eq!(categorize(""), Category::Other);
    }

    #[test]
    fn earlier_rule_wins_on_overlap() {
        // Matches both the restaurant and bar rules.
        assert_eq!(categorize("bar_and_restaurant"), Category::Restaurant);
        // Matches both the cafe and park rules.
        assert_eq!(categorize("garden_cafe"), Category::Cafe);
    }

    #[test]
    fn duplicate_ids_collapse_to_first() {
        let places = around_origin(1_000.0).apply(
            vec![
                raw("a", "cafe", 0.001, 0.0),
                raw("a", "restaurant", 0.002, 0.0),
                raw("b", "cafe", 0.003, 0.0),
            ],
            "test",
        );
        assert_eq!(places.len(), 2);
        assert_eq!(places[0].id, "a");
        assert_eq!(places[0].category, Category::Cafe);
    }

    #[test]
    fn drops_places_beyond_radius_and_sorts() {
        // 0.001° of latitude is ~111 m
        let places = around_origin(500.0).apply(
            vec![
                raw("far", "cafe", 0.009, 0.0),
                raw("mid", "cafe", 0.003, 0.0),
                raw("near", "cafe", 0.001, 0.0),
            ],
            "test",
        );
        let ids: Vec<&str> = places.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!(places.iter().all(|p| p.distance_m <= 500.0));
        assert!(places.iter().all(|p| p.travel_times.is_empty()));
    }

    #[test]
    fn single_category_filter_drops_other_kinds() {
        let aggregation = Aggregation {
            only: Some(Category::Park),
            ..around_origin(1_000.0)
        };
        let places = aggregation.apply(
            vec![raw("p", "leisure=park", 0.001, 0.0), raw("c", "amenity=cafe", 0.001, 0.0)],
            "test",
        );
        assert_eq!(places.len(), 1);
        assert_eq!(places[0].id, "p");
    }

    #[test]
    fn records_source_and_raw_category() {
        let places = around_origin(1_000.0).apply(vec![raw("x", "Coffee_Shop", 0.0, 0.0)], "overpass");
        assert_eq!(places[0].source, "overpass");
        assert_eq!(places[0].raw_category, "Coffee_Shop");
        assert_eq!(places[0].distance_m, 0.0);
    }
}
