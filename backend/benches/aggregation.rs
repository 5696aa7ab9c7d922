use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use halfway::aggregate::Aggregation;
use halfway::backends::RawPlace;
use halfway::geodesy::{distance, midpoint};
use halfway::models::Coordinate;

const CATEGORIES: [&str; 5] = ["cafe", "amenity=restaurant", "pub", "leisure=park", "museum"];

/// Places on a small grid around `center`, every tenth one a duplicate.
fn raw_places(center: Coordinate, count: usize) -> Vec<RawPlace> {
    (0..count)
        .map(|i| {
            let id = if i % 10 == 9 { i - 1 } else { i };
            let dlat = ((i % 40) as f64 - 20.0) * 0.0005;
            let dlon = ((i / 40) as f64 - 20.0) * 0.0008;
            RawPlace {
                id: format!("node/{id}"),
                name: format!("Place {id}"),
                category: CATEGORIES[i % CATEGORIES.len()].to_string(),
                coordinate: Coordinate::new(center.lat + dlat, center.lon + dlon),
                address: None,
            }
        })
        .collect()
}

fn benchmark_geodesy(c: &mut Criterion) {
    let a = Coordinate::new(51.5007, -0.1246);
    let b = Coordinate::new(51.5155, -0.1419);
    let origins = [a, b, Coordinate::new(51.52, -0.10), Coordinate::new(51.49, -0.15)];

    c.bench_function("distance", |bench| {
        bench.iter(|| distance(black_box(a), black_box(b)))
    });
    c.bench_function("midpoint_4_origins", |bench| {
        bench.iter(|| midpoint(black_box(&origins)))
    });
}

fn benchmark_aggregation(c: &mut Criterion) {
    let center = Coordinate::new(51.5081, -0.13325);
    let mut group = c.benchmark_group("aggregation");

    for count in [20, 200, 1_600] {
        let raw = raw_places(center, count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &raw, |b, raw| {
            let aggregation = Aggregation {
                midpoint: center,
                radius_m: 1_000.0,
                only: None,
            };
            b.iter(|| aggregation.apply(black_box(raw.clone()), "bench"))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_geodesy, benchmark_aggregation);
criterion_main!(benches);
