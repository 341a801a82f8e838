use criterion::{black_box, criterion_group, criterion_main, Criterion};

use mzbank::io::RawHit;
use mzbank::search::rank_hits;
use mzbank::{Feature, FeatureSet, IonMode, MassErrorType};

fn make_feature_set(size: usize) -> FeatureSet {
    let features = (0..size)
        .map(|i| Feature::new(i as u32, 100.0 + i as f64 * 0.731, 1000.0 + (i % 17) as f64 * 35.0))
        .collect();
    FeatureSet::new(0, 1, IonMode::Positive, features)
}

fn make_hits(size: usize) -> Vec<RawHit> {
    (0..size)
        .map(|i| {
            RawHit::new(
                format!("PR{i:06}").as_str(),
                "Compound; LC-ESI-QTOF; MS2",
                format!("{:.4}", 150.0 + i as f64 * 0.5).as_str(),
                format!("{:.3}", ((i * 7919) % 1000) as f64 / 1000.0).as_str(),
            )
        })
        .collect()
}

fn closest_mz(feature_set: &FeatureSet, queries: &[f64]) {
    for q in queries.iter() {
        black_box(feature_set.closest_mz(*q));
    }
}

fn closest_mz_within(feature_set: &FeatureSet, queries: &[f64]) {
    for q in queries.iter() {
        black_box(feature_set.closest_mz_within(*q, 10.0, MassErrorType::PPM));
    }
}

fn feature_search(c: &mut Criterion) {
    let feature_set = make_feature_set(5000);
    let queries: Vec<f64> = feature_set
        .iter()
        .map(|f| IonMode::Positive.adjust_mass(f.mz - 1.0073))
        .collect();
    c.bench_function("closest_mz", |b| {
        b.iter(|| closest_mz(black_box(&feature_set), black_box(&queries)))
    });
    c.bench_function("closest_mz_within", |b| {
        b.iter(|| closest_mz_within(black_box(&feature_set), black_box(&queries)))
    });
}

fn hit_ranking(c: &mut Criterion) {
    let hits = make_hits(500);
    c.bench_function("rank_hits", |b| {
        b.iter(|| rank_hits(black_box(hits.clone())))
    });
}

criterion_group!(benches, feature_search, hit_ranking);
criterion_main!(benches);
