//! Benchmarks for the arrangement and classification engine.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use cluster_explorer::config::{ArrangeConfig, ClassifyConfig};
use cluster_explorer::engine::arrange::{ArrangeMode, Arranger};
use cluster_explorer::engine::classifier::NearestCentroid;
use cluster_explorer::engine::member::{Member, ObjectRecord};

fn random_members(n: usize, dim: usize, seed: u64) -> Vec<Member> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            Member::Object(ObjectRecord {
                object_id: i.to_string(),
                vector: (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect(),
            })
        })
        .collect()
}

fn bench_similarity(c: &mut Criterion) {
    let arranger = Arranger::new(
        &ArrangeConfig {
            seed: Some(1),
            ..Default::default()
        },
        &ClassifyConfig::default(),
    );
    let members = random_members(300, 32, 1);

    c.bench_function("similarity_300x32", |b| {
        b.iter(|| {
            let order = arranger.arrange(black_box(&members), &ArrangeMode::Similarity, &[]);
            black_box(order)
        })
    });
}

fn bench_classify(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(2);
    let anchors: Vec<Vec<f32>> = (0..50)
        .map(|_| (0..32).map(|_| rng.gen_range(-1.0f32..1.0)).collect())
        .collect();
    let classifier = NearestCentroid::new(anchors, &ClassifyConfig::default()).unwrap();
    let vectors: Vec<Vec<f32>> = random_members(10_000, 32, 3)
        .iter()
        .map(|m| m.vector().to_vec())
        .collect();

    c.bench_function("classify_safe_10k_into_50", |b| {
        b.iter(|| black_box(classifier.classify(black_box(&vectors), true)))
    });
}

fn bench_starred_similarity(c: &mut Criterion) {
    let arranger = Arranger::new(&ArrangeConfig::default(), &ClassifyConfig::default());
    let members = random_members(10_000, 32, 4);
    let anchors = random_members(20, 32, 5);

    c.bench_function("starred_similarity_10k", |b| {
        b.iter(|| black_box(arranger.arrange(black_box(&members), &ArrangeMode::StarredSimilarity, &anchors)))
    });
}

criterion_group!(benches, bench_similarity, bench_classify, bench_starred_similarity);
criterion_main!(benches);
