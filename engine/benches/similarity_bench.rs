use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use engine::similarity::{SimilarityIndex, SimilarityParams};
use engine::{Index, Token};

const DAY: i64 = 86_400;

fn synthetic_doc(seed: u64) -> Vec<Token> {
    // Deterministic token mix: a shared core plus per-doc vocabulary.
    (0..40)
        .map(|i| {
            if i % 4 == 0 {
                format!("common{}", i % 8)
            } else {
                format!("tok{}", (seed.wrapping_mul(31).wrapping_add(i)) % 500)
            }
        })
        .collect()
}

fn populated(n: u64) -> SimilarityIndex {
    let params = SimilarityParams {
        irrelevant_thresh: 0.01,
        duplicate_thresh: 0.95,
        ..SimilarityParams::default()
    };
    let mut index = SimilarityIndex::new(params);
    for i in 0..n {
        index.add(i, synthetic_doc(i), i as i64 * DAY / 24);
    }
    index
}

fn bench_add(c: &mut Criterion) {
    let base = populated(500);
    c.bench_function("add_into_500", |b| {
        b.iter_batched(
            || base.clone(),
            |mut index| index.add(10_000, synthetic_doc(10_000), 600 * DAY),
            BatchSize::LargeInput,
        );
    });
}

fn bench_probe(c: &mut Criterion) {
    let index = populated(500);
    let probe = synthetic_doc(42);
    c.bench_function("find_most_similar_over_500", |b| {
        b.iter(|| index.find_most_similar(&probe));
    });
}

criterion_group!(benches, bench_add, bench_probe);
criterion_main!(benches);
