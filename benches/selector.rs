use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use maxspread::pool::CandidateIndex;
use maxspread::provider::{DistanceProvider, PrecomputedDistances};
use maxspread::selector::{DiversitySelector, SeededSampler, SelectorConfig};

const POOL_LEN: usize = 2_000;
const DIMS: usize = 13;

fn feature(index: CandidateIndex) -> Vec<f32> {
    (0..DIMS)
        .map(|d| (((index + 1) * (d + 3) * 2_654_435_761) % 10_007) as f32 / 10_007.0)
        .collect()
}

fn bench_precomputed(c: &mut Criterion) {
    let embeddings: Vec<Vec<f32>> = (0..POOL_LEN).map(feature).collect();
    let oracle = PrecomputedDistances::from_embeddings(&embeddings);
    let selector = DiversitySelector::new(SelectorConfig::new(10, 1_000));
    c.bench_function("select_precomputed_k10_1000_steps", |b| {
        b.iter(|| {
            selector
                .select(&oracle, &mut SeededSampler::new(42))
                .expect("selection")
        })
    });
}

fn bench_lazy(c: &mut Criterion) {
    let selector = DiversitySelector::new(SelectorConfig::new(10, 1_000));
    c.bench_function("select_lazy_cold_cache_k10_1000_steps", |b| {
        b.iter_batched(
            || DistanceProvider::new(|index: CandidateIndex| Ok(feature(index)), POOL_LEN),
            |provider| {
                selector
                    .select(&provider, &mut SeededSampler::new(42))
                    .expect("selection")
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_precomputed, bench_lazy);
criterion_main!(benches);
