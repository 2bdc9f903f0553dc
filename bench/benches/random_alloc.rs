//! Criterion comparison of the random alloc/free pass across backends.
//!
//! Every backend replays the same seeded workload, so differences come from
//! the allocator and not from the sample stream.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use numachurn::workload::seeded_rng;
use numachurn::{
    AllocatorBackend, NUM_OPERATIONS, NumaInterleaved, NumaLocal, Pool, RunConfig, Runner,
    StreamPolicy, SystemHeap,
};
use std::time::Duration;

/// Large enough that a single pass never runs out of budget.
const BENCH_CAPACITY: usize = 1 << 30;

fn bench_random_alloc(c: &mut Criterion) {
    let pool = Pool::init(BENCH_CAPACITY);
    let local = NumaLocal::new(&pool);
    let interleaved = NumaInterleaved::new(&pool);

    let mut backends: Vec<&dyn AllocatorBackend> = Vec::new();
    backends.push(&local);
    backends.push(&interleaved);
    backends.push(&SystemHeap);
    backends.extend(numachurn_bench::extra_heaps());

    let config = RunConfig::default()
        .with_capacity(BENCH_CAPACITY)
        .with_stream(StreamPolicy::Replay);
    let runner = Runner::new(config.clone());

    let mut group = c.benchmark_group("random_alloc_free");
    group.throughput(Throughput::Elements(NUM_OPERATIONS as u64));

    for backend in backends {
        group.bench_function(BenchmarkId::new(backend.label(), NUM_OPERATIONS), |b| {
            let mut rng = seeded_rng(config.seed);
            b.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for _ in 0..iters {
                    let summary = runner.run(&[backend], &mut rng);
                    total += summary.passes[0].elapsed;
                }
                total
            });
        });
    }
    group.finish();

    if let Err(err) = pool.teardown() {
        eprintln!("{err}");
    }
}

criterion_group!(benches, bench_random_alloc);
criterion_main!(benches);
