//! Timed random allocate/free passes, one per backend, then a single sweep.
//!
//! Every backend runs the same loop: draw a sample, allocate into the next
//! slot, and free it straight away when the sample says so. Whatever is still
//! live after the last pass is released by one cleanup sweep, so the pool can
//! be torn down with nothing outstanding.

use crate::backend::{AllocatorBackend, NumaInterleaved, NumaLocal, SystemHeap};
use crate::error::Result;
use crate::pool::{DEFAULT_CAPACITY, Handle, Pool, PoolStats};
use crate::report::Reporter;
use crate::size_class;
use crate::timer::{self, Timer};
use crate::workload::{self, DEFAULT_SEED, WorkloadGenerator};
use rand::{Rng, SeedableRng};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, warn};

/// Iterations per backend in the default run.
pub const NUM_OPERATIONS: usize = 10_000;

/// How the workload RNG is shared between passes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StreamPolicy {
    /// Seed once; each pass continues where the previous one stopped, so
    /// every backend sees a different slice of one stream.
    #[default]
    Continuous,
    /// Re-seed before every pass; every backend sees the identical sequence.
    Replay,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    /// Slots and loop iterations per backend.
    pub iterations: usize,
    /// Byte budget handed to the pool.
    pub capacity: usize,
    /// Seed for the workload RNG. [`benchmark_random_alloc`] seeds its RNG
    /// from it once; [`Runner::run`] only uses it to re-seed under
    /// [`StreamPolicy::Replay`] and otherwise takes the caller's RNG as is.
    pub seed: u64,
    pub stream: StreamPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            iterations: NUM_OPERATIONS,
            capacity: DEFAULT_CAPACITY,
            seed: DEFAULT_SEED,
            stream: StreamPolicy::Continuous,
        }
    }
}

impl RunConfig {
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_stream(mut self, stream: StreamPolicy) -> Self {
        self.stream = stream;
        self
    }
}

/// Average latency of one backend's pass.
#[derive(Clone, Debug, PartialEq)]
pub struct BackendResult {
    pub label: &'static str,
    /// Elapsed nanoseconds divided by iterations; `0.0` for an empty pass.
    pub average_latency_ns: f64,
}

/// Slot bookkeeping for one pass.
#[derive(Clone, Debug, PartialEq)]
pub struct PassReport {
    pub result: BackendResult,
    pub elapsed: Duration,
    /// Slots that received a block.
    pub allocated: usize,
    /// Slots left empty because `allocate` failed.
    pub failed: usize,
    /// Blocks freed inside the timed loop.
    pub freed_in_pass: usize,
    /// Blocks still live when the timed loop ended.
    pub live_after_pass: usize,
    /// Blocks released by the cleanup sweep.
    pub freed_in_sweep: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub stream: StreamPolicy,
    pub passes: Vec<PassReport>,
    /// Non-empty slots across all backends after the sweep. Always zero.
    pub live_after_sweep: usize,
}

/// One backend's slots. `None` is the null sentinel.
struct Pass<'b> {
    backend: &'b dyn AllocatorBackend,
    slots: Vec<Option<Handle>>,
    report: PassReport,
}

pub struct Runner {
    config: RunConfig,
    timer: Timer,
}

impl Runner {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            timer: Timer,
        }
    }

    /// Run one timed pass per backend, in order, then sweep every live slot.
    ///
    /// `rng` is the caller's workload generator state and the only seed source
    /// under [`StreamPolicy::Continuous`]: `RunConfig::seed` is ignored there.
    /// Under [`StreamPolicy::Replay`] it is re-seeded from `RunConfig::seed`
    /// before each pass.
    pub fn run<R>(&self, backends: &[&dyn AllocatorBackend], rng: &mut R) -> RunSummary
    where
        R: Rng + SeedableRng,
    {
        self.run_with(backends, rng, |_| {})
    }

    /// Like [`Runner::run`], handing each pass's result to `on_result` as soon
    /// as that pass finishes and before the next one starts.
    pub fn run_with<R, F>(
        &self,
        backends: &[&dyn AllocatorBackend],
        rng: &mut R,
        mut on_result: F,
    ) -> RunSummary
    where
        R: Rng + SeedableRng,
        F: FnMut(&BackendResult),
    {
        debug!(
            iterations = self.config.iterations,
            stream = ?self.config.stream,
            expected_live_bytes = (self.config.iterations as f64 * size_class::mean_size() / 2.0) as u64,
            "starting random alloc/free run"
        );

        let mut passes: Vec<Pass<'_>> = Vec::with_capacity(backends.len());
        for &backend in backends {
            if self.config.stream == StreamPolicy::Replay {
                *rng = R::seed_from_u64(self.config.seed);
            }
            let pass = self.timed_pass(backend, rng);
            on_result(&pass.report.result);
            passes.push(pass);
        }

        let live_after_sweep = sweep(&mut passes);

        RunSummary {
            stream: self.config.stream,
            passes: passes.into_iter().map(|p| p.report).collect(),
            live_after_sweep,
        }
    }

    fn timed_pass<'b, R: Rng>(&self, backend: &'b dyn AllocatorBackend, rng: &mut R) -> Pass<'b> {
        let n = self.config.iterations;
        let mut slots: Vec<Option<Handle>> = (0..n).map(|_| None).collect();
        let mut freed = 0usize;

        let start = self.timer.now();
        for (slot, sample) in slots.iter_mut().zip(WorkloadGenerator::new(rng)) {
            *slot = backend.allocate(sample.size);
            if sample.free_now {
                if let Some(handle) = slot.take() {
                    backend.free(handle);
                    freed += 1;
                }
            }
        }
        let end = self.timer.now();

        let elapsed = self.timer.elapsed(start, end);
        let live = slots.iter().filter(|s| s.is_some()).count();
        let allocated = live + freed;
        let report = PassReport {
            result: BackendResult {
                label: backend.label(),
                average_latency_ns: timer::per_op_ns(elapsed, n),
            },
            elapsed,
            allocated,
            failed: n - allocated,
            freed_in_pass: freed,
            live_after_pass: live,
            freed_in_sweep: 0,
        };

        debug!(
            backend = backend.label(),
            elapsed_ns = elapsed.as_nanos() as u64,
            allocated,
            failed = report.failed,
            live,
            "pass finished"
        );
        if n > 0 && allocated == 0 {
            warn!(backend = backend.label(), "every allocation in the pass failed");
        }

        Pass {
            backend,
            slots,
            report,
        }
    }
}

/// Free every live slot with its owning backend. Returns the slots still
/// holding a block afterwards.
fn sweep(passes: &mut [Pass<'_>]) -> usize {
    for pass in passes.iter_mut() {
        let mut freed = 0;
        for slot in pass.slots.iter_mut() {
            // take() nulls the slot before the free, so a block is released once.
            if let Some(handle) = slot.take() {
                pass.backend.free(handle);
                freed += 1;
            }
        }
        pass.report.freed_in_sweep = freed;
    }

    let live = passes
        .iter()
        .map(|p| p.slots.iter().filter(|s| s.is_some()).count())
        .sum();
    debug!(
        freed = passes.iter().map(|p| p.report.freed_in_sweep).sum::<usize>(),
        live,
        "cleanup sweep finished"
    );
    live
}

/// Full benchmark: init the pool, run NUMA local, NUMA interleaved and the
/// system heap, printing each result line to `out` as its pass finishes, then
/// tear the pool down.
pub fn benchmark_random_alloc<W: Write>(
    config: RunConfig,
    out: W,
) -> Result<(RunSummary, PoolStats)> {
    let mut reporter = Reporter::new(out);
    // A write error stops further output but never skips the sweep or teardown.
    let mut report = reporter.write_banner();

    let pool = Pool::init(config.capacity);
    let summary = {
        let local = NumaLocal::new(&pool);
        let interleaved = NumaInterleaved::new(&pool);
        let heap = SystemHeap;
        let backends: [&dyn AllocatorBackend; 3] = [&local, &interleaved, &heap];

        let mut rng = workload::seeded_rng(config.seed);
        Runner::new(config).run_with(&backends, &mut rng, |result| {
            if report.is_ok() {
                report = reporter.write_result(result);
            }
        })
    };

    let stats = pool.teardown()?;
    report?;
    Ok((summary, stats))
}
