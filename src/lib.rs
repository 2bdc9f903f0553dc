//! numachurn: random allocate/free micro-benchmark for NUMA allocation policies.
//!
//! Compares three strategies under the same class of workload:
//! - NUMA-local pool allocation
//! - NUMA-interleaved pool allocation
//! - The general-purpose system heap
//!
//! Each strategy gets one timed pass of randomly sized allocations, half of
//! which are freed immediately. The rest are released by a single cleanup
//! sweep once every pass has finished, and only then is the pool torn down.
//!
//! # Usage
//!
//! ```no_run
//! let (summary, _stats) =
//!     numachurn::benchmark_random_alloc(numachurn::RunConfig::default(), std::io::stdout())?;
//! assert_eq!(summary.live_after_sweep, 0);
//! # Ok::<(), numachurn::Error>(())
//! ```

pub mod size_class;
pub mod timer;
pub mod workload;
pub mod error;
pub mod pool;
pub mod backend;
pub mod runner;
pub mod report;

// Re-export the entry points at crate root for convenience
pub use backend::{AllocatorBackend, GlobalHeap, NumaInterleaved, NumaLocal, SystemHeap};
pub use error::{Error, PoolError, Result};
pub use pool::{Handle, Pool, PoolStats};
pub use runner::{
    BackendResult, NUM_OPERATIONS, PassReport, RunConfig, RunSummary, Runner, StreamPolicy,
    benchmark_random_alloc,
};
pub use workload::{WorkloadGenerator, WorkloadSample};
