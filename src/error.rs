use std::io;

/// Errors raised by the pool lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("pool torn down with {blocks} live blocks ({bytes} bytes) still allocated")]
    LiveAllocations { blocks: usize, bytes: usize },
}

/// Top-level harness error.
///
/// Allocation failure is not represented here: a failed `allocate` is an
/// ordinary outcome and only ever shows up as an empty slot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("failed to write report: {0}")]
    Report(#[from] io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
