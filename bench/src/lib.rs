//! Third-party general-purpose heaps to run alongside the system heap.

use numachurn::{AllocatorBackend, GlobalHeap};

// Both are process-wide allocators: every value serves the same heap.
pub static MIMALLOC: GlobalHeap<mimalloc::MiMalloc> =
    unsafe { GlobalHeap::new(mimalloc::MiMalloc, "mimalloc") };

#[cfg(not(target_env = "msvc"))]
pub static JEMALLOC: GlobalHeap<tikv_jemallocator::Jemalloc> =
    unsafe { GlobalHeap::new(tikv_jemallocator::Jemalloc, "jemalloc") };

/// Every extra heap available on this target.
pub fn extra_heaps() -> Vec<&'static dyn AllocatorBackend> {
    let mut heaps: Vec<&'static dyn AllocatorBackend> = Vec::new();
    heaps.push(&MIMALLOC);
    #[cfg(not(target_env = "msvc"))]
    heaps.push(&JEMALLOC);
    heaps
}
