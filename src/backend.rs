//! The three allocation strategies under comparison, behind one trait.
//!
//! A backend hands out opaque [`Handle`]s and takes them back in `free`. The
//! harness never looks inside a handle.

use crate::pool::{self, Handle, Origin, Pool};
use core::alloc::GlobalAlloc;
use core::any::TypeId;
use core::ptr::NonNull;
use std::alloc::System;
use tracing::warn;

/// Uniform capability set over an allocation strategy.
pub trait AllocatorBackend {
    /// Label printed in front of the result line.
    fn label(&self) -> &'static str;

    /// Allocate `size` bytes. `None` is an ordinary out-of-memory outcome.
    fn allocate(&self, size: usize) -> Option<Handle>;

    /// Release a block this backend allocated. A block owned by anything else
    /// is left alone and logged.
    fn free(&self, handle: Handle);
}

/// Pool blocks placed on the local node.
pub struct NumaLocal<'p> {
    pool: &'p Pool,
}

impl<'p> NumaLocal<'p> {
    pub fn new(pool: &'p Pool) -> Self {
        Self { pool }
    }
}

impl AllocatorBackend for NumaLocal<'_> {
    fn label(&self) -> &'static str {
        "NUMA Local"
    }

    #[inline]
    fn allocate(&self, size: usize) -> Option<Handle> {
        self.pool.allocate_local(size)
    }

    #[inline]
    fn free(&self, handle: Handle) {
        self.pool.free(handle)
    }
}

/// Pool blocks striped across all nodes.
pub struct NumaInterleaved<'p> {
    pool: &'p Pool,
}

impl<'p> NumaInterleaved<'p> {
    pub fn new(pool: &'p Pool) -> Self {
        Self { pool }
    }
}

impl AllocatorBackend for NumaInterleaved<'_> {
    fn label(&self) -> &'static str {
        "NUMA Interleaved"
    }

    #[inline]
    fn allocate(&self, size: usize) -> Option<Handle> {
        self.pool.allocate_interleaved(size)
    }

    #[inline]
    fn free(&self, handle: Handle) {
        self.pool.free(handle)
    }
}

/// The general-purpose system heap (`malloc`/`free`), outside the pool budget.
#[derive(Default)]
pub struct SystemHeap;

impl AllocatorBackend for SystemHeap {
    fn label(&self) -> &'static str {
        "Malloc"
    }

    #[inline]
    fn allocate(&self, size: usize) -> Option<Handle> {
        heap_allocate(&System, size)
    }

    #[inline]
    fn free(&self, handle: Handle) {
        heap_free(&System, handle)
    }
}

/// Any `GlobalAlloc` used directly as a general-purpose heap, e.g. mimalloc
/// or jemalloc for side-by-side runs.
///
/// Blocks are tagged with the allocator type, so a `GlobalHeap<A>` only frees
/// blocks that some `A` allocated.
pub struct GlobalHeap<A: GlobalAlloc + 'static> {
    alloc: A,
    label: &'static str,
}

impl<A: GlobalAlloc + 'static> GlobalHeap<A> {
    /// # Safety
    ///
    /// Every value of `A` must serve one shared heap, as the process-wide
    /// allocators (`System`, mimalloc, jemalloc) do: a block allocated through
    /// any `A` must be valid to free through any other `A`.
    pub const unsafe fn new(alloc: A, label: &'static str) -> Self {
        Self { alloc, label }
    }
}

impl<A: GlobalAlloc + 'static> AllocatorBackend for GlobalHeap<A> {
    fn label(&self) -> &'static str {
        self.label
    }

    #[inline]
    fn allocate(&self, size: usize) -> Option<Handle> {
        heap_allocate(&self.alloc, size)
    }

    #[inline]
    fn free(&self, handle: Handle) {
        heap_free(&self.alloc, handle)
    }
}

#[inline]
fn heap_allocate<A: GlobalAlloc + 'static>(alloc: &A, size: usize) -> Option<Handle> {
    let layout = pool::block_layout(size)?;
    let ptr = NonNull::new(unsafe { alloc.alloc(layout) })?;
    Some(Handle::new(ptr, layout, heap_origin::<A>()))
}

#[inline]
fn heap_free<A: GlobalAlloc + 'static>(alloc: &A, handle: Handle) {
    if handle.origin() != heap_origin::<A>() {
        warn!(
            origin = ?handle.origin(),
            size = handle.size(),
            "heap free called with a block it does not own"
        );
        return;
    }
    // The tag matches, so an `A` allocated this block with this layout.
    unsafe { alloc.dealloc(handle.as_ptr(), handle.layout()) }
}

#[inline]
fn heap_origin<A: 'static>() -> Origin {
    Origin::Heap {
        alloc: TypeId::of::<A>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(backend: &dyn AllocatorBackend) {
        let handles: Vec<Handle> = [64, 256, 1024, 4096, 16384]
            .into_iter()
            .map(|size| backend.allocate(size).expect("allocation failed"))
            .collect();
        for (h, size) in handles.iter().zip([64, 256, 1024, 4096, 16384]) {
            assert_eq!(h.size(), size);
            assert_eq!(h.as_ptr() as usize % pool::BLOCK_ALIGN, 0);
        }
        handles.into_iter().for_each(|h| backend.free(h));
    }

    #[test]
    fn test_labels() {
        let pool = Pool::with_nodes(0, 1);
        assert_eq!(NumaLocal::new(&pool).label(), "NUMA Local");
        assert_eq!(NumaInterleaved::new(&pool).label(), "NUMA Interleaved");
        assert_eq!(SystemHeap.label(), "Malloc");
    }

    #[test]
    fn test_each_backend_round_trips() {
        let pool = Pool::with_nodes(1 << 20, 2);
        exercise(&NumaLocal::new(&pool));
        exercise(&NumaInterleaved::new(&pool));
        exercise(&SystemHeap);
        let stats = pool.teardown().unwrap();
        assert_eq!(stats.allocations, 10);
        assert_eq!(stats.frees, 10);
    }

    #[test]
    fn test_heap_ignores_pool_budget() {
        let pool = Pool::with_nodes(0, 1);
        assert!(NumaLocal::new(&pool).allocate(64).is_none());
        assert!(NumaInterleaved::new(&pool).allocate(64).is_none());
        let h = SystemHeap.allocate(64).unwrap();
        assert_eq!(h.node(), None);
        SystemHeap.free(h);
    }

    #[test]
    fn test_heap_zero_size_fails() {
        assert!(SystemHeap.allocate(0).is_none());
    }

    #[test]
    fn test_global_heap_wraps_any_allocator() {
        let heap = unsafe { GlobalHeap::new(System, "System") };
        assert_eq!(heap.label(), "System");
        exercise(&heap);
    }

    #[test]
    fn test_system_blocks_move_between_system_heaps() {
        let heap = unsafe { GlobalHeap::new(System, "System") };
        let h = SystemHeap.allocate(256).unwrap();
        heap.free(h);
        let h = heap.allocate(256).unwrap();
        SystemHeap.free(h);
    }

    /// Distinct allocator type that forwards to `System` and counts frees.
    struct Counting;

    static COUNTING_FREES: core::sync::atomic::AtomicUsize =
        core::sync::atomic::AtomicUsize::new(0);

    unsafe impl GlobalAlloc for Counting {
        unsafe fn alloc(&self, layout: core::alloc::Layout) -> *mut u8 {
            unsafe { System.alloc(layout) }
        }

        unsafe fn dealloc(&self, ptr: *mut u8, layout: core::alloc::Layout) {
            COUNTING_FREES.fetch_add(1, core::sync::atomic::Ordering::Relaxed);
            unsafe { System.dealloc(ptr, layout) }
        }
    }

    #[test]
    fn test_heap_ignores_foreign_blocks() {
        let counting = unsafe { GlobalHeap::new(Counting, "Counting") };
        let pool = Pool::with_nodes(1 << 20, 1);
        let local = NumaLocal::new(&pool);

        // A System block and a pool block both bounce off the counting heap.
        let sys = SystemHeap.allocate(64).unwrap();
        let sys_ptr = sys.as_ptr();
        let sys_layout = sys.layout();
        counting.free(sys);
        let pooled = local.allocate(64).unwrap();
        counting.free(pooled);
        assert_eq!(COUNTING_FREES.load(core::sync::atomic::Ordering::Relaxed), 0);
        assert_eq!(pool.stats().live_blocks, 1);

        // And a counting block is refused by the system heap and the pool.
        let own = counting.allocate(64).unwrap();
        SystemHeap.free(own);
        let own = counting.allocate(64).unwrap();
        local.free(own);
        assert_eq!(pool.stats().frees, 0);
        assert_eq!(COUNTING_FREES.load(core::sync::atomic::Ordering::Relaxed), 0);

        unsafe { System.dealloc(sys_ptr, sys_layout) };
    }

    #[test]
    fn test_heap_block_ignored_by_pool_backend() {
        let pool = Pool::with_nodes(1 << 20, 1);
        let interleaved = NumaInterleaved::new(&pool);
        let h = SystemHeap.allocate(1024).unwrap();
        interleaved.free(h);
        let stats = pool.stats();
        assert_eq!(stats.frees, 0);
        assert_eq!(stats.live_blocks, 0);
        assert_eq!(stats.live_bytes, 0);
    }
}
