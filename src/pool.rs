//! Capacity-bounded NUMA pool: the allocator collaborator the harness drives.
//!
//! This is the thinnest thing that honours the collaborator contract
//! (`init`, `allocate_local`, `allocate_interleaved`, `free`, `teardown`).
//! Blocks come from the system heap; the pool only enforces the byte budget
//! given at `init` and tags each block with the node it was placed on. It does
//! not bind pages to nodes.
//!
//! All counters are atomics so backends can share the pool by `&Pool`.

use crate::error::PoolError;
use core::alloc::{GlobalAlloc, Layout};
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use core::any::TypeId;
use std::alloc::System;
use tracing::{debug, trace, warn};

/// Alignment of every block handed out, matching what `malloc` guarantees.
pub const BLOCK_ALIGN: usize = 16;

/// Capacity used by the default run (24 MiB).
pub const DEFAULT_CAPACITY: usize = 24 * 1024 * 1024;

/// Where a block was placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// Nearest node to the allocating CPU.
    Local,
    /// Striped round-robin across all online nodes.
    Interleaved,
}

/// Source of `Pool` ids; every pool gets its own.
static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Which allocator owns a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Origin {
    /// Pool with id `pool`, placed on `node`.
    Pool { pool: u64, node: usize },
    /// A `GlobalAlloc` heap, keyed by the allocator type.
    Heap { alloc: TypeId },
}

/// Opaque, single-owner token for one live block.
///
/// Not `Clone`: the only ways to get rid of a handle are to pass it to the
/// owning backend's `free` (which consumes it) or to drop it, which leaks the
/// block. Every handle records its owner; `free` on any other backend logs a
/// warning and leaves the block alone.
#[derive(Debug)]
pub struct Handle {
    ptr: NonNull<u8>,
    layout: Layout,
    origin: Origin,
}

impl Handle {
    pub(crate) fn new(ptr: NonNull<u8>, layout: Layout, origin: Origin) -> Self {
        Self { ptr, layout, origin }
    }

    /// Requested size of the block.
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// Node the block was placed on, or `None` for general-purpose heap blocks.
    pub fn node(&self) -> Option<usize> {
        match self.origin {
            Origin::Pool { node, .. } => Some(node),
            Origin::Heap { .. } => None,
        }
    }

    pub(crate) fn origin(&self) -> Origin {
        self.origin
    }

    pub(crate) fn layout(&self) -> Layout {
        self.layout
    }

    pub(crate) fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

/// Layout of a `size`-byte block. `None` for zero or overflowing sizes.
#[inline]
pub(crate) fn block_layout(size: usize) -> Option<Layout> {
    if size == 0 {
        return None;
    }
    Layout::from_size_align(size, BLOCK_ALIGN).ok()
}

/// Point-in-time copy of the pool counters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: usize,
    pub nodes: usize,
    pub allocations: u64,
    pub failures: u64,
    pub frees: u64,
    pub live_blocks: usize,
    pub live_bytes: usize,
    pub peak_bytes: usize,
    /// Successful allocations per node.
    pub per_node: Vec<u64>,
}

pub struct Pool {
    id: u64,
    capacity: usize,
    used: AtomicUsize,
    peak: AtomicUsize,
    live_blocks: AtomicUsize,
    allocations: AtomicU64,
    failures: AtomicU64,
    frees: AtomicU64,
    next_node: AtomicUsize,
    per_node: Box<[AtomicU64]>,
}

impl Pool {
    /// Create a pool with a `capacity`-byte budget spread over the online nodes.
    pub fn init(capacity: usize) -> Self {
        Self::with_nodes(capacity, online_nodes())
    }

    /// Create a pool with an explicit node count (at least one).
    pub fn with_nodes(capacity: usize, nodes: usize) -> Self {
        let nodes = nodes.max(1);
        debug!(capacity, nodes, "pool initialized");
        Self {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            capacity,
            used: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            live_blocks: AtomicUsize::new(0),
            allocations: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            frees: AtomicU64::new(0),
            next_node: AtomicUsize::new(0),
            per_node: (0..nodes).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Allocate `size` bytes on the local node. `None` when the budget is exhausted.
    #[inline]
    pub fn allocate_local(&self, size: usize) -> Option<Handle> {
        self.allocate(size, Placement::Local)
    }

    /// Allocate `size` bytes on the next node in the interleave stripe.
    #[inline]
    pub fn allocate_interleaved(&self, size: usize) -> Option<Handle> {
        self.allocate(size, Placement::Interleaved)
    }

    pub fn allocate(&self, size: usize, placement: Placement) -> Option<Handle> {
        let Some(layout) = block_layout(size).filter(|_| self.reserve(size)) else {
            self.failures.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let ptr = unsafe { System.alloc(layout) };
        let Some(ptr) = NonNull::new(ptr) else {
            self.release(size);
            self.failures.fetch_add(1, Ordering::Relaxed);
            trace!(size, "system heap refused pool block");
            return None;
        };

        let node = match placement {
            Placement::Local => 0,
            Placement::Interleaved => {
                self.next_node.fetch_add(1, Ordering::Relaxed) % self.per_node.len()
            }
        };
        self.per_node[node].fetch_add(1, Ordering::Relaxed);
        self.allocations.fetch_add(1, Ordering::Relaxed);
        self.live_blocks.fetch_add(1, Ordering::Relaxed);

        Some(Handle::new(ptr, layout, Origin::Pool { pool: self.id, node }))
    }

    /// Return a block to the pool. Consumes the handle.
    ///
    /// A handle issued by another pool or a heap is not touched: the call
    /// logs a warning and the block stays with its real owner, leaked.
    pub fn free(&self, handle: Handle) {
        if !self.owns(&handle) {
            warn!(
                origin = ?handle.origin,
                size = handle.size(),
                "pool free called with a block it does not own"
            );
            return;
        }
        unsafe { System.dealloc(handle.as_ptr(), handle.layout()) };
        self.release(handle.size());
        self.live_blocks.fetch_sub(1, Ordering::Relaxed);
        self.frees.fetch_add(1, Ordering::Relaxed);
    }

    /// Whether `handle` was issued by this pool.
    pub fn owns(&self, handle: &Handle) -> bool {
        matches!(handle.origin, Origin::Pool { pool, .. } if pool == self.id)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.capacity,
            nodes: self.per_node.len(),
            allocations: self.allocations.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            frees: self.frees.load(Ordering::Relaxed),
            live_blocks: self.live_blocks.load(Ordering::Relaxed),
            live_bytes: self.used.load(Ordering::Relaxed),
            peak_bytes: self.peak.load(Ordering::Relaxed),
            per_node: self.per_node.iter().map(|n| n.load(Ordering::Relaxed)).collect(),
        }
    }

    /// Tear the pool down. Refuses while any block is still live.
    pub fn teardown(self) -> Result<PoolStats, PoolError> {
        let stats = self.stats();
        if stats.live_blocks != 0 {
            return Err(PoolError::LiveAllocations {
                blocks: stats.live_blocks,
                bytes: stats.live_bytes,
            });
        }
        debug!(
            allocations = stats.allocations,
            failures = stats.failures,
            peak_bytes = stats.peak_bytes,
            "pool torn down"
        );
        Ok(stats)
    }

    /// Claim `size` bytes of budget.
    fn reserve(&self, size: usize) -> bool {
        let mut used = self.used.load(Ordering::Relaxed);
        loop {
            let Some(next) = used.checked_add(size).filter(|&n| n <= self.capacity) else {
                return false;
            };
            match self
                .used
                .compare_exchange_weak(used, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => {
                    self.peak.fetch_max(next, Ordering::Relaxed);
                    return true;
                }
                Err(actual) => used = actual,
            }
        }
    }

    fn release(&self, size: usize) {
        self.used.fetch_sub(size, Ordering::Relaxed);
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        /// Number of online NUMA nodes as reported by sysfs, 1 if unknown.
        pub fn online_nodes() -> usize {
            std::fs::read_to_string("/sys/devices/system/node/online")
                .ok()
                .and_then(|list| parse_node_list(&list))
                .unwrap_or(1)
        }
    } else {
        /// Number of online NUMA nodes. Non-Linux targets are treated as one node.
        pub fn online_nodes() -> usize {
            1
        }
    }
}

/// Count the nodes in a sysfs node list such as `0-3,8,10-11`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_node_list(list: &str) -> Option<usize> {
    let mut count = 0usize;
    for part in list.trim().split(',').filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((lo, hi)) => {
                let lo: usize = lo.parse().ok()?;
                let hi: usize = hi.parse().ok()?;
                count += hi.checked_sub(lo)? + 1;
            }
            None => {
                part.parse::<usize>().ok()?;
                count += 1;
            }
        }
    }
    (count > 0).then_some(count)
}
