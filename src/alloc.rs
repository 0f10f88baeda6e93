//! Allocator indirection.
//!
//! Every container allocates through a [`RawAllocator`] resolved at
//! construction time instead of the platform default, so one process can
//! redirect all container memory (arena, pool, instrumented allocator)
//! without recompiling container code.

use crate::error::{Error, Result};
use core::alloc::Layout;
use core::ptr::NonNull;
use parking_lot::RwLock;
use std::sync::Arc;

/// Source of raw memory for containers.
///
/// # Safety
///
/// Implementors must return blocks that are valid for reads and writes of
/// `layout.size()` bytes, aligned to `layout.align()`, and not aliased by
/// any other live block. Callers never request zero-sized layouts.
pub unsafe trait RawAllocator: Send + Sync {
    /// Allocate a block for `layout`. `None` means out of memory.
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Resize a block, preserving the first `min(old.size(), new_size)`
    /// bytes. On `None` the original block is untouched and still owned by
    /// the caller.
    ///
    /// # Safety
    ///
    /// `ptr` must come from this allocator with layout `old`; `new_size`
    /// must be non-zero and form a valid layout with `old.align()`.
    unsafe fn reallocate(&self, ptr: NonNull<u8>, old: Layout, new_size: usize)
        -> Option<NonNull<u8>>;

    /// Return a block to the allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must come from this allocator with exactly `layout` and must not
    /// be used afterwards.
    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout);
}

/// Shared handle to an allocator.
pub type AllocatorRef = Arc<dyn RawAllocator>;

impl core::fmt::Debug for dyn RawAllocator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("RawAllocator")
    }
}

/// Platform default backed by `std::alloc`.
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemAllocator;

unsafe impl RawAllocator for SystemAllocator {
    #[inline]
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        debug_assert!(layout.size() > 0);
        // SAFETY: layout is non-zero sized per the trait contract.
        NonNull::new(unsafe { std::alloc::alloc(layout) })
    }

    #[inline]
    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old: Layout,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        NonNull::new(std::alloc::realloc(ptr.as_ptr(), old, new_size))
    }

    #[inline]
    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        std::alloc::dealloc(ptr.as_ptr(), layout)
    }
}

static GLOBAL_ALLOCATOR: RwLock<Option<AllocatorRef>> = parking_lot::const_rwlock(None);

/// Install a process-wide allocator; `None` restores [`SystemAllocator`].
///
/// Maps capture the allocator when they are constructed, so existing maps
/// keep releasing into the allocator they allocated from.
pub fn set_allocator(allocator: Option<AllocatorRef>) {
    let installed = allocator.is_some();
    *GLOBAL_ALLOCATOR.write() = allocator;
    tracing::debug!(custom = installed, "process-wide allocator replaced");
}

/// The allocator new containers resolve to.
pub fn get_allocator() -> AllocatorRef {
    match &*GLOBAL_ALLOCATOR.read() {
        Some(a) => a.clone(),
        None => Arc::new(SystemAllocator),
    }
}

/// Allocate or report `OutOfMemory`.
pub(crate) fn try_allocate(alloc: &dyn RawAllocator, layout: Layout) -> Result<NonNull<u8>> {
    alloc.allocate(layout).ok_or_else(|| {
        tracing::warn!(bytes = layout.size(), "allocation failed");
        Error::OutOfMemory {
            bytes: layout.size(),
        }
    })
}

/// Reallocate or report `OutOfMemory`; the original block stays valid on error.
///
/// # Safety
///
/// Same contract as [`RawAllocator::reallocate`].
pub(crate) unsafe fn try_reallocate(
    alloc: &dyn RawAllocator,
    ptr: NonNull<u8>,
    old: Layout,
    new_size: usize,
) -> Result<NonNull<u8>> {
    alloc.reallocate(ptr, old, new_size).ok_or_else(|| {
        tracing::warn!(bytes = new_size, "reallocation failed");
        Error::OutOfMemory { bytes: new_size }
    })
}
