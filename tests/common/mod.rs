// Shared helpers for integration tests.
#![allow(dead_code)]

use parking_lot::Mutex;
use seeded_chainmap::{RawAllocator, SystemAllocator};
use std::alloc::Layout;
use std::ptr::NonNull;
use std::sync::Arc;

/// What a released block looked like at the moment of release.
#[derive(Clone, Debug)]
pub struct Release {
    pub size: usize,
    pub bytes: Vec<u8>,
}

impl Release {
    pub fn all_zero(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }

    pub fn contains(&self, needle: &[u8]) -> bool {
        !needle.is_empty() && self.bytes.windows(needle.len()).any(|w| w == needle)
    }
}

/// System-backed allocator that records every release and can be armed to
/// fail once a budget of successful allocations is spent.
#[derive(Default)]
pub struct Recorder {
    inner: Mutex<State>,
}

#[derive(Default)]
struct State {
    allocations: usize,
    reallocations: usize,
    outstanding: isize,
    outstanding_bytes: isize,
    budget: Option<usize>,
    releases: Vec<Release>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_after(&self, successes: usize) {
        let mut s = self.inner.lock();
        s.budget = Some(s.allocations + successes);
    }

    pub fn never_fail(&self) {
        self.inner.lock().budget = None;
    }

    pub fn allocations(&self) -> usize {
        self.inner.lock().allocations
    }

    pub fn reallocations(&self) -> usize {
        self.inner.lock().reallocations
    }

    pub fn outstanding(&self) -> isize {
        self.inner.lock().outstanding
    }

    /// Bytes currently held by blocks from this allocator.
    pub fn outstanding_bytes(&self) -> isize {
        self.inner.lock().outstanding_bytes
    }

    pub fn releases(&self) -> Vec<Release> {
        self.inner.lock().releases.clone()
    }

    fn exhausted(s: &State) -> bool {
        s.budget.is_some_and(|n| s.allocations >= n)
    }
}

unsafe impl RawAllocator for Recorder {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        let mut s = self.inner.lock();
        if Self::exhausted(&s) {
            return None;
        }
        s.allocations += 1;
        s.outstanding += 1;
        s.outstanding_bytes += layout.size() as isize;
        SystemAllocator.allocate(layout)
    }

    unsafe fn reallocate(&self, ptr: NonNull<u8>, old: Layout, new_size: usize) -> Option<NonNull<u8>> {
        let mut s = self.inner.lock();
        if Self::exhausted(&s) {
            return None;
        }
        let moved = SystemAllocator.reallocate(ptr, old, new_size)?;
        s.reallocations += 1;
        s.outstanding_bytes += new_size as isize - old.size() as isize;
        Some(moved)
    }

    unsafe fn release(&self, ptr: NonNull<u8>, layout: Layout) {
        let bytes = std::slice::from_raw_parts(ptr.as_ptr(), layout.size()).to_vec();
        {
            let mut s = self.inner.lock();
            s.outstanding -= 1;
            s.outstanding_bytes -= layout.size() as isize;
            s.releases.push(Release {
                size: layout.size(),
                bytes,
            });
        }
        SystemAllocator.release(ptr, layout)
    }
}
