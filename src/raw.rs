//! Allocator-backed storage owned by a map: key byte copies and the
//! bucket-head array. Entry nodes live in [`crate::pool`].
//!
//! Neither type remembers its allocator; the owning map passes the same
//! allocator to every call, which is why the release paths are `unsafe`.
//! Dropping either type without releasing it leaks the block.

use crate::alloc::{try_allocate, try_reallocate, RawAllocator};
use crate::error::Result;
use crate::overflow;
use crate::pool::Link;
use crate::security::wipe_raw;
use core::alloc::Layout;
use core::ptr::{self, NonNull};

/// Zero the block when `secure` and hand it back to `alloc`.
///
/// # Safety
///
/// `ptr` must be a live block from `alloc` allocated with `layout`.
pub(crate) unsafe fn release_block(
    alloc: &dyn RawAllocator,
    ptr: NonNull<u8>,
    layout: Layout,
    secure: bool,
) {
    if secure {
        wipe_raw(ptr.as_ptr(), layout.size());
    }
    alloc.release(ptr, layout);
}

/// Heap copy of a string key. Empty keys do not allocate.
pub(crate) struct KeyBytes {
    ptr: NonNull<u8>,
    len: usize,
}

impl KeyBytes {
    pub(crate) fn copy_from(alloc: &dyn RawAllocator, key: &str) -> Result<Self> {
        if key.is_empty() {
            return Ok(Self {
                ptr: NonNull::dangling(),
                len: 0,
            });
        }
        let layout = overflow::array_layout::<u8>(key.len())?;
        let ptr = try_allocate(alloc, layout)?;
        // SAFETY: fresh block of key.len() bytes, disjoint from `key`.
        unsafe { ptr::copy_nonoverlapping(key.as_ptr(), ptr.as_ptr(), key.len()) };
        Ok(Self { ptr, len: key.len() })
    }

    #[inline]
    pub(crate) fn as_bytes(&self) -> &[u8] {
        // SAFETY: ptr is valid for len bytes (or dangling with len 0).
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[inline]
    pub(crate) fn as_str(&self) -> &str {
        // SAFETY: the bytes were copied verbatim from a `&str`.
        unsafe { core::str::from_utf8_unchecked(self.as_bytes()) }
    }

    /// # Safety
    ///
    /// `alloc` must be the allocator passed to `copy_from`.
    pub(crate) unsafe fn release(self, alloc: &dyn RawAllocator, secure: bool) {
        if self.len == 0 {
            return;
        }
        let layout = Layout::from_size_align_unchecked(self.len, 1);
        release_block(alloc, self.ptr, layout, secure);
    }
}

/// Fixed-length array of chain heads.
pub(crate) struct BucketArray {
    heads: NonNull<Link>,
    len: usize,
}

impl BucketArray {
    pub(crate) const fn empty() -> Self {
        Self {
            heads: NonNull::dangling(),
            len: 0,
        }
    }

    /// Allocate `count` empty heads. Sizing is checked before anything is
    /// allocated.
    pub(crate) fn allocate(alloc: &dyn RawAllocator, count: usize) -> Result<Self> {
        debug_assert!(count > 0);
        let layout = overflow::array_layout::<Link>(count)?;
        let heads = try_allocate(alloc, layout)?.cast::<Link>();
        let mut arr = Self { heads, len: count };
        arr.reset_heads();
        Ok(arr)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[Link] {
        // SAFETY: len initialised heads (or dangling with len 0).
        unsafe { core::slice::from_raw_parts(self.heads.as_ptr(), self.len) }
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [Link] {
        // SAFETY: as above, and &mut self gives exclusive access.
        unsafe { core::slice::from_raw_parts_mut(self.heads.as_ptr(), self.len) }
    }

    fn layout(&self) -> Layout {
        // Computed successfully when the block was allocated.
        // SAFETY: size and align were validated by `array_layout`.
        unsafe {
            Layout::from_size_align_unchecked(
                self.len * core::mem::size_of::<Link>(),
                core::mem::align_of::<Link>(),
            )
        }
    }

    // Overwrites without reading, so it is valid on uninitialised memory.
    fn reset_heads(&mut self) {
        for i in 0..self.len {
            // SAFETY: i < len, block holds len slots.
            unsafe { self.heads.as_ptr().add(i).write(None) };
        }
    }

    /// Grow to `count` heads, all empty afterwards. On error the array and
    /// its contents are unchanged. Secure arrays never move through
    /// `reallocate`, which could leave an unwiped copy behind.
    ///
    /// # Safety
    ///
    /// `alloc` must be the allocator this array came from.
    pub(crate) unsafe fn regrow(
        &mut self,
        alloc: &dyn RawAllocator,
        count: usize,
        secure: bool,
    ) -> Result<()> {
        debug_assert!(count > self.len);
        let new_layout = overflow::array_layout::<Link>(count)?;
        if self.len == 0 {
            *self = Self::allocate(alloc, count)?;
            return Ok(());
        }
        if secure {
            let fresh = Self::allocate(alloc, count)?;
            let mut old = core::mem::replace(self, fresh);
            old.release(alloc, true);
        } else {
            let old_layout = self.layout();
            let heads = try_reallocate(alloc, self.heads.cast(), old_layout, new_layout.size())?;
            self.heads = heads.cast();
            self.len = count;
            self.reset_heads();
        }
        Ok(())
    }

    /// Release the block and become empty.
    ///
    /// # Safety
    ///
    /// `alloc` must be the allocator this array came from.
    pub(crate) unsafe fn release(&mut self, alloc: &dyn RawAllocator, secure: bool) {
        if self.len == 0 {
            return;
        }
        let layout = self.layout();
        release_block(alloc, self.heads.cast(), layout, secure);
        *self = Self::empty();
    }
}
