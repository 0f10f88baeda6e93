//! Allocator-backed node pool with generation-checked keys.
//!
//! Nodes live in one contiguous block from the map's allocator. Vacated
//! slots are threaded onto a free list and reused. Every insertion stamps
//! the slot with a pool-wide version that is never reset (not even by
//! `release`), so a key to a removed node can never resolve to a later one.
//!
//! Like the other raw storage, the pool does not remember its allocator:
//! the owning map passes the same allocator to every call and must
//! `release` the pool before dropping it.

use crate::alloc::{try_allocate, try_reallocate, RawAllocator};
use crate::error::{Error, Result};
use crate::overflow;
use crate::raw::release_block;
use crate::security::wipe_raw;
use core::alloc::Layout;
use core::marker::PhantomData;
use core::num::NonZeroU32;
use core::ptr::{self, NonNull};

/// Slots allocated by the first reservation.
const MIN_CAPACITY: usize = 8;

/// Largest slot count addressable by a `u32` index.
const MAX_CAPACITY: usize = u32::MAX as usize;

/// Generation-checked reference to a node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct NodeKey {
    idx: u32,
    version: NonZeroU32,
}

/// Head of a bucket chain or link to the next node.
pub(crate) type Link = Option<NodeKey>;

enum Slot<T> {
    Occupied { version: NonZeroU32, value: T },
    Vacant { next_free: Option<u32> },
}

pub(crate) struct NodePool<T> {
    slots: NonNull<Slot<T>>,
    capacity: usize,
    // Slots [0, used) are initialised; the rest of the block is not.
    used: usize,
    len: usize,
    free_head: Option<u32>,
    next_version: NonZeroU32,
    _owns: PhantomData<T>,
}

impl<T> NodePool<T> {
    pub(crate) const fn new() -> Self {
        Self {
            slots: NonNull::dangling(),
            capacity: 0,
            used: 0,
            len: 0,
            free_head: None,
            next_version: NonZeroU32::MIN,
            _owns: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    fn initialised(&self) -> &[Slot<T>] {
        // SAFETY: the first `used` slots are initialised (or dangling with 0).
        unsafe { core::slice::from_raw_parts(self.slots.as_ptr(), self.used) }
    }

    #[inline]
    fn initialised_mut(&mut self) -> &mut [Slot<T>] {
        // SAFETY: as above, and &mut self gives exclusive access.
        unsafe { core::slice::from_raw_parts_mut(self.slots.as_ptr(), self.used) }
    }

    fn layout(&self) -> Layout {
        // SAFETY: validated by `array_layout` when the block was allocated.
        unsafe {
            Layout::from_size_align_unchecked(
                self.capacity * core::mem::size_of::<Slot<T>>(),
                core::mem::align_of::<Slot<T>>(),
            )
        }
    }

    pub(crate) fn get(&self, key: NodeKey) -> Option<&T> {
        match self.initialised().get(key.idx as usize)? {
            Slot::Occupied { version, value } if *version == key.version => Some(value),
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, key: NodeKey) -> Option<&mut T> {
        match self.initialised_mut().get_mut(key.idx as usize)? {
            Slot::Occupied { version, value } if *version == key.version => Some(value),
            _ => None,
        }
    }

    /// Make sure the next [`NodePool::insert`] has a slot. Grows the block
    /// (at least doubling) when neither a vacant nor an unused slot is left.
    /// On error the pool is unchanged. Secure pools never move through
    /// `reallocate`; the superseded block is wiped and released.
    ///
    /// # Safety
    ///
    /// `alloc` must be the allocator every earlier block came from.
    pub(crate) unsafe fn reserve_one(&mut self, alloc: &dyn RawAllocator, secure: bool) -> Result<()> {
        if self.free_head.is_some() || self.used < self.capacity {
            return Ok(());
        }
        if self.capacity >= MAX_CAPACITY {
            return Err(Error::Overflow);
        }
        let (grown, wrapped) = overflow::checked_add(self.capacity, self.capacity.max(MIN_CAPACITY));
        if wrapped {
            return Err(Error::Overflow);
        }
        let count = grown.min(MAX_CAPACITY);
        let new_layout = overflow::array_layout::<Slot<T>>(count)?;

        if self.capacity == 0 {
            self.slots = try_allocate(alloc, new_layout)?.cast();
        } else if secure {
            let fresh = try_allocate(alloc, new_layout)?.cast::<Slot<T>>();
            ptr::copy_nonoverlapping(self.slots.as_ptr(), fresh.as_ptr(), self.used);
            release_block(alloc, self.slots.cast(), self.layout(), true);
            self.slots = fresh;
        } else {
            let moved = try_reallocate(alloc, self.slots.cast(), self.layout(), new_layout.size())?;
            self.slots = moved.cast();
        }
        let from = self.capacity;
        self.capacity = count;
        tracing::debug!(from, to = count, secure, "node pool grown");
        Ok(())
    }

    /// Store `value` and return its key.
    ///
    /// # Panics
    ///
    /// If no slot was reserved with [`NodePool::reserve_one`].
    pub(crate) fn insert(&mut self, value: T) -> NodeKey {
        let version = self.next_version;
        let idx = match self.free_head {
            Some(i) => {
                let slot = &mut self.initialised_mut()[i as usize];
                let next = match slot {
                    Slot::Vacant { next_free } => *next_free,
                    Slot::Occupied { .. } => unreachable!("occupied slot on the free list"),
                };
                // Vacant slots own nothing; overwriting drops nothing of value.
                *slot = Slot::Occupied { version, value };
                self.free_head = next;
                i
            }
            None => {
                assert!(self.used < self.capacity, "node pool insert without a reserved slot");
                // SAFETY: used < capacity, the slot is inside the block and uninitialised.
                unsafe {
                    self.slots
                        .as_ptr()
                        .add(self.used)
                        .write(Slot::Occupied { version, value })
                };
                self.used += 1;
                (self.used - 1) as u32
            }
        };
        self.next_version = version.checked_add(1).unwrap_or(NonZeroU32::MIN);
        self.len += 1;
        NodeKey { idx, version }
    }

    /// Take the node out of the pool. When `secure`, the vacated slot is
    /// zeroed before it is put on the free list.
    pub(crate) fn remove(&mut self, key: NodeKey, secure: bool) -> Option<T> {
        self.get(key)?;
        let next_free = self.free_head;
        // SAFETY: idx < used and the slot is occupied (checked above). It is
        // read out exactly once and overwritten before any further access.
        let taken = unsafe {
            let p = self.slots.as_ptr().add(key.idx as usize);
            let taken = p.read();
            if secure {
                wipe_raw(p.cast(), core::mem::size_of::<Slot<T>>());
            }
            p.write(Slot::Vacant { next_free });
            taken
        };
        self.free_head = Some(key.idx);
        self.len -= 1;
        match taken {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    /// Remove every node, handing each to `f`. Capacity is kept.
    pub(crate) fn clear_with(&mut self, secure: bool, mut f: impl FnMut(T)) {
        for idx in 0..self.used {
            let version = match &self.initialised()[idx] {
                Slot::Occupied { version, .. } => *version,
                Slot::Vacant { .. } => continue,
            };
            if let Some(value) = self.remove(NodeKey { idx: idx as u32, version }, secure) {
                f(value);
            }
        }
    }

    /// Every live node, mutably, in slot order.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (NodeKey, &mut T)> {
        self.initialised_mut()
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| match slot {
                Slot::Occupied { version, value } => Some((
                    NodeKey {
                        idx: i as u32,
                        version: *version,
                    },
                    value,
                )),
                Slot::Vacant { .. } => None,
            })
    }

    /// Drop any remaining nodes, release the block and become empty. Keys
    /// handed out earlier stay dead after the pool is reused.
    ///
    /// # Safety
    ///
    /// `alloc` must be the allocator the block came from.
    pub(crate) unsafe fn release(&mut self, alloc: &dyn RawAllocator, secure: bool) {
        self.clear_with(secure, drop);
        if self.capacity == 0 {
            return;
        }
        release_block(alloc, self.slots.cast(), self.layout(), secure);
        self.slots = NonNull::dangling();
        self.capacity = 0;
        self.used = 0;
        self.free_head = None;
    }
}
