//! Debug-only structural-mutation epoch.
//!
//! A map bumps its epoch on every structural change (insert of a new key,
//! remove, clear, free, rehash). A detached cursor stamps the epoch when it
//! is created; advancing it under a different epoch panics in debug builds.
//! In release builds both types are zero-sized and every check is a no-op.

/// Per-map mutation counter.
#[derive(Debug, Default)]
pub(crate) struct DebugEpoch {
    #[cfg(debug_assertions)]
    value: u64,
}

/// Epoch observed by a cursor when it was positioned.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct EpochStamp {
    #[cfg(debug_assertions)]
    value: u64,
}

impl DebugEpoch {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            value: 0,
        }
    }

    #[inline]
    pub(crate) fn bump(&mut self) {
        #[cfg(debug_assertions)]
        {
            self.value = self.value.wrapping_add(1);
        }
    }

    #[inline]
    pub(crate) fn stamp(&self) -> EpochStamp {
        EpochStamp {
            #[cfg(debug_assertions)]
            value: self.value,
        }
    }

    /// Panics in debug builds when `stamp` predates a structural mutation.
    #[inline]
    pub(crate) fn check(&self, stamp: &EpochStamp) {
        #[cfg(debug_assertions)]
        assert!(
            stamp.value == self.value,
            "cursor used after structural mutation of the map"
        );
        #[cfg(not(debug_assertions))]
        let _ = stamp;
    }
}
