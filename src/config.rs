//! Explicit construction context and map configuration.
//!
//! The allocator and hash seed are process-wide by default, but a map never
//! holds a reference to the process-wide slots: it copies a [`Context`] at
//! construction. Subsystems that want their own allocator or seed build a
//! `Context` directly and never touch global state.

use crate::alloc::{self, AllocatorRef};
use crate::security;
use core::fmt;

/// Buckets allocated on first insertion when no capacity was requested.
pub const DEFAULT_BUCKETS: usize = 16;

/// Default growth threshold: entries may reach 75% of the bucket count.
pub const DEFAULT_MAX_LOAD_PERCENT: u32 = 75;

/// Allocator and seed captured by a container.
#[derive(Clone)]
pub struct Context {
    pub allocator: AllocatorRef,
    pub seed: u32,
}

impl Context {
    /// Snapshot of the process-wide allocator and seed.
    pub fn global() -> Self {
        Self {
            allocator: alloc::get_allocator(),
            seed: security::get_seed(),
        }
    }

    pub fn new(allocator: AllocatorRef, seed: u32) -> Self {
        Self { allocator, seed }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("seed", &format_args!("{:#010x}", self.seed))
            .finish_non_exhaustive()
    }
}

/// Bucket growth policy.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Growth {
    /// Double the bucket count before an insertion would push the load
    /// above `max_load_percent`.
    Doubling { max_load_percent: u32 },
    /// Never grow; chains lengthen without bound.
    Fixed,
}

impl Default for Growth {
    fn default() -> Self {
        Growth::Doubling {
            max_load_percent: DEFAULT_MAX_LOAD_PERCENT,
        }
    }
}

impl Growth {
    /// Whether holding `entries` in `buckets` exceeds the threshold.
    pub(crate) fn exceeded(&self, entries: usize, buckets: usize) -> bool {
        match *self {
            Growth::Fixed => false,
            Growth::Doubling { max_load_percent } => {
                // entries / buckets > pct / 100, in u128 to stay exact.
                (entries as u128) * 100 > (buckets as u128) * u128::from(max_load_percent.max(1))
            }
        }
    }
}

/// Options for [`ChainMap::with_config`](crate::ChainMap::with_config).
///
/// Unset fields fall back to the process-wide allocator and seed, lazy
/// bucket allocation, non-secure release and doubling growth.
#[derive(Clone, Debug, Default)]
pub struct MapConfig {
    pub(crate) secure: bool,
    pub(crate) buckets: Option<usize>,
    pub(crate) seed: Option<u32>,
    pub(crate) allocator: Option<AllocatorRef>,
    pub(crate) growth: Growth,
}

impl MapConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero key bytes and bucket arrays before releasing them.
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Allocate `buckets` heads eagerly (0 means the default of 16).
    pub fn buckets(mut self, buckets: usize) -> Self {
        self.buckets = Some(buckets);
        self
    }

    /// Use this seed instead of the process-wide one.
    pub fn seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Use this allocator instead of the process-wide one.
    pub fn allocator(mut self, allocator: AllocatorRef) -> Self {
        self.allocator = Some(allocator);
        self
    }

    pub fn growth(mut self, growth: Growth) -> Self {
        self.growth = growth;
        self
    }

    /// Apply both fields of `ctx`.
    pub fn context(self, ctx: Context) -> Self {
        self.allocator(ctx.allocator).seed(ctx.seed)
    }

    /// Resolve unset fields against the process-wide state.
    pub(crate) fn resolve_context(&mut self) -> Context {
        Context {
            allocator: self.allocator.take().unwrap_or_else(alloc::get_allocator),
            seed: self.seed.unwrap_or_else(security::get_seed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubling_threshold_is_strictly_above_percent() {
        let g = Growth::default();
        assert!(!g.exceeded(12, 16));
        assert!(g.exceeded(13, 16));
        assert!(!Growth::Fixed.exceeded(1_000, 1));
    }

    #[test]
    fn explicit_fields_win_over_process_wide_state() {
        let a = alloc::get_allocator();
        let mut cfg = MapConfig::new().seed(99).allocator(a.clone()).secure(true);
        let ctx = cfg.resolve_context();
        assert_eq!(ctx.seed, 99);
        assert!(std::sync::Arc::ptr_eq(&ctx.allocator, &a));
        assert!(cfg.secure);
    }
}
