//! seeded-chainmap: a string-keyed, separately chained hash map with
//! seeded hashing, a pluggable allocator and optional secure erase.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a map that is safe to key with attacker-controlled strings and
//!   safe to fill with secrets, built in small layers so each can be
//!   reasoned about on its own.
//! - Layers:
//!   - `error`/`overflow`: closed error taxonomy with stable integer codes,
//!     and size arithmetic that reports wraparound instead of wrapping.
//!   - `alloc`/`security`: the process-wide allocator and hash seed, the
//!     seeded FNV-1a hash, and the zero-before-release wipe.
//!   - `config`: an explicit `Context` (allocator + seed) captured by each
//!     map, and `MapConfig` for everything else.
//!   - `raw`/`pool`: allocator-backed key copies, bucket-head arrays and
//!     the entry node pool; the only modules with raw pointers.
//!   - `ChainMap<V>`: chains, growth, cursors and handles on top.
//!
//! Constraints
//! - Every block a map owns (key copies, entry nodes, bucket array) comes
//!   from the map's allocator. Keys are `&str`, copied; values are owned
//!   `V` and never copied (store `&T` to keep ownership with the caller).
//! - Every size computation is checked before anything is allocated;
//!   failures surface as `Error::Overflow` and leave the map untouched.
//! - Allocation failure surfaces as `Error::OutOfMemory` and leaves the map
//!   untouched.
//! - Secure maps zero key bytes, vacated nodes, node pool blocks and bucket
//!   arrays before releasing them, and never move a block through
//!   `reallocate`.
//!
//! Chains and handles
//! - Entries live in a node pool: one allocator-backed block of slots with
//!   a free list. Chain links and bucket heads are pool keys (slot index +
//!   version). New entries are pushed at the chain head.
//! - Each entry stores its 32-bit hash, so growth relinks without
//!   rehashing key bytes.
//! - `Handle` wraps a pool key. Versions are pool-wide and never reused, so
//!   a handle to a removed entry resolves to `None` even after its slot is
//!   reused or the map is freed and refilled.
//!
//! Seeding
//! - The process-wide seed is initialised lazily (time and address bits)
//!   or explicitly through `seed_init`. Maps copy it at construction, so
//!   reseeding never reshuffles an existing map.
//!
//! Growth
//! - Default policy doubles the bucket count before an insertion would
//!   push the load above 75%. `Growth::Fixed` keeps the bucket count as
//!   constructed and lets chains grow.
//!
//! Cursor invalidation
//! - `Cursor` is detached from the map it walks. Inserting a new key,
//!   removing, clearing, freeing or rehashing invalidates outstanding
//!   cursors; debug builds panic if a stale cursor is advanced. Borrowing
//!   iterators (`iter`, `keys`, `values`) are checked by the borrow checker
//!   instead.
//!
//! Notes and non-goals
//! - Not internally synchronised. `ChainMap<V>` is `Send`/`Sync` when `V`
//!   is; share it behind a lock.
//! - No shrinking: buckets grow but are only released by `free`.

pub mod alloc;
mod chain_map;
mod chain_map_proptest;
pub mod config;
mod epoch;
pub mod error;
pub mod overflow;
mod pool;
mod raw;
pub mod security;

// Public surface
pub use alloc::{get_allocator, set_allocator, AllocatorRef, RawAllocator, SystemAllocator};
pub use chain_map::{ChainMap, Cursor, Handle, Iter, Keys, Values};
pub use config::{Context, Growth, MapConfig};
pub use error::{status_code, Error, Result};
pub use overflow::{checked_add, checked_multiply};
pub use security::{fnv1a_seeded, get_seed, reset_seed, seed_init};
