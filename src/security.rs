//! Security substrate: the process-wide hash seed, seeded FNV-1a, and the
//! zero-before-release wipe.
//!
//! Without randomisation an adversary who knows the hash function can pick
//! keys that all land in one bucket and turn O(1) lookups into O(n) chain
//! walks. Mixing a per-process seed into the hash makes bucket assignment
//! unpredictable from outside.

use core::mem::MaybeUninit;
use parking_lot::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use zeroize::Zeroize;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// FNV-1a over `bytes`, with `seed` folded into the offset basis.
#[inline]
pub fn fnv1a_seeded(bytes: &[u8], seed: u32) -> u32 {
    let mut hash = FNV_OFFSET_BASIS ^ seed;
    for &b in bytes {
        hash ^= u32::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

// `None` until the first `seed_init`/`get_seed`.
static SEED: Mutex<Option<u32>> = parking_lot::const_mutex(None);

/// Initialise the process-wide seed.
///
/// `0` derives a seed from the wall clock mixed with address-space bits;
/// any other value is used verbatim. Calling again overwrites the seed for
/// maps constructed afterwards; existing maps keep the value they captured.
pub fn seed_init(custom_seed: u32) {
    let seed = if custom_seed == 0 {
        derive_seed()
    } else {
        custom_seed
    };
    *SEED.lock() = Some(seed);
    tracing::debug!(derived = custom_seed == 0, "hash seed initialised");
}

/// Current process-wide seed, deriving one on first use.
pub fn get_seed() -> u32 {
    let mut slot = SEED.lock();
    *slot.get_or_insert_with(derive_seed)
}

/// Forget the process-wide seed; the next [`get_seed`] derives a new one.
pub fn reset_seed() {
    *SEED.lock() = None;
}

fn derive_seed() -> u32 {
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32 ^ d.subsec_nanos())
        .unwrap_or(0);
    let p = &SEED as *const _ as usize;
    let stack = &t as *const u32 as usize;
    t ^ (p >> 16) as u32 ^ (p & 0xFFFF) as u32 ^ (stack >> 4) as u32
}

/// Overwrite `bytes` with zeroes in a way the optimiser cannot drop.
#[inline]
pub fn wipe(bytes: &mut [u8]) {
    bytes.zeroize();
}

/// [`wipe`] for memory that may be partly uninitialised, such as the unused
/// tail of a node pool block.
///
/// # Safety
///
/// `ptr` must be valid for writes of `len` bytes.
pub(crate) unsafe fn wipe_raw(ptr: *mut u8, len: usize) {
    core::slice::from_raw_parts_mut(ptr.cast::<MaybeUninit<u8>>(), len).zeroize();
}
