//! Overflow-checked sizing arithmetic.
//!
//! Capacities are caller- or growth-driven, so a byte-size computation can
//! wrap the machine word. Every allocation in the crate is sized through
//! these helpers and refuses to allocate instead of under-allocating.

use crate::error::{Error, Result};
use core::alloc::Layout;

/// `a * b` in native word width. The flag is `true` when the product
/// wrapped; the returned value is then the wrapped product and must not be
/// used for sizing.
#[inline]
pub const fn checked_multiply(a: usize, b: usize) -> (usize, bool) {
    a.overflowing_mul(b)
}

/// `a + b` in native word width, with the same contract as
/// [`checked_multiply`].
#[inline]
pub const fn checked_add(a: usize, b: usize) -> (usize, bool) {
    a.overflowing_add(b)
}

/// Byte size of `count` values of `T`.
#[inline]
pub fn array_bytes<T>(count: usize) -> Result<usize> {
    match checked_multiply(count, core::mem::size_of::<T>()) {
        (bytes, false) => Ok(bytes),
        (_, true) => Err(Error::Overflow),
    }
}

/// Layout for `count` values of `T`.
///
/// Sizes past `isize::MAX` are rejected by `Layout` as well; both cases
/// surface as [`Error::Overflow`].
pub fn array_layout<T>(count: usize) -> Result<Layout> {
    let bytes = array_bytes::<T>(count)?;
    Layout::from_size_align(bytes, core::mem::align_of::<T>()).map_err(|_| Error::Overflow)
}
