//! Closed error taxonomy shared by every container in the crate.

/// Failure of a container operation.
///
/// Each variant has a stable integer code (see [`Error::code`]); success is
/// code `0`. The map itself only produces `OutOfMemory`, `Overflow` and
/// `NotFound`. `Bounds`, `Empty` and `Null` belong to the sibling
/// containers and to FFI shims that accept raw pointers.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, thiserror::Error)]
pub enum Error {
    #[error("allocation of {bytes} bytes failed")]
    OutOfMemory { bytes: usize },
    #[error("index {index} out of bounds for length {len}")]
    Bounds { index: usize, len: usize },
    #[error("container is empty")]
    Empty,
    #[error("size computation overflowed the machine word")]
    Overflow,
    #[error("key not found")]
    NotFound,
    #[error("null argument")]
    Null,
}

pub type Result<T> = core::result::Result<T, Error>;

/// Status code reported for a successful operation.
pub const OK: i32 = 0;

impl Error {
    /// Integer code of this error, always negative.
    pub const fn code(&self) -> i32 {
        match self {
            Error::OutOfMemory { .. } => -1,
            Error::Bounds { .. } => -2,
            Error::Empty => -3,
            Error::Overflow => -4,
            Error::NotFound => -5,
            Error::Null => -6,
        }
    }

    /// True for conditions a caller may reasonably retry after freeing
    /// resources elsewhere.
    pub const fn is_resource_exhaustion(&self) -> bool {
        matches!(self, Error::OutOfMemory { .. })
    }
}

/// Collapse a result into its integer status code.
pub fn status_code<T>(r: &Result<T>) -> i32 {
    match r {
        Ok(_) => OK,
        Err(e) => e.code(),
    }
}
