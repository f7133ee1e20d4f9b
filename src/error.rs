//! Errors reported by the arenas.

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, ArenaError>;

/// Everything that can go wrong while allocating from or releasing into an arena.
///
/// Failures are always returned to the caller, the arenas never abort.
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    /// The kernel refused to map the backing memory.
    #[error("backing memory allocation failed: {requested} bytes")]
    AllocationFailed { requested: usize },

    /// Computing the new capacity overflowed `usize`.
    #[error("capacity overflow while reserving {requested} bytes")]
    CapacityOverflow { requested: usize },

    /// Zero sized blocks are not handed out.
    #[error("zero sized allocation requested")]
    ZeroSizedRequest,

    /// The block does not start a live allocation of this arena.
    #[error("block at offset {offset} ({len} bytes) is not owned by this arena")]
    InvalidBlock { offset: usize, len: usize },

    /// The block was released with a different size than it was issued with.
    #[error("block at offset {offset} was issued with {expected} bytes, released with {actual}")]
    SizeMismatch {
        offset: usize,
        expected: usize,
        actual: usize,
    },

    /// The block was already released.
    #[error("block at offset {offset} released twice")]
    DoubleFree { offset: usize },

    #[error("invalid arena configuration: {reason}")]
    InvalidConfig { reason: &'static str },
}

impl ArenaError {
    /// Stable category code, handy for metrics labels and log filtering.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AllocationFailed { .. } => "ARENA:ALLOC:FAILED",
            Self::CapacityOverflow { .. } => "ARENA:ALLOC:OVERFLOW",
            Self::ZeroSizedRequest => "ARENA:ALLOC:ZERO",
            Self::InvalidBlock { .. } => "ARENA:FREE:INVALID",
            Self::SizeMismatch { .. } => "ARENA:FREE:SIZE",
            Self::DoubleFree { .. } => "ARENA:FREE:DOUBLE",
            Self::InvalidConfig { .. } => "ARENA:CONFIG:INVALID",
        }
    }

    /// Whether the error comes from misuse of a block handle rather than
    /// from the system allocator.
    #[must_use]
    pub fn is_consistency_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidBlock { .. } | Self::SizeMismatch { .. } | Self::DoubleFree { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_categories() {
        let err = ArenaError::DoubleFree { offset: 8 };
        assert_eq!(err.code(), "ARENA:FREE:DOUBLE");
        assert!(err.is_consistency_violation());
        assert_eq!(err.to_string(), "block at offset 8 released twice");

        let err = ArenaError::AllocationFailed { requested: 4096 };
        assert!(!err.is_consistency_violation());
        assert_eq!(err.code(), "ARENA:ALLOC:FAILED");
    }
}
