use crate::error::{ArenaError, Result};

/// Capacity used when none is given: one 4k page.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Tunables shared by [`crate::Arena`] and [`crate::SegmentedArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Bytes reserved by [`crate::Arena`] at creation. Zero means [`DEFAULT_CAPACITY`].
    pub initial_capacity: usize,
    /// Capacity of a regular segment in [`crate::SegmentedArena`]. Requests
    /// larger than this get a dedicated segment.
    pub segment_capacity: usize,
    /// Overwrite released blocks with zeroes. Debugging aid only.
    pub zero_on_free: bool,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            segment_capacity: DEFAULT_CAPACITY,
            zero_on_free: true,
        }
    }
}

impl ArenaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_segment_capacity(mut self, capacity: usize) -> Self {
        self.segment_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_zero_on_free(mut self, zero: bool) -> Self {
        self.zero_on_free = zero;
        self
    }

    /// Initial capacity with the zero-means-default rule applied.
    pub(crate) fn effective_initial_capacity(&self) -> usize {
        if self.initial_capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            self.initial_capacity
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.segment_capacity == 0 {
            return Err(ArenaError::InvalidConfig {
                reason: "segment capacity must be greater than zero",
            });
        }

        Ok(())
    }
}
