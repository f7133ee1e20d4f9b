//! Point in time usage snapshot of an arena.

/// Snapshot returned by [`crate::Arena::stats`] and [`crate::SegmentedArena::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArenaStats {
    /// Bytes of backing storage, all segments included.
    pub capacity: usize,
    /// High-water mark, all segments included.
    pub used: usize,
    /// Blocks issued and not released.
    pub live_blocks: usize,
    /// Spans waiting in the free list.
    pub free_spans: usize,
    /// Bytes in the free list.
    pub free_bytes: usize,
    /// Size of the biggest span in the free list.
    pub largest_free_span: usize,
    /// Backing segments. Always 1 for a live [`crate::Arena`].
    pub segments: usize,
}

impl ArenaStats {
    /// Bytes between the high-water mark and the end of the storage.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity - self.used
    }

    /// `1 - largest_free_span / free_bytes`.
    ///
    /// 0 when the free bytes form a single span (or there are none), close
    /// to 1 when they are scattered across many small spans.
    #[must_use]
    pub fn fragmentation(&self) -> f64 {
        if self.free_bytes == 0 {
            return 0.0;
        }
        1.0 - self.largest_free_span as f64 / self.free_bytes as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragmentation_ratio() {
        let mut stats = ArenaStats::default();
        assert_eq!(stats.fragmentation(), 0.0);

        stats.free_bytes = 40;
        stats.largest_free_span = 40;
        assert_eq!(stats.fragmentation(), 0.0);

        stats.largest_free_span = 10;
        assert!((stats.fragmentation() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn remaining() {
        let stats = ArenaStats {
            capacity: 4096,
            used: 96,
            ..Default::default()
        };
        assert_eq!(stats.remaining(), 4000);
    }
}
