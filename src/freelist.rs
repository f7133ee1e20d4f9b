use crate::{utils::padding_for, vector::SlotVec};

/// A released byte range of an [`crate::Arena`], relative to the start of
/// its backing region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeSpan {
    pub offset: usize,
    pub size: usize,
}

impl FreeSpan {
    #[inline]
    pub const fn end(&self) -> usize {
        self.offset + self.size
    }

    #[inline]
    pub const fn contains(&self, offset: usize) -> bool {
        offset >= self.offset && offset < self.end()
    }
}

/// Tombstones tolerated before the slots are compacted.
const COMPACT_THRESHOLD: usize = 32;

/// Result of a best-fit search: which slot to carve and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Fit {
    /// Slot of the chosen span in the list.
    pub index: usize,
    pub span: FreeSpan,
    /// Alignment bytes needed at the start of the span.
    pub padding: usize,
}

/// Spans released back to the arena, waiting to be reused before the
/// high-water mark is pushed any further.
///
/// ```text
///   used
///   <-------------------------------------------------------->
/// +------+--------+------+------+------------+------+---------+-----------+
/// | live | (free) | live | live |   (free)   | live | (free)  |  virgin   |
/// +------+--------+------+------+------------+------+---------+-----------+
///           |                         |                |
///           +------------+------------+----------------+
///                        |
///                   FreeList slots (scan order = release order)
/// ```
///
/// Spans are never merged with their neighbours and live blocks are never
/// moved, so fragmentation only grows until the arena is reset.
/// Releasing a span that touches the high-water mark doesn't go through
/// here, the arena retracts `used` instead.
#[derive(Debug, Default)]
pub(crate) struct FreeList {
    spans: SlotVec<FreeSpan>,
}

impl FreeList {
    /// Creates a new empty FreeList
    pub const fn new() -> Self {
        Self {
            spans: SlotVec::new(),
        }
    }

    /// It tells whether the FreeList is empty or not.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Records a released span.
    pub fn insert(&mut self, span: FreeSpan) {
        debug_assert!(span.size != 0, "empty spans are tombstones");
        self.spans.push(span);
    }

    pub fn clear(&mut self) {
        self.spans.clear();
    }

    /// Live spans in scan order.
    pub fn iter(&self) -> impl Iterator<Item = &FreeSpan> + '_ {
        self.spans.iter().map(|(_, span)| span)
    }

    /// Whether `offset` falls inside any released span.
    pub fn covers(&self, offset: usize) -> bool {
        self.iter().any(|span| span.contains(offset))
    }

    /// Sum of all span sizes.
    pub fn total_bytes(&self) -> usize {
        self.iter().map(|span| span.size).sum()
    }

    pub fn largest(&self) -> usize {
        self.iter().map(|span| span.size).max().unwrap_or(0)
    }

    /// Best-fit search for `size` bytes.
    ///
    /// Every span is visited and the smallest one that can hold the
    /// request wins. Ties go to the span found first. When `align` is set,
    /// each candidate is checked with the padding its own start needs.
    /// Regions start on a page boundary, so aligning the offset aligns the
    /// address.
    pub fn find_best_fit(&self, size: usize, align: Option<usize>) -> Option<Fit> {
        let mut best: Option<Fit> = None;

        for (index, span) in self.spans.iter() {
            // Tombstones never show up here, but a zero sized span must never
            // be handed out either.
            if span.size == 0 {
                continue;
            }

            let padding = align.map_or(0, |align| padding_for(span.offset, align));

            match padding.checked_add(size) {
                Some(needed) if span.size >= needed => {}
                _ => continue,
            }

            if best.is_none_or(|best| span.size < best.span.size) {
                best = Some(Fit {
                    index,
                    span: *span,
                    padding,
                });
            }
        }

        best
    }

    /// Carves `size` bytes out of the span chosen by [`FreeList::find_best_fit`]
    /// and returns the payload offset.
    ///
    /// An exact fit frees the slot. Otherwise the slot is rewritten in place
    /// to describe the leftover tail.
    pub fn take(&mut self, fit: Fit, size: usize) -> usize {
        let consumed = fit.padding + size;
        debug_assert!(consumed <= fit.span.size);

        if consumed == fit.span.size {
            self.spans.free_slot(fit.index);

            // Fits are used right away, no index outlives this call.
            if self.spans.tombstones() > COMPACT_THRESHOLD.max(self.spans.len()) {
                self.spans.compact();
            }
        } else {
            self.spans.replace(
                fit.index,
                FreeSpan {
                    offset: fit.span.offset + consumed,
                    size: fit.span.size - consumed,
                },
            );
        }

        fit.span.offset + fit.padding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(spans: &[(usize, usize)]) -> FreeList {
        let mut list = FreeList::new();
        for &(offset, size) in spans {
            list.insert(FreeSpan { offset, size });
        }
        list
    }

    #[test]
    fn best_fit_picks_smallest_sufficient() {
        let mut list = list(&[(100, 20), (0, 10)]);

        let fit = list.find_best_fit(8, None).unwrap();
        assert_eq!(fit.span, FreeSpan { offset: 0, size: 10 });

        assert_eq!(list.take(fit, 8), 0);
        let spans: Vec<_> = list.iter().copied().collect();
        assert_eq!(spans, vec![FreeSpan { offset: 100, size: 20 }, FreeSpan { offset: 8, size: 2 }]);
    }

    #[test]
    fn ties_go_to_first_found() {
        let list = list(&[(64, 16), (0, 16)]);
        let fit = list.find_best_fit(16, None).unwrap();
        assert_eq!(fit.index, 0);
        assert_eq!(fit.span.offset, 64);
    }

    #[test]
    fn exact_fit_removes_span() {
        let mut list = list(&[(32, 4)]);
        let fit = list.find_best_fit(4, None).unwrap();
        assert_eq!(list.take(fit, 4), 32);
        assert!(list.is_empty());
    }

    #[test]
    fn no_fit() {
        let list = list(&[(0, 4), (8, 6)]);
        assert!(list.find_best_fit(7, None).is_none());
        assert!(FreeList::new().find_best_fit(1, None).is_none());
    }

    #[test]
    fn aligned_fit_accounts_for_padding() {
        // The span at 1 needs 7 bytes of padding, so 8 bytes don't fit in 12.
        let mut list = list(&[(1, 12), (40, 16)]);
        let fit = list.find_best_fit(8, Some(8)).unwrap();
        assert_eq!(fit.span.offset, 40);
        assert_eq!(fit.padding, 0);

        let fit = list.find_best_fit(4, Some(8)).unwrap();
        assert_eq!(fit.span.offset, 1);
        assert_eq!(fit.padding, 7);
        assert_eq!(list.take(fit, 4), 8);
        assert_eq!(list.iter().copied().collect::<Vec<_>>()[0], FreeSpan { offset: 12, size: 1 });
    }

    #[test]
    fn tombstones_are_compacted() {
        let mut list = FreeList::new();
        list.insert(FreeSpan { offset: 0, size: 1000 });

        for i in 0..100 {
            list.insert(FreeSpan { offset: 2000 + i * 8, size: 8 });
            let fit = list.find_best_fit(8, None).unwrap();
            list.take(fit, 8);
        }

        assert_eq!(list.len(), 1);
        assert!(list.spans.tombstones() <= COMPACT_THRESHOLD);
    }

    #[test]
    fn bookkeeping() {
        let list = list(&[(0, 4), (16, 12), (40, 2)]);
        assert_eq!(list.len(), 3);
        assert_eq!(list.total_bytes(), 18);
        assert_eq!(list.largest(), 12);
        assert!(list.covers(20));
        assert!(!list.covers(28));
    }
}
