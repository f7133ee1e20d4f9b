use std::ptr::NonNull;

use crate::{error::Result, region::Region, utils::padding_for};

/// One backing block of a [`crate::SegmentedArena`].
///
/// A segment is a [`Region`] that is never grown, so every address handed
/// out of it stays put until the segment is dropped.
///
/// ```text
/// +-------------------------------+---------------------+
/// |        used (handed out)      |      remaining      |
/// +-------------------------------+---------------------+
/// ^ region start                  ^ next bump
/// ```
pub(crate) struct Segment {
    region: Region,
    used: usize,
}

impl Segment {
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            region: Region::new(capacity)?,
            used: 0,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    #[inline]
    pub fn used(&self) -> usize {
        self.used
    }

    /// Bumps `size` bytes aligned to `align` (1 for no alignment) off the
    /// segment. Returns `None` when padding and payload don't fit.
    pub fn bump(&mut self, size: usize, align: usize) -> Option<NonNull<u8>> {
        let padding = padding_for(self.region.base_addr() + self.used, align);
        let needed = padding.checked_add(size)?;

        if self.capacity() - self.used < needed {
            return None;
        }

        let offset = self.used + padding;
        self.used += needed;

        unsafe { Some(self.region.as_ptr().add(offset)) }
    }

    /// Makes the whole segment available again, zeroing the handed out
    /// prefix when asked to.
    pub fn rewind(&mut self, zero: bool) {
        if zero {
            self.region.zero(0, self.used);
        }
        self.used = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_until_full() {
        let mut segment = Segment::new(16).unwrap();

        let a = segment.bump(10, 1).unwrap();
        let b = segment.bump(6, 1).unwrap();
        assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, 10);
        assert_eq!(segment.used(), 16);

        assert!(segment.bump(1, 1).is_none());
    }

    #[test]
    fn aligned_bump_pays_padding() {
        let mut segment = Segment::new(32).unwrap();
        segment.bump(1, 1).unwrap();

        let aligned = segment.bump(8, 8).unwrap();
        assert_eq!(aligned.as_ptr() as usize % 8, 0);
        assert_eq!(segment.used(), 16);

        // 16 bytes left, the padding is zero now, 17 don't fit.
        assert!(segment.bump(17, 8).is_none());
        assert_eq!(segment.used(), 16);
    }

    #[test]
    fn rewind() {
        let mut segment = Segment::new(8).unwrap();
        let ptr = segment.bump(8, 1).unwrap();
        unsafe { ptr.as_ptr().write(42) };

        segment.rewind(true);

        assert_eq!(segment.used(), 0);
        assert_eq!(segment.bump(8, 1), Some(ptr));
        unsafe { assert_eq!(*ptr.as_ptr(), 0) };
    }
}
