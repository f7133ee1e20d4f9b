/// Handle to a block issued by [`crate::Arena`].
///
/// A block is described by its offset from the start of the arena's
/// backing region, not by an address, so it stays valid when the region is
/// moved by a growth. The arena keeps no header next to the payload:
///
/// ```text
///            padding     len
///           <-------><--------------->
/// +--------+---------+----------------+--------
/// |  ...   |  (pad)  |    payload     |  ...
/// +--------+---------+----------------+--------
///                    ^
///                    offset
/// ```
///
/// `padding` is only non zero for aligned allocations. Those bytes are
/// charged to the block and go back to the arena together with it.
///
/// Every issued block also carries the generation it was issued under.
/// Offsets are recycled, generations are not, so a handle kept after its
/// block was released never matches the block issued in its place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    pub(crate) offset: usize,
    pub(crate) len: usize,
    pub(crate) padding: usize,
    pub(crate) generation: u64,
}

impl Block {
    pub(crate) const fn new(offset: usize, len: usize, padding: usize, generation: u64) -> Self {
        Self {
            offset,
            len,
            padding,
            generation,
        }
    }

    /// Offset of the first payload byte from the start of the arena.
    #[inline]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Payload size, as requested.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Alignment bytes consumed in front of the payload.
    #[inline]
    pub const fn padding(&self) -> usize {
        self.padding
    }

    /// First byte the block occupies, padding included.
    #[inline]
    pub(crate) const fn span_start(&self) -> usize {
        self.offset - self.padding
    }

    /// Bytes the block occupies, padding included.
    #[inline]
    pub(crate) const fn span_len(&self) -> usize {
        self.padding + self.len
    }

    /// One past the last payload byte.
    #[inline]
    pub(crate) const fn end(&self) -> usize {
        self.offset + self.len
    }
}
