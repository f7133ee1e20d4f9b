use std::{collections::BTreeMap, fmt, mem, ptr::NonNull};

use bytemuck::Pod;
use tracing::{debug, trace, warn};

use crate::{
    align::AlignMode,
    block::Block,
    config::ArenaConfig,
    error::{ArenaError, Result},
    freelist::{FreeList, FreeSpan},
    region::{Growth, Region},
    stats::ArenaStats,
    utils::{WORD_ALIGN, padding_for},
};

/// Single buffer arena with best-fit reuse of released blocks.
///
/// Every block lives in one contiguous [`Region`]. New blocks are served from
/// the free list when a released span fits, otherwise they are bumped off
/// the high-water mark `used`, growing the region when it runs out:
///
/// ```text
///  offset 0                                   used                capacity
///  +--------+--------+--------+--------+--------+--------------------+
///  | block  | (free) | block  | block  | (free) |       virgin       |
///  +--------+--------+--------+--------+--------+--------------------+
/// ```
///
/// Blocks are handed out as [`Block`] handles holding offsets, so they
/// survive a growth that moves the region. Raw addresses obtained through
/// [`Arena::as_ptr`] do not: any call that may allocate can invalidate them.
///
/// Nothing is stored next to the payloads. Live blocks are recorded in a
/// side table, which is what lets [`Arena::free`] reject foreign, stale and
/// mis-sized handles. Handles also carry the generation they were issued
/// under, so a stale handle is told apart from a newer block at the same
/// offset.
///
/// The arena is single threaded.
pub struct Arena {
    /// Backing storage. `None` once the arena has been torn down.
    region: Option<Region>,
    /// High-water mark: everything past it has never been handed out.
    used: usize,
    free_list: FreeList,
    /// Live blocks keyed by payload offset.
    live: BTreeMap<usize, Block>,
    /// Generation given to the next issued block. Survives reset and teardown.
    next_generation: u64,
    align: AlignMode,
    config: ArenaConfig,
}

impl Arena {
    /// Creates an arena with the default capacity (4096 bytes).
    pub fn new() -> Result<Self> {
        Self::with_config(ArenaConfig::default())
    }

    /// Creates an arena able to hold `capacity` bytes before growing.
    /// A capacity of zero selects the default.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_config(ArenaConfig::default().with_initial_capacity(capacity))
    }

    pub fn with_config(config: ArenaConfig) -> Result<Self> {
        config.validate()?;

        let capacity = config.effective_initial_capacity();
        let region = Region::new(capacity)?;

        debug!(capacity, "Created arena");

        Ok(Self {
            region: Some(region),
            used: 0,
            free_list: FreeList::new(),
            live: BTreeMap::new(),
            next_generation: 0,
            align: AlignMode::default(),
            config,
        })
    }

    /// Bytes of backing storage. Zero after [`Arena::teardown`].
    #[inline]
    pub fn capacity(&self) -> usize {
        self.region.as_ref().map_or(0, Region::capacity)
    }

    /// Current high-water mark.
    #[inline]
    pub fn used(&self) -> usize {
        self.used
    }

    #[inline]
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    #[inline]
    pub fn align_mode(&self) -> AlignMode {
        self.align
    }

    /// Aligns the next allocation only.
    pub fn align_next_block(&mut self) {
        self.align = AlignMode::AlignNext;
    }

    /// Aligns every allocation until [`Arena::disable_alignment`].
    pub fn align_until_disabled(&mut self) {
        self.align = AlignMode::AlignUntilDisabled;
    }

    /// Clears both aligned states.
    pub fn disable_alignment(&mut self) {
        self.align = AlignMode::Unaligned;
    }

    /// Stops [`AlignMode::AlignUntilDisabled`] but keeps a pending
    /// [`AlignMode::AlignNext`].
    pub fn disable_persistent_alignment(&mut self) {
        self.align.clear_persistent();
    }

    /// Allocates `size` bytes following the current [`AlignMode`].
    ///
    /// Aligned blocks start at a multiple of the pointer width. The padding
    /// in front of them is consumed from the arena as part of the block.
    pub fn alloc(&mut self, size: usize) -> Result<Block> {
        if size == 0 {
            return Err(ArenaError::ZeroSizedRequest);
        }

        let aligned = self.align.take();
        self.allocate(size, aligned)
    }

    /// Allocates `size` pointer aligned bytes regardless of the current mode,
    /// which is left untouched.
    pub fn alloc_aligned(&mut self, size: usize) -> Result<Block> {
        if size == 0 {
            return Err(ArenaError::ZeroSizedRequest);
        }

        self.allocate(size, true)
    }

    /// Allocates a block for `value` and copies it in.
    pub fn alloc_value<T: Pod>(&mut self, value: T) -> Result<Block> {
        let block = self.alloc(mem::size_of::<T>())?;
        self.get_mut(block)?.copy_from_slice(bytemuck::bytes_of(&value));
        Ok(block)
    }

    fn allocate(&mut self, size: usize, aligned: bool) -> Result<Block> {
        let align = aligned.then_some(WORD_ALIGN);

        if !self.free_list.is_empty()
            && let Some(fit) = self.free_list.find_best_fit(size, align)
        {
            let offset = self.free_list.take(fit, size);
            let block = Block::new(offset, size, fit.padding, self.issue_generation());

            trace!(offset, size, span = fit.span.size, "Reused free span");

            self.live.insert(offset, block);
            return Ok(block);
        }

        // Regions start on a page boundary, aligning the offset aligns the address.
        let padding = align.map_or(0, |align| padding_for(self.used, align));
        let needed = padding
            .checked_add(size)
            .ok_or(ArenaError::CapacityOverflow { requested: size })?;

        self.reserve(needed)?;

        let block = Block::new(self.used + padding, size, padding, self.issue_generation());
        self.used += needed;
        self.live.insert(block.offset, block);

        Ok(block)
    }

    fn issue_generation(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1);
        generation
    }

    /// Makes room for `needed` bytes past the high-water mark.
    ///
    /// The new capacity is `capacity * 2 + needed`: at least double, plus
    /// the request itself.
    fn reserve(&mut self, needed: usize) -> Result<()> {
        let capacity = self.capacity();

        if capacity - self.used >= needed {
            return Ok(());
        }

        let new_capacity = capacity
            .checked_mul(2)
            .and_then(|doubled| doubled.checked_add(needed))
            .ok_or(ArenaError::CapacityOverflow { requested: needed })?
            .max(capacity);

        match self.region.as_mut() {
            Some(region) => {
                let growth = region.grow(new_capacity, self.used)?;
                debug!(
                    old_capacity = capacity,
                    new_capacity,
                    in_place = growth == Growth::InPlace,
                    "Grew arena"
                );
            }
            None => {
                // Torn down arenas come back to life on the next allocation.
                let new_capacity = new_capacity.max(self.config.effective_initial_capacity());
                self.region = Some(Region::new(new_capacity)?);
                debug!(capacity = new_capacity, "Recreated arena storage");
            }
        }

        Ok(())
    }

    /// Releases `block` back to the arena.
    ///
    /// The bytes are zeroed when [`ArenaConfig::zero_on_free`] is set. A
    /// block ending at the high-water mark lowers it directly, any other
    /// block becomes a span in the free list.
    pub fn free(&mut self, block: Block) -> Result<()> {
        if let Err(err) = self.check_live(&block) {
            let err = match err {
                ArenaError::InvalidBlock { offset, .. } if self.was_released(&block) => {
                    ArenaError::DoubleFree { offset }
                }
                err => err,
            };

            warn!(offset = block.offset, len = block.len, error = %err, "Rejected free");
            return Err(err);
        }

        self.live.remove(&block.offset);

        let start = block.span_start();
        let len = block.span_len();

        if self.config.zero_on_free
            && let Some(region) = self.region.as_mut()
        {
            region.zero(start, len);
        }

        if block.end() == self.used {
            self.used = start;
            trace!(offset = start, len, used = self.used, "Retracted high-water mark");
        } else {
            self.free_list.insert(FreeSpan { offset: start, size: len });
            trace!(offset = start, len, spans = self.free_list.len(), "Released block");
        }

        Ok(())
    }

    fn check_live(&self, block: &Block) -> Result<()> {
        match self.live.get(&block.offset) {
            Some(live) if live.generation != block.generation => Err(ArenaError::InvalidBlock {
                offset: block.offset,
                len: block.len,
            }),
            Some(live) if live.len != block.len => Err(ArenaError::SizeMismatch {
                offset: block.offset,
                expected: live.len,
                actual: block.len,
            }),
            Some(live) if live == block => Ok(()),
            _ => Err(ArenaError::InvalidBlock {
                offset: block.offset,
                len: block.len,
            }),
        }
    }

    /// Whether a handle that failed [`Arena::check_live`] points at memory
    /// it once owned: the offset now lies in a free span, or a younger block
    /// was issued at the same offset.
    fn was_released(&self, block: &Block) -> bool {
        if block.offset < self.used && self.free_list.covers(block.offset) {
            return true;
        }

        self.live
            .get(&block.offset)
            .is_some_and(|live| live.generation > block.generation)
    }

    /// Payload bytes of a live block.
    pub fn get(&self, block: Block) -> Result<&[u8]> {
        self.check_live(&block)?;
        let region = self.region.as_ref().ok_or(ArenaError::InvalidBlock {
            offset: block.offset,
            len: block.len,
        })?;

        Ok(region.bytes(block.offset, block.len))
    }

    pub fn get_mut(&mut self, block: Block) -> Result<&mut [u8]> {
        self.check_live(&block)?;
        let region = self.region.as_mut().ok_or(ArenaError::InvalidBlock {
            offset: block.offset,
            len: block.len,
        })?;

        Ok(region.bytes_mut(block.offset, block.len))
    }

    /// Reads back a value stored with [`Arena::alloc_value`] (or written
    /// through [`Arena::get_mut`]).
    pub fn read_value<T: Pod>(&self, block: Block) -> Result<T> {
        let bytes = self.get(block)?;

        if bytes.len() != mem::size_of::<T>() {
            return Err(ArenaError::SizeMismatch {
                offset: block.offset,
                expected: block.len,
                actual: mem::size_of::<T>(),
            });
        }

        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Current address of a live block.
    ///
    /// The address is only valid until the next call that may allocate:
    /// growing the arena can move the whole region.
    pub fn as_ptr(&self, block: Block) -> Result<NonNull<u8>> {
        self.check_live(&block)?;
        let region = self.region.as_ref().ok_or(ArenaError::InvalidBlock {
            offset: block.offset,
            len: block.len,
        })?;

        unsafe { Ok(region.as_ptr().add(block.offset)) }
    }

    /// Spans currently in the free list, in scan order.
    pub fn free_spans(&self) -> impl Iterator<Item = FreeSpan> + '_ {
        self.free_list.iter().copied()
    }

    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            capacity: self.capacity(),
            used: self.used,
            live_blocks: self.live.len(),
            free_spans: self.free_list.len(),
            free_bytes: self.free_list.total_bytes(),
            largest_free_span: self.free_list.largest(),
            segments: usize::from(self.region.is_some()),
        }
    }

    /// Forgets every block at once. The storage is kept for reuse and all
    /// outstanding handles become invalid.
    pub fn reset(&mut self) {
        self.used = 0;
        self.free_list.clear();
        self.live.clear();

        debug!(capacity = self.capacity(), "Reset arena");
    }

    /// Returns the backing storage to the kernel.
    ///
    /// Afterwards capacity and used are both zero. Calling it again does
    /// nothing. Dropping the arena tears it down too.
    pub fn teardown(&mut self) {
        let Some(region) = self.region.take() else {
            return;
        };

        debug!(capacity = region.capacity(), "Tearing down arena");

        drop(region);
        self.used = 0;
        self.free_list.clear();
        self.live.clear();
        self.align = AlignMode::default();
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("capacity", &self.capacity())
            .field("used", &self.used)
            .field("live_blocks", &self.live.len())
            .field("free_spans", &self.free_list.len())
            .field("align", &self.align)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_alloc() {
        let mut arena = Arena::new().unwrap();
        let block = arena.alloc_value(23u32).unwrap();

        assert_eq!(arena.read_value::<u32>(block).unwrap(), 23);
        assert_eq!(arena.used(), 4);
        assert_eq!(arena.capacity(), 4096);
    }

    #[test]
    fn space_for_free_block_is_used() {
        let mut arena = Arena::new().unwrap();
        let first = arena.alloc(4).unwrap();
        let _ = arena.alloc(8).unwrap();
        let _ = arena.alloc(8).unwrap();

        arena.free(first).unwrap();

        let second = arena.alloc(4).unwrap();
        assert_eq!(first.offset(), second.offset());
        assert_eq!(arena.free_spans().count(), 0);
    }

    #[test]
    fn zero_size_is_rejected() {
        let mut arena = Arena::new().unwrap();
        arena.align_next_block();

        assert_eq!(arena.alloc(0), Err(ArenaError::ZeroSizedRequest));
        // A rejected request doesn't consume the alignment directive.
        assert_eq!(arena.align_mode(), AlignMode::AlignNext);
    }

    #[test]
    fn growth_formula() {
        let mut arena = Arena::with_capacity(16).unwrap();
        arena.alloc(10).unwrap();
        arena.alloc(10).unwrap();

        // 16 * 2 + 10
        assert_eq!(arena.capacity(), 42);
        assert_eq!(arena.used(), 20);
    }

    #[test]
    fn freeing_top_block_retracts_used() {
        let mut arena = Arena::new().unwrap();
        let _ = arena.alloc(16).unwrap();
        let top = arena.alloc(8).unwrap();

        arena.free(top).unwrap();

        assert_eq!(arena.used(), 16);
        assert_eq!(arena.free_spans().count(), 0);
    }

    #[test]
    fn freed_bytes_are_zeroed() {
        let mut arena = Arena::new().unwrap();
        let block = arena.alloc(4).unwrap();
        let _ = arena.alloc(4).unwrap();
        arena.get_mut(block).unwrap().copy_from_slice(&[1, 2, 3, 4]);

        arena.free(block).unwrap();
        let again = arena.alloc(4).unwrap();

        assert_eq!(arena.get(again).unwrap(), &[0, 0, 0, 0]);
    }

    #[test]
    fn zeroing_can_be_disabled() {
        let config = ArenaConfig::default().with_zero_on_free(false);
        let mut arena = Arena::with_config(config).unwrap();
        let block = arena.alloc(4).unwrap();
        let _ = arena.alloc(4).unwrap();
        arena.get_mut(block).unwrap().copy_from_slice(&[1, 2, 3, 4]);

        arena.free(block).unwrap();
        let again = arena.alloc(4).unwrap();

        assert_eq!(arena.get(again).unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    fn consistency_violations() {
        let mut arena = Arena::new().unwrap();
        let block = arena.alloc(8).unwrap();
        let _ = arena.alloc(8).unwrap();

        let wrong_size = Block::new(block.offset, 4, 0, block.generation);
        assert!(matches!(arena.free(wrong_size), Err(ArenaError::SizeMismatch { expected: 8, actual: 4, .. })));

        let inside = Block::new(block.offset + 2, 2, 0, block.generation);
        assert!(matches!(arena.free(inside), Err(ArenaError::InvalidBlock { .. })));

        let outside = Block::new(1024, 8, 0, block.generation);
        assert!(matches!(arena.free(outside), Err(ArenaError::InvalidBlock { .. })));

        arena.free(block).unwrap();
        assert_eq!(arena.free(block), Err(ArenaError::DoubleFree { offset: 0 }));
        assert!(arena.get(block).is_err());
    }

    #[test]
    fn stale_handle_does_not_free_reissued_block() {
        let mut arena = Arena::new().unwrap();
        let first = arena.alloc(8).unwrap();
        let _ = arena.alloc(8).unwrap();

        arena.free(first).unwrap();
        let second = arena.alloc(8).unwrap();
        assert_eq!(second.offset(), first.offset());

        assert_eq!(arena.free(first), Err(ArenaError::DoubleFree { offset: first.offset() }));
        assert!(arena.get(first).is_err());
        assert!(arena.as_ptr(first).is_err());

        // The block issued in its place is untouched.
        arena.get_mut(second).unwrap().fill(7);
        assert_eq!(arena.get(second).unwrap(), &[7; 8]);
        arena.free(second).unwrap();
    }

    #[test]
    fn handle_from_before_reset_cannot_read_new_block() {
        let mut arena = Arena::new().unwrap();
        let old = arena.alloc(8).unwrap();

        arena.reset();
        let new = arena.alloc(8).unwrap();
        arena.get_mut(new).unwrap().fill(9);

        assert_eq!(new.offset(), old.offset());
        assert!(matches!(arena.get(old), Err(ArenaError::InvalidBlock { .. })));
        assert!(arena.get_mut(old).is_err());
        assert_eq!(arena.free(old), Err(ArenaError::DoubleFree { offset: old.offset() }));
        assert_eq!(arena.get(new).unwrap(), &[9; 8]);
    }

    #[test]
    fn persistent_alignment_can_be_stopped_alone() {
        let mut arena = Arena::new().unwrap();

        arena.align_until_disabled();
        arena.disable_persistent_alignment();
        assert_eq!(arena.align_mode(), AlignMode::Unaligned);

        arena.align_next_block();
        arena.disable_persistent_alignment();
        assert_eq!(arena.align_mode(), AlignMode::AlignNext);

        arena.disable_alignment();
        assert_eq!(arena.align_mode(), AlignMode::Unaligned);
    }

    #[test]
    fn aligned_padding_is_charged_to_the_block() {
        let mut arena = Arena::new().unwrap();
        let _ = arena.alloc(3).unwrap();
        let aligned = arena.alloc_aligned(8).unwrap();

        assert_eq!(aligned.offset(), 8);
        assert_eq!(aligned.padding(), 5);
        assert_eq!(arena.used(), 16);

        // Releasing the top block gives the padding back as well.
        arena.free(aligned).unwrap();
        assert_eq!(arena.used(), 3);
    }

    #[test]
    fn read_value_checks_size() {
        let mut arena = Arena::new().unwrap();
        let block = arena.alloc_value(7u16).unwrap();
        assert!(matches!(arena.read_value::<u64>(block), Err(ArenaError::SizeMismatch { .. })));
    }

    #[test]
    fn reset_keeps_capacity() {
        let mut arena = Arena::with_capacity(64).unwrap();
        let block = arena.alloc(100).unwrap();
        let capacity = arena.capacity();

        arena.reset();

        assert_eq!(arena.used(), 0);
        assert_eq!(arena.capacity(), capacity);
        assert!(arena.get(block).is_err());
        assert_eq!(arena.alloc(8).unwrap().offset(), 0);
    }

    #[test]
    fn teardown_then_alloc() {
        let mut arena = Arena::new().unwrap();
        arena.alloc(8).unwrap();

        arena.teardown();
        assert_eq!(arena.capacity(), 0);
        assert_eq!(arena.used(), 0);

        let block = arena.alloc(8).unwrap();
        assert_eq!(block.offset(), 0);
        assert_eq!(arena.capacity(), 4096);
    }
}
