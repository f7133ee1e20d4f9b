use std::{
    cell::{Cell, RefCell},
    fmt, mem, slice,
};

use bytemuck::Pod;
use tracing::debug;

use crate::{
    align::AlignMode,
    config::ArenaConfig,
    error::{ArenaError, Result},
    segment::Segment,
    stats::ArenaStats,
    utils::WORD_ALIGN,
};

/// Arena made of independently mapped segments that never move.
///
/// Allocations are bumped off the current segment. When a request doesn't
/// fit, a new segment of [`ArenaConfig::segment_capacity`] bytes becomes
/// current and the old one is left as it is; nothing is ever bumped off a
/// superseded segment again. Requests bigger than the segment capacity get a
/// dedicated segment of exactly their size, so one huge block never inflates
/// the regular segments.
///
/// ```text
///   segments:  [0] +----------+    [1] +------------------------+    [2] +----------+
///                  | full     |        | dedicated (oversized)  |        | current  |
///                  +----------+        +------------------------+        +----------+
/// ```
///
/// Because segments don't move, blocks come back as plain `&mut [u8]`
/// borrowed from the arena. There is no per-block free: memory comes back
/// with [`SegmentedArena::reset`], [`SegmentedArena::teardown`] or drop.
///
/// The arena is single threaded.
pub struct SegmentedArena {
    segments: RefCell<Vec<Segment>>,
    /// Index of the only segment new blocks are bumped off.
    current: Cell<usize>,
    align: Cell<AlignMode>,
    allocations: Cell<usize>,
    config: ArenaConfig,
}

impl SegmentedArena {
    /// Creates an arena with one default segment of 4096 bytes.
    pub fn new() -> Result<Self> {
        Self::with_config(ArenaConfig::default())
    }

    pub fn with_config(config: ArenaConfig) -> Result<Self> {
        config.validate()?;

        let segment = Segment::new(config.segment_capacity)?;

        debug!(segment_capacity = config.segment_capacity, "Created segmented arena");

        Ok(Self {
            segments: RefCell::new(vec![segment]),
            current: Cell::new(0),
            align: Cell::new(AlignMode::default()),
            allocations: Cell::new(0),
            config,
        })
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn segment_count(&self) -> usize {
        self.segments.borrow().len()
    }

    /// Index of the segment new blocks come from.
    pub fn current_segment(&self) -> usize {
        self.current.get()
    }

    /// Bytes mapped across all segments.
    pub fn capacity(&self) -> usize {
        self.segments.borrow().iter().map(Segment::capacity).sum()
    }

    /// Bytes handed out across all segments, alignment padding included.
    pub fn used(&self) -> usize {
        self.segments.borrow().iter().map(Segment::used).sum()
    }

    pub fn align_mode(&self) -> AlignMode {
        self.align.get()
    }

    pub fn align_next_block(&self) {
        self.align.set(AlignMode::AlignNext);
    }

    pub fn align_until_disabled(&self) {
        self.align.set(AlignMode::AlignUntilDisabled);
    }

    pub fn disable_alignment(&self) {
        self.align.set(AlignMode::Unaligned);
    }

    /// Stops [`AlignMode::AlignUntilDisabled`] but keeps a pending
    /// [`AlignMode::AlignNext`].
    pub fn disable_persistent_alignment(&self) {
        let mut mode = self.align.get();
        mode.clear_persistent();
        self.align.set(mode);
    }

    /// Allocates `size` bytes following the current [`AlignMode`].
    #[allow(clippy::mut_from_ref)]
    pub fn alloc(&self, size: usize) -> Result<&mut [u8]> {
        if size == 0 {
            return Err(ArenaError::ZeroSizedRequest);
        }

        let align = if self.take_alignment() { WORD_ALIGN } else { 1 };
        self.allocate(size, align)
    }

    /// Moves `value` into the arena. The block is aligned for `T`, and to the
    /// pointer width as well when the mode asks for it.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_value<T: Pod>(&self, value: T) -> Result<&mut T> {
        let size = mem::size_of::<T>();
        if size == 0 {
            return Err(ArenaError::ZeroSizedRequest);
        }

        let mut align = mem::align_of::<T>();
        if self.take_alignment() {
            align = align.max(WORD_ALIGN);
        }

        let slot: &mut T = bytemuck::from_bytes_mut(self.allocate(size, align)?);
        *slot = value;
        Ok(slot)
    }

    fn take_alignment(&self) -> bool {
        let mut mode = self.align.get();
        let aligned = mode.take();
        self.align.set(mode);
        aligned
    }

    #[allow(clippy::mut_from_ref)]
    fn allocate(&self, size: usize, align: usize) -> Result<&mut [u8]> {
        let mut segments = self.segments.borrow_mut();

        let bumped = if size > self.config.segment_capacity {
            None
        } else {
            segments
                .get_mut(self.current.get())
                .and_then(|segment| segment.bump(size, align))
        };

        let ptr = match bumped {
            Some(ptr) => ptr,
            None => {
                // Fresh segments are page aligned, no padding is ever needed at their start.
                let capacity = size.max(self.config.segment_capacity);
                let mut segment = Segment::new(capacity)?;
                let ptr = segment
                    .bump(size, align)
                    .ok_or(ArenaError::AllocationFailed { requested: size })?;

                segments.push(segment);
                self.current.set(segments.len() - 1);

                debug!(
                    index = segments.len() - 1,
                    capacity,
                    dedicated = size > self.config.segment_capacity,
                    "Started new segment"
                );

                ptr
            }
        };

        self.allocations.set(self.allocations.get() + 1);

        // Segments never move and bumped ranges never overlap, so this
        // borrow is exclusive for as long as the arena is borrowed.
        unsafe { Ok(slice::from_raw_parts_mut(ptr.as_ptr(), size)) }
    }

    pub fn stats(&self) -> ArenaStats {
        let segments = self.segments.borrow();

        ArenaStats {
            capacity: segments.iter().map(Segment::capacity).sum(),
            used: segments.iter().map(Segment::used).sum(),
            live_blocks: self.allocations.get(),
            segments: segments.len(),
            ..ArenaStats::default()
        }
    }

    /// Forgets every block. The first segment is kept and rewound, the
    /// others go back to the kernel.
    pub fn reset(&mut self) {
        let segments = self.segments.get_mut();
        segments.truncate(1);

        if let Some(first) = segments.first_mut() {
            first.rewind(self.config.zero_on_free);
        }

        self.current.set(0);
        self.allocations.set(0);

        debug!("Reset segmented arena");
    }

    /// Returns every segment to the kernel. Calling it again does nothing.
    /// The next allocation starts a fresh segment.
    pub fn teardown(&mut self) {
        let segments = self.segments.get_mut();
        if segments.is_empty() {
            return;
        }

        debug!(segments = segments.len(), "Tearing down segmented arena");

        segments.clear();
        self.current.set(0);
        self.allocations.set(0);
        self.align.set(AlignMode::default());
    }
}

impl fmt::Debug for SegmentedArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentedArena")
            .field("segments", &self.segment_count())
            .field("current", &self.current.get())
            .field("capacity", &self.capacity())
            .field("used", &self.used())
            .field("align", &self.align.get())
            .finish()
    }
}
