//! Arena allocators backed by memory mapped straight from the kernel.
//!
//! Two designs are provided, and they are deliberately kept apart:
//!
//! - [`Arena`]: one contiguous region that grows by doubling. Released
//!   blocks go to a best-fit free list and are reused before the
//!   high-water mark moves. Blocks are [`Block`] handles (offsets), because
//!   growing may move the region.
//! - [`SegmentedArena`]: a chain of fixed size segments that never move.
//!   Blocks are plain `&mut [u8]` borrowed from the arena, but there is no
//!   per-block release.
//!
//! Both follow an [`AlignMode`] that can align the next block, or every
//! block, to the pointer width.
//!
//! ```
//! use memarena::Arena;
//!
//! let mut arena = Arena::new()?;
//!
//! let number = arena.alloc_value(20i32)?;
//! arena.align_next_block();
//! let record = arena.alloc(28)?;
//! assert_eq!(arena.as_ptr(record)?.as_ptr() as usize % size_of::<usize>(), 0);
//!
//! arena.free(number)?;
//! let again = arena.alloc(4)?;
//! assert_eq!(again.offset(), number.offset());
//! # Ok::<(), memarena::ArenaError>(())
//! ```
//!
//! Nothing here is thread safe: an arena belongs to one thread.

mod align;
mod arena;
mod block;
mod config;
mod error;
mod freelist;
mod kernel;
mod region;
mod segment;
mod segmented;
mod stats;
pub mod utils;
pub mod vector;

pub use align::AlignMode;
pub use arena::Arena;
pub use block::Block;
pub use config::{ArenaConfig, DEFAULT_CAPACITY};
pub use error::{ArenaError, Result};
pub use freelist::FreeSpan;
pub use segmented::SegmentedArena;
pub use stats::ArenaStats;
