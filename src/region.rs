use std::ptr::{self, NonNull};

use crate::{
    error::{ArenaError, Result},
    kernel::{self, page_size},
    utils::checked_align,
};

/// One contiguous backing buffer obtained from the [`kernel`].
///
/// The kernel hands out whole pages, so a region keeps two sizes: the
/// logical `capacity` the arena works with and the page rounded `mapped`
/// length it actually owns.
///
/// ```text
/// +--------------------------------------+-----------+
/// |          capacity (logical)          |   slack   |
/// +--------------------------------------+-----------+
/// <------------------------- mapped ----------------->
/// ```
pub(crate) struct Region {
    /// Start of the mapping. Page aligned.
    ptr: NonNull<u8>,
    /// Bytes usable by the arena.
    capacity: usize,
    /// Bytes owned by the mapping, a multiple of the page size.
    mapped: usize,
}

/// How a [`Region::grow`] call was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Growth {
    /// The existing mapping already covered (or was extended to) the new capacity.
    InPlace,
    /// A new mapping was created and the used prefix copied over.
    Moved,
}

impl Region {
    /// Maps a new region able to hold at least `capacity` bytes.
    pub fn new(capacity: usize) -> Result<Self> {
        debug_assert!(capacity > 0);

        let mapped = mapping_len(capacity)?;

        unsafe {
            let ptr = kernel::request_memory(mapped)
                .ok_or(ArenaError::AllocationFailed { requested: capacity })?;

            Ok(Self {
                ptr,
                capacity,
                mapped,
            })
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Address of the first byte, used for alignment computations.
    #[inline]
    pub fn base_addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Bytes in `offset..offset + len`. Caller checks the bounds against
    /// the issued range, this only checks them against the capacity.
    pub fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        assert!(offset + len <= self.capacity, "range outside of region");
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr().add(offset), len) }
    }

    pub fn bytes_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        assert!(offset + len <= self.capacity, "range outside of region");
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr().add(offset), len) }
    }

    /// Fills `offset..offset + len` with zeroes.
    pub fn zero(&mut self, offset: usize, len: usize) {
        self.bytes_mut(offset, len).fill(0);
    }

    /// Raises the capacity to `new_capacity`, keeping the first `used` bytes.
    ///
    /// The in place paths are tried first: the slack of the current
    /// mapping, then asking the kernel to extend the mapping where it is.
    /// Only when both fail a fresh mapping is requested, the `used` prefix
    /// copied over and the old mapping returned. In that case every address
    /// previously derived from [`Region::as_ptr`] is dangling.
    pub fn grow(&mut self, new_capacity: usize, used: usize) -> Result<Growth> {
        debug_assert!(used <= self.capacity);

        if new_capacity <= self.capacity {
            return Ok(Growth::InPlace);
        }

        if new_capacity <= self.mapped {
            self.capacity = new_capacity;
            return Ok(Growth::InPlace);
        }

        let new_mapped = mapping_len(new_capacity)?;

        unsafe {
            if kernel::resize_in_place(self.ptr, self.mapped, new_mapped) {
                self.capacity = new_capacity;
                self.mapped = new_mapped;
                return Ok(Growth::InPlace);
            }
        }

        self.relocate(new_capacity, new_mapped, used)?;
        Ok(Growth::Moved)
    }

    /// Moves the region to a fresh mapping of `new_mapped` bytes. Only the
    /// first `used` bytes are carried over, the rest of the new mapping is
    /// zero.
    fn relocate(&mut self, new_capacity: usize, new_mapped: usize, used: usize) -> Result<()> {
        unsafe {
            let new_ptr = kernel::request_memory(new_mapped).ok_or(ArenaError::AllocationFailed {
                requested: new_capacity,
            })?;

            ptr::copy_nonoverlapping(self.ptr.as_ptr(), new_ptr.as_ptr(), used);
            kernel::return_memory(self.ptr, self.mapped);

            self.ptr = new_ptr;
        }

        self.capacity = new_capacity;
        self.mapped = new_mapped;
        Ok(())
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        unsafe { kernel::return_memory(self.ptr, self.mapped) }
    }
}

/// Page rounded length of the mapping needed for `capacity` bytes.
fn mapping_len(capacity: usize) -> Result<usize> {
    checked_align(capacity, page_size()).ok_or(ArenaError::CapacityOverflow { requested: capacity })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_region_is_page_aligned() {
        let region = Region::new(100).unwrap();
        assert_eq!(region.capacity(), 100);
        assert_eq!(region.base_addr() % page_size(), 0);
        assert!(region.bytes(0, 100).iter().all(|b| *b == 0));
    }

    #[test]
    fn grow_within_slack_is_in_place() {
        let mut region = Region::new(100).unwrap();
        let base = region.base_addr();

        assert_eq!(region.grow(200, 0).unwrap(), Growth::InPlace);
        assert_eq!(region.capacity(), 200);
        assert_eq!(region.base_addr(), base);
    }

    #[test]
    fn grow_keeps_used_prefix() {
        let page = page_size();
        let mut region = Region::new(page).unwrap();
        region.bytes_mut(0, 4).copy_from_slice(&[1, 2, 3, 4]);

        region.grow(page * 8, 4).unwrap();

        assert_eq!(region.capacity(), page * 8);
        assert_eq!(region.bytes(0, 4), &[1, 2, 3, 4]);
        // The grown tail is usable.
        region.bytes_mut(page * 8 - 1, 1)[0] = 9;
        assert_eq!(region.bytes(page * 8 - 1, 1), &[9]);
    }

    #[test]
    fn relocation_copies_only_used_prefix() {
        let page = page_size();
        let mut region = Region::new(page).unwrap();
        region.bytes_mut(0, page).fill(0xab);

        region.relocate(page * 4, page * 4, 16).unwrap();

        assert_eq!(region.capacity(), page * 4);
        assert_eq!(region.base_addr() % page, 0);
        assert!(region.bytes(0, 16).iter().all(|b| *b == 0xab));
        assert!(region.bytes(16, page * 4 - 16).iter().all(|b| *b == 0));
    }

    #[test]
    fn zero_range() {
        let mut region = Region::new(16).unwrap();
        region.bytes_mut(0, 16).fill(0xff);
        region.zero(4, 8);
        assert_eq!(region.bytes(0, 16), &[0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff, 0xff, 0xff]);
    }
}
