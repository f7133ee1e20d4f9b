//! This file contains the helper functions for the allocators.
//! These are functions that don't particularly belong to any concrete module of the crate.

use std::mem;

/// Alignment applied to blocks when an [`crate::AlignMode`] asks for it: the
/// native pointer width.
pub const WORD_ALIGN: usize = mem::size_of::<usize>();

/// It aligns `to_be_aligned` using `aligment`, which must be a power of two.
///
/// This method is used to round mapping lengths up to a multiple of the
/// kernel's page size and block addresses to a multiple of the computer's
/// pointer size.
pub fn align(to_be_aligned: usize, aligment: usize) -> usize {
    (to_be_aligned + aligment - 1) & !(aligment - 1)
}

/// Checked variant of [`align`]. Returns `None` on overflow.
pub fn checked_align(to_be_aligned: usize, aligment: usize) -> Option<usize> {
    Some(to_be_aligned.checked_add(aligment - 1)? & !(aligment - 1))
}

/// Number of bytes needed to move `addr` forward to the next multiple of `aligment`.
#[inline]
pub fn padding_for(addr: usize, aligment: usize) -> usize {
    align(addr, aligment) - addr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_pointer_size() {
        let aligments = vec![(1..8, 8), (9..16, 16), (17..24, 24), (25..32, 32)];

        for (sizes, expected) in aligments {
            for size in sizes {
                assert_eq!(expected, align(size, 8));
            }
        }
    }

    #[test]
    fn align_page_size() {
        // For testing purposes we are assuming the page size is 4096
        let aligments = vec![(1..4096, 4096), (4097..8192, 8192)];

        for (sizes, expected) in aligments {
            for size in sizes {
                assert_eq!(expected, align(size, 4096))
            }
        }
    }

    #[test]
    fn padding() {
        assert_eq!(padding_for(0, 8), 0);
        assert_eq!(padding_for(1, 8), 7);
        assert_eq!(padding_for(8, 8), 0);
        assert_eq!(padding_for(13, 8), 3);
    }

    #[test]
    fn checked_align_overflow() {
        assert_eq!(checked_align(usize::MAX, 8), None);
        assert_eq!(checked_align(4097, 4096), Some(8192));
    }
}
