/// Alignment policy of an arena.
///
/// ```text
///   from \ event         align_next_block   align_until_disabled   disable_alignment   disable_persistent   allocation
///   Unaligned            AlignNext          AlignUntilDisabled     Unaligned           Unaligned            Unaligned
///   AlignNext            AlignNext          AlignUntilDisabled     Unaligned           AlignNext            Unaligned
///   AlignUntilDisabled   AlignNext          AlignUntilDisabled     Unaligned           Unaligned            AlignUntilDisabled
/// ```
///
/// The two aligned states exclude each other: selecting one clears the
/// other. The mode is arena state, it sticks across calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlignMode {
    #[default]
    Unaligned,
    /// Align exactly the next allocation, then fall back to `Unaligned`.
    AlignNext,
    /// Align every allocation until disabled.
    AlignUntilDisabled,
}

impl AlignMode {
    /// Consumes the mode for one allocation and reports whether that
    /// allocation must be aligned.
    #[inline]
    pub(crate) fn take(&mut self) -> bool {
        match *self {
            Self::Unaligned => false,
            Self::AlignNext => {
                *self = Self::Unaligned;
                true
            }
            Self::AlignUntilDisabled => true,
        }
    }

    /// Leaves `AlignUntilDisabled`, a pending `AlignNext` stays.
    #[inline]
    pub(crate) fn clear_persistent(&mut self) {
        if *self == Self::AlignUntilDisabled {
            *self = Self::Unaligned;
        }
    }
}
