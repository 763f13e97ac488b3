//! Allocation state of a single physical frame.
//!
//! Each frame is described by two bits:
//!
//! ```text
//! 0b00  Free             available for allocation
//! 0b10  HeadOfSequence   allocated, first frame of a run
//! 0b11  Used             allocated, continuation of the run before it
//! 0b01  (invalid)        never written; reading it means the bitmap is corrupt
//! ```
//!
//! Runs carry no explicit length. A run is a `HeadOfSequence` frame followed by
//! `Used` frames up to the next `Free` or `HeadOfSequence` frame, so the length
//! is recovered from the states alone when the run is released.

use core::fmt;

/// State of one frame in a [`FrameBitmap`](crate::frame_bitmap::FrameBitmap).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum FrameState {
    /// Not allocated.
    Free = 0b00,
    /// First frame of an allocated run.
    HeadOfSequence = 0b10,
    /// Allocated frame following the head of its run.
    Used = 0b11,
}

impl FrameState {
    /// Number of bits a state occupies in the bitmap.
    pub const BITS: u32 = 2;

    /// Mask covering one encoded state.
    pub const MASK: u8 = 0b11;

    /// Decode two bits, returning `None` for the unused `0b01` pattern.
    #[inline]
    #[must_use]
    pub const fn try_from_bits(bits: u8) -> Option<Self> {
        match bits & Self::MASK {
            0b00 => Some(Self::Free),
            0b10 => Some(Self::HeadOfSequence),
            0b11 => Some(Self::Used),
            _ => None,
        }
    }

    /// Decode two bits.
    ///
    /// # Panics
    /// On the `0b01` pattern. No code path writes it, so observing it means the
    /// bitmap memory was overwritten.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match Self::try_from_bits(bits) {
            Some(state) => state,
            None => panic!("corrupt frame bitmap: invalid state pattern 0b01"),
        }
    }

    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }

    #[inline]
    #[must_use]
    pub const fn is_free(self) -> bool {
        matches!(self, Self::Free)
    }

    /// Whether this frame ends a run that is being swept forward.
    #[inline]
    #[must_use]
    pub const fn is_run_boundary(self) -> bool {
        matches!(self, Self::Free | Self::HeadOfSequence)
    }
}

impl fmt::Display for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Free => "free",
            Self::HeadOfSequence => "head-of-sequence",
            Self::Used => "used",
        })
    }
}
