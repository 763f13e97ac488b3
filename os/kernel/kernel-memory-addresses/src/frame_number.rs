use crate::{FRAME_SHIFT, PhysicalAddress};
use core::fmt;
use core::ops::{Add, AddAssign};

/// Physical frame number.
///
/// Frame `n` covers the physical bytes `[n * FRAME_SIZE, (n + 1) * FRAME_SIZE)`.
/// Frame allocators hand these out; page tables store them shifted into their
/// entries.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let f = FrameNumber::new(3);
/// assert_eq!(f.base(), PhysicalAddress::new(3 * FRAME_SIZE));
/// assert_eq!((f + 2).as_u64(), 5);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FrameNumber(u64);

impl FrameNumber {
    #[inline]
    #[must_use]
    pub const fn new(n: u64) -> Self {
        Self(n)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The frame that contains `pa`.
    #[inline]
    #[must_use]
    pub const fn containing(pa: PhysicalAddress) -> Self {
        Self(pa.as_u64() >> FRAME_SHIFT)
    }

    /// Physical address of the first byte of this frame.
    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0 << FRAME_SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn checked_add(self, n: u64) -> Option<Self> {
        match self.0.checked_add(n) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Distance from `base` to `self`, or `None` if `self` lies below `base`.
    #[inline]
    #[must_use]
    pub const fn offset_from(self, base: Self) -> Option<u64> {
        self.0.checked_sub(base.0)
    }
}

impl fmt::Debug for FrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({:#X})", self.0)
    }
}

impl fmt::Display for FrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for FrameNumber {
    #[inline]
    fn from(n: u64) -> Self {
        Self::new(n)
    }
}

impl From<FrameNumber> for u64 {
    #[inline]
    fn from(f: FrameNumber) -> Self {
        f.0
    }
}

impl Add<u64> for FrameNumber {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u64> for FrameNumber {
    #[inline]
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}
