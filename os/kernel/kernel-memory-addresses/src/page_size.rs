/// Size of a physical frame in bytes.
pub const FRAME_SIZE: u64 = 4096;

/// log2([`FRAME_SIZE`]).
pub const FRAME_SHIFT: u32 = 12;

/// Size of a virtual page in bytes. Pages and frames have the same size.
pub const PAGE_SIZE: u64 = FRAME_SIZE;

/// log2([`PAGE_SIZE`]).
pub const PAGE_SHIFT: u32 = FRAME_SHIFT;

const _: () = {
    assert!(FRAME_SIZE.is_power_of_two());
    assert!(1 << FRAME_SHIFT == FRAME_SIZE);
};

/// Align `x` down to the nearest multiple of `a`.
///
/// ### Preconditions
/// - `a` must be **non-zero** and a **power of two**.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::align_down;
/// assert_eq!(align_down(4095, 4096), 0);
/// assert_eq!(align_down(8191, 4096), 4096);
/// ```
#[inline]
#[must_use]
pub const fn align_down(x: u64, a: u64) -> u64 {
    x & !(a - 1)
}

/// Align `x` up to the nearest multiple of `a`, or `None` if that overflows.
///
/// ### Preconditions
/// - `a` must be **non-zero** and a **power of two**.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::align_up;
/// assert_eq!(align_up(1, 4096), Some(4096));
/// assert_eq!(align_up(u64::MAX, 4096), None);
/// ```
#[inline]
#[must_use]
pub const fn align_up(x: u64, a: u64) -> Option<u64> {
    match x.checked_add(a - 1) {
        Some(v) => Some(v & !(a - 1)),
        None => None,
    }
}

/// Number of whole pages needed to cover `bytes` bytes.
#[inline]
#[must_use]
pub const fn pages_spanned(bytes: u64) -> u64 {
    bytes.div_ceil(PAGE_SIZE)
}
