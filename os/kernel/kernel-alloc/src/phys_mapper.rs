//! # Reaching Physical Frames from Code
//!
//! Frame pools keep their bitmap *inside* a physical frame: either frame 0 of
//! the pool itself, or a frame the caller set aside. Code can only dereference
//! virtual addresses, so the pool asks a [`PhysMapper`] to turn that frame's
//! physical address into a reference once, at construction.
//!
//! The mapping strategy differs between environments, which is why it is a
//! trait:
//! - **Kernel**: a higher-half direct map (HHDM); see [`HhdmPhysMapper`].
//! - **Tests**: ordinary heap memory standing in for physical frames.

use kernel_info::memory::{FRAME_SIZE, HHDM_BASE};
use kernel_memory_addresses::PhysicalAddress;

/// Bytes of one physical frame as seen through a mapping.
#[allow(clippy::cast_possible_truncation)]
pub type FrameBytes = [u8; FRAME_SIZE as usize];

/// Converts physical addresses to usable references in the current address space.
pub trait PhysMapper {
    /// Convert a *physical* address to a mutable reference in the current address space.
    ///
    /// # Safety
    /// - `pa` must be mapped writable for at least `size_of::<T>()` bytes and
    ///   suitably aligned for `T`.
    /// - The memory must hold a valid `T` and must not be aliased for `'a`.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}

/// [`PhysMapper`] for kernels with a higher-half direct map (HHDM).
///
/// Every physical address `pa` is visible at `HHDM_BASE + pa`.
///
/// # Safety
/// - The HHDM mapping must be present and cover the referenced physical range.
pub struct HhdmPhysMapper;

impl HhdmPhysMapper {
    /// Virtual address at which `pa` is visible.
    #[inline]
    #[must_use]
    pub const fn virtual_address_of(pa: PhysicalAddress) -> u64 {
        HHDM_BASE + pa.as_u64()
    }
}

impl PhysMapper for HhdmPhysMapper {
    #[allow(clippy::cast_possible_truncation)]
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let va: *mut T =
            core::ptr::with_exposed_provenance_mut(Self::virtual_address_of(pa) as usize);
        // SAFETY: Caller must ensure the physical address is valid and mapped via HHDM.
        unsafe { &mut *va }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hhdm_offsets_physical_addresses() {
        let pa = PhysicalAddress::new(0x0020_0000);
        assert_eq!(HhdmPhysMapper::virtual_address_of(pa), HHDM_BASE + 0x0020_0000);
    }
}
