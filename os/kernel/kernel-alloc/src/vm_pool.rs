//! # Virtual Memory Pools
//!
//! A [`VmPool`] hands out page-granular regions of a fixed virtual range. It
//! only keeps books: `allocate` neither takes frames nor installs mappings.
//! Pages are backed lazily by the [`PageTable`] when they are first touched,
//! using frames from the pool named in [`VmPoolInfo::frame_pool`].
//!
//! ```text
//!  base_address                                         base_address + size
//!  │                                                                  │
//!  ▼                                                                  ▼
//!  ┌──────────────┬──────────┬────────────────┬──────────────────────┐
//!  │ region table │ region 0 │    region 1    │      unallocated     │
//!  │ (self-hosted │          │                │                      │
//!  │  pools only) │          │                │                      │
//!  └──────────────┴──────────┴────────────────┴──────────────────────┘
//! ```
//!
//! A new region starts where the last live region ends, or at the first
//! allocatable address if no region is live. Releasing a region unmaps its
//! pages and shifts the later descriptors down one slot; their addresses stay.

use crate::page_table::{PageTable, PageTableError, VmPoolInfo};
use crate::pool_registry::PoolId;
use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress, align_up, pages_spanned};
use log::{debug, trace, warn};

/// One allocated region of a [`VmPool`].
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Region {
    pub base_address: VirtualAddress,
    /// Length in bytes, always a whole number of pages.
    pub size: u64,
}

impl Region {
    /// First address past the region.
    #[inline]
    #[must_use]
    pub fn end(&self) -> VirtualAddress {
        self.base_address + self.size
    }

    /// Base address of every page in the region.
    pub fn pages(&self) -> impl Iterator<Item = VirtualAddress> + '_ {
        (0..pages_spanned(self.size)).map(|page| self.base_address + page * PAGE_SIZE)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmPoolError {
    #[error("pool base {0} is not page aligned")]
    Unaligned(VirtualAddress),
    #[error("pool range {base}+{size:#x} is empty or wraps the address space")]
    InvalidRange { base: VirtualAddress, size: u64 },
    #[error("pool of {size:#x} bytes cannot hold its {required:#x}-byte region table")]
    TooSmallForRegionTable { size: u64, required: u64 },
    #[error("requested a zero-sized region")]
    ZeroSize,
    #[error("region table is full ({capacity} regions)")]
    RegionTableFull { capacity: usize },
    #[error("region of {requested:#x} bytes does not fit the {available:#x} bytes left")]
    OutOfAddressSpace { requested: u64, available: u64 },
    #[error("no region starts at {0}")]
    UnknownRegion(VirtualAddress),
    #[error("page table rejected the pool: {0}")]
    Registration(#[from] PageTableError),
}

/// Region allocator over one virtual address range.
pub struct VmPool<'a, P: PageTable + ?Sized> {
    info: VmPoolInfo,
    page_table: &'a P,
    regions: &'a mut [Region],
    region_count: usize,
    /// Where the first region starts; past the region table when self-hosted.
    first_address: VirtualAddress,
}

impl<'a, P: PageTable + ?Sized> VmPool<'a, P> {
    /// Regions a self-hosted pool can track: one page worth of descriptors.
    #[allow(clippy::cast_possible_truncation)]
    pub const SELF_HOSTED_CAPACITY: usize = PAGE_SIZE as usize / size_of::<Region>();

    /// Bytes a self-hosted pool reserves at its base for the region table.
    pub const SELF_HOSTED_RESERVED: u64 = PAGE_SIZE;

    /// Create a pool over `[base_address, base_address + size)` that records
    /// regions in `regions`, and register it with `page_table`.
    ///
    /// # Errors
    /// - [`VmPoolError::Unaligned`] if `base_address` is not page aligned.
    /// - [`VmPoolError::InvalidRange`] if `size` is zero or the range wraps.
    /// - [`VmPoolError::Registration`] if the page table refuses the pool.
    pub fn new(
        base_address: VirtualAddress,
        size: u64,
        frame_pool: PoolId,
        page_table: &'a P,
        regions: &'a mut [Region],
    ) -> Result<Self, VmPoolError> {
        let info = Self::validate(base_address, size, frame_pool)?;
        page_table.register_pool(info)?;
        Ok(Self::from_parts(info, page_table, regions, base_address))
    }

    /// Create a pool that keeps its region table in its own first page.
    ///
    /// The table page is never handed out; the first region starts at
    /// `base_address + SELF_HOSTED_RESERVED`. The pool registers with
    /// `page_table` before touching the table, so a lazily paging page table
    /// can back it on first write.
    ///
    /// # Safety
    /// - `[base_address, base_address + PAGE_SIZE)` must be writable once the
    ///   pool is registered, either already mapped or mapped by `page_table`
    ///   on fault.
    /// - Nothing else may access that page for `'a`.
    ///
    /// # Errors
    /// As [`new`](Self::new), plus [`VmPoolError::TooSmallForRegionTable`]
    /// if no page is left after the table.
    pub unsafe fn new_self_hosted(
        base_address: VirtualAddress,
        size: u64,
        frame_pool: PoolId,
        page_table: &'a P,
    ) -> Result<Self, VmPoolError> {
        let info = Self::validate(base_address, size, frame_pool)?;
        if size <= Self::SELF_HOSTED_RESERVED {
            return Err(VmPoolError::TooSmallForRegionTable {
                size,
                required: Self::SELF_HOSTED_RESERVED,
            });
        }
        page_table.register_pool(info)?;

        let table = base_address.as_mut_ptr::<Region>();
        // SAFETY: The caller guarantees the first page is writable and exclusively ours.
        // An all-zero `Region` is valid, so the slice is initialized after the fill.
        let regions = unsafe {
            table.write_bytes(0, Self::SELF_HOSTED_CAPACITY);
            core::slice::from_raw_parts_mut(table, Self::SELF_HOSTED_CAPACITY)
        };

        Ok(Self::from_parts(
            info,
            page_table,
            regions,
            base_address + Self::SELF_HOSTED_RESERVED,
        ))
    }

    fn validate(
        base_address: VirtualAddress,
        size: u64,
        frame_pool: PoolId,
    ) -> Result<VmPoolInfo, VmPoolError> {
        if !base_address.is_page_aligned() {
            return Err(VmPoolError::Unaligned(base_address));
        }
        if size == 0 || base_address.checked_add(size).is_none() {
            return Err(VmPoolError::InvalidRange {
                base: base_address,
                size,
            });
        }
        Ok(VmPoolInfo {
            base_address,
            size,
            frame_pool,
        })
    }

    fn from_parts(
        info: VmPoolInfo,
        page_table: &'a P,
        regions: &'a mut [Region],
        first_address: VirtualAddress,
    ) -> Self {
        debug!(
            "VM pool initialized: {}+{:#x}, {} region slots, backed by {}",
            info.base_address,
            info.size,
            regions.len(),
            info.frame_pool
        );
        Self {
            info,
            page_table,
            regions,
            region_count: 0,
            first_address,
        }
    }

    /// Reserve a region of at least `size` bytes and return its base.
    ///
    /// The size is rounded up to whole pages. Nothing is mapped.
    ///
    /// # Errors
    /// - [`VmPoolError::ZeroSize`] for `size == 0`.
    /// - [`VmPoolError::RegionTableFull`] if every descriptor slot is live.
    /// - [`VmPoolError::OutOfAddressSpace`] if the region would end past
    ///   `base_address + size`.
    pub fn allocate(&mut self, size: u64) -> Result<VirtualAddress, VmPoolError> {
        if size == 0 {
            return Err(VmPoolError::ZeroSize);
        }
        if self.region_count == self.regions.len() {
            return Err(VmPoolError::RegionTableFull {
                capacity: self.regions.len(),
            });
        }

        let start = match self.region_count {
            0 => self.first_address,
            n => self.regions[n - 1].end(),
        };
        let available = self.end_address().checked_sub(start).unwrap_or(0);
        let size = align_up(size, PAGE_SIZE)
            .filter(|rounded| *rounded <= available)
            .ok_or(VmPoolError::OutOfAddressSpace {
                requested: size,
                available,
            })?;

        self.regions[self.region_count] = Region {
            base_address: start,
            size,
        };
        self.region_count += 1;

        debug!("Allocated region {start}+{size:#x}");
        Ok(start)
    }

    /// Release the region starting at `start_address`.
    ///
    /// Every page of the region is handed to [`PageTable::free_page`], the
    /// descriptor is removed and the page table is reloaded.
    ///
    /// # Errors
    /// [`VmPoolError::UnknownRegion`] if no live region starts at
    /// `start_address`. Nothing changes in that case.
    pub fn release(&mut self, start_address: VirtualAddress) -> Result<(), VmPoolError> {
        let Some(slot) = self
            .regions()
            .iter()
            .position(|region| region.base_address == start_address)
        else {
            warn!("Rejected release of {start_address}: no region starts there");
            return Err(VmPoolError::UnknownRegion(start_address));
        };

        let region = self.regions[slot];
        for page in region.pages() {
            trace!("Freeing page {page}");
            self.page_table.free_page(page);
        }

        self.regions.copy_within(slot + 1..self.region_count, slot);
        self.region_count -= 1;
        self.regions[self.region_count] = Region::default();

        self.page_table.load();
        debug!(
            "Released region {}+{:#x}",
            region.base_address, region.size
        );
        Ok(())
    }

    /// Whether `address` lies within this pool's range, end inclusive.
    #[inline]
    #[must_use]
    pub fn is_legitimate(&self, address: VirtualAddress) -> bool {
        self.info.is_legitimate(address)
    }

    /// Live regions in slot order.
    #[inline]
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions[..self.region_count]
    }

    /// Number of descriptor slots.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.regions.len()
    }

    #[inline]
    #[must_use]
    pub const fn info(&self) -> VmPoolInfo {
        self.info
    }

    #[inline]
    #[must_use]
    pub const fn base_address(&self) -> VirtualAddress {
        self.info.base_address
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.info.size
    }

    #[inline]
    #[must_use]
    pub const fn frame_pool(&self) -> PoolId {
        self.info.frame_pool
    }

    #[inline]
    fn end_address(&self) -> VirtualAddress {
        self.info.base_address + self.info.size
    }
}
