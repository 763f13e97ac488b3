//! # Page Table Collaborator
//!
//! Virtual memory pools never touch page-table entries themselves. They
//! describe their address range to a [`PageTable`] at construction and ask it
//! to unmap pages on release. The page table in turn consults the registered
//! [`VmPoolInfo`]s when a fault arrives, and backs legitimate addresses with
//! a frame from the pool's [`frame_pool`](VmPoolInfo::frame_pool).
//!
//! Pools share one page table, so every method takes `&self`; implementations
//! keep their state behind interior mutability.

use crate::pool_registry::PoolId;
use kernel_memory_addresses::VirtualAddress;

/// Fixed description of a virtual memory pool, as seen by the page table.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct VmPoolInfo {
    pub base_address: VirtualAddress,
    pub size: u64,
    /// Pool that backs faulting pages of this range.
    pub frame_pool: PoolId,
}

impl VmPoolInfo {
    /// Whether `address` lies in `[base_address, base_address + size]`.
    ///
    /// The upper bound is inclusive.
    #[must_use]
    pub fn is_legitimate(&self, address: VirtualAddress) -> bool {
        address
            .checked_sub(self.base_address)
            .is_some_and(|offset| offset <= self.size)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageTableError {
    #[error("page table cannot track more than {capacity} virtual memory pools")]
    PoolTableFull { capacity: usize },
    #[error("virtual memory pool at {0} overlaps a registered pool")]
    OverlappingPool(VirtualAddress),
}

/// Operations a virtual memory pool needs from the active page table.
pub trait PageTable {
    /// Record `pool` so faults inside its range can be served.
    ///
    /// # Errors
    /// Implementation specific; the pool is not constructed on failure.
    fn register_pool(&self, pool: VmPoolInfo) -> Result<(), PageTableError>;

    /// Unmap the page at `page` and give its frame back, if one was ever mapped.
    fn free_page(&self, page: VirtualAddress);

    /// Make the current mappings effective, e.g. by reloading the root
    /// pointer to flush stale translations.
    fn load(&self);
}
