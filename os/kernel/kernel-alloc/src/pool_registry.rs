//! # Frame Pool Registry
//!
//! Frame runs are released by frame number alone, without naming the pool
//! that handed them out. The registry owns every [`ContFramePool`] in
//! registration order and resolves the owner of a frame by range lookup.
//!
//! Capacity is fixed at compile time ([`MAX_FRAME_POOLS`] by default) so the
//! registry works before any heap exists. Pools are never removed.
//!
//! ```rust
//! # use kernel_alloc::cont_frame_pool::{ContFramePool, InfoFrame};
//! # use kernel_alloc::pool_registry::PoolRegistry;
//! # use kernel_memory_addresses::FrameNumber;
//! let mut storage = [0_u8; 4];
//! let pool = ContFramePool::with_storage(FrameNumber::new(64), 16, InfoFrame::SelfHosted, &mut storage)?;
//!
//! let mut registry: PoolRegistry = PoolRegistry::new();
//! let id = registry.register(pool)?;
//!
//! let run = registry.get_frames(id, 4)?;
//! assert_eq!(registry.release_frames(run)?, 4);
//! # Ok::<(), kernel_alloc::pool_registry::RegistryError>(())
//! ```

use crate::cont_frame_pool::{ContFramePool, FramePoolError};
use core::fmt;
use kernel_info::memory::MAX_FRAME_POOLS;
use kernel_memory_addresses::FrameNumber;
use log::{debug, warn};

/// Handle of a pool inside a [`PoolRegistry`].
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PoolId(usize);

impl PoolId {
    /// Position of the pool in registration order.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PoolId({})", self.0)
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool {}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Pool(#[from] FramePoolError),
    #[error("frame {0} is not governed by any registered pool")]
    UnknownFrame(FrameNumber),
    #[error("registry is full ({capacity} pools)")]
    Full { capacity: usize },
    #[error("pool at {base}+{n_frames} overlaps {existing}")]
    OverlappingPool {
        base: FrameNumber,
        n_frames: u64,
        existing: PoolId,
    },
    #[error("{0} is not registered")]
    UnknownPool(PoolId),
}

/// Fixed-capacity, append-only set of frame pools.
pub struct PoolRegistry<'a, const N: usize = MAX_FRAME_POOLS> {
    pools: [Option<ContFramePool<'a>>; N],
    len: usize,
}

impl<const N: usize> Default for PoolRegistry<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, const N: usize> PoolRegistry<'a, N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pools: [const { None }; N],
            len: 0,
        }
    }

    /// Append `pool` and return its handle.
    ///
    /// # Errors
    /// - [`RegistryError::Full`] if `N` pools are registered already.
    /// - [`RegistryError::OverlappingPool`] if `pool` shares a frame with a
    ///   registered pool.
    pub fn register(&mut self, pool: ContFramePool<'a>) -> Result<PoolId, RegistryError> {
        if self.len == N {
            return Err(RegistryError::Full { capacity: N });
        }
        if let Some((existing, _)) = self.iter().find(|(_, other)| other.overlaps(&pool)) {
            return Err(RegistryError::OverlappingPool {
                base: pool.base_frame_no(),
                n_frames: pool.n_frames(),
                existing,
            });
        }

        let id = PoolId(self.len);
        debug!(
            "Registered {id}: frames {}..+{}",
            pool.base_frame_no(),
            pool.n_frames()
        );
        self.pools[self.len] = Some(pool);
        self.len += 1;
        Ok(id)
    }

    /// Number of registered pools.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[must_use]
    pub fn pool(&self, id: PoolId) -> Option<&ContFramePool<'a>> {
        self.pools.get(id.0).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn pool_mut(&mut self, id: PoolId) -> Option<&mut ContFramePool<'a>> {
        self.pools.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Allocate `n` contiguous frames from pool `id`.
    ///
    /// # Errors
    /// [`RegistryError::UnknownPool`] or the pool's own failure.
    pub fn get_frames(&mut self, id: PoolId, n: u64) -> Result<FrameNumber, RegistryError> {
        let pool = self.pool_mut(id).ok_or(RegistryError::UnknownPool(id))?;
        Ok(pool.get_frames(n)?)
    }

    /// Reserve the absolute frames `[base, base + n)` in pool `id`.
    ///
    /// # Errors
    /// [`RegistryError::UnknownPool`] or the pool's own failure.
    pub fn mark_inaccessible(
        &mut self,
        id: PoolId,
        base: FrameNumber,
        n: u64,
    ) -> Result<(), RegistryError> {
        let pool = self.pool_mut(id).ok_or(RegistryError::UnknownPool(id))?;
        Ok(pool.mark_inaccessible(base, n)?)
    }

    /// First pool, in registration order, that governs `frame`.
    #[must_use]
    pub fn owner_of(&self, frame: FrameNumber) -> Option<PoolId> {
        self.iter()
            .find(|(_, pool)| pool.contains(frame))
            .map(|(id, _)| id)
    }

    /// Release the run headed by `frame` in whichever pool owns it.
    ///
    /// Returns the number of frames freed.
    ///
    /// # Errors
    /// - [`RegistryError::UnknownFrame`] if no registered pool governs `frame`.
    /// - [`FramePoolError::NotHeadOfSequence`] (wrapped) if `frame` does not
    ///   start an allocated run.
    ///
    /// No bitmap changes on failure.
    pub fn release_frames(&mut self, frame: FrameNumber) -> Result<u64, RegistryError> {
        let Some(id) = self.owner_of(frame) else {
            warn!("Rejected release of frame {frame}: no owning pool");
            return Err(RegistryError::UnknownFrame(frame));
        };

        let pool = self.pool_mut(id).ok_or(RegistryError::UnknownPool(id))?;
        pool.release_run(frame).map_err(|e| {
            warn!("Rejected release of frame {frame} in {id}: {e}");
            RegistryError::from(e)
        })
    }

    /// Registered pools with their handles, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (PoolId, &ContFramePool<'a>)> + '_ {
        self.pools[..self.len]
            .iter()
            .enumerate()
            .filter_map(|(index, pool)| pool.as_ref().map(|pool| (PoolId(index), pool)))
    }

    /// Free frames summed over all registered pools.
    #[must_use]
    pub fn total_free_frames(&self) -> u64 {
        self.iter().map(|(_, pool)| pool.n_free_frames()).sum()
    }
}
