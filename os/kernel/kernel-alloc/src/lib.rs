//! # Kernel Frame Pools and Virtual Memory Pools
//!
//! This crate provides the memory bookkeeping the kernel needs before and
//! after paging is enabled: allocation of *contiguous* physical frame runs,
//! and allocation of virtual address regions that are backed lazily on page
//! fault.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │               Virtual Memory Pools                  │
//! │    • Page-granular region bookkeeping               │
//! │    • Legitimacy check for faulting addresses        │
//! │    • Unmap on release via the page table            │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ PageTable (register / free_page / load)
//! ┌─────────────────▼───────────────────────────────────┐
//! │                 Pool Registry                       │
//! │    • Owns all frame pools, in registration order    │
//! │    • Resolves the owner of a frame on release       │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │            Contiguous Frame Pools                   │
//! │    • First-fit allocation of frame runs             │
//! │    • 2-bit frame states in one info frame           │
//! │    • Info frame reached through a PhysMapper        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! ### Frame States ([`frame_state`], [`frame_bitmap`])
//!
//! Every frame is `Free`, `HeadOfSequence` or `Used`, packed four to a byte.
//! A run is a head followed by used frames, so its length never needs to be
//! stored: releasing a head sweeps forward to the next free frame or head.
//!
//! ### Contiguous Frame Pool ([`cont_frame_pool`])
//!
//! Governs a fixed range of physical frames. The bitmap lives either in the
//! pool's own first frame or in an external frame, usually taken from another
//! pool. One info frame describes up to 16384 frames (64 MiB).
//!
//! ### Pool Registry ([`pool_registry`])
//!
//! A fixed-capacity list of pools. Frames are released through the registry
//! by number alone; it finds the pool whose range contains the frame.
//!
//! ### Virtual Memory Pool ([`vm_pool`], [`page_table`])
//!
//! Hands out page-rounded regions of a virtual range. Nothing is mapped on
//! allocation; the [`PageTable`](page_table::PageTable) maps pages on first
//! touch if the address is legitimate for a registered pool, and unmaps them
//! when the region is released.
//!
//! ## Usage Patterns
//!
//! ### Frame Runs
//! ```rust
//! use kernel_alloc::cont_frame_pool::{ContFramePool, InfoFrame};
//! use kernel_alloc::frame_state::FrameState;
//! use kernel_alloc::pool_registry::PoolRegistry;
//! use kernel_memory_addresses::FrameNumber;
//!
//! let mut info = [0_u8; 2];
//! let pool = ContFramePool::with_storage(FrameNumber::new(0), 8, InfoFrame::SelfHosted, &mut info)?;
//! assert_eq!(pool.n_free_frames(), 7);
//!
//! let mut registry: PoolRegistry = PoolRegistry::new();
//! let id = registry.register(pool)?;
//!
//! let run = registry.get_frames(id, 3)?;
//! assert_eq!(run, FrameNumber::new(1));
//! assert_eq!(registry.pool(id).map(|p| p.state(run)), Some(Some(FrameState::HeadOfSequence)));
//!
//! registry.release_frames(run)?;
//! assert_eq!(registry.total_free_frames(), 7);
//! # Ok::<(), kernel_alloc::pool_registry::RegistryError>(())
//! ```
//!
//! ### Kernel Bring-up
//! ```rust,no_run
//! use kernel_alloc::cont_frame_pool::{ContFramePool, InfoFrame, needed_info_frames};
//! use kernel_alloc::phys_mapper::HhdmPhysMapper;
//! use kernel_alloc::pool_registry::PoolRegistry;
//! use kernel_info::memory::*;
//! use kernel_memory_addresses::FrameNumber;
//!
//! let mapper = HhdmPhysMapper;
//! let mut registry: PoolRegistry = PoolRegistry::new();
//!
//! let kernel = unsafe {
//!     ContFramePool::new(FrameNumber::new(KERNEL_POOL_START_FRAME), KERNEL_POOL_SIZE, InfoFrame::SelfHosted, &mapper)
//! }?;
//! let kernel = registry.register(kernel)?;
//!
//! let info = registry.get_frames(kernel, needed_info_frames(PROCESS_POOL_SIZE))?;
//! let process = unsafe {
//!     ContFramePool::new(FrameNumber::new(PROCESS_POOL_START_FRAME), PROCESS_POOL_SIZE, InfoFrame::External(info), &mapper)
//! }?;
//! let process = registry.register(process)?;
//! registry.mark_inaccessible(process, FrameNumber::new(MEM_HOLE_START_FRAME), MEM_HOLE_SIZE)?;
//! # Ok::<(), kernel_alloc::pool_registry::RegistryError>(())
//! ```
//!
//! ## Concurrency
//!
//! All operations are synchronous and take `&mut self`; the kernel runs them
//! on one CPU with interrupts off. The page table is shared between pools and
//! is therefore used through `&self`.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod cont_frame_pool;
pub mod frame_bitmap;
pub mod frame_state;
pub mod page_table;
pub mod phys_mapper;
pub mod pool_registry;
pub mod vm_pool;
