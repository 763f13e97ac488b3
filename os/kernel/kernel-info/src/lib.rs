//! # Kernel Memory Configuration
//!
//! Compile-time configuration shared by the memory subsystem: frame and page
//! sizes, the higher-half direct map used to reach physical frames, capacity
//! limits of the allocator bookkeeping, and the reference physical layout the
//! kernel brings its frame pools up on.
//!
//! ## Physical Memory Layout
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │  Low memory, kernel image       │  (not pooled)
//! 0x0020_0000 ├─────────────────────────────────┤  KERNEL_POOL_START_FRAME
//!             │  Kernel frame pool (2 MiB)      │  self-hosted bitmap
//! 0x0040_0000 ├─────────────────────────────────┤  PROCESS_POOL_START_FRAME
//!             │  Process frame pool (28 MiB)    │  bitmap in a kernel frame
//! 0x00F0_0000 │  ┌───────────────────────────┐  │  MEM_HOLE_START_FRAME
//!             │  │  Memory hole (1 MiB)      │  │  marked inaccessible
//! 0x0100_0000 │  └───────────────────────────┘  │  + MEM_HOLE_SIZE
//!             │                                 │
//! 0x0200_0000 └─────────────────────────────────┘
//! ```
//!
//! All values are `const` and validated with compile-time assertions, so an
//! inconsistent layout fails the build instead of the boot.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
