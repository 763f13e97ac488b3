//! # Frame Numbers and Memory Address Types
//!
//! Strongly typed wrappers for the raw numbers the memory subsystem passes
//! around: physical frame numbers, physical addresses and virtual addresses.
//!
//! ## Overview
//!
//! Frame allocators speak in **frame numbers** (physical address divided by the
//! frame size), page tables and the VM pools speak in **addresses**. Mixing the
//! two is the classic off-by-4096 bug, so each gets its own type:
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`FrameNumber`] | Index of a [`FRAME_SIZE`]-byte physical frame. |
//! | [`PhysicalAddress`] | Byte address in physical memory. |
//! | [`VirtualAddress`] | Byte address in the (page-table translated) virtual space. |
//!
//! Conversions are explicit: [`FrameNumber::base`] yields the first byte of a
//! frame, [`PhysicalAddress::frame`] yields the frame containing an address.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let frame = FrameNumber::new(512);
//! assert_eq!(frame.base().as_u64(), 2 * 1024 * 1024);
//! assert_eq!(PhysicalAddress::new(0x20_0FFF).frame(), frame);
//!
//! let va = VirtualAddress::new(0x4000_0123);
//! assert_eq!(va.page_base().as_u64(), 0x4000_0000);
//! assert_eq!(pages_spanned(PAGE_SIZE + 1), 2);
//! ```
//!
//! ## Design Notes
//!
//! - All types are `#[repr(transparent)]` over `u64` and implement `Copy`,
//!   `Eq`, `Ord` and `Hash`.
//! - Arithmetic that can leave the address space is offered in `checked_*`
//!   form; the operator impls are for call sites that already validated bounds.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod frame_number;
mod page_size;
mod physical_address;
mod virtual_address;

pub use crate::frame_number::FrameNumber;
pub use crate::page_size::{
    FRAME_SHIFT, FRAME_SIZE, PAGE_SHIFT, PAGE_SIZE, align_down, align_up, pages_spanned,
};
pub use crate::physical_address::PhysicalAddress;
pub use crate::virtual_address::VirtualAddress;
