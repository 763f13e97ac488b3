//! # Memory Layout

pub use kernel_memory_addresses::{FRAME_SIZE, PAGE_SIZE};

/// A simple Higher Half Direct Map (HHDM) base.
/// Anything you map at [`HHDM_BASE`] + `pa` lets the kernel
/// access physical memory via a fixed offset.
pub const HHDM_BASE: u64 = 0xffff_8880_0000_0000;

/// Maximum number of frame pools the pool registry can hold.
pub const MAX_FRAME_POOLS: usize = 8;

/// Number of frames a single frame of 2-bit state entries can describe.
pub const FRAMES_PER_INFO_FRAME: u64 = FRAME_SIZE * 8 / 2;

/// First frame of the kernel frame pool (2 MiB).
pub const KERNEL_POOL_START_FRAME: u64 = (2 * 1024 * 1024) / FRAME_SIZE;

/// Number of frames in the kernel frame pool (2 MiB worth).
pub const KERNEL_POOL_SIZE: u64 = (2 * 1024 * 1024) / FRAME_SIZE;

/// First frame of the process frame pool (4 MiB).
pub const PROCESS_POOL_START_FRAME: u64 = (4 * 1024 * 1024) / FRAME_SIZE;

/// Number of frames in the process frame pool (28 MiB worth).
pub const PROCESS_POOL_SIZE: u64 = (28 * 1024 * 1024) / FRAME_SIZE;

/// First frame of the memory hole at 15 MiB that must never be handed out.
pub const MEM_HOLE_START_FRAME: u64 = (15 * 1024 * 1024) / FRAME_SIZE;

/// Number of frames in the memory hole (1 MiB worth).
pub const MEM_HOLE_SIZE: u64 = (1024 * 1024) / FRAME_SIZE;

const _: () = {
    assert!(KERNEL_POOL_SIZE <= FRAMES_PER_INFO_FRAME);
    assert!(PROCESS_POOL_SIZE <= FRAMES_PER_INFO_FRAME);
    assert!(KERNEL_POOL_START_FRAME + KERNEL_POOL_SIZE <= PROCESS_POOL_START_FRAME);
    assert!(MEM_HOLE_START_FRAME >= PROCESS_POOL_START_FRAME);
    assert!(MEM_HOLE_START_FRAME + MEM_HOLE_SIZE <= PROCESS_POOL_START_FRAME + PROCESS_POOL_SIZE);
    assert!(MAX_FRAME_POOLS > 0);
};
