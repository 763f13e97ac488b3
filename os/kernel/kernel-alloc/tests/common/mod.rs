#![allow(dead_code)]

use kernel_alloc::page_table::{PageTable, PageTableError, VmPoolInfo};
use kernel_alloc::phys_mapper::PhysMapper;
use kernel_memory_addresses::{FRAME_SIZE, FrameNumber, PhysicalAddress, VirtualAddress};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ptr::NonNull;

#[repr(C, align(4096))]
struct Frame([u8; FRAME_SIZE as usize]);

/// Sparse stand-in for physical memory.
///
/// A frame is materialized (zeroed) on first access. Frames are leaked so
/// references handed out stay valid for any lifetime.
#[derive(Default)]
pub struct FrameArena {
    frames: RefCell<HashMap<FrameNumber, NonNull<Frame>>>,
}

impl FrameArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames touched so far.
    pub fn materialized(&self) -> usize {
        self.frames.borrow().len()
    }

    pub fn is_materialized(&self, frame: FrameNumber) -> bool {
        self.frames.borrow().contains_key(&frame)
    }

    fn frame(&self, frame: FrameNumber) -> NonNull<Frame> {
        *self
            .frames
            .borrow_mut()
            .entry(frame)
            .or_insert_with(|| NonNull::from(Box::leak(Box::new(Frame([0; FRAME_SIZE as usize])))))
    }
}

impl PhysMapper for FrameArena {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let frame = self.frame(pa.frame());
        let offset = usize::try_from(pa.offset_in_frame()).unwrap();
        // the frame is leaked, 4 KiB aligned and exclusively handed to the caller
        unsafe { &mut *frame.as_ptr().cast::<u8>().add(offset).cast::<T>() }
    }
}

/// Page table that records every call and maps nothing.
#[derive(Default)]
pub struct RecordingPageTable {
    pub capacity: Option<usize>,
    pub pools: RefCell<Vec<VmPoolInfo>>,
    pub freed: RefCell<Vec<VirtualAddress>>,
    pub loads: Cell<usize>,
}

impl RecordingPageTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }
}

impl PageTable for RecordingPageTable {
    fn register_pool(&self, pool: VmPoolInfo) -> Result<(), PageTableError> {
        let mut pools = self.pools.borrow_mut();
        if let Some(capacity) = self.capacity
            && pools.len() == capacity
        {
            return Err(PageTableError::PoolTableFull { capacity });
        }
        pools.push(pool);
        Ok(())
    }

    fn free_page(&self, page: VirtualAddress) {
        self.freed.borrow_mut().push(page);
    }

    fn load(&self) {
        self.loads.set(self.loads.get() + 1);
    }
}
