//! VM pools driving a software page table that backs pages on first touch.

mod common;

use common::FrameArena;
use kernel_alloc::cont_frame_pool::{ContFramePool, InfoFrame};
use kernel_alloc::page_table::{PageTable, PageTableError, VmPoolInfo};
use kernel_alloc::pool_registry::{PoolId, PoolRegistry, RegistryError};
use kernel_alloc::vm_pool::{Region, VmPool};
use kernel_memory_addresses::{FrameNumber, PAGE_SIZE, VirtualAddress};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

const VM_POOLS_MAX: usize = 4;

#[derive(Debug, PartialEq, Eq)]
enum Fault {
    Illegitimate(VirtualAddress),
    OutOfFrames(RegistryError),
}

/// Page table that maps pages lazily out of the registered pools' frame pools.
struct SoftPageTable<'r> {
    registry: &'r RefCell<PoolRegistry<'static>>,
    pools: RefCell<Vec<VmPoolInfo>>,
    mappings: RefCell<BTreeMap<VirtualAddress, FrameNumber>>,
    loads: Cell<usize>,
}

impl<'r> SoftPageTable<'r> {
    fn new(registry: &'r RefCell<PoolRegistry<'static>>) -> Self {
        Self {
            registry,
            pools: RefCell::default(),
            mappings: RefCell::default(),
            loads: Cell::new(0),
        }
    }

    /// Back the page containing `address`, as a page fault would.
    fn handle_fault(&self, address: VirtualAddress) -> Result<FrameNumber, Fault> {
        let page = address.page_base();
        if let Some(frame) = self.mappings.borrow().get(&page) {
            return Ok(*frame);
        }

        let pool = self
            .pools
            .borrow()
            .iter()
            .find(|pool| pool.is_legitimate(address))
            .copied()
            .ok_or(Fault::Illegitimate(address))?;

        let frame = self
            .registry
            .borrow_mut()
            .get_frames(pool.frame_pool, 1)
            .map_err(Fault::OutOfFrames)?;
        self.mappings.borrow_mut().insert(page, frame);
        Ok(frame)
    }

    fn mapped(&self) -> usize {
        self.mappings.borrow().len()
    }
}

impl PageTable for SoftPageTable<'_> {
    fn register_pool(&self, pool: VmPoolInfo) -> Result<(), PageTableError> {
        let mut pools = self.pools.borrow_mut();
        if pools.len() == VM_POOLS_MAX {
            return Err(PageTableError::PoolTableFull {
                capacity: VM_POOLS_MAX,
            });
        }
        pools.push(pool);
        Ok(())
    }

    fn free_page(&self, page: VirtualAddress) {
        if let Some(frame) = self.mappings.borrow_mut().remove(&page) {
            self.registry
                .borrow_mut()
                .release_frames(frame)
                .expect("mapped frames come from a registered pool");
        }
    }

    fn load(&self) {
        self.loads.set(self.loads.get() + 1);
    }
}

fn registry_with_pools(arena: &FrameArena) -> (RefCell<PoolRegistry<'static>>, PoolId, PoolId) {
    let mut registry = PoolRegistry::new();
    let kernel = unsafe { ContFramePool::new(FrameNumber::new(512), 512, InfoFrame::SelfHosted, arena) }
        .unwrap();
    let process =
        unsafe { ContFramePool::new(FrameNumber::new(1024), 64, InfoFrame::SelfHosted, arena) }
            .unwrap();
    let kernel = registry.register(kernel).unwrap();
    let process = registry.register(process).unwrap();
    (RefCell::new(registry), kernel, process)
}

fn free_frames(registry: &RefCell<PoolRegistry<'static>>, id: PoolId) -> u64 {
    registry.borrow().pool(id).unwrap().n_free_frames()
}

#[test]
fn pages_are_backed_on_touch_and_returned_on_release() {
    let arena = FrameArena::new();
    let (registry, _, process) = registry_with_pools(&arena);
    let page_table = SoftPageTable::new(&registry);
    let mut regions = [Region::default(); 16];
    let base = VirtualAddress::new(0x4000_0000);
    let mut heap = VmPool::new(base, 256 * PAGE_SIZE, process, &page_table, &mut regions).unwrap();

    let before = free_frames(&registry, process);
    let region = heap.allocate(3 * PAGE_SIZE).unwrap();
    // allocation alone consumes nothing
    assert_eq!(free_frames(&registry, process), before);

    page_table.handle_fault(region + 10).unwrap();
    page_table.handle_fault(region + 2 * PAGE_SIZE + 123).unwrap();
    page_table.handle_fault(region + 20).unwrap();
    assert_eq!(page_table.mapped(), 2);
    assert_eq!(free_frames(&registry, process), before - 2);

    heap.release(region).unwrap();
    assert_eq!(page_table.mapped(), 0);
    assert_eq!(free_frames(&registry, process), before);
    assert_eq!(page_table.loads.get(), 1);
}

#[test]
fn faults_outside_every_pool_are_illegitimate() {
    let arena = FrameArena::new();
    let (registry, _, process) = registry_with_pools(&arena);
    let page_table = SoftPageTable::new(&registry);
    let mut regions = [Region::default(); 4];
    let base = VirtualAddress::new(0x4000_0000);
    let _heap = VmPool::new(base, 4 * PAGE_SIZE, process, &page_table, &mut regions).unwrap();

    let outside = base + 4 * PAGE_SIZE + 1;
    assert_eq!(
        page_table.handle_fault(outside),
        Err(Fault::Illegitimate(outside))
    );
    assert_eq!(page_table.mapped(), 0);
}

#[test]
fn each_pool_draws_from_its_own_frame_pool() {
    let arena = FrameArena::new();
    let (registry, kernel, process) = registry_with_pools(&arena);
    let page_table = SoftPageTable::new(&registry);

    let (mut code_regions, mut heap_regions) = ([Region::default(); 4], [Region::default(); 4]);
    let mut code = VmPool::new(
        VirtualAddress::new(0x8000_0000),
        64 * PAGE_SIZE,
        kernel,
        &page_table,
        &mut code_regions,
    )
    .unwrap();
    let mut heap = VmPool::new(
        VirtualAddress::new(0x4000_0000),
        64 * PAGE_SIZE,
        process,
        &page_table,
        &mut heap_regions,
    )
    .unwrap();

    let c = code.allocate(PAGE_SIZE).unwrap();
    let h = heap.allocate(PAGE_SIZE).unwrap();
    let c_frame = page_table.handle_fault(c).unwrap();
    let h_frame = page_table.handle_fault(h).unwrap();

    assert_eq!(registry.borrow().owner_of(c_frame), Some(kernel));
    assert_eq!(registry.borrow().owner_of(h_frame), Some(process));

    code.release(c).unwrap();
    heap.release(h).unwrap();
    assert_eq!(free_frames(&registry, kernel), 511);
    assert_eq!(free_frames(&registry, process), 63);
}

#[test]
fn exhausted_frame_pool_surfaces_as_a_fault_error() {
    let arena = FrameArena::new();
    let (registry, _, process) = registry_with_pools(&arena);
    let page_table = SoftPageTable::new(&registry);
    let mut regions = [Region::default(); 4];
    let mut heap = VmPool::new(
        VirtualAddress::new(0x4000_0000),
        128 * PAGE_SIZE,
        process,
        &page_table,
        &mut regions,
    )
    .unwrap();

    let region = heap.allocate(64 * PAGE_SIZE).unwrap();
    for page in 0..63 {
        page_table.handle_fault(region + page * PAGE_SIZE).unwrap();
    }
    assert!(matches!(
        page_table.handle_fault(region + 63 * PAGE_SIZE),
        Err(Fault::OutOfFrames(_))
    ));

    heap.release(region).unwrap();
    assert_eq!(free_frames(&registry, process), 63);
}

#[test]
fn self_hosted_table_is_backed_like_any_other_page() {
    let arena = FrameArena::new();
    let (registry, kernel, _) = registry_with_pools(&arena);
    let page_table = SoftPageTable::new(&registry);

    #[repr(C, align(4096))]
    struct Backing([u8; 4 * PAGE_SIZE as usize]);
    let backing: &'static mut Backing = Box::leak(Box::new(Backing([0; 4 * PAGE_SIZE as usize])));
    let base = VirtualAddress::from_ptr(backing as *const Backing);

    let mut pool =
        unsafe { VmPool::new_self_hosted(base, 4 * PAGE_SIZE, kernel, &page_table) }.unwrap();
    // the table page faults in like any other page of the pool
    page_table.handle_fault(base).unwrap();

    let region = pool.allocate(PAGE_SIZE).unwrap();
    assert_eq!(region, base + PAGE_SIZE);
    assert!(page_table.pools.borrow()[0].is_legitimate(base));
    assert_eq!(page_table.mapped(), 1);
}
