mod common;

use common::FrameArena;
use kernel_alloc::cont_frame_pool::{ContFramePool, FramePoolError, InfoFrame};
use kernel_alloc::frame_state::FrameState;
use kernel_alloc::pool_registry::{PoolRegistry, RegistryError};
use kernel_memory_addresses::FrameNumber;

fn self_hosted(arena: &FrameArena, base: u64, n: u64) -> ContFramePool<'static> {
    unsafe { ContFramePool::new(FrameNumber::new(base), n, InfoFrame::SelfHosted, arena) }.unwrap()
}

#[test]
fn release_is_routed_by_frame_number() {
    let arena = FrameArena::new();
    let mut registry: PoolRegistry = PoolRegistry::new();
    let low = registry.register(self_hosted(&arena, 0, 32)).unwrap();
    let high = registry.register(self_hosted(&arena, 1000, 32)).unwrap();

    let a = registry.get_frames(low, 4).unwrap();
    let b = registry.get_frames(high, 6).unwrap();
    assert_eq!(registry.owner_of(a), Some(low));
    assert_eq!(registry.owner_of(b), Some(high));
    assert_eq!(registry.total_free_frames(), 62 - 10);

    assert_eq!(registry.release_frames(b), Ok(6));
    assert_eq!(registry.pool(high).unwrap().n_free_frames(), 31);
    assert_eq!(registry.pool(low).unwrap().n_free_frames(), 27);

    assert_eq!(registry.release_frames(a), Ok(4));
    assert_eq!(registry.total_free_frames(), 62);
}

#[test]
fn rejected_releases_change_nothing() {
    let arena = FrameArena::new();
    let mut registry: PoolRegistry = PoolRegistry::new();
    let id = registry.register(self_hosted(&arena, 0, 16)).unwrap();
    let run = registry.get_frames(id, 5).unwrap();

    let snapshot = |registry: &PoolRegistry| -> Vec<FrameState> {
        let pool = registry.pool(id).unwrap();
        (0..16).map(|f| pool.state(FrameNumber::new(f)).unwrap()).collect()
    };
    let before = snapshot(&registry);

    // continuation frame
    assert_eq!(
        registry.release_frames(run + 2),
        Err(RegistryError::Pool(FramePoolError::NotHeadOfSequence {
            frame: run + 2,
            state: FrameState::Used
        }))
    );
    // free frame
    assert!(matches!(
        registry.release_frames(FrameNumber::new(10)),
        Err(RegistryError::Pool(FramePoolError::NotHeadOfSequence {
            state: FrameState::Free,
            ..
        }))
    ));
    // not owned by any pool
    assert_eq!(
        registry.release_frames(FrameNumber::new(16)),
        Err(RegistryError::UnknownFrame(FrameNumber::new(16)))
    );

    assert_eq!(snapshot(&registry), before);
    assert_eq!(registry.total_free_frames(), 10);
}

#[test]
fn double_release_is_rejected() {
    let arena = FrameArena::new();
    let mut registry: PoolRegistry = PoolRegistry::new();
    let id = registry.register(self_hosted(&arena, 0, 16)).unwrap();
    let run = registry.get_frames(id, 2).unwrap();

    assert_eq!(registry.release_frames(run), Ok(2));
    assert!(registry.release_frames(run).is_err());
    assert_eq!(registry.total_free_frames(), 15);
}

#[test]
fn adjacent_runs_are_released_independently() {
    let arena = FrameArena::new();
    let mut registry: PoolRegistry = PoolRegistry::new();
    let id = registry.register(self_hosted(&arena, 0, 16)).unwrap();

    let first = registry.get_frames(id, 3).unwrap();
    let second = registry.get_frames(id, 3).unwrap();
    assert_eq!(second, first + 3);

    assert_eq!(registry.release_frames(first), Ok(3));
    let pool = registry.pool(id).unwrap();
    assert_eq!(pool.state(second), Some(FrameState::HeadOfSequence));
    assert_eq!(pool.state(second + 2), Some(FrameState::Used));
}

#[test]
fn default_capacity_holds_eight_pools() {
    let arena = FrameArena::new();
    let mut registry: PoolRegistry = PoolRegistry::new();
    assert_eq!(registry.capacity(), 8);

    for i in 0..8 {
        registry.register(self_hosted(&arena, i * 100, 10)).unwrap();
    }
    assert_eq!(registry.len(), 8);
    assert_eq!(
        registry.register(self_hosted(&arena, 900, 10)).err(),
        Some(RegistryError::Full { capacity: 8 })
    );

    let ids: Vec<usize> = registry.iter().map(|(id, _)| id.index()).collect();
    assert_eq!(ids, (0..8).collect::<Vec<_>>());
}

#[test]
fn overlapping_ranges_are_rejected() {
    let arena = FrameArena::new();
    let mut registry: PoolRegistry = PoolRegistry::new();
    let existing = registry.register(self_hosted(&arena, 100, 50)).unwrap();

    assert!(matches!(
        registry.register(self_hosted(&arena, 149, 10)),
        Err(RegistryError::OverlappingPool { existing: e, .. }) if e == existing
    ));
    // touching ranges are fine
    assert!(registry.register(self_hosted(&arena, 150, 10)).is_ok());
    assert!(registry.register(self_hosted(&arena, 90, 10)).is_ok());
}
