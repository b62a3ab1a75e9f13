mod common;

use common::{ArenaMapper, pa, reporting};
use core::num::NonZeroUsize;
use kernel_pmm::{
    FrameAllocator, FrameAllocatorConfig, FrameDescriptor, FrameTable, FreeError, MisusePolicy,
    ReserveError,
};

fn n(count: usize) -> NonZeroUsize {
    NonZeroUsize::new(count).unwrap()
}

fn allocator(
    storage: &mut [FrameDescriptor],
    mapper: ArenaMapper,
) -> FrameAllocator<'_, ArenaMapper> {
    unsafe { FrameAllocator::from_table(FrameTable::new(storage), mapper, reporting()) }
}

fn snapshot(pmm: &FrameAllocator<'_, ArenaMapper>) -> Vec<FrameDescriptor> {
    (0..pmm.frame_count()).filter_map(|i| pmm.frame(i)).collect()
}

#[test]
fn ten_frame_scenario() {
    let mut storage = [FrameDescriptor::FREE; 10];
    let mut pmm = allocator(&mut storage, ArenaMapper::new(10));

    let run = pmm.allocate_many(n(3)).unwrap();
    assert_eq!(run, pa(0));
    assert_eq!(pmm.frame(0), Some(FrameDescriptor::head(2)));
    assert_eq!(pmm.frame(1), Some(FrameDescriptor::continuation()));
    assert_eq!(pmm.frame(2), Some(FrameDescriptor::continuation()));

    assert_eq!(pmm.allocate_one(), Some(pa(0x3000)));

    // frame 0 is a real allocation head here, so the null address is accepted
    assert_eq!(pmm.free(run), Ok(()));
    assert!((0..3).all(|i| pmm.frame(i) == Some(FrameDescriptor::FREE)));
    assert_eq!(pmm.count_frames(true), 1);
    assert_eq!(pmm.count_frames(false), 9);

    assert_eq!(pmm.allocate_many(n(11)), None);
    assert!(pmm.verify().is_ok());
}

#[test]
fn allocations_are_zero_filled() {
    let mapper = ArenaMapper::new(4);
    let mut storage = [FrameDescriptor::FREE; 4];
    let mut pmm = allocator(&mut storage, mapper);

    let one = pmm.allocate_one().unwrap();
    assert!(mapper.is_zeroed(one, 1));
    // the neighbour was not touched
    assert!(!mapper.is_zeroed(pa(0x1000), 1));

    mapper.fill(one, 1, 0xFF);
    pmm.free(one).unwrap();
    assert_eq!(pmm.allocate_one(), Some(one));
    assert!(mapper.is_zeroed(one, 1));

    let run = pmm.allocate_many(n(3)).unwrap();
    assert_eq!(run, pa(0x1000));
    assert!(mapper.is_zeroed(run, 3));
}

#[test]
fn first_fit_reuses_holes() {
    let mut storage = [FrameDescriptor::FREE; 10];
    let mut pmm = allocator(&mut storage, ArenaMapper::new(10));

    let a = pmm.allocate_one().unwrap();
    let b = pmm.allocate_one().unwrap();
    let c = pmm.allocate_one().unwrap();
    assert_eq!([a, b, c], [pa(0), pa(0x1000), pa(0x2000)]);

    pmm.free(b).unwrap();
    // the single-frame hole is too small for two frames
    assert_eq!(pmm.allocate_many(n(2)), Some(pa(0x3000)));
    assert_eq!(pmm.allocate_one(), Some(b));
    assert_eq!(pmm.allocate_many(n(5)), Some(pa(0x5000)));
    assert_eq!(pmm.allocate_one(), None);
    assert!(pmm.verify().is_ok());
}

#[test]
fn round_trip_restores_counts() {
    let mut storage = [FrameDescriptor::FREE; 16];
    let mut pmm = allocator(&mut storage, ArenaMapper::new(16));
    pmm.reserve("firmware", pa(0x4000), 2).unwrap();

    let before = snapshot(&pmm);
    let used = pmm.count_frames(true);

    let run = pmm.allocate_many(n(7)).unwrap();
    assert_eq!(pmm.count_frames(true), used + 7);
    pmm.free(run).unwrap();

    assert_eq!(pmm.count_frames(true), used);
    assert_eq!(snapshot(&pmm), before);
    assert_eq!(pmm.allocate_many(n(7)), Some(run));
}

#[test]
fn reserve_marks_frames() {
    let mut storage = [FrameDescriptor::FREE; 8];
    let mut pmm = allocator(&mut storage, ArenaMapper::new(8));

    // misaligned base addresses round down to their frame
    assert_eq!(pmm.reserve("bios", pa(0x1234), 2), Ok(()));
    assert_eq!(pmm.frame(0), Some(FrameDescriptor::FREE));
    assert_eq!(pmm.frame(1), Some(FrameDescriptor::reservation()));
    assert_eq!(pmm.frame(2), Some(FrameDescriptor::reservation()));
    assert_eq!(pmm.frame(3), Some(FrameDescriptor::FREE));

    let usage = pmm.usage();
    assert_eq!(usage.used_frames, 2);
    assert_eq!(usage.reserved_frames, 2);
    assert_eq!(usage.free_frames, 6);
    assert!(pmm.verify().is_ok());
}

#[test]
fn reserve_rejects_bad_ranges() {
    let mut storage = [FrameDescriptor::FREE; 8];
    let mut pmm = allocator(&mut storage, ArenaMapper::new(8));
    pmm.reserve("bios", pa(0x1000), 2).unwrap();
    let before = snapshot(&pmm);

    assert_eq!(pmm.reserve("empty", pa(0x4000), 0), Err(ReserveError::EmptyRange));
    assert_eq!(
        pmm.reserve("past the end", pa(0x8000), 1),
        Err(ReserveError::OutOfBounds { index: 8, frames: 8 })
    );
    assert_eq!(
        pmm.reserve("straddling the end", pa(0x6000), 4),
        Err(ReserveError::OutOfBounds { index: 8, frames: 8 })
    );
    assert_eq!(
        pmm.reserve("twice", pa(0x1000), 1),
        Err(ReserveError::AlreadyReserved { index: 1 })
    );
    // overlap that only starts in the middle of the range
    assert_eq!(
        pmm.reserve("overlapping", pa(0), 3),
        Err(ReserveError::AlreadyReserved { index: 1 })
    );

    assert_eq!(snapshot(&pmm), before);
}

#[test]
fn reserve_rejects_live_allocations() {
    let mut storage = [FrameDescriptor::FREE; 8];
    let mut pmm = allocator(&mut storage, ArenaMapper::new(8));

    let run = pmm.allocate_many(n(2)).unwrap();
    assert_eq!(run, pa(0));
    let before = snapshot(&pmm);

    // the range starts on the allocation's continuation frame
    assert_eq!(
        pmm.reserve("dma", pa(0x1000), 3),
        Err(ReserveError::OverlapsAllocation { index: 1 })
    );
    assert_eq!(snapshot(&pmm), before);
}

#[test]
fn reserved_frames_are_never_handed_out() {
    let mut storage = [FrameDescriptor::FREE; 6];
    let mut pmm = allocator(&mut storage, ArenaMapper::new(6));
    pmm.reserve("low memory", pa(0), 2).unwrap();
    pmm.reserve("mmio", pa(0x3000), 1).unwrap();

    assert_eq!(pmm.allocate_many(n(2)), Some(pa(0x4000)));
    assert_eq!(pmm.allocate_one(), Some(pa(0x2000)));
    assert_eq!(pmm.allocate_one(), None);
    assert_eq!(pmm.free(pa(0x1000)), Err(FreeError::Reserved { index: 1 }));
    assert_eq!(pmm.frame(1), Some(FrameDescriptor::reservation()));
}

#[test]
fn free_rejects_misuse() {
    let mut storage = [FrameDescriptor::FREE; 8];
    let mut pmm = allocator(&mut storage, ArenaMapper::new(8));
    pmm.reserve("low memory", pa(0), 1).unwrap();
    let run = pmm.allocate_many(n(3)).unwrap();
    assert_eq!(run, pa(0x1000));
    let before = snapshot(&pmm);

    assert_eq!(pmm.free(pa(0)), Err(FreeError::NullAddress));
    assert_eq!(
        pmm.free(pa(0x64000)),
        Err(FreeError::OutOfBounds { index: 100, frames: 8 })
    );
    assert_eq!(pmm.free(pa(0x2000)), Err(FreeError::NotAllocationHead { index: 2 }));
    assert_eq!(pmm.free(pa(0x5000)), Err(FreeError::NotAllocated { index: 5 }));
    assert_eq!(snapshot(&pmm), before);

    // an address inside the head frame names the same allocation
    assert_eq!(pmm.free(pa(0x1010)), Ok(()));
    assert_eq!(pmm.free(run), Err(FreeError::NotAllocated { index: 1 }));
}

#[test]
fn null_address_outside_an_empty_table() {
    let mut storage: [FrameDescriptor; 0] = [];
    let mut pmm = allocator(&mut storage, ArenaMapper::new(1));
    assert_eq!(pmm.free(pa(0)), Err(FreeError::NullAddress));
    assert_eq!(pmm.allocate_one(), None);
}

#[test]
fn exhaustion_leaves_table_unchanged() {
    let mut storage = [FrameDescriptor::FREE; 4];
    let mut pmm = allocator(&mut storage, ArenaMapper::new(4));
    let _ = pmm.allocate_one().unwrap();
    let before = snapshot(&pmm);

    assert_eq!(pmm.allocate_many(n(4)), None);
    assert_eq!(snapshot(&pmm), before);
}

#[test]
#[should_panic(expected = "Frame allocator misuse")]
fn halt_policy_panics_on_double_free() {
    let mut storage = [FrameDescriptor::FREE; 4];
    let config = FrameAllocatorConfig::default().with_misuse(MisusePolicy::Halt);
    let table = FrameTable::new(&mut storage);
    let mut pmm = unsafe { FrameAllocator::from_table(table, ArenaMapper::new(4), config) };

    let frame = pmm.allocate_one().unwrap();
    pmm.free(frame).unwrap();
    let _ = pmm.free(frame);
}

#[test]
fn halt_policy_does_not_apply_to_exhaustion() {
    let mut storage = [FrameDescriptor::FREE; 1];
    let config = FrameAllocatorConfig::default().with_misuse(MisusePolicy::Halt);
    let table = FrameTable::new(&mut storage);
    let mut pmm = unsafe { FrameAllocator::from_table(table, ArenaMapper::new(1), config) };

    assert!(pmm.allocate_one().is_some());
    assert_eq!(pmm.allocate_one(), None);
    assert_eq!(pmm.config().misuse, MisusePolicy::Halt);
}
