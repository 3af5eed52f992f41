#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]
#![cfg(test)]

use core::alloc::Layout;

use allocator::{
    Allocator, CountingAllocator, DefaultAllocatorRef, FixedAllocator,
    FixedAllocatorWithOverflow, FixedPool, FixedPoolReference, FixedPoolWithOverflow,
    HeapAllocator, NullAllocator, PoolBuffer, allocate_memory, is_aligned_with_offset,
};

const ALIGNMENTS: [usize; 5] = [1, 2, 4, 8, 16];
const OFFSETS: [usize; 2] = [0, 16];

fn node_layout() -> Layout {
    Layout::from_size_align(64, 16).unwrap()
}

/// Requests every alignment/offset pair from `allocator` and checks the
/// returned address.
fn check_alignment_grid<A>(allocator: &A, size: usize)
where
    A: Allocator + ?Sized,
{
    for alignment in ALIGNMENTS {
        for offset in OFFSETS {
            let ptr = allocate_memory(allocator, size, alignment, offset)
                .unwrap_or_else(|| panic!("{}: {alignment}/{offset} failed", allocator.name()));
            assert!(
                is_aligned_with_offset(ptr, alignment, offset),
                "{}: {ptr:p} is not {alignment}-aligned at offset {offset}",
                allocator.name()
            );
            unsafe {
                ptr.as_ptr().write_bytes(0x5a, size);
                allocator.deallocate(ptr, size);
            }
        }
    }
}

#[test]
fn alignment_is_honoured_by_every_allocator() {
    check_alignment_grid(&HeapAllocator::new(), 100);
    check_alignment_grid(&CountingAllocator::new(HeapAllocator::new()), 1);
    check_alignment_grid(&DefaultAllocatorRef::new(), 33);

    let mut buffer = PoolBuffer::<1024>::new();
    let mut fixed = FixedAllocator::default();
    fixed.init(&mut buffer, node_layout()).unwrap();
    check_alignment_grid(&fixed, 48);

    let mut buffer = PoolBuffer::<1024>::new();
    let pool = FixedPool::with_buffer(&mut buffer, node_layout()).unwrap();
    check_alignment_grid(&FixedPoolReference::new(&pool), 64);
    assert_eq!(pool.free_count(), pool.capacity());

    let mut buffer = PoolBuffer::<128>::new();
    let mut overflow = FixedAllocatorWithOverflow::new(FixedPoolWithOverflow::new(
        HeapAllocator::new(),
    ));
    overflow.init(&mut buffer, node_layout()).unwrap();
    check_alignment_grid(&overflow, 200);
}

#[test]
fn heap_allocators_are_equal_regardless_of_name() {
    let a = HeapAllocator::with_name("textures");
    let mut b = HeapAllocator::default();
    b.set_name("meshes");
    assert_eq!(a, b);

    // Equal allocators release each other's blocks.
    let ptr = allocate_memory(&a, 256, 64, 0).unwrap();
    unsafe { b.deallocate(ptr, 256) };
}

#[test]
fn fixed_pool_reuses_the_last_freed_node() {
    let mut buffer = PoolBuffer::<1024>::new();
    let pool = FixedPool::with_buffer(&mut buffer, node_layout()).unwrap();
    let first = pool.allocate().unwrap();
    unsafe { pool.deallocate(first) };
    let second = pool.allocate().unwrap();
    assert_eq!(first, second);
}

#[test]
fn overflow_is_transparent() {
    let mut buffer = PoolBuffer::<{ 64 * 8 }>::new();
    let pool = FixedPoolWithOverflow::with_buffer(&mut buffer, node_layout(), HeapAllocator::new())
        .unwrap();
    let capacity = pool.pool().capacity();
    assert_eq!(capacity, 8);

    let mut nodes: Vec<_> = (0..capacity).map(|_| pool.allocate().unwrap()).collect();
    let extra = pool.allocate().unwrap();
    assert!(!pool.pool().owns(extra.as_ptr()));

    unsafe { pool.deallocate(extra, 64) };
    for node in nodes.drain(..) {
        unsafe { pool.deallocate(node, 64) };
    }

    // The free list survived: the whole buffer is handed out again.
    nodes.extend((0..capacity).map(|_| pool.allocate().unwrap()));
    assert!(nodes.iter().all(|node| pool.pool().owns(node.as_ptr())));
    assert_eq!(pool.overflow_count(), 0);
    for node in nodes {
        unsafe { pool.deallocate(node, 64) };
    }
}

#[test]
fn exhausted_pool_without_overflow_fails() {
    let mut buffer = PoolBuffer::<{ 64 * 8 }>::new();
    let mut allocator = FixedAllocator::default();
    let capacity = allocator.init(&mut buffer, node_layout()).unwrap();

    let nodes: Vec<_> = (0..capacity)
        .map(|_| allocate_memory(&allocator, 64, 16, 0).unwrap())
        .collect();
    assert!(allocate_memory(&allocator, 64, 16, 0).is_none());

    // Every earlier node is still usable and can be freed on its own.
    for (i, node) in nodes.iter().enumerate() {
        unsafe { node.as_ptr().write_bytes(u8::try_from(i).unwrap(), 64) };
    }
    for (i, node) in nodes.into_iter().enumerate().rev() {
        assert_eq!(unsafe { node.as_ptr().read() }, u8::try_from(i).unwrap());
        unsafe { allocator.deallocate(node, 64) };
    }
    assert_eq!(allocator.pool().free_count(), capacity);
}

#[test]
fn references_are_equal_iff_they_share_a_pool() {
    let mut first_buffer = PoolBuffer::<1024>::new();
    let mut second_buffer = PoolBuffer::<1024>::new();
    let first = FixedPool::with_buffer(&mut first_buffer, node_layout()).unwrap();
    let second = FixedPool::with_buffer(&mut second_buffer, node_layout()).unwrap();

    assert_eq!(FixedPoolReference::new(&first), FixedPoolReference::new(&first));
    assert_ne!(FixedPoolReference::new(&first), FixedPoolReference::new(&second));
}

#[test]
fn null_allocator_fails_every_request() {
    let null = NullAllocator::new();
    for alignment in ALIGNMENTS {
        for offset in OFFSETS {
            assert!(allocate_memory(&null, 8, alignment, offset).is_none());
        }
    }
    assert_eq!(null, NullAllocator::default());
}
