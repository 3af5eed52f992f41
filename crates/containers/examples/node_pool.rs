//! Fills a list from a fixed pool until it overflows to the heap.
//!
//! Run with `RUST_LOG=trace` to see the allocator's own events.

use allocator::{
    CountingAllocator, FixedPoolReference, FixedPoolWithOverflow, HeapAllocator, PoolBuffer,
};
use containers::{HashMap, List};
use tracing_subscriber::EnvFilter;

const NODES: usize = 64;

type Nodes<'p, 'a> = FixedPoolReference<'p, FixedPoolWithOverflow<'p, &'a CountingAllocator>>;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let heap = CountingAllocator::new(HeapAllocator::new());
    let mut buffer = PoolBuffer::<{ NODES * 24 }>::new();
    let pool = FixedPoolWithOverflow::with_buffer(
        &mut buffer,
        List::<u64, Nodes<'_, '_>>::node_layout(),
        &heap,
    )?;
    tracing::info!(capacity = pool.pool().capacity(), "pool ready");

    let mut evens: List<u64, Nodes<'_, '_>> = List::new_in(FixedPoolReference::new(&pool));
    let mut odds: List<u64, Nodes<'_, '_>> = List::new_in(FixedPoolReference::new(&pool));
    for i in 0..80 {
        if i % 2 == 0 {
            evens.push_front(i)?;
        } else {
            odds.push_front(i)?;
        }
    }
    tracing::info!(
        free = pool.pool().free_count(),
        overflow = pool.overflow_count(),
        heap_blocks = heap.live_allocations(),
        "lists filled"
    );

    evens.sort();
    odds.sort();
    evens.swap(&mut odds)?;
    tracing::info!(
        front = ?evens.front(),
        back = ?evens.back(),
        "swapped without copying nodes"
    );

    let mut index: HashMap<u64, usize, _> = HashMap::new_in(&heap);
    for (position, value) in evens.iter().enumerate() {
        index.insert(*value, position)?;
    }
    tracing::info!(
        entries = index.len(),
        buckets = index.bucket_count(),
        heap_bytes = heap.live_bytes(),
        "index built"
    );

    drop(index);
    drop(evens);
    drop(odds);
    tracing::info!(
        free = pool.pool().free_count(),
        heap_blocks = heap.live_allocations(),
        "all memory returned"
    );
    Ok(())
}
