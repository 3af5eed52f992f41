//! A separately chained hash map whose memory comes from a pluggable
//! allocator.
//!
//! The map keeps a power-of-two array of bucket heads. Each entry lives in
//! its own node and is threaded onto the singly-linked chain of its bucket:
//!
//! ```text
//! buckets
//! ┌───┐   ┌───────┐   ┌───────┐
//! │ ● ├──▶│ entry ├──▶│ entry │
//! ├───┤   └───────┘   └───────┘
//! │ ∅ │
//! ├───┤   ┌───────┐
//! │ ● ├──▶│ entry │
//! └───┘   └───────┘
//! ```
//!
//! Both the bucket array and the entries are obtained through
//! [`allocate_memory`]. Entries store their hash, so growing the bucket
//! array relinks entries without rehashing keys or touching the allocator
//! for them.

use core::{
    alloc::Layout,
    borrow::Borrow,
    fmt,
    hash::{BuildHasher, Hash},
    iter::FusedIterator,
    marker::PhantomData,
    mem,
    ptr::{self, NonNull},
    slice,
};
use std::hash::RandomState;

use allocator::{AllocError, AllocSnafu, Allocator, HeapAllocator, allocate_memory};
use snafu::{OptionExt as _, ensure};

use crate::error::{AllocatorMismatchSnafu, SwapError};

/// Smallest non-empty bucket array.
const MIN_BUCKETS: usize = 8;

type Link<K, V> = Option<NonNull<Entry<K, V>>>;

struct Entry<K, V> {
    next: Link<K, V>,
    hash: u64,
    key: K,
    value: V,
}

/// A hash map with separate chaining.
///
/// The map grows its bucket array so that there is at least one bucket per
/// entry. Operations that allocate return [`AllocError`] when the allocator
/// is exhausted and leave the map unchanged.
///
/// # Examples
///
/// ```
/// # use containers::HashMap;
/// let mut map = HashMap::new();
/// map.insert("one", 1)?;
/// map.insert("two", 2)?;
/// assert_eq!(map.insert("one", 10)?, Some(1));
/// assert_eq!(map.get("one"), Some(&10));
/// assert_eq!(map.remove("two"), Some(2));
/// assert_eq!(map.len(), 1);
/// # Ok::<(), allocator::AllocError>(())
/// ```
pub struct HashMap<K, V, A = HeapAllocator, S = RandomState>
where
    A: Allocator,
{
    buckets: NonNull<Link<K, V>>,
    bucket_count: usize,
    len: usize,
    hasher: S,
    allocator: A,
    _marker: PhantomData<(K, V)>,
}

unsafe impl<K, V, A, S> Send for HashMap<K, V, A, S>
where
    K: Send,
    V: Send,
    A: Allocator + Send,
    S: Send,
{
}

unsafe impl<K, V, A, S> Sync for HashMap<K, V, A, S>
where
    K: Sync,
    V: Sync,
    A: Allocator + Sync,
    S: Sync,
{
}

impl<K, V> HashMap<K, V> {
    /// Creates an empty map backed by the heap. No memory is allocated until
    /// the first insertion.
    #[must_use]
    pub fn new() -> Self {
        Self::new_in(HeapAllocator::new())
    }
}

impl<K, V> Default for HashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, A, S> HashMap<K, V, A, S>
where
    A: Allocator,
{
    /// Creates an empty map that allocates from `allocator`.
    pub fn new_in(allocator: A) -> Self
    where
        S: Default,
    {
        Self::with_hasher_in(S::default(), allocator)
    }

    pub const fn with_hasher_in(hasher: S, allocator: A) -> Self {
        Self {
            buckets: NonNull::dangling(),
            bucket_count: 0,
            len: 0,
            hasher,
            allocator,
            _marker: PhantomData,
        }
    }

    /// Layout of one entry node.
    ///
    /// The bucket array comes from the same allocator as the entries and is
    /// larger than an entry (see [`initial_bucket_layout`]). A pool without
    /// overflow sized only for entries fails the first insertion.
    ///
    /// [`initial_bucket_layout`]: Self::initial_bucket_layout
    #[must_use]
    pub const fn entry_layout() -> Layout {
        Layout::new::<Entry<K, V>>()
    }

    /// Layout of the bucket array allocated by the first insertion.
    ///
    /// The array doubles whenever the map holds more entries than buckets.
    #[must_use]
    pub const fn initial_bucket_layout() -> Layout {
        Layout::new::<[Link<K, V>; MIN_BUCKETS]>()
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets; zero before the first insertion.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Grows the bucket array so that `additional` more entries can be
    /// inserted without another rehash.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the larger bucket array could not be
    /// allocated. The map is unchanged in that case.
    pub fn reserve(&mut self, additional: usize) -> Result<(), AllocError> {
        let needed = self.len.checked_add(additional);
        if needed.is_some_and(|needed| needed <= self.bucket_count) {
            return Ok(());
        }
        let bucket_count = needed
            .and_then(usize::checked_next_power_of_two)
            .context(AllocSnafu {
                size: usize::MAX,
                alignment: align_of::<Link<K, V>>(),
            })?;
        self.rehash(bucket_count.max(MIN_BUCKETS))
    }

    /// Inserts a key-value pair, returning the previous value of the key.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the entry or a larger bucket array could not
    /// be allocated. The map is unchanged and the pair is dropped.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>, AllocError>
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        let hash = self.hasher.hash_one(&key);
        if let Some(entry) = self.find(hash, &key) {
            let slot = unsafe { &mut (*entry.as_ptr()).value };
            return Ok(Some(mem::replace(slot, value)));
        }

        self.reserve(1)?;
        let entry = self.allocate_entry()?;
        unsafe { self.link_entry(entry, hash, key, value) };
        Ok(None)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        S: BuildHasher,
    {
        let entry = self.find(self.hasher.hash_one(key), key)?;
        Some(unsafe { &(*entry.as_ptr()).value })
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        S: BuildHasher,
    {
        let entry = self.find(self.hasher.hash_one(key), key)?;
        Some(unsafe { &mut (*entry.as_ptr()).value })
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        S: BuildHasher,
    {
        self.get(key).is_some()
    }

    /// Removes a key, returning its value if it was present.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        S: BuildHasher,
    {
        if self.bucket_count == 0 {
            return None;
        }
        let hash = self.hasher.hash_one(key);
        unsafe {
            let mut slot = self.bucket(hash);
            while let Some(entry) = *slot {
                let candidate = entry.as_ptr();
                if (*candidate).hash == hash && Borrow::<Q>::borrow(&(*candidate).key) == key {
                    *slot = (*candidate).next;
                    self.len -= 1;
                    let (_key, value) = self.release_entry(entry);
                    return Some(value);
                }
                slot = &raw mut (*candidate).next;
            }
        }
        None
    }

    /// Removes every entry. The bucket array is kept.
    pub fn clear(&mut self) {
        for index in 0..self.bucket_count {
            unsafe {
                let mut cursor = self.buckets.add(index).replace(None);
                while let Some(entry) = cursor {
                    cursor = (*entry.as_ptr()).next;
                    drop(self.release_entry(entry));
                }
            }
        }
        self.len = 0;
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        let buckets = unsafe { slice::from_raw_parts(self.buckets.as_ptr(), self.bucket_count) };
        Iter {
            buckets: buckets.iter(),
            current: None,
            remaining: self.len,
        }
    }

    /// Moves the contents of `other` into this map, replacing its current
    /// entries. `other` is left empty on success.
    ///
    /// If the two allocators compare equal the whole table changes owners.
    /// Otherwise every entry is moved into a node from this map's allocator
    /// and the source node is released.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if an allocation fails during an element-wise
    /// move. Entries moved so far stay in this map; the rest stay in
    /// `other`. No entry is lost.
    pub fn take_from(&mut self, other: &mut Self) -> Result<(), AllocError>
    where
        K: Hash,
        A: PartialEq,
        S: BuildHasher,
    {
        self.clear();
        if self.allocator == other.allocator {
            self.swap_table(other);
            return Ok(());
        }

        self.reserve(other.len)?;
        let mut moved = 0_usize;
        for index in 0..other.bucket_count {
            unsafe {
                let slot = other.buckets.add(index).as_ptr();
                while let Some(entry) = *slot {
                    let dest = match self.allocate_entry() {
                        Ok(dest) => dest,
                        Err(err) => {
                            tracing::warn!(
                                moved,
                                remaining = other.len,
                                "element-wise map transfer stopped: {err}"
                            );
                            return Err(err);
                        }
                    };
                    *slot = (*entry.as_ptr()).next;
                    other.len -= 1;
                    let (key, value) = other.release_entry(entry);
                    let hash = self.hasher.hash_one(&key);
                    self.link_entry(dest, hash, key, value);
                    moved += 1;
                }
            }
        }
        Ok(())
    }

    /// Exchanges the contents of two maps in constant time.
    ///
    /// # Errors
    ///
    /// Returns [`SwapError::AllocatorMismatch`] if the allocators do not
    /// compare equal. Neither map is changed in that case.
    pub fn swap(&mut self, other: &mut Self) -> Result<(), SwapError>
    where
        A: PartialEq,
    {
        ensure!(self.allocator == other.allocator, AllocatorMismatchSnafu);
        self.swap_table(other);
        Ok(())
    }

    /// Creates a copy of the map using copies of its allocator and hasher.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator runs out of memory.
    pub fn try_clone(&self) -> Result<Self, AllocError>
    where
        K: Clone,
        V: Clone,
        A: Clone,
        S: Clone,
    {
        let mut map = Self::with_hasher_in(self.hasher.clone(), self.allocator.clone());
        map.reserve(self.len)?;
        for entry in self.entries() {
            let dest = map.allocate_entry()?;
            unsafe {
                let entry = entry.as_ptr();
                map.link_entry(
                    dest,
                    (*entry).hash,
                    (*entry).key.clone(),
                    (*entry).value.clone(),
                );
            }
        }
        Ok(map)
    }

    fn swap_table(&mut self, other: &mut Self) {
        mem::swap(&mut self.buckets, &mut other.buckets);
        mem::swap(&mut self.bucket_count, &mut other.bucket_count);
        mem::swap(&mut self.len, &mut other.len);
        mem::swap(&mut self.hasher, &mut other.hasher);
    }

    /// Iterates over all entry nodes.
    fn entries(&self) -> impl Iterator<Item = NonNull<Entry<K, V>>> + '_ {
        (0..self.bucket_count).flat_map(move |index| {
            let mut cursor = unsafe { *self.buckets.add(index).as_ptr() };
            core::iter::from_fn(move || {
                let entry = cursor?;
                cursor = unsafe { (*entry.as_ptr()).next };
                Some(entry)
            })
        })
    }

    fn find<Q>(&self, hash: u64, key: &Q) -> Link<K, V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        if self.bucket_count == 0 {
            return None;
        }
        let mut cursor = unsafe { *self.bucket(hash) };
        while let Some(entry) = cursor {
            let entry_ref = unsafe { entry.as_ref() };
            if entry_ref.hash == hash && Borrow::<Q>::borrow(&entry_ref.key) == key {
                return Some(entry);
            }
            cursor = entry_ref.next;
        }
        None
    }

    /// Returns the head slot of the bucket `hash` falls into.
    ///
    /// The bucket array must not be empty.
    fn bucket(&self, hash: u64) -> *mut Link<K, V> {
        debug_assert!(self.bucket_count.is_power_of_two());
        unsafe {
            self.buckets
                .add(bucket_index(hash, self.bucket_count))
                .as_ptr()
        }
    }

    /// Replaces the bucket array with one of `bucket_count` buckets and
    /// relinks every entry into it.
    fn rehash(&mut self, bucket_count: usize) -> Result<(), AllocError> {
        let buckets = self.allocate_buckets(bucket_count)?;
        for index in 0..self.bucket_count {
            unsafe {
                let mut cursor = *self.buckets.add(index).as_ptr();
                while let Some(entry) = cursor {
                    cursor = (*entry.as_ptr()).next;
                    let slot = buckets
                        .add(bucket_index((*entry.as_ptr()).hash, bucket_count))
                        .as_ptr();
                    (*entry.as_ptr()).next = *slot;
                    *slot = Some(entry);
                }
            }
        }

        unsafe { self.free_buckets() };
        self.buckets = buckets;
        self.bucket_count = bucket_count;
        tracing::trace!(len = self.len, bucket_count, "hash map rehashed");
        Ok(())
    }

    fn allocate_buckets(&self, count: usize) -> Result<NonNull<Link<K, V>>, AllocError> {
        let layout = Layout::array::<Link<K, V>>(count).ok().context(AllocSnafu {
            size: usize::MAX,
            alignment: align_of::<Link<K, V>>(),
        })?;
        let buckets = allocate_memory(&self.allocator, layout.size(), layout.align(), 0)
            .context(AllocSnafu {
                size: layout.size(),
                alignment: layout.align(),
            })?
            .cast::<Link<K, V>>();
        for index in 0..count {
            unsafe { buckets.add(index).write(None) };
        }
        Ok(buckets)
    }

    /// Returns the bucket array to the allocator, if there is one.
    ///
    /// # Safety
    ///
    /// `self.buckets` must not be used afterwards.
    unsafe fn free_buckets(&mut self) {
        if self.bucket_count > 0 {
            let size = size_of::<Link<K, V>>() * self.bucket_count;
            unsafe { self.allocator.deallocate(self.buckets.cast(), size) };
        }
    }

    fn allocate_entry(&self) -> Result<NonNull<Entry<K, V>>, AllocError> {
        let layout = Self::entry_layout();
        let ptr = allocate_memory(&self.allocator, layout.size(), layout.align(), 0).context(
            AllocSnafu {
                size: layout.size(),
                alignment: layout.align(),
            },
        )?;
        Ok(ptr.cast())
    }

    /// Initialises `entry` and pushes it onto the chain of its bucket.
    ///
    /// # Safety
    ///
    /// `entry` must be a fresh entry node from this map's allocator, the
    /// bucket array must not be empty, and `key` must not be in the map.
    unsafe fn link_entry(&mut self, entry: NonNull<Entry<K, V>>, hash: u64, key: K, value: V) {
        let slot = self.bucket(hash);
        unsafe {
            entry.as_ptr().write(Entry {
                next: *slot,
                hash,
                key,
                value,
            });
            *slot = Some(entry);
        }
        self.len += 1;
    }

    /// Moves the key and value out of an unlinked entry and frees the node.
    ///
    /// # Safety
    ///
    /// `entry` must be an initialised entry of this map that is no longer
    /// reachable from it.
    unsafe fn release_entry(&self, entry: NonNull<Entry<K, V>>) -> (K, V) {
        unsafe {
            let key = ptr::read(&raw const (*entry.as_ptr()).key);
            let value = ptr::read(&raw const (*entry.as_ptr()).value);
            self.allocator
                .deallocate(entry.cast(), Self::entry_layout().size());
            (key, value)
        }
    }
}

#[expect(clippy::cast_possible_truncation)]
fn bucket_index(hash: u64, bucket_count: usize) -> usize {
    (hash as usize) & (bucket_count - 1)
}

impl<K, V, A, S> Drop for HashMap<K, V, A, S>
where
    A: Allocator,
{
    fn drop(&mut self) {
        self.clear();
        unsafe { self.free_buckets() };
    }
}

impl<K, V, A, S> fmt::Debug for HashMap<K, V, A, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
    A: Allocator,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, A, S, B, T> PartialEq<HashMap<K, V, B, T>> for HashMap<K, V, A, S>
where
    K: Eq + Hash,
    V: PartialEq,
    A: Allocator,
    B: Allocator,
    T: BuildHasher,
{
    fn eq(&self, other: &HashMap<K, V, B, T>) -> bool {
        self.len == other.len && self.iter().all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<K, V, A, S> Eq for HashMap<K, V, A, S>
where
    K: Eq + Hash,
    V: Eq,
    A: Allocator,
    S: BuildHasher,
{
}

impl<'a, K, V, A, S> IntoIterator for &'a HashMap<K, V, A, S>
where
    A: Allocator,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the entries of a [`HashMap`] in bucket order.
pub struct Iter<'a, K, V> {
    buckets: slice::Iter<'a, Link<K, V>>,
    current: Link<K, V>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.current {
                let entry = unsafe { &*entry.as_ptr() };
                self.current = entry.next;
                self.remaining -= 1;
                return Some((&entry.key, &entry.value));
            }
            self.current = *self.buckets.next()?;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use allocator::{CountingAllocator, FixedPool, FixedPoolReference, PoolBuffer};

    use super::*;

    /// Heap allocator with an allocation budget and an identity.
    struct Budget {
        id: u32,
        remaining: Cell<usize>,
        heap: HeapAllocator,
    }

    impl Budget {
        fn new(id: u32, allocations: usize) -> Self {
            Self {
                id,
                remaining: Cell::new(allocations),
                heap: HeapAllocator::new(),
            }
        }
    }

    impl PartialEq for Budget {
        fn eq(&self, other: &Self) -> bool {
            self.id == other.id
        }
    }

    impl Allocator for Budget {
        fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
            let remaining = self.remaining.get().checked_sub(1)?;
            self.remaining.set(remaining);
            self.heap.allocate(size)
        }

        fn allocate_aligned(
            &self,
            size: usize,
            alignment: usize,
            offset: usize,
        ) -> Option<NonNull<u8>> {
            let remaining = self.remaining.get().checked_sub(1)?;
            self.remaining.set(remaining);
            self.heap.allocate_aligned(size, alignment, offset)
        }

        unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
            unsafe { self.heap.deallocate(ptr, size) }
        }

        fn name(&self) -> &'static str {
            "budget"
        }

        fn set_name(&mut self, _name: &'static str) {}
    }

    fn sorted<K, V, A, S>(map: &HashMap<K, V, A, S>) -> Vec<(K, V)>
    where
        K: Ord + Clone,
        V: Clone,
        A: Allocator,
    {
        let mut entries: Vec<_> = map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    #[test]
    fn test_insert_get_remove() {
        let mut map: HashMap<String, i32> = HashMap::new();
        assert_eq!(map.bucket_count(), 0);
        assert_eq!(map.get("missing"), None);
        assert_eq!(map.remove("missing"), None);

        assert_eq!(map.insert("a".to_owned(), 1).unwrap(), None);
        assert_eq!(map.insert("b".to_owned(), 2).unwrap(), None);
        assert_eq!(map.insert("a".to_owned(), 3).unwrap(), Some(1));
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a"), Some(&3));
        assert!(map.contains_key("b"));

        *map.get_mut("b").unwrap() += 40;
        assert_eq!(map.remove("b"), Some(42));
        assert!(!map.contains_key("b"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_growth_keeps_entries() {
        let mut map = HashMap::new();
        for i in 0..1000_u32 {
            map.insert(i, i * 2).unwrap();
            assert!(map.bucket_count() >= map.len());
            assert!(map.bucket_count().is_power_of_two());
        }
        for i in 0..1000_u32 {
            assert_eq!(map.get(&i), Some(&(i * 2)));
        }
        assert_eq!(map.iter().len(), 1000);
        assert_eq!(map.iter().count(), 1000);
    }

    #[test]
    fn test_reserve_and_clear() {
        let mut map: HashMap<u32, u32> = HashMap::new();
        map.reserve(100).unwrap();
        assert_eq!(map.bucket_count(), 128);
        map.reserve(10).unwrap();
        assert_eq!(map.bucket_count(), 128);

        for i in 0..50 {
            map.insert(i, i).unwrap();
        }
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.bucket_count(), 128);
        assert_eq!(map.iter().next(), None);
    }

    #[test]
    fn test_memory_is_returned() {
        let counting = CountingAllocator::new(HeapAllocator::new());
        {
            let mut map: HashMap<u64, String, _> = HashMap::new_in(&counting);
            for i in 0..100 {
                map.insert(i, i.to_string()).unwrap();
            }
            for i in 0..50 {
                map.remove(&i);
            }
            // 50 entries plus the bucket array.
            assert_eq!(counting.live_allocations(), 51);
        }
        assert_eq!(counting.live_allocations(), 0);
        assert_eq!(counting.live_bytes(), 0);
    }

    #[test]
    fn test_failed_insert_leaves_map_unchanged() {
        // One allocation for the bucket array, one for the first entry.
        let mut map: HashMap<u32, u32, Budget> = HashMap::new_in(Budget::new(0, 2));
        map.insert(1, 1).unwrap();
        let err = map.insert(2, 2).unwrap_err();
        assert_eq!(err.size(), HashMap::<u32, u32, Budget>::entry_layout().size());
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&1), Some(&1));
        // Updating an existing key needs no memory.
        assert_eq!(map.insert(1, 5).unwrap(), Some(1));
    }

    #[test]
    fn test_pool_must_fit_the_bucket_array() {
        type Map<'p> = HashMap<u32, u32, FixedPoolReference<'p, FixedPool<'p>>>;

        let mut entries_only = PoolBuffer::<1024>::new();
        let pool = FixedPool::with_buffer(&mut entries_only, Map::entry_layout()).unwrap();
        let mut map: Map<'_> = HashMap::new_in(FixedPoolReference::new(&pool));
        let err = map.insert(1, 1).unwrap_err();
        assert_eq!(err.size(), Map::initial_bucket_layout().size());
        assert!(map.is_empty());
        assert_eq!(pool.free_count(), pool.capacity());
        drop(map);

        let mut buffer = PoolBuffer::<1024>::new();
        let pool = FixedPool::with_buffer(&mut buffer, Map::initial_bucket_layout()).unwrap();
        let mut map: Map<'_> = HashMap::new_in(FixedPoolReference::new(&pool));
        for i in 0..8 {
            map.insert(i, i).unwrap();
        }
        // Growing to sixteen buckets no longer fits a node.
        assert!(map.insert(8, 8).is_err());
        assert_eq!(map.len(), 8);
        assert_eq!(map.get(&7), Some(&7));
    }

    #[test]
    fn test_try_clone() {
        let mut map = HashMap::new();
        for i in 0..20 {
            map.insert(i, i * i).unwrap();
        }
        let copy = map.try_clone().unwrap();
        assert_eq!(copy, map);
        assert_eq!(sorted(&copy), sorted(&map));
    }

    #[test]
    fn test_take_from_equal_allocators() {
        let counting = CountingAllocator::new(HeapAllocator::new());
        let mut source: HashMap<u32, u32, _> = HashMap::new_in(&counting);
        let mut target: HashMap<u32, u32, _> = HashMap::new_in(&counting);
        for i in 0..10 {
            source.insert(i, i).unwrap();
        }
        target.insert(99, 99).unwrap();
        let before = counting.total_allocations();

        target.take_from(&mut source).unwrap();
        assert_eq!(counting.total_allocations(), before);
        assert_eq!(target.len(), 10);
        assert!(!target.contains_key(&99));
        assert!(source.is_empty());
    }

    #[test]
    fn test_take_from_unequal_allocators() {
        let mut source: HashMap<u32, u32, Budget> = HashMap::new_in(Budget::new(1, usize::MAX));
        let mut target: HashMap<u32, u32, Budget> = HashMap::new_in(Budget::new(2, usize::MAX));
        for i in 0..10 {
            source.insert(i, i + 100).unwrap();
        }
        target.take_from(&mut source).unwrap();
        assert!(source.is_empty());
        assert_eq!(target.len(), 10);
        for i in 0..10 {
            assert_eq!(target.get(&i), Some(&(i + 100)));
        }
    }

    #[test]
    fn test_take_from_stops_without_losing_entries() {
        let mut source: HashMap<u32, u32, Budget> = HashMap::new_in(Budget::new(1, usize::MAX));
        // Bucket array plus four entries.
        let mut target: HashMap<u32, u32, Budget> = HashMap::new_in(Budget::new(2, 5));
        for i in 0..10 {
            source.insert(i, i).unwrap();
        }
        assert!(target.take_from(&mut source).is_err());
        assert_eq!(target.len(), 4);
        assert_eq!(source.len(), 6);
        for i in 0..10 {
            assert!(target.contains_key(&i) != source.contains_key(&i));
        }
    }

    #[test]
    fn test_swap() {
        let mut a: HashMap<u32, u32, Budget> = HashMap::new_in(Budget::new(1, usize::MAX));
        let mut b: HashMap<u32, u32, Budget> = HashMap::new_in(Budget::new(1, usize::MAX));
        a.insert(1, 1).unwrap();
        b.insert(2, 2).unwrap();
        b.insert(3, 3).unwrap();
        a.swap(&mut b).unwrap();
        assert_eq!(sorted(&a), [(2, 2), (3, 3)]);
        assert_eq!(sorted(&b), [(1, 1)]);

        let mut c: HashMap<u32, u32, Budget> = HashMap::new_in(Budget::new(2, usize::MAX));
        let err = a.swap(&mut c).unwrap_err();
        assert!(matches!(err, SwapError::AllocatorMismatch { .. }));
        assert_eq!(a.len(), 2);
        assert!(c.is_empty());
    }

    #[test]
    fn test_equality_ignores_allocator_and_order() {
        let mut a = HashMap::new();
        let counting = CountingAllocator::new(HeapAllocator::new());
        let mut b: HashMap<_, _, _> = HashMap::new_in(&counting);
        for i in 0..10 {
            a.insert(i, i).unwrap();
            b.insert(9 - i, 9 - i).unwrap();
        }
        assert_eq!(a, b);
        b.insert(3, 4).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_debug() {
        let mut map = HashMap::new();
        map.insert(1, "one").unwrap();
        assert_eq!(format!("{map:?}"), r#"{1: "one"}"#);
    }
}
