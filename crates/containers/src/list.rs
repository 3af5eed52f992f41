//! A doubly-linked list whose nodes come from a pluggable allocator.

use core::{
    alloc::Layout,
    cmp::Ordering,
    fmt,
    iter::FusedIterator,
    marker::PhantomData,
    mem,
    ptr::{self, NonNull},
};

use allocator::{AllocError, AllocSnafu, Allocator, HeapAllocator, allocate_memory};
use snafu::OptionExt as _;

type Link<T> = Option<NonNull<Node<T>>>;

struct Node<T> {
    next: Link<T>,
    prev: Link<T>,
    value: T,
}

/// A doubly-linked list.
///
/// Every element lives in its own node, obtained from the list's allocator
/// through [`allocate_memory`] with the node's size and alignment. Use
/// [`List::node_layout`] to size a pool for the list.
///
/// Operations that allocate return [`AllocError`] when the allocator is
/// exhausted instead of aborting.
///
/// # Examples
///
/// ```
/// # use containers::List;
/// let mut list = List::new();
/// list.push_back(2)?;
/// list.push_back(1)?;
/// list.push_front(3)?;
/// list.sort();
/// assert_eq!(list.iter().copied().collect::<Vec<_>>(), [1, 2, 3]);
/// # Ok::<(), allocator::AllocError>(())
/// ```
pub struct List<T, A = HeapAllocator>
where
    A: Allocator,
{
    head: Link<T>,
    tail: Link<T>,
    len: usize,
    allocator: A,
    _marker: PhantomData<T>,
}

unsafe impl<T, A> Send for List<T, A>
where
    T: Send,
    A: Allocator + Send,
{
}

unsafe impl<T, A> Sync for List<T, A>
where
    T: Sync,
    A: Allocator + Sync,
{
}

impl<T> List<T> {
    /// Creates an empty list backed by the heap.
    #[must_use]
    pub const fn new() -> Self {
        Self::new_in(HeapAllocator::new())
    }
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A> List<T, A>
where
    A: Allocator,
{
    /// Creates an empty list that allocates its nodes from `allocator`.
    pub const fn new_in(allocator: A) -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            allocator,
            _marker: PhantomData,
        }
    }

    /// Layout of one list node.
    #[must_use]
    pub const fn node_layout() -> Layout {
        Layout::new::<Node<T>>()
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Returns a mutable reference to the allocator.
    ///
    /// # Safety
    ///
    /// After the borrow ends the allocator must still be able to release
    /// every node the list holds, that is, it must compare equal to the
    /// allocator as it was before. Renaming it is always fine.
    pub unsafe fn allocator_mut(&mut self) -> &mut A {
        &mut self.allocator
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn front(&self) -> Option<&T> {
        self.head.map(|node| unsafe { &(*node.as_ptr()).value })
    }

    pub fn front_mut(&mut self) -> Option<&mut T> {
        self.head.map(|node| unsafe { &mut (*node.as_ptr()).value })
    }

    #[must_use]
    pub fn back(&self) -> Option<&T> {
        self.tail.map(|node| unsafe { &(*node.as_ptr()).value })
    }

    pub fn back_mut(&mut self) -> Option<&mut T> {
        self.tail.map(|node| unsafe { &mut (*node.as_ptr()).value })
    }

    /// Appends an element.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if no node could be allocated. The element is
    /// dropped in that case.
    pub fn push_back(&mut self, value: T) -> Result<(), AllocError> {
        let node = self.allocate_node()?;
        unsafe { self.link_back(node, value) };
        Ok(())
    }

    /// Prepends an element.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if no node could be allocated. The element is
    /// dropped in that case.
    pub fn push_front(&mut self, value: T) -> Result<(), AllocError> {
        let node = self.allocate_node()?;
        unsafe {
            node.as_ptr().write(Node {
                next: self.head,
                prev: None,
                value,
            });
            match self.head {
                Some(head) => (*head.as_ptr()).prev = Some(node),
                None => self.tail = Some(node),
            }
        }
        self.head = Some(node);
        self.len += 1;
        Ok(())
    }

    pub fn pop_front(&mut self) -> Option<T> {
        let node = self.head?;
        Some(unsafe { self.unlink(node) })
    }

    pub fn pop_back(&mut self) -> Option<T> {
        let node = self.tail?;
        Some(unsafe { self.unlink(node) })
    }

    /// Removes every element and returns all nodes to the allocator.
    pub fn clear(&mut self) {
        while self.pop_front().is_some() {}
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            head: self.head,
            tail: self.tail,
            len: self.len,
            _marker: PhantomData,
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        IterMut {
            head: self.head,
            tail: self.tail,
            len: self.len,
            _marker: PhantomData,
        }
    }

    /// Sorts the list in place, keeping equal elements in their order.
    ///
    /// Nodes are relinked, never reallocated or moved.
    pub fn sort(&mut self)
    where
        T: Ord,
    {
        self.sort_by(T::cmp);
    }

    /// Sorts the list with a comparator, keeping equal elements in their
    /// order.
    pub fn sort_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        if self.len < 2 {
            return;
        }
        unsafe {
            self.head = merge_sort(self.head, self.len, &mut compare);

            let mut prev = None;
            let mut cursor = self.head;
            while let Some(node) = cursor {
                (*node.as_ptr()).prev = prev;
                prev = Some(node);
                cursor = (*node.as_ptr()).next;
            }
            self.tail = prev;
        }
    }

    /// Creates a copy of the list whose nodes come from `allocator`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if `allocator` runs out of memory. Nothing is
    /// leaked in that case.
    pub fn clone_in<B>(&self, allocator: B) -> Result<List<T, B>, AllocError>
    where
        T: Clone,
        B: Allocator,
    {
        let mut list = List::new_in(allocator);
        for value in self {
            list.push_back(value.clone())?;
        }
        Ok(list)
    }

    /// Creates a copy of the list that uses a copy of this list's allocator.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator runs out of memory.
    pub fn try_clone(&self) -> Result<Self, AllocError>
    where
        T: Clone,
        A: Clone,
    {
        self.clone_in(self.allocator.clone())
    }

    /// Replaces the contents of the list with copies of the elements of
    /// `other`, keeping this list's allocator.
    ///
    /// Existing nodes are reused; only the difference in length is allocated
    /// or released.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if a node could not be allocated. The list then
    /// holds a prefix of `other`.
    pub fn assign_from<B>(&mut self, other: &List<T, B>) -> Result<(), AllocError>
    where
        T: Clone,
        B: Allocator,
    {
        let mut source = other.iter();
        let mut cursor = self.head;
        let mut kept = 0;
        while let Some(node) = cursor {
            let Some(value) = source.next() else {
                break;
            };
            unsafe {
                (*node.as_ptr()).value.clone_from(value);
                cursor = (*node.as_ptr()).next;
            }
            kept += 1;
        }

        while self.len > kept {
            self.pop_back();
        }
        for value in source {
            self.push_back(value.clone())?;
        }
        Ok(())
    }

    /// Moves the contents of `other` into this list, replacing its current
    /// elements. `other` is left empty on success.
    ///
    /// If the two allocators compare equal the nodes change owners without
    /// any allocation. Otherwise every element is moved into a node from
    /// this list's allocator and the source node is released.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if a node could not be allocated during an
    /// element-wise move. Elements moved so far stay in this list; the rest
    /// stay in `other`. No element is lost.
    pub fn take_from(&mut self, other: &mut Self) -> Result<(), AllocError>
    where
        A: PartialEq,
    {
        self.clear();
        if self.allocator == other.allocator {
            mem::swap(&mut self.head, &mut other.head);
            mem::swap(&mut self.tail, &mut other.tail);
            mem::swap(&mut self.len, &mut other.len);
            return Ok(());
        }
        move_elements(other, self, 0)
    }

    /// Exchanges the contents of two lists.
    ///
    /// If the allocators compare equal this only exchanges node pointers.
    /// Otherwise values are exchanged in place across the common length and
    /// the surplus of the longer list is moved element-wise, each node
    /// staying with the allocator that produced it.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if a node for a surplus element could not be
    /// allocated. The surplus elements not moved yet remain at the end of
    /// the longer list; no element is lost.
    pub fn swap(&mut self, other: &mut Self) -> Result<(), AllocError>
    where
        A: PartialEq,
    {
        if self.allocator == other.allocator {
            mem::swap(&mut self.head, &mut other.head);
            mem::swap(&mut self.tail, &mut other.tail);
            mem::swap(&mut self.len, &mut other.len);
            return Ok(());
        }

        let common = self.len.min(other.len);
        for (a, b) in self.iter_mut().zip(other.iter_mut()) {
            mem::swap(a, b);
        }
        if self.len > common {
            move_elements(self, other, common)
        } else {
            move_elements(other, self, common)
        }
    }

    /// Returns the node at `index`, if any.
    fn node_at(&self, index: usize) -> Link<T> {
        let mut cursor = self.head;
        for _ in 0..index {
            cursor = cursor.and_then(|node| unsafe { (*node.as_ptr()).next });
        }
        cursor
    }

    fn allocate_node(&self) -> Result<NonNull<Node<T>>, AllocError> {
        let layout = Self::node_layout();
        let ptr = allocate_memory(&self.allocator, layout.size(), layout.align(), 0).context(
            AllocSnafu {
                size: layout.size(),
                alignment: layout.align(),
            },
        )?;
        Ok(ptr.cast())
    }

    /// Initialises `node` with `value` and links it after the tail.
    ///
    /// # Safety
    ///
    /// `node` must be a fresh, uninitialised node from this list's allocator.
    unsafe fn link_back(&mut self, node: NonNull<Node<T>>, value: T) {
        unsafe {
            node.as_ptr().write(Node {
                next: None,
                prev: self.tail,
                value,
            });
            match self.tail {
                Some(tail) => (*tail.as_ptr()).next = Some(node),
                None => self.head = Some(node),
            }
        }
        self.tail = Some(node);
        self.len += 1;
    }

    /// Removes `node` from the list, frees it and returns its value.
    ///
    /// # Safety
    ///
    /// `node` must be a node of this list.
    unsafe fn unlink(&mut self, node: NonNull<Node<T>>) -> T {
        unsafe {
            let Node { next, prev, .. } = *node.as_ptr();
            match prev {
                Some(prev) => (*prev.as_ptr()).next = next,
                None => self.head = next,
            }
            match next {
                Some(next) => (*next.as_ptr()).prev = prev,
                None => self.tail = prev,
            }
            self.len -= 1;

            let value = ptr::read(&raw const (*node.as_ptr()).value);
            self.allocator
                .deallocate(node.cast(), Self::node_layout().size());
            value
        }
    }
}

/// Moves the elements of `from` past its first `keep` to the back of `to`,
/// allocating each destination node before the source node is released.
fn move_elements<T, A>(
    from: &mut List<T, A>,
    to: &mut List<T, A>,
    keep: usize,
) -> Result<(), AllocError>
where
    A: Allocator,
{
    let mut cursor = from.node_at(keep);
    let mut moved = 0_usize;
    while let Some(node) = cursor {
        let dest = match to.allocate_node() {
            Ok(dest) => dest,
            Err(err) => {
                tracing::warn!(
                    moved,
                    remaining = from.len - keep,
                    "element-wise list transfer stopped: {err}"
                );
                return Err(err);
            }
        };
        unsafe {
            cursor = (*node.as_ptr()).next;
            let value = from.unlink(node);
            to.link_back(dest, value);
        }
        moved += 1;
    }
    Ok(())
}

/// Sorts the `len` nodes starting at `head`, whose last `next` is `None`.
/// `prev` links are left stale.
unsafe fn merge_sort<T, F>(head: Link<T>, len: usize, compare: &mut F) -> Link<T>
where
    F: FnMut(&T, &T) -> Ordering,
{
    if len < 2 {
        return head;
    }
    let mid = len / 2;
    unsafe {
        let mut cut = head;
        for _ in 1..mid {
            cut = cut.and_then(|node| (*node.as_ptr()).next);
        }
        let right = cut.and_then(|node| (*node.as_ptr()).next.take());
        let left = merge_sort(head, mid, compare);
        let right = merge_sort(right, len - mid, compare);
        merge(left, right, compare)
    }
}

/// Merges two sorted chains, taking from `left` on ties.
unsafe fn merge<T, F>(mut left: Link<T>, mut right: Link<T>, compare: &mut F) -> Link<T>
where
    F: FnMut(&T, &T) -> Ordering,
{
    let mut head = None;
    let mut slot: *mut Link<T> = &raw mut head;
    unsafe {
        loop {
            match (left, right) {
                (Some(l), Some(r)) => {
                    let node = if compare(&(*r.as_ptr()).value, &(*l.as_ptr()).value).is_lt() {
                        right = (*r.as_ptr()).next;
                        r
                    } else {
                        left = (*l.as_ptr()).next;
                        l
                    };
                    *slot = Some(node);
                    slot = &raw mut (*node.as_ptr()).next;
                }
                (rest, None) | (None, rest) => {
                    *slot = rest;
                    break;
                }
            }
        }
    }
    head
}

impl<T, A> Drop for List<T, A>
where
    A: Allocator,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T, A> fmt::Debug for List<T, A>
where
    T: fmt::Debug,
    A: Allocator,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self).finish()
    }
}

impl<T, A, B> PartialEq<List<T, B>> for List<T, A>
where
    T: PartialEq,
    A: Allocator,
    B: Allocator,
{
    fn eq(&self, other: &List<T, B>) -> bool {
        self.len == other.len && self.iter().eq(other)
    }
}

impl<T, A> Eq for List<T, A>
where
    T: Eq,
    A: Allocator,
{
}

impl<'a, T, A> IntoIterator for &'a List<T, A>
where
    A: Allocator,
{
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, A> IntoIterator for &'a mut List<T, A>
where
    A: Allocator,
{
    type Item = &'a mut T;
    type IntoIter = IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T, A> IntoIterator for List<T, A>
where
    A: Allocator,
{
    type Item = T;
    type IntoIter = IntoIter<T, A>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter { list: self }
    }
}

/// Iterator over shared references to the elements of a [`List`].
pub struct Iter<'a, T> {
    head: Link<T>,
    tail: Link<T>,
    len: usize,
    _marker: PhantomData<&'a Node<T>>,
}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            head: self.head,
            tail: self.tail,
            len: self.len,
            _marker: PhantomData,
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        self.head.map(|node| unsafe {
            self.len -= 1;
            self.head = (*node.as_ptr()).next;
            &(*node.as_ptr()).value
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        self.tail.map(|node| unsafe {
            self.len -= 1;
            self.tail = (*node.as_ptr()).prev;
            &(*node.as_ptr()).value
        })
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
impl<T> FusedIterator for Iter<'_, T> {}

/// Iterator over mutable references to the elements of a [`List`].
pub struct IterMut<'a, T> {
    head: Link<T>,
    tail: Link<T>,
    len: usize,
    _marker: PhantomData<&'a mut Node<T>>,
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        self.head.map(|node| unsafe {
            self.len -= 1;
            self.head = (*node.as_ptr()).next;
            &mut (*node.as_ptr()).value
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<T> DoubleEndedIterator for IterMut<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }
        self.tail.map(|node| unsafe {
            self.len -= 1;
            self.tail = (*node.as_ptr()).prev;
            &mut (*node.as_ptr()).value
        })
    }
}

impl<T> ExactSizeIterator for IterMut<'_, T> {}
impl<T> FusedIterator for IterMut<'_, T> {}

/// Owning iterator over the elements of a [`List`].
pub struct IntoIter<T, A = HeapAllocator>
where
    A: Allocator,
{
    list: List<T, A>,
}

impl<T, A> Iterator for IntoIter<T, A>
where
    A: Allocator,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.list.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.list.len, Some(self.list.len))
    }
}

impl<T, A> DoubleEndedIterator for IntoIter<T, A>
where
    A: Allocator,
{
    fn next_back(&mut self) -> Option<T> {
        self.list.pop_back()
    }
}

impl<T, A> ExactSizeIterator for IntoIter<T, A> where A: Allocator {}
impl<T, A> FusedIterator for IntoIter<T, A> where A: Allocator {}
