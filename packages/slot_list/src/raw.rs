use std::mem;

use tracing::trace;

use crate::{Error, Iter, Result, SlotKey, SlotListBuilder, SlotPool};

/// A fixed-capacity doubly-linked list of opaque byte elements, stored in a pre-allocated pool
/// of slots. This is the unsynchronized variant; see [`SlotList`][1] for the thread-safe one.
///
/// Every element is exactly [`element_size()`][2] bytes long. The list never allocates after
/// construction: insertion takes a slot from the pool's free list and erasure returns it there.
/// Insertion fails with [`Error::PoolExhausted`] once all [`capacity()`][3] slots are in use.
///
/// Elements are addressed by [`SlotKey`], which identifies the physical slot that holds the
/// element. All relinking operations are O(1) per element.
///
/// # Storage
///
/// The pool either owns a heap allocation made at construction time ([`new()`][4]) or borrows a
/// caller-provided buffer ([`from_buffer()`][5]), which is useful for static or linker-placed
/// memory on constrained hosts.
///
/// # Example
///
/// ```rust
/// use slot_list::RawSlotList;
///
/// let mut list = RawSlotList::new(5, 4).unwrap();
///
/// for value in 1_u32..=5 {
///     list.push_back(&value.to_ne_bytes()).unwrap();
/// }
///
/// // The pool is now exhausted.
/// assert!(list.push_back(&6_u32.to_ne_bytes()).is_err());
///
/// let mut element = [0_u8; 4];
/// list.pop_front(&mut element).unwrap();
/// assert_eq!(u32::from_ne_bytes(element), 1);
/// assert_eq!(list.len(), 4);
/// ```
///
/// [1]: crate::SlotList
/// [2]: Self::element_size
/// [3]: Self::capacity
/// [4]: Self::new
/// [5]: Self::from_buffer
#[derive(Debug)]
pub struct RawSlotList<'a> {
    pub(crate) pool: SlotPool<'a>,

    pub(crate) head: Option<u16>,
    pub(crate) tail: Option<u16>,

    pub(crate) len: u16,
}

impl RawSlotList<'static> {
    /// Creates a list with a heap-allocated pool of `capacity` slots, each holding an element of
    /// `element_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if either argument is zero or if the pool cannot be allocated.
    #[inline]
    pub fn new(capacity: u16, element_size: u16) -> Result<Self> {
        Self::builder()
            .capacity(capacity)
            .element_size(element_size)
            .build_raw()
    }

    /// Starts building a new [`RawSlotList`].
    #[inline]
    pub fn builder() -> SlotListBuilder<'static> {
        SlotListBuilder::new()
    }
}

impl<'a> RawSlotList<'a> {
    /// Creates a list whose pool lives in a caller-provided buffer. The buffer must be exactly
    /// [`required_storage_bytes(capacity, element_size)`][1] long. Its previous contents are
    /// overwritten and it is never freed by the list.
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension is zero or if the buffer has the wrong size.
    ///
    /// [1]: crate::required_storage_bytes
    #[inline]
    pub fn from_buffer(buffer: &'a mut [u8], capacity: u16, element_size: u16) -> Result<Self> {
        SlotListBuilder::new()
            .capacity(capacity)
            .element_size(element_size)
            .storage(buffer)
            .build_raw()
    }

    pub(crate) fn from_pool(pool: SlotPool<'a>) -> Self {
        Self {
            pool,
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// The number of elements in the list.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    /// Whether the list contains no elements.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether every slot of the pool is in use.
    #[must_use]
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len >= self.pool.capacity()
    }

    /// The number of slots in the pool, i.e. the maximum number of elements.
    #[must_use]
    #[inline]
    pub fn capacity(&self) -> u16 {
        self.pool.capacity()
    }

    /// Same as [`capacity()`][Self::capacity]; a list can never grow beyond its pool.
    #[must_use]
    #[inline]
    pub fn max_size(&self) -> u16 {
        self.pool.capacity()
    }

    /// The size of every element, in bytes.
    #[must_use]
    #[inline]
    pub fn element_size(&self) -> u16 {
        self.pool.element_size()
    }

    /// Whether the pool lives in a caller-provided buffer rather than in memory owned by the
    /// list.
    #[must_use]
    #[inline]
    pub fn is_borrowed(&self) -> bool {
        self.pool.is_borrowed()
    }

    /// The first element, if any.
    #[must_use]
    #[inline]
    pub fn front(&self) -> Option<&[u8]> {
        self.head.map(|index| self.pool.data(index))
    }

    /// The last element, if any.
    #[must_use]
    #[inline]
    pub fn back(&self) -> Option<&[u8]> {
        self.tail.map(|index| self.pool.data(index))
    }

    /// Key of the first element, if any.
    #[must_use]
    #[inline]
    pub fn begin(&self) -> Option<SlotKey> {
        self.head.map(SlotKey::new)
    }

    /// Key of the last element, if any. Note that this is the last element itself, not a
    /// position one past it.
    #[must_use]
    #[inline]
    pub fn end(&self) -> Option<SlotKey> {
        self.tail.map(SlotKey::new)
    }

    /// Key of the element after `key`. Returns `None` at the end of the list or if `key` is not
    /// an element of this list.
    #[must_use]
    pub fn next(&self, key: SlotKey) -> Option<SlotKey> {
        let index = self.key_index(key).ok()?;
        self.pool.next(index).map(SlotKey::new)
    }

    /// Key of the element before `key`. Returns `None` at the start of the list or if `key` is
    /// not an element of this list.
    #[must_use]
    pub fn prev(&self, key: SlotKey) -> Option<SlotKey> {
        let index = self.key_index(key).ok()?;
        self.pool.prev(index).map(SlotKey::new)
    }

    /// The bytes of the element identified by `key`.
    #[must_use]
    pub fn get_element(&self, key: SlotKey) -> Option<&[u8]> {
        let index = self.key_index(key).ok()?;
        Some(self.pool.data(index))
    }

    /// The bytes of the element identified by `key`, for in-place modification.
    #[must_use]
    pub fn get_element_mut(&mut self, key: SlotKey) -> Option<&mut [u8]> {
        let index = self.key_index(key).ok()?;
        Some(self.pool.data_mut(index))
    }

    /// Key of the element at a position in the list.
    ///
    /// Non-negative positions count from the front (`0` is the first element). Negative
    /// positions count from the back (`-1` is the last element). Returns `None` if the position
    /// is outside the list in either direction.
    ///
    /// This walks the list and is O(n).
    ///
    /// # Example
    ///
    /// ```rust
    /// use slot_list::RawSlotList;
    ///
    /// let mut list = RawSlotList::new(4, 1).unwrap();
    /// list.push_back(&[10]).unwrap();
    /// list.push_back(&[20]).unwrap();
    /// list.push_back(&[30]).unwrap();
    ///
    /// assert_eq!(list.get(0), Some(&[10_u8][..]));
    /// assert_eq!(list.get(-1), Some(&[30_u8][..]));
    /// assert_eq!(list.get(3), None);
    /// assert_eq!(list.get(-4), None);
    /// ```
    #[must_use]
    pub fn at(&self, position: isize) -> Option<SlotKey> {
        if let Ok(steps) = usize::try_from(position) {
            if steps >= self.len() {
                return None;
            }

            self.walk(self.head, steps, |index| self.pool.next(index))
        } else {
            let from_back = position.unsigned_abs();

            if from_back > self.len() {
                return None;
            }

            let steps = from_back
                .checked_sub(1)
                .expect("guarded by negative position");

            self.walk(self.tail, steps, |index| self.pool.prev(index))
        }
    }

    /// The bytes of the element at a position in the list. Positions are interpreted as by
    /// [`at()`][Self::at].
    #[must_use]
    #[inline]
    pub fn get(&self, position: isize) -> Option<&[u8]> {
        self.at(position).map(|key| self.pool.data(key.slot_index()))
    }

    /// The position of `key` counted from the front, or `None` if `key` is not an element of
    /// this list. This walks the list and is O(n).
    #[must_use]
    pub fn index_of(&self, key: SlotKey) -> Option<usize> {
        self.key_index(key).ok()?;

        self.iter()
            .position(|(candidate, _)| candidate == key)
    }

    /// Inserts a copy of `element` before `position`, or at the back if `position` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error without modifying the list if `element` has the wrong length, if
    /// `position` is not an element of this list or if the pool is exhausted.
    pub fn insert(&mut self, position: Option<SlotKey>, element: &[u8]) -> Result<SlotKey> {
        self.check_element(element)?;

        let before = position.map(|key| self.key_index(key)).transpose()?;

        let Some(index) = self.pool.acquire() else {
            trace!(capacity = self.capacity(), "slot pool exhausted");
            return Err(Error::PoolExhausted {
                capacity: self.capacity(),
            });
        };

        self.pool.data_mut(index).copy_from_slice(element);
        self.link_before(index, before);

        Ok(SlotKey::new(index))
    }

    /// Removes the element identified by `key` and returns its slot to the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is not an element of this list.
    pub fn erase(&mut self, key: SlotKey) -> Result<()> {
        let index = self.key_index(key)?;
        self.erase_index(index);
        Ok(())
    }

    /// Overwrites the element identified by `key` in place.
    ///
    /// # Errors
    ///
    /// Returns an error if `element` has the wrong length or if `key` is not an element of this
    /// list.
    pub fn replace(&mut self, key: SlotKey, element: &[u8]) -> Result<()> {
        self.check_element(element)?;
        let index = self.key_index(key)?;

        self.pool.data_mut(index).copy_from_slice(element);
        Ok(())
    }

    /// Inserts a copy of `element` at the front.
    ///
    /// # Errors
    ///
    /// Returns an error if `element` has the wrong length or if the pool is exhausted.
    #[inline]
    pub fn push_front(&mut self, element: &[u8]) -> Result<SlotKey> {
        self.insert(self.begin(), element)
    }

    /// Inserts a copy of `element` at the back.
    ///
    /// # Errors
    ///
    /// Returns an error if `element` has the wrong length or if the pool is exhausted.
    #[inline]
    pub fn push_back(&mut self, element: &[u8]) -> Result<SlotKey> {
        self.insert(None, element)
    }

    /// Removes the first element, copying it into `element`.
    ///
    /// # Errors
    ///
    /// Returns an error if `element` has the wrong length or if the list is empty.
    pub fn pop_front(&mut self, element: &mut [u8]) -> Result<()> {
        self.check_element(element)?;
        let index = self.head.ok_or(Error::Empty)?;

        element.copy_from_slice(self.pool.data(index));
        self.erase_index(index);
        Ok(())
    }

    /// Removes the last element, copying it into `element`.
    ///
    /// # Errors
    ///
    /// Returns an error if `element` has the wrong length or if the list is empty.
    pub fn pop_back(&mut self, element: &mut [u8]) -> Result<()> {
        self.check_element(element)?;
        let index = self.tail.ok_or(Error::Empty)?;

        element.copy_from_slice(self.pool.data(index));
        self.erase_index(index);
        Ok(())
    }

    /// Removes every element, returning all slots to the pool.
    pub fn clear(&mut self) {
        let mut current = self.head;

        while let Some(index) = current {
            current = self.pool.next(index);
            self.pool.release(index);
        }

        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Reverses the order of the elements in place. Keys remain valid.
    pub fn reverse(&mut self) {
        let mut current = self.head;

        while let Some(index) = current {
            let next = self.pool.next(index);
            let prev = self.pool.prev(index);

            self.pool.set_next(index, prev);
            self.pool.set_prev(index, next);

            current = next;
        }

        mem::swap(&mut self.head, &mut self.tail);
    }

    /// Exchanges the contents of two lists in O(1).
    ///
    /// The pools travel with their elements, so the capacity, element size and storage of the
    /// two lists are exchanged as well and keys remain valid in whichever list now holds their
    /// element.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Removes every element whose bytes equal `value` and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` has the wrong length.
    pub fn remove(&mut self, value: &[u8]) -> Result<usize> {
        self.check_element(value)?;
        Ok(self.remove_if(|element| element == value))
    }

    /// Removes every element for which `predicate` returns `true` and returns how many were
    /// removed. Elements are visited front to back, each exactly once.
    ///
    /// # Example
    ///
    /// ```rust
    /// use slot_list::RawSlotList;
    ///
    /// let mut list = RawSlotList::new(8, 1).unwrap();
    /// for value in [1_u8, 2, 3, 2, 4, 2, 5] {
    ///     list.push_back(&[value]).unwrap();
    /// }
    ///
    /// let removed = list.remove_if(|element| element[0] % 2 == 0);
    ///
    /// assert_eq!(removed, 4);
    /// assert_eq!(list.len(), 3);
    /// ```
    pub fn remove_if<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&[u8]) -> bool,
    {
        let mut removed: usize = 0;
        let mut current = self.head;

        while let Some(index) = current {
            current = self.pool.next(index);

            if predicate(self.pool.data(index)) {
                self.erase_index(index);
                removed = removed
                    .checked_add(1)
                    .expect("cannot remove more than u16::MAX elements");
            }
        }

        removed
    }

    /// Removes every element whose bytes equal those of an earlier element, keeping the first
    /// occurrence of each distinct value. Returns how many were removed.
    ///
    /// Unlike `Vec::dedup()` this is not limited to adjacent duplicates. Every element is
    /// compared with every later one, so this is O(n²) and intended for short lists.
    pub fn unique(&mut self) -> usize {
        let mut removed: usize = 0;
        let mut anchor = self.head;

        while let Some(anchor_index) = anchor {
            let mut current = self.pool.next(anchor_index);

            while let Some(index) = current {
                current = self.pool.next(index);

                if self.pool.data(index) == self.pool.data(anchor_index) {
                    self.erase_index(index);
                    removed = removed
                        .checked_add(1)
                        .expect("cannot remove more than u16::MAX elements");
                }
            }

            anchor = self.pool.next(anchor_index);
        }

        removed
    }

    /// Finds the first element after `start` (or from the front if `start` is `None`) whose
    /// bytes equal `value`.
    ///
    /// Pass the previous match as `start` to continue searching from there.
    #[must_use]
    #[inline]
    pub fn find(&self, start: Option<SlotKey>, value: &[u8]) -> Option<SlotKey> {
        self.find_if(start, |element| element == value)
    }

    /// Finds the first element after `start` (or from the front if `start` is `None`) for which
    /// `predicate` returns `true`.
    ///
    /// Returns `None` if there is no match or if `start` is not an element of this list.
    ///
    /// # Example
    ///
    /// ```rust
    /// use slot_list::RawSlotList;
    ///
    /// let mut list = RawSlotList::new(8, 1).unwrap();
    /// for value in [1_u8, 6, 3, 8] {
    ///     list.push_back(&[value]).unwrap();
    /// }
    ///
    /// let mut matches = Vec::new();
    /// let mut cursor = None;
    ///
    /// while let Some(key) = list.find_if(cursor, |element| element[0] > 2) {
    ///     matches.push(list.get_element(key).unwrap()[0]);
    ///     cursor = Some(key);
    /// }
    ///
    /// assert_eq!(matches, [6, 3, 8]);
    /// ```
    pub fn find_if<F>(&self, start: Option<SlotKey>, mut predicate: F) -> Option<SlotKey>
    where
        F: FnMut(&[u8]) -> bool,
    {
        let mut current = match start {
            Some(key) => self.pool.next(self.key_index(key).ok()?),
            None => self.head,
        };

        while let Some(index) = current {
            if predicate(self.pool.data(index)) {
                return Some(SlotKey::new(index));
            }

            current = self.pool.next(index);
        }

        None
    }

    /// Whether any element's bytes equal `value`.
    #[must_use]
    #[inline]
    pub fn contains(&self, value: &[u8]) -> bool {
        self.find(None, value).is_some()
    }

    /// Calls `callback` for every element, front to back. There is no filtering; callers that
    /// only care about some elements should check inside the callback.
    pub fn for_each<F>(&self, mut callback: F)
    where
        F: FnMut(SlotKey, &[u8]),
    {
        for (key, element) in self {
            callback(key, element);
        }
    }

    /// Calls `callback` for every element, front to back, allowing the element bytes to be
    /// modified in place.
    pub fn for_each_mut<F>(&mut self, mut callback: F)
    where
        F: FnMut(SlotKey, &mut [u8]),
    {
        let mut current = self.head;

        while let Some(index) = current {
            current = self.pool.next(index);
            callback(SlotKey::new(index), self.pool.data_mut(index));
        }
    }

    /// Iterates over the keys and bytes of all elements, front to back.
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(&self.pool, self.head, self.tail, self.len())
    }

    /// Moves the elements `[first, last)` of `src` into this list, before `position` (or at the
    /// back if `position` is `None`). If `last` is `None` the range extends to the end of `src`.
    ///
    /// The two lists use separate pools, so the moved elements are copied into slots acquired
    /// from this list's pool and their old slots are returned to the pool of `src`. Keys to the
    /// moved elements are therefore invalidated. Returns the number of elements moved.
    ///
    /// # Errors
    ///
    /// Returns an error without modifying either list if the element sizes differ, if
    /// `position` is not an element of this list, if `first` or `last` are not elements of
    /// `src`, if `last` does not follow `first` or if this list lacks the capacity for the
    /// range.
    ///
    /// # Example
    ///
    /// ```rust
    /// use slot_list::RawSlotList;
    ///
    /// let mut dest = RawSlotList::new(10, 1).unwrap();
    /// let mut src = RawSlotList::new(10, 1).unwrap();
    ///
    /// for value in [1_u8, 2, 3] {
    ///     dest.push_back(&[value]).unwrap();
    /// }
    ///
    /// let mut keys = Vec::new();
    /// for value in [10_u8, 20, 30, 40] {
    ///     keys.push(src.push_back(&[value]).unwrap());
    /// }
    ///
    /// // Move the run [20, 30) to the back of `dest`.
    /// let moved = dest.splice(None, &mut src, keys[1], Some(keys[2])).unwrap();
    ///
    /// assert_eq!(moved, 1);
    /// assert_eq!(dest.back(), Some(&[20_u8][..]));
    /// assert_eq!(src.len(), 3);
    /// ```
    pub fn splice(
        &mut self,
        position: Option<SlotKey>,
        src: &mut RawSlotList<'_>,
        first: SlotKey,
        last: Option<SlotKey>,
    ) -> Result<usize> {
        if self.element_size() != src.element_size() {
            return Err(Error::ElementSize {
                expected: usize::from(self.element_size()),
                actual: usize::from(src.element_size()),
            });
        }

        let before = position.map(|key| self.key_index(key)).transpose()?;
        let first_index = src.key_index(first)?;
        let last_index = last.map(|key| src.key_index(key)).transpose()?;

        let mut run_len: u16 = 0;
        let mut run_tail = None;
        let mut current = Some(first_index);

        while current != last_index {
            let Some(index) = current else {
                return Err(Error::InvalidRange {
                    first: first_index,
                    last: last_index.expect("only a Some end can be walked past"),
                });
            };

            run_len = run_len
                .checked_add(1)
                .expect("a run cannot be longer than its u16-sized list");
            run_tail = Some(index);
            current = src.pool.next(index);
        }

        let Some(run_tail) = run_tail else {
            // Empty range, nothing to move.
            return Ok(0);
        };

        if usize::from(self.len).saturating_add(usize::from(run_len))
            > usize::from(self.capacity())
        {
            trace!(
                capacity = self.capacity(),
                len = self.len,
                run_len,
                "splice rejected, destination pool too small"
            );
            return Err(Error::PoolExhausted {
                capacity: self.capacity(),
            });
        }

        let mut current = Some(first_index);
        for _ in 0..run_len {
            let index = current.expect("guarded by run length computed above");

            let dest_index = self
                .pool
                .acquire()
                .expect("guarded by capacity check above");
            self.pool.data_mut(dest_index).copy_from_slice(src.pool.data(index));
            self.link_before(dest_index, before);

            current = src.pool.next(index);
        }

        src.unlink_run(first_index, run_tail, run_len);

        trace!(moved = run_len, "spliced run between slot lists");

        #[cfg(debug_assertions)]
        {
            self.integrity_check();
            src.integrity_check();
        }

        Ok(usize::from(run_len))
    }

    /// Moves every element of `src` to the back of this list. Returns the number moved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Empty`] if `src` is empty and otherwise fails like
    /// [`splice()`][Self::splice].
    pub fn merge(&mut self, src: &mut RawSlotList<'_>) -> Result<usize> {
        let first = src.begin().ok_or(Error::Empty)?;
        self.splice(None, src, first, None)
    }

    pub(crate) fn key_index(&self, key: SlotKey) -> Result<u16> {
        let index = key.slot_index();

        if self.pool.is_occupied(index) {
            Ok(index)
        } else {
            Err(Error::InvalidKey { index })
        }
    }

    pub(crate) fn check_element(&self, element: &[u8]) -> Result<()> {
        let expected = usize::from(self.element_size());

        if element.len() == expected {
            Ok(())
        } else {
            Err(Error::ElementSize {
                expected,
                actual: element.len(),
            })
        }
    }

    /// Links an acquired slot into the active chain before `before`, or at the back.
    pub(crate) fn link_before(&mut self, index: u16, before: Option<u16>) {
        match before {
            None => {
                self.pool.set_prev(index, self.tail);
                self.pool.set_next(index, None);

                match self.tail {
                    Some(tail) => self.pool.set_next(tail, Some(index)),
                    None => self.head = Some(index),
                }

                self.tail = Some(index);
            }
            Some(before) => {
                let prev = self.pool.prev(before);

                self.pool.set_next(index, Some(before));
                self.pool.set_prev(index, prev);
                self.pool.set_prev(before, Some(index));

                match prev {
                    Some(prev) => self.pool.set_next(prev, Some(index)),
                    None => self.head = Some(index),
                }
            }
        }

        self.len = self
            .len
            .checked_add(1)
            .expect("guarded by pool capacity being a u16");
    }

    fn erase_index(&mut self, index: u16) {
        let prev = self.pool.prev(index);
        let next = self.pool.next(index);

        match prev {
            Some(prev) => self.pool.set_next(prev, next),
            None => self.head = next,
        }

        match next {
            Some(next) => self.pool.set_prev(next, prev),
            None => self.tail = prev,
        }

        self.pool.release(index);

        self.len = self
            .len
            .checked_sub(1)
            .expect("an active slot was erased so len must be non-zero");
    }

    /// Detaches the run `first..=run_tail` of `run_len` slots in O(1) and then returns its slots
    /// to the pool.
    fn unlink_run(&mut self, first: u16, run_tail: u16, run_len: u16) {
        let before = self.pool.prev(first);
        let after = self.pool.next(run_tail);

        match before {
            Some(before) => self.pool.set_next(before, after),
            None => self.head = after,
        }

        match after {
            Some(after) => self.pool.set_prev(after, before),
            None => self.tail = before,
        }

        self.len = self
            .len
            .checked_sub(run_len)
            .expect("run was counted inside this list");

        let mut current = Some(first);
        for _ in 0..run_len {
            let index = current.expect("guarded by run length");

            // Read the link before releasing because the free list reuses it.
            current = self.pool.next(index);
            self.pool.release(index);
        }
    }

    fn walk<F>(&self, start: Option<u16>, steps: usize, step: F) -> Option<SlotKey>
    where
        F: Fn(u16) -> Option<u16>,
    {
        let mut current = start;

        for _ in 0..steps {
            current = step(current?);
        }

        current.map(SlotKey::new)
    }

    /// Asserts every structural invariant of the list and its pool.
    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(any(test, debug_assertions))]
    pub(crate) fn integrity_check(&self) {
        let capacity = usize::from(self.capacity());

        assert!(
            self.len() <= capacity,
            "len {} exceeds capacity {capacity}",
            self.len()
        );

        let mut forward: usize = 0;
        let mut previous = None;
        let mut current = self.head;

        while let Some(index) = current {
            assert!(
                self.pool.is_occupied(index),
                "slot {index} is on the active chain but marked vacant"
            );
            assert_eq!(
                self.pool.prev(index),
                previous,
                "slot {index} has a prev link that does not match its predecessor"
            );

            forward = forward.checked_add(1).expect("bounded by capacity check");
            assert!(forward <= capacity, "active chain contains a cycle");

            previous = Some(index);
            current = self.pool.next(index);
        }

        assert_eq!(previous, self.tail, "forward walk did not end at tail");

        let mut backward: usize = 0;
        let mut current = self.tail;

        while let Some(index) = current {
            backward = backward.checked_add(1).expect("bounded by capacity check");
            assert!(backward <= capacity, "active chain contains a cycle");

            current = self.pool.prev(index);
        }

        assert_eq!(forward, self.len(), "forward walk does not match len");
        assert_eq!(backward, self.len(), "backward walk does not match len");
        assert_eq!(
            self.pool.free_len().checked_add(self.len()),
            Some(capacity),
            "free list and active chain do not partition the pool"
        );
    }
}

impl<'l> IntoIterator for &'l RawSlotList<'_> {
    type Item = (SlotKey, &'l [u8]);
    type IntoIter = Iter<'l>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(RawSlotList<'static>: Send, Sync);

    fn list_of(capacity: u16, values: &[u8]) -> RawSlotList<'static> {
        let mut list = RawSlotList::new(capacity, 1).unwrap();

        for value in values {
            list.push_back(&[*value]).unwrap();
        }

        list
    }

    fn contents(list: &RawSlotList<'_>) -> Vec<u8> {
        list.iter().map(|(_, element)| element[0]).collect()
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert_eq!(RawSlotList::new(0, 4).unwrap_err(), Error::ZeroCapacity);
        assert_eq!(RawSlotList::new(4, 0).unwrap_err(), Error::ZeroElementSize);
    }

    #[test]
    fn push_pop_both_ends() {
        let mut list = RawSlotList::new(5, 4).unwrap();

        for value in 1_u32..=5 {
            list.push_back(&value.to_ne_bytes()).unwrap();
            list.integrity_check();
        }

        assert!(list.is_full());
        assert_eq!(
            list.push_back(&6_u32.to_ne_bytes()).unwrap_err(),
            Error::PoolExhausted { capacity: 5 }
        );
        list.integrity_check();

        let mut element = [0_u8; 4];

        list.pop_front(&mut element).unwrap();
        assert_eq!(u32::from_ne_bytes(element), 1);

        list.pop_back(&mut element).unwrap();
        assert_eq!(u32::from_ne_bytes(element), 5);

        assert_eq!(list.len(), 3);
        list.integrity_check();
    }

    #[test]
    fn pop_from_empty_fails() {
        let mut list = RawSlotList::new(2, 1).unwrap();
        let mut element = [0_u8; 1];

        assert_eq!(list.pop_front(&mut element).unwrap_err(), Error::Empty);
        assert_eq!(list.pop_back(&mut element).unwrap_err(), Error::Empty);
    }

    #[test]
    fn pop_with_wrong_output_size_leaves_list_intact() {
        let mut list = list_of(2, &[1]);
        let mut element = [0_u8; 2];

        assert!(matches!(
            list.pop_front(&mut element),
            Err(Error::ElementSize { .. })
        ));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn push_front_prepends() {
        let mut list = list_of(4, &[2, 3]);
        list.push_front(&[1]).unwrap();

        assert_eq!(contents(&list), [1, 2, 3]);
        list.integrity_check();
    }

    #[test]
    fn insert_before_position() {
        let mut list = list_of(5, &[1, 3]);
        let three = list.at(1).unwrap();

        let two = list.insert(Some(three), &[2]).unwrap();
        let zero = list.insert(list.begin(), &[0]).unwrap();

        assert_eq!(contents(&list), [0, 1, 2, 3]);
        assert_eq!(list.begin(), Some(zero));
        assert_eq!(list.next(two), Some(three));
        list.integrity_check();
    }

    #[test]
    fn insert_with_wrong_element_size_fails() {
        let mut list = RawSlotList::new(2, 4).unwrap();

        assert_eq!(
            list.push_back(&[1, 2]).unwrap_err(),
            Error::ElementSize {
                expected: 4,
                actual: 2
            }
        );
        assert!(list.is_empty());
    }

    #[test]
    fn erase_reuses_slot() {
        let mut list = list_of(3, &[1, 2, 3]);
        let middle = list.at(1).unwrap();

        list.erase(middle).unwrap();
        assert_eq!(contents(&list), [1, 3]);
        list.integrity_check();

        // The erased key is now stale.
        assert_eq!(
            list.erase(middle).unwrap_err(),
            Error::InvalidKey {
                index: middle.slot_index()
            }
        );

        // LIFO reuse hands the same slot out again.
        let reused = list.push_back(&[4]).unwrap();
        assert_eq!(reused, middle);
        assert_eq!(contents(&list), [1, 3, 4]);
    }

    #[test]
    fn replace_overwrites_in_place() {
        let mut list = list_of(3, &[1, 2, 3]);
        let key = list.at(-2).unwrap();

        list.replace(key, &[9]).unwrap();

        assert_eq!(contents(&list), [1, 9, 3]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn navigation() {
        let list = list_of(4, &[1, 2, 3]);

        let first = list.begin().unwrap();
        let last = list.end().unwrap();

        assert_eq!(list.front(), Some(&[1_u8][..]));
        assert_eq!(list.back(), Some(&[3_u8][..]));
        assert_eq!(list.prev(first), None);
        assert_eq!(list.next(last), None);
        assert_eq!(list.next(list.next(first).unwrap()), Some(last));
        assert_eq!(list.prev(last).and_then(|key| list.prev(key)), Some(first));
    }

    #[test]
    fn at_handles_both_directions_and_bounds() {
        let list = list_of(8, &[10, 20, 30]);

        assert_eq!(list.get(0), Some(&[10_u8][..]));
        assert_eq!(list.get(2), Some(&[30_u8][..]));
        assert_eq!(list.get(3), None);
        assert_eq!(list.get(-1), Some(&[30_u8][..]));
        assert_eq!(list.get(-3), Some(&[10_u8][..]));
        assert_eq!(list.get(-4), None);
        assert_eq!(list.get(isize::MIN), None);
        assert_eq!(list.get(isize::MAX), None);

        let empty = RawSlotList::new(2, 1).unwrap();
        assert_eq!(empty.at(0), None);
        assert_eq!(empty.at(-1), None);
    }

    #[test]
    fn index_of_finds_ordinal() {
        let mut list = list_of(4, &[1, 2, 3]);
        let last = list.end().unwrap();

        assert_eq!(list.index_of(last), Some(2));

        list.erase(last).unwrap();
        assert_eq!(list.index_of(last), None);

        // Slot 3 was never handed out.
        assert_eq!(list.index_of(SlotKey::new(3)), None);
        // Out of range of the pool entirely.
        assert_eq!(list.index_of(SlotKey::new(u16::MAX)), None);
    }

    #[test]
    fn clear_returns_all_slots() {
        let mut list = list_of(4, &[1, 2, 3, 4]);

        list.clear();

        assert!(list.is_empty());
        assert_eq!(list.begin(), None);
        assert_eq!(list.end(), None);
        list.integrity_check();

        for value in 0..4 {
            list.push_back(&[value]).unwrap();
        }
        assert!(list.is_full());
    }

    #[test]
    fn reverse_keeps_keys_valid() {
        let mut list = list_of(5, &[1, 2, 3, 4]);
        let two = list.at(1).unwrap();

        list.reverse();

        assert_eq!(contents(&list), [4, 3, 2, 1]);
        assert_eq!(list.get_element(two), Some(&[2_u8][..]));
        assert_eq!(list.index_of(two), Some(2));
        list.integrity_check();

        let mut single = list_of(1, &[7]);
        single.reverse();
        assert_eq!(contents(&single), [7]);
        single.integrity_check();
    }

    #[test]
    fn swap_exchanges_everything() {
        let mut a = list_of(3, &[1, 2]);
        let mut b = RawSlotList::new(6, 1).unwrap();
        b.push_back(&[9]).unwrap();

        let key_in_a = a.begin().unwrap();

        a.swap(&mut b);

        assert_eq!(contents(&a), [9]);
        assert_eq!(a.capacity(), 6);
        assert_eq!(contents(&b), [1, 2]);
        assert_eq!(b.capacity(), 3);
        assert_eq!(b.get_element(key_in_a), Some(&[1_u8][..]));
        a.integrity_check();
        b.integrity_check();
    }

    #[test]
    fn remove_if_even() {
        let mut list = list_of(8, &[1, 2, 3, 2, 4, 2, 5]);

        let removed = list.remove_if(|element| element[0] % 2 == 0);

        assert_eq!(removed, 4);
        assert_eq!(contents(&list), [1, 3, 5]);
        list.integrity_check();
    }

    #[test]
    fn remove_by_value() {
        let mut list = list_of(8, &[2, 1, 2, 2]);

        assert_eq!(list.remove(&[2]).unwrap(), 3);
        assert_eq!(list.remove(&[7]).unwrap(), 0);
        assert!(matches!(list.remove(&[1, 1]), Err(Error::ElementSize { .. })));
        assert_eq!(contents(&list), [1]);
        list.integrity_check();
    }

    #[test]
    fn unique_is_global() {
        let mut list = list_of(16, &[1, 1, 2, 2, 2, 2, 3, 4, 4, 5, 1]);

        assert_eq!(list.unique(), 6);
        assert_eq!(contents(&list), [1, 2, 3, 4, 5]);
        list.integrity_check();

        assert_eq!(list.unique(), 0);
    }

    #[test]
    fn find_resumes_after_start() {
        let list = list_of(8, &[5, 1, 5, 2, 5]);

        let first = list.find(None, &[5]).unwrap();
        let second = list.find(Some(first), &[5]).unwrap();
        let third = list.find(Some(second), &[5]).unwrap();

        assert_eq!(list.index_of(first), Some(0));
        assert_eq!(list.index_of(second), Some(2));
        assert_eq!(list.index_of(third), Some(4));
        assert_eq!(list.find(Some(third), &[5]), None);

        assert!(list.contains(&[2]));
        assert!(!list.contains(&[9]));
        assert!(!list.contains(&[2, 2]));
    }

    #[test]
    fn find_from_stale_key_is_none() {
        let mut list = list_of(4, &[1, 2]);
        let first = list.begin().unwrap();
        list.erase(first).unwrap();

        assert_eq!(list.find_if(Some(first), |_| true), None);
    }

    #[test]
    fn for_each_visits_everything_in_order() {
        let mut list = list_of(4, &[1, 2, 3]);

        let mut seen = Vec::new();
        list.for_each(|key, element| seen.push((list.index_of(key), element[0])));
        assert_eq!(seen, [(Some(0), 1), (Some(1), 2), (Some(2), 3)]);

        list.for_each_mut(|_, element| element[0] *= 10);
        assert_eq!(contents(&list), [10, 20, 30]);
    }

    #[test]
    fn iter_is_double_ended() {
        let list = list_of(4, &[1, 2, 3]);

        let reversed: Vec<u8> = list.iter().rev().map(|(_, element)| element[0]).collect();
        assert_eq!(reversed, [3, 2, 1]);
        assert_eq!(list.iter().len(), 3);
    }

    #[test]
    fn splice_single_node() {
        let mut dest = list_of(10, &[1, 2, 3]);
        let mut src = list_of(10, &[10, 20, 30, 40]);

        let twenty = src.at(1).unwrap();
        let thirty = src.at(2).unwrap();

        assert_eq!(dest.splice(None, &mut src, twenty, Some(thirty)).unwrap(), 1);

        assert_eq!(contents(&dest), [1, 2, 3, 20]);
        assert_eq!(contents(&src), [10, 30, 40]);
        dest.integrity_check();
        src.integrity_check();
    }

    #[test]
    fn splice_run_to_front_and_to_end() {
        let mut dest = list_of(10, &[1, 2]);
        let mut src = list_of(10, &[10, 20, 30, 40]);

        let ten = src.begin().unwrap();
        let thirty = src.at(2).unwrap();

        assert_eq!(
            dest.splice(dest.begin(), &mut src, ten, Some(thirty)).unwrap(),
            2
        );
        assert_eq!(contents(&dest), [10, 20, 1, 2]);
        assert_eq!(contents(&src), [30, 40]);

        let thirty = src.begin().unwrap();
        let two = dest.end().unwrap();
        assert_eq!(dest.splice(Some(two), &mut src, thirty, None).unwrap(), 2);

        assert_eq!(contents(&dest), [10, 20, 1, 30, 40, 2]);
        assert!(src.is_empty());
        dest.integrity_check();
        src.integrity_check();
    }

    #[test]
    fn splice_empty_range_is_noop() {
        let mut dest = list_of(4, &[1]);
        let mut src = list_of(4, &[2, 3]);
        let two = src.begin().unwrap();

        assert_eq!(dest.splice(None, &mut src, two, Some(two)).unwrap(), 0);
        assert_eq!(contents(&dest), [1]);
        assert_eq!(contents(&src), [2, 3]);
    }

    #[test]
    fn splice_rejects_bad_inputs_without_side_effects() {
        let mut dest = list_of(3, &[1, 2]);
        let mut src = list_of(4, &[10, 20, 30]);

        let ten = src.begin().unwrap();
        let thirty = src.end().unwrap();

        // Capacity.
        assert_eq!(
            dest.splice(None, &mut src, ten, None).unwrap_err(),
            Error::PoolExhausted { capacity: 3 }
        );

        // End precedes start.
        assert!(matches!(
            dest.splice(None, &mut src, thirty, Some(ten)),
            Err(Error::InvalidRange { .. })
        ));

        // Element size mismatch.
        let mut wide = RawSlotList::new(4, 2).unwrap();
        wide.push_back(&[1, 1]).unwrap();
        let wide_first = wide.begin().unwrap();
        assert!(matches!(
            dest.splice(None, &mut wide, wide_first, None),
            Err(Error::ElementSize { .. })
        ));

        // Stale first key.
        let mut other = list_of(4, &[5]);
        let stale = other.begin().unwrap();
        other.erase(stale).unwrap();
        assert!(matches!(
            dest.splice(None, &mut other, stale, None),
            Err(Error::InvalidKey { .. })
        ));

        assert_eq!(contents(&dest), [1, 2]);
        assert_eq!(contents(&src), [10, 20, 30]);
        dest.integrity_check();
        src.integrity_check();
    }

    #[test]
    fn merge_moves_everything() {
        let mut dest = list_of(8, &[1, 2]);
        let mut src = list_of(8, &[3, 4]);

        assert_eq!(dest.merge(&mut src).unwrap(), 2);
        assert_eq!(contents(&dest), [1, 2, 3, 4]);
        assert!(src.is_empty());

        assert_eq!(dest.merge(&mut src).unwrap_err(), Error::Empty);
    }
}
