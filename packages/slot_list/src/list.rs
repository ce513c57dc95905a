use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::{Error, RawSlotList, Result, SlotKey, SlotListBuilder};

/// Source of the process-wide identity of every [`SlotList`], used to order lock acquisition in
/// operations that involve two lists.
static NEXT_LIST_ID: AtomicU64 = AtomicU64::new(0);

/// A thread-safe wrapper around [`RawSlotList`].
///
/// Every method acquires the list's lock once and performs the whole operation under it. Element
/// bytes are copied out rather than borrowed, because a borrow could not outlive the lock. To
/// borrow elements or to perform several operations atomically, hold the guard returned by
/// [`lock()`][Self::lock].
///
/// The lock is not reentrant. Callbacks passed to [`remove_if()`][Self::remove_if],
/// [`find_if()`][Self::find_if] and [`for_each()`][Self::for_each] run while the lock is held and
/// must not call back into the same list.
///
/// # Thread Safety
///
/// This type is thread-safe and can be shared across threads by reference or in an `Arc`.
/// Operations that involve two lists ([`swap()`][Self::swap], [`splice()`][Self::splice] and
/// [`merge()`][Self::merge]) always lock the two lists in the same global order, so concurrent
/// mirror-image calls cannot deadlock.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::thread;
///
/// use slot_list::SlotList;
///
/// let list = Arc::new(SlotList::new(64, 8).unwrap());
///
/// let handles: Vec<_> = (0_u64..4)
///     .map(|worker| {
///         let list = Arc::clone(&list);
///         thread::spawn(move || {
///             list.push_back(&worker.to_ne_bytes()).unwrap();
///         })
///     })
///     .collect();
///
/// for handle in handles {
///     handle.join().unwrap();
/// }
///
/// assert_eq!(list.len(), 4);
/// ```
#[derive(Debug)]
pub struct SlotList<'a> {
    id: u64,

    inner: Mutex<RawSlotList<'a>>,
}

impl<'a> From<RawSlotList<'a>> for SlotList<'a> {
    /// Wraps an existing unsynchronized list, making it thread-safe.
    fn from(list: RawSlotList<'a>) -> Self {
        Self {
            id: NEXT_LIST_ID.fetch_add(1, Ordering::Relaxed),
            inner: Mutex::new(list),
        }
    }
}

impl SlotList<'static> {
    /// Creates a list with a heap-allocated pool of `capacity` slots, each holding an element of
    /// `element_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if either argument is zero or if the pool cannot be allocated.
    pub fn new(capacity: u16, element_size: u16) -> Result<Self> {
        Self::builder()
            .capacity(capacity)
            .element_size(element_size)
            .build()
    }

    /// Starts building a new [`SlotList`].
    pub fn builder() -> SlotListBuilder<'static> {
        SlotListBuilder::new()
    }
}

impl<'a> SlotList<'a> {
    /// Creates a list whose pool lives in a caller-provided buffer of exactly
    /// [`required_storage_bytes(capacity, element_size)`][1] bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension is zero or if the buffer has the wrong size.
    ///
    /// [1]: crate::required_storage_bytes
    pub fn from_buffer(buffer: &'a mut [u8], capacity: u16, element_size: u16) -> Result<Self> {
        RawSlotList::from_buffer(buffer, capacity, element_size).map(Self::from)
    }

    /// Acquires the lock and returns the underlying unsynchronized list.
    ///
    /// The lock is held until the guard is dropped. Do not call other methods of this
    /// [`SlotList`] while holding the guard; they would deadlock.
    ///
    /// # Example
    ///
    /// ```rust
    /// use slot_list::SlotList;
    ///
    /// let list = SlotList::new(8, 1).unwrap();
    ///
    /// {
    ///     let mut raw = list.lock();
    ///     let key = raw.push_back(&[1]).unwrap();
    ///     raw.insert(Some(key), &[0]).unwrap();
    ///     assert_eq!(raw.front(), Some(&[0_u8][..]));
    /// }
    ///
    /// assert_eq!(list.len(), 2);
    /// ```
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, RawSlotList<'a>> {
        self.inner.lock()
    }

    /// Consumes the wrapper and returns the underlying unsynchronized list.
    #[must_use]
    pub fn into_raw(self) -> RawSlotList<'a> {
        self.inner.into_inner()
    }

    /// The number of elements in the list.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the list contains no elements.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Whether every slot of the pool is in use.
    #[must_use]
    #[inline]
    pub fn is_full(&self) -> bool {
        self.inner.lock().is_full()
    }

    /// The number of slots in the pool, i.e. the maximum number of elements.
    #[must_use]
    #[inline]
    pub fn capacity(&self) -> u16 {
        self.inner.lock().capacity()
    }

    /// Same as [`capacity()`][Self::capacity].
    #[must_use]
    #[inline]
    pub fn max_size(&self) -> u16 {
        self.inner.lock().max_size()
    }

    /// The size of every element, in bytes.
    #[must_use]
    #[inline]
    pub fn element_size(&self) -> u16 {
        self.inner.lock().element_size()
    }

    /// Whether the pool lives in a caller-provided buffer.
    #[must_use]
    #[inline]
    pub fn is_borrowed(&self) -> bool {
        self.inner.lock().is_borrowed()
    }

    /// Copies the first element into `element`.
    ///
    /// # Errors
    ///
    /// Returns an error if `element` has the wrong length or if the list is empty.
    pub fn front(&self, element: &mut [u8]) -> Result<()> {
        let list = self.inner.lock();
        list.check_element(element)?;

        element.copy_from_slice(list.front().ok_or(Error::Empty)?);
        Ok(())
    }

    /// Copies the last element into `element`.
    ///
    /// # Errors
    ///
    /// Returns an error if `element` has the wrong length or if the list is empty.
    pub fn back(&self, element: &mut [u8]) -> Result<()> {
        let list = self.inner.lock();
        list.check_element(element)?;

        element.copy_from_slice(list.back().ok_or(Error::Empty)?);
        Ok(())
    }

    /// Key of the first element, if any.
    #[must_use]
    #[inline]
    pub fn begin(&self) -> Option<SlotKey> {
        self.inner.lock().begin()
    }

    /// Key of the last element, if any.
    #[must_use]
    #[inline]
    pub fn end(&self) -> Option<SlotKey> {
        self.inner.lock().end()
    }

    /// Key of the element after `key`.
    #[must_use]
    #[inline]
    pub fn next(&self, key: SlotKey) -> Option<SlotKey> {
        self.inner.lock().next(key)
    }

    /// Key of the element before `key`.
    #[must_use]
    #[inline]
    pub fn prev(&self, key: SlotKey) -> Option<SlotKey> {
        self.inner.lock().prev(key)
    }

    /// Key of the element at a position; see [`RawSlotList::at()`].
    #[must_use]
    #[inline]
    pub fn at(&self, position: isize) -> Option<SlotKey> {
        self.inner.lock().at(position)
    }

    /// Copies the element at a position into `element`. Returns `false` if the position is
    /// outside the list.
    ///
    /// # Errors
    ///
    /// Returns an error if `element` has the wrong length.
    pub fn get(&self, position: isize, element: &mut [u8]) -> Result<bool> {
        let list = self.inner.lock();
        list.check_element(element)?;

        match list.get(position) {
            Some(found) => {
                element.copy_from_slice(found);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Copies the element identified by `key` into `element`.
    ///
    /// # Errors
    ///
    /// Returns an error if `element` has the wrong length or if `key` is not an element of this
    /// list.
    pub fn get_element(&self, key: SlotKey, element: &mut [u8]) -> Result<()> {
        let list = self.inner.lock();
        list.check_element(element)?;

        let index = list.key_index(key)?;
        element.copy_from_slice(list.pool.data(index));
        Ok(())
    }

    /// The position of `key` counted from the front.
    #[must_use]
    #[inline]
    pub fn index_of(&self, key: SlotKey) -> Option<usize> {
        self.inner.lock().index_of(key)
    }

    /// Inserts a copy of `element` before `position`, or at the back if `position` is `None`.
    ///
    /// # Errors
    ///
    /// See [`RawSlotList::insert()`].
    #[inline]
    pub fn insert(&self, position: Option<SlotKey>, element: &[u8]) -> Result<SlotKey> {
        self.inner.lock().insert(position, element)
    }

    /// Removes the element identified by `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is not an element of this list.
    #[inline]
    pub fn erase(&self, key: SlotKey) -> Result<()> {
        self.inner.lock().erase(key)
    }

    /// Overwrites the element identified by `key` in place.
    ///
    /// # Errors
    ///
    /// See [`RawSlotList::replace()`].
    #[inline]
    pub fn replace(&self, key: SlotKey, element: &[u8]) -> Result<()> {
        self.inner.lock().replace(key, element)
    }

    /// Inserts a copy of `element` at the front.
    ///
    /// # Errors
    ///
    /// See [`RawSlotList::push_front()`].
    #[inline]
    pub fn push_front(&self, element: &[u8]) -> Result<SlotKey> {
        self.inner.lock().push_front(element)
    }

    /// Inserts a copy of `element` at the back.
    ///
    /// # Errors
    ///
    /// See [`RawSlotList::push_back()`].
    #[inline]
    pub fn push_back(&self, element: &[u8]) -> Result<SlotKey> {
        self.inner.lock().push_back(element)
    }

    /// Removes the first element, copying it into `element`.
    ///
    /// # Errors
    ///
    /// See [`RawSlotList::pop_front()`].
    #[inline]
    pub fn pop_front(&self, element: &mut [u8]) -> Result<()> {
        self.inner.lock().pop_front(element)
    }

    /// Removes the last element, copying it into `element`.
    ///
    /// # Errors
    ///
    /// See [`RawSlotList::pop_back()`].
    #[inline]
    pub fn pop_back(&self, element: &mut [u8]) -> Result<()> {
        self.inner.lock().pop_back(element)
    }

    /// Removes every element.
    #[inline]
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Reverses the order of the elements in place.
    #[inline]
    pub fn reverse(&self) {
        self.inner.lock().reverse();
    }

    /// Removes every element whose bytes equal `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` has the wrong length.
    #[inline]
    pub fn remove(&self, value: &[u8]) -> Result<usize> {
        self.inner.lock().remove(value)
    }

    /// Removes every element for which `predicate` returns `true`. The predicate runs under the
    /// lock.
    #[inline]
    pub fn remove_if<F>(&self, predicate: F) -> usize
    where
        F: FnMut(&[u8]) -> bool,
    {
        self.inner.lock().remove_if(predicate)
    }

    /// Removes every element equal to an earlier one; see [`RawSlotList::unique()`].
    #[inline]
    pub fn unique(&self) -> usize {
        self.inner.lock().unique()
    }

    /// Finds the first element after `start` whose bytes equal `value`.
    #[must_use]
    #[inline]
    pub fn find(&self, start: Option<SlotKey>, value: &[u8]) -> Option<SlotKey> {
        self.inner.lock().find(start, value)
    }

    /// Finds the first element after `start` matching `predicate`. The predicate runs under the
    /// lock.
    #[inline]
    pub fn find_if<F>(&self, start: Option<SlotKey>, predicate: F) -> Option<SlotKey>
    where
        F: FnMut(&[u8]) -> bool,
    {
        self.inner.lock().find_if(start, predicate)
    }

    /// Whether any element's bytes equal `value`.
    #[must_use]
    #[inline]
    pub fn contains(&self, value: &[u8]) -> bool {
        self.inner.lock().contains(value)
    }

    /// Calls `callback` for every element, front to back, under the lock.
    #[inline]
    pub fn for_each<F>(&self, callback: F)
    where
        F: FnMut(SlotKey, &[u8]),
    {
        self.inner.lock().for_each(callback);
    }

    /// Calls `callback` for every element, front to back, under the lock, allowing the element
    /// bytes to be modified in place.
    #[inline]
    pub fn for_each_mut<F>(&self, callback: F)
    where
        F: FnMut(SlotKey, &mut [u8]),
    {
        self.inner.lock().for_each_mut(callback);
    }

    /// Exchanges the contents of two lists, including their pools. Swapping a list with itself
    /// does nothing.
    pub fn swap(&self, other: &Self) {
        if self.id == other.id {
            return;
        }

        let (mut first, mut second) = self.lock_pair(other);
        first.swap(&mut second);
    }

    /// Moves the elements `[first, last)` of `src` into this list before `position`, or at the
    /// back if `position` is `None`. Returns the number of elements moved.
    ///
    /// The moved elements are copied into newly acquired slots of this list, so keys to them are
    /// invalidated. Such a key may still be accepted by either list if its slot index happens to
    /// be occupied there, in which case it refers to an unrelated element. Look the elements up
    /// again, for example with [`find()`][Self::find], after splicing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SameList`] if `src` is this list and otherwise fails like
    /// [`RawSlotList::splice()`].
    pub fn splice(
        &self,
        position: Option<SlotKey>,
        src: &SlotList<'_>,
        first: SlotKey,
        last: Option<SlotKey>,
    ) -> Result<usize> {
        if self.id == src.id {
            return Err(Error::SameList);
        }

        let (mut dest, mut src) = self.lock_pair(src);
        dest.splice(position, &mut src, first, last)
    }

    /// Moves every element of `src` to the back of this list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SameList`] if `src` is this list and otherwise fails like
    /// [`RawSlotList::merge()`].
    pub fn merge(&self, src: &SlotList<'_>) -> Result<usize> {
        if self.id == src.id {
            return Err(Error::SameList);
        }

        let (mut dest, mut src) = self.lock_pair(src);
        dest.merge(&mut src)
    }

    /// Number of bytes [`serialize()`][Self::serialize] writes for the current contents.
    ///
    /// Another thread may change the list between this call and a later `serialize()`. Hold the
    /// guard from [`lock()`][Self::lock] across both calls if that matters.
    #[must_use]
    #[inline]
    pub fn serialized_len(&self) -> usize {
        self.inner.lock().serialized_len()
    }

    /// Writes an image of the list into `buffer`; see [`RawSlotList::serialize()`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferTooSmall`] if `buffer` cannot hold the image.
    #[inline]
    pub fn serialize(&self, buffer: &mut [u8]) -> Result<usize> {
        self.inner.lock().serialize(buffer)
    }

    /// Replaces the contents of the list with an image; see [`RawSlotList::deserialize()`].
    ///
    /// # Errors
    ///
    /// Returns one of the `Error::Image*` variants if the image is incompatible or corrupt, in
    /// which case the list is left empty.
    #[inline]
    pub fn deserialize(&self, image: &[u8]) -> Result<()> {
        self.inner.lock().deserialize(image)
    }

    /// Locks `self` and `other` in ascending id order and returns the guards in argument order.
    fn lock_pair<'s, 'o, 'b>(
        &'s self,
        other: &'o SlotList<'b>,
    ) -> (MutexGuard<'s, RawSlotList<'a>>, MutexGuard<'o, RawSlotList<'b>>) {
        debug_assert_ne!(self.id, other.id, "caller rejects self-pairs");

        if self.id < other.id {
            let mine = self.inner.lock();
            let theirs = other.inner.lock();
            (mine, theirs)
        } else {
            let theirs = other.inner.lock();
            let mine = self.inner.lock();
            (mine, theirs)
        }
    }
}
