use std::cell::Cell;
use std::marker::PhantomData;

use tracing::debug;

use crate::pool::{Storage, storage_bytes};
use crate::{Error, RawSlotList, Result, SlotList, SlotPool};

/// Builder for creating an instance of [`SlotList`] or [`RawSlotList`].
///
/// Both the capacity and the element size are mandatory and must be non-zero. By default the
/// slot pool is allocated on the heap; use `.storage()` to place it in a caller-provided buffer
/// instead.
///
/// # Examples
///
/// Heap-allocated pool:
///
/// ```
/// use slot_list::SlotList;
///
/// let list = SlotList::builder()
///     .capacity(100)
///     .element_size(16)
///     .build()
///     .unwrap();
///
/// assert_eq!(list.capacity(), 100);
/// ```
///
/// Caller-provided storage:
///
/// ```
/// use slot_list::{RawSlotList, required_storage_bytes};
///
/// let mut storage = [0_u8; 64];
/// assert_eq!(required_storage_bytes(4, 8), storage.len());
///
/// let list = RawSlotList::builder()
///     .capacity(4)
///     .element_size(8)
///     .storage(&mut storage)
///     .build_raw()
///     .unwrap();
///
/// assert!(list.is_borrowed());
/// ```
///
/// # Thread safety
///
/// The builder is thread-mobile ([`Send`]) and can be safely transferred between threads,
/// allowing list configuration to happen on different threads than where the list is used.
/// However, it is not thread-safe ([`Sync`]) as it contains mutable configuration state.
#[derive(Debug)]
#[must_use]
pub struct SlotListBuilder<'a> {
    capacity: u16,
    element_size: u16,

    storage: Option<&'a mut [u8]>,

    // Prevents Sync while allowing Send - builders are thread-mobile but not thread-safe
    _not_sync: PhantomData<Cell<()>>,
}

impl SlotListBuilder<'static> {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            capacity: 0,
            element_size: 0,
            storage: None,
            _not_sync: PhantomData,
        }
    }
}

impl<'a> SlotListBuilder<'a> {
    /// Sets the number of slots in the pool, which is the maximum number of elements.
    #[inline]
    pub fn capacity(mut self, capacity: u16) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the size in bytes of every element.
    #[inline]
    pub fn element_size(mut self, element_size: u16) -> Self {
        self.element_size = element_size;
        self
    }

    /// Places the slot pool in `buffer` instead of allocating it.
    ///
    /// The buffer must be exactly [`required_storage_bytes()`][1] long for the configured
    /// capacity and element size, which is checked when building. Its contents are overwritten.
    ///
    /// [1]: crate::required_storage_bytes
    #[inline]
    pub fn storage<'b>(self, buffer: &'b mut [u8]) -> SlotListBuilder<'b> {
        SlotListBuilder {
            capacity: self.capacity,
            element_size: self.element_size,
            storage: Some(buffer),
            _not_sync: PhantomData,
        }
    }

    /// Builds a thread-safe [`SlotList`].
    ///
    /// # Errors
    ///
    /// Returns an error if the capacity or element size is zero, if a provided buffer has the
    /// wrong size or if the pool cannot be allocated.
    pub fn build(self) -> Result<SlotList<'a>> {
        self.build_raw().map(SlotList::from)
    }

    /// Builds an unsynchronized [`RawSlotList`].
    ///
    /// # Errors
    ///
    /// Returns an error if the capacity or element size is zero, if a provided buffer has the
    /// wrong size or if the pool cannot be allocated.
    pub fn build_raw(self) -> Result<RawSlotList<'a>> {
        if self.capacity == 0 {
            return Err(Error::ZeroCapacity);
        }

        if self.element_size == 0 {
            return Err(Error::ZeroElementSize);
        }

        let required = storage_bytes(self.capacity, self.element_size)
            .ok_or(Error::AllocationFailed { bytes: usize::MAX })?;

        let storage = match self.storage {
            Some(buffer) => {
                if buffer.len() != required {
                    return Err(Error::StorageSize {
                        required,
                        actual: buffer.len(),
                    });
                }

                Storage::Borrowed(buffer)
            }
            None => {
                let mut bytes = Vec::new();
                bytes
                    .try_reserve_exact(required)
                    .map_err(|_| Error::AllocationFailed { bytes: required })?;
                bytes.resize(required, 0);

                Storage::Owned(bytes.into_boxed_slice())
            }
        };

        let pool = SlotPool::new(storage, self.capacity, self.element_size);

        debug!(
            capacity = self.capacity,
            element_size = self.element_size,
            storage_bytes = required,
            borrowed = pool.is_borrowed(),
            "created slot list"
        );

        Ok(RawSlotList::from_pool(pool))
    }
}
