use std::fmt;
use std::ops::Range;

/// Every slot starts with a header of two native-endian `u32` link fields (next, prev),
/// followed by the element bytes.
const LINK_BYTES: usize = 4;
const NEXT_OFFSET: usize = 0;
const PREV_OFFSET: usize = LINK_BYTES;
pub(crate) const SLOT_HEADER_BYTES: usize = 2 * LINK_BYTES;

/// Link value meaning "no slot".
const NIL: u32 = u32::MAX;

/// Stored in the prev field of every slot that sits on the free list. Active slots never carry
/// this value because indices are limited to `u16`.
const VACANT: u32 = u32::MAX - 1;

/// Returns the exact number of bytes of storage a slot pool of the given shape occupies.
///
/// Use this to size a buffer for [`SlotList::from_buffer()`][1] or
/// [`SlotListBuilder::storage()`][2].
///
/// # Panics
///
/// Panics if the size does not fit in `usize`, which can only happen on 32-bit targets with
/// both dimensions near `u16::MAX`.
///
/// # Example
///
/// ```
/// use slot_list::{SlotList, required_storage_bytes};
///
/// let mut storage = vec![0_u8; required_storage_bytes(16, 4)];
/// let list = SlotList::from_buffer(&mut storage, 16, 4).unwrap();
/// assert!(list.is_borrowed());
/// ```
///
/// [1]: crate::SlotList::from_buffer
/// [2]: crate::SlotListBuilder::storage
#[must_use]
pub fn required_storage_bytes(capacity: u16, element_size: u16) -> usize {
    storage_bytes(capacity, element_size).expect("slot pool size must fit in usize")
}

pub(crate) fn storage_bytes(capacity: u16, element_size: u16) -> Option<usize> {
    SLOT_HEADER_BYTES
        .checked_add(usize::from(element_size))?
        .checked_mul(usize::from(capacity))
}

/// Backing bytes of a slot pool. The pool either owns a heap allocation or borrows a buffer
/// from the caller, who then remains responsible for its lifetime.
pub(crate) enum Storage<'a> {
    Owned(Box<[u8]>),
    Borrowed(&'a mut [u8]),
}

impl Storage<'_> {
    fn bytes(&self) -> &[u8] {
        match self {
            Self::Owned(bytes) => bytes,
            Self::Borrowed(bytes) => bytes,
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            Self::Owned(bytes) => bytes,
            Self::Borrowed(bytes) => bytes,
        }
    }
}

/// A fixed-capacity array of uniform slots plus the intrusive free list threaded through the
/// vacant ones.
///
/// The pool knows nothing about the active chain other than which slots belong to it. Callers
/// are responsible for only passing indices below `capacity`; out of bounds indices panic.
pub(crate) struct SlotPool<'a> {
    storage: Storage<'a>,

    capacity: u16,
    element_size: u16,

    /// Size of one slot in bytes (header plus element).
    stride: usize,

    /// Top of the stack of vacant slots. `None` if every slot is in use.
    free_head: Option<u16>,
}

impl<'a> SlotPool<'a> {
    /// Lays out a new pool on top of `storage`, with every slot vacant.
    ///
    /// # Panics
    ///
    /// Panics if the storage is not exactly the required size. The builder validates this.
    pub(crate) fn new(storage: Storage<'a>, capacity: u16, element_size: u16) -> Self {
        let stride = SLOT_HEADER_BYTES
            .checked_add(usize::from(element_size))
            .expect("u16 element size plus a small header cannot overflow usize");

        assert_eq!(
            Some(storage.bytes().len()),
            storage_bytes(capacity, element_size),
            "slot pool storage size was not validated before use"
        );

        let mut pool = Self {
            storage,
            capacity,
            element_size,
            stride,
            free_head: None,
        };

        pool.reset();
        pool
    }

    pub(crate) fn capacity(&self) -> u16 {
        self.capacity
    }

    pub(crate) fn element_size(&self) -> u16 {
        self.element_size
    }

    pub(crate) fn is_borrowed(&self) -> bool {
        matches!(self.storage, Storage::Borrowed(_))
    }

    /// Marks every slot vacant and threads the free list through them in ascending index order,
    /// so a fresh pool hands out slot 0 first.
    pub(crate) fn reset(&mut self) {
        self.disband();
        self.rebuild_free_list();
    }

    /// Pops the top of the free list. The returned slot has cleared links and zeroed data.
    pub(crate) fn acquire(&mut self) -> Option<u16> {
        let index = self.free_head?;

        self.free_head = decode(self.read_link(index, NEXT_OFFSET));

        self.write_link(index, NEXT_OFFSET, NIL);
        self.write_link(index, PREV_OFFSET, NIL);
        self.data_mut(index).fill(0);

        Some(index)
    }

    /// Pushes a slot onto the free list. The element bytes are left as they are.
    pub(crate) fn release(&mut self, index: u16) {
        debug_assert!(
            self.is_occupied(index),
            "released slot {index} was already vacant"
        );

        self.write_link(index, NEXT_OFFSET, encode(self.free_head));
        self.write_link(index, PREV_OFFSET, VACANT);
        self.free_head = Some(index);
    }

    /// Marks every slot as an unclaimed candidate without threading a free list through them.
    /// Follow up with [`claim()`][Self::claim] calls and then
    /// [`rebuild_free_list()`][Self::rebuild_free_list].
    pub(crate) fn disband(&mut self) {
        for index in 0..self.capacity {
            self.write_link(index, NEXT_OFFSET, NIL);
            self.write_link(index, PREV_OFFSET, VACANT);
        }

        self.free_head = None;
    }

    /// Claims one specific slot of a disbanded pool. Returns `false` if the slot is already
    /// claimed.
    pub(crate) fn claim(&mut self, index: u16) -> bool {
        if self.is_occupied(index) {
            return false;
        }

        self.write_link(index, NEXT_OFFSET, NIL);
        self.write_link(index, PREV_OFFSET, NIL);
        true
    }

    /// Pushes every vacant slot onto the free list, lowest index ending up on top.
    pub(crate) fn rebuild_free_list(&mut self) {
        self.free_head = None;

        for index in (0..self.capacity).rev() {
            if !self.is_occupied(index) {
                self.write_link(index, NEXT_OFFSET, encode(self.free_head));
                self.free_head = Some(index);
            }
        }
    }

    /// Whether the slot is part of the active chain. Out of range indices are never occupied.
    pub(crate) fn is_occupied(&self, index: u16) -> bool {
        index < self.capacity && self.read_link(index, PREV_OFFSET) != VACANT
    }

    pub(crate) fn next(&self, index: u16) -> Option<u16> {
        decode(self.read_link(index, NEXT_OFFSET))
    }

    pub(crate) fn prev(&self, index: u16) -> Option<u16> {
        decode(self.read_link(index, PREV_OFFSET))
    }

    pub(crate) fn set_next(&mut self, index: u16, next: Option<u16>) {
        self.write_link(index, NEXT_OFFSET, encode(next));
    }

    pub(crate) fn set_prev(&mut self, index: u16, prev: Option<u16>) {
        self.write_link(index, PREV_OFFSET, encode(prev));
    }

    pub(crate) fn data(&self, index: u16) -> &[u8] {
        let range = self.data_range(index);

        self.storage
            .bytes()
            .get(range)
            .expect("slot index out of bounds of slot pool")
    }

    pub(crate) fn data_mut(&mut self, index: u16) -> &mut [u8] {
        let range = self.data_range(index);

        self.storage
            .bytes_mut()
            .get_mut(range)
            .expect("slot index out of bounds of slot pool")
    }

    /// Number of slots on the free list, found by walking it.
    #[cfg(any(test, debug_assertions))]
    pub(crate) fn free_len(&self) -> usize {
        let mut count: usize = 0;
        let mut current = self.free_head;

        while let Some(index) = current {
            count = count
                .checked_add(1)
                .expect("free list cannot be longer than u16::MAX slots");

            assert!(
                count <= usize::from(self.capacity),
                "free list of slot pool contains a cycle"
            );

            current = decode(self.read_link(index, NEXT_OFFSET));
        }

        count
    }

    fn slot_start(&self, index: u16) -> usize {
        assert!(
            index < self.capacity,
            "slot {index} out of bounds of slot pool with capacity {}",
            self.capacity
        );

        usize::from(index)
            .checked_mul(self.stride)
            .expect("guarded by storage size validation in ctor")
    }

    fn data_range(&self, index: u16) -> Range<usize> {
        let start = self
            .slot_start(index)
            .checked_add(SLOT_HEADER_BYTES)
            .expect("guarded by storage size validation in ctor");
        let end = start
            .checked_add(usize::from(self.element_size))
            .expect("guarded by storage size validation in ctor");

        start..end
    }

    fn read_link(&self, index: u16, field_offset: usize) -> u32 {
        let start = self
            .slot_start(index)
            .checked_add(field_offset)
            .expect("guarded by storage size validation in ctor");
        let end = start
            .checked_add(LINK_BYTES)
            .expect("guarded by storage size validation in ctor");

        let bytes: [u8; LINK_BYTES] = self
            .storage
            .bytes()
            .get(start..end)
            .expect("slot index out of bounds of slot pool")
            .try_into()
            .expect("range is exactly one link field long");

        u32::from_ne_bytes(bytes)
    }

    fn write_link(&mut self, index: u16, field_offset: usize, value: u32) {
        let start = self
            .slot_start(index)
            .checked_add(field_offset)
            .expect("guarded by storage size validation in ctor");
        let end = start
            .checked_add(LINK_BYTES)
            .expect("guarded by storage size validation in ctor");

        self.storage
            .bytes_mut()
            .get_mut(start..end)
            .expect("slot index out of bounds of slot pool")
            .copy_from_slice(&value.to_ne_bytes());
    }
}

impl fmt::Debug for SlotPool<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotPool")
            .field("capacity", &self.capacity)
            .field("element_size", &self.element_size)
            .field("borrowed", &self.is_borrowed())
            .field("free_head", &self.free_head)
            .finish_non_exhaustive()
    }
}

fn encode(link: Option<u16>) -> u32 {
    link.map_or(NIL, u32::from)
}

fn decode(raw: u32) -> Option<u16> {
    // VACANT also decodes to "no link"; it is only ever found in slots on the free list.
    u16::try_from(raw).ok()
}
