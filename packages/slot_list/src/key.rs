/// A handle to one element of a slot list.
///
/// Keys are returned by insertion and navigation methods and are accepted by every method that
/// operates on a specific element. A key identifies the physical slot that holds the element, so
/// it stays valid for as long as that element remains in the list, no matter how the list is
/// reordered around it.
///
/// # Key reuse
///
/// Once the element is erased, the slot returns to the pool and may be handed out again by a
/// later insertion. A stale key is rejected while its slot is vacant but refers to the new
/// element once the slot is reused.
///
/// # Keys are not bound to a list
///
/// A key is nothing more than a slot index. Any list whose slot with that index is occupied
/// accepts the key and applies the operation to its own element in that slot. This includes keys
/// obtained from a different list and keys to elements that [`splice()`][1] moved away. Keep
/// track of which list a key came from.
///
/// This is what makes keys survive persistence: a list restored from an image holds every
/// element in the slot it had when saved, so keys taken before saving address the same elements
/// in the restored list.
///
/// # Example
///
/// ```rust
/// use slot_list::RawSlotList;
///
/// let mut list = RawSlotList::new(4, 1).unwrap();
///
/// let a = list.push_back(&[1]).unwrap();
/// let b = list.push_back(&[2]).unwrap();
///
/// assert_eq!(list.next(a), Some(b));
/// assert_eq!(list.get_element(b), Some(&[2_u8][..]));
/// ```
///
/// [1]: crate::RawSlotList::splice
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SlotKey {
    index: u16,
}

impl SlotKey {
    #[inline]
    pub(crate) fn new(index: u16) -> Self {
        Self { index }
    }

    /// The physical index of the slot within the pool. This is the index recorded for the
    /// element when the list is persisted.
    #[must_use]
    #[inline]
    pub fn slot_index(self) -> u16 {
        self.index
    }
}
