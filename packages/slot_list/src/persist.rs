//! Flat binary images of a slot list.
//!
//! An image records the logical order of the elements together with the physical slot that holds
//! each one, so a restored list has the same keys as the list that was saved. All fields are
//! fixed-width and in host byte order:
//!
//! ```text
//! header:   size: u16, capacity: u16, element_size: u16
//! records:  size times { slot_index: u16, element: [u8; element_size] }
//! ```
//!
//! Records appear in front to back order.

use tracing::{debug, trace};

use crate::{Error, RawSlotList, Result};

const FIELD_BYTES: usize = size_of::<u16>();
const HEADER_BYTES: usize = 3 * FIELD_BYTES;

/// The header at the start of every persisted slot list image.
///
/// Reading the header without restoring the image is useful for sizing the destination list,
/// which must have the recorded element size and at least the recorded capacity.
///
/// # Example
///
/// ```rust
/// use slot_list::{ImageHeader, RawSlotList};
///
/// let mut list = RawSlotList::new(8, 2).unwrap();
/// list.push_back(&[1, 2]).unwrap();
///
/// let mut image = vec![0_u8; list.serialized_len()];
/// list.serialize(&mut image).unwrap();
///
/// let header = ImageHeader::read(&image).unwrap();
/// assert_eq!(header.size(), 1);
/// assert_eq!(header.capacity(), 8);
/// assert_eq!(header.element_size(), 2);
/// assert_eq!(header.image_len(), image.len());
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ImageHeader {
    size: u16,
    capacity: u16,
    element_size: u16,
}

impl ImageHeader {
    /// Reads the header from the start of an image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageTruncated`] if the image is too short to contain a header.
    pub fn read(image: &[u8]) -> Result<Self> {
        let field = |offset: usize| -> Result<u16> {
            read_u16(image, offset).ok_or(Error::ImageTruncated {
                required: HEADER_BYTES,
                actual: image.len(),
            })
        };

        Ok(Self {
            size: field(0)?,
            capacity: field(FIELD_BYTES)?,
            element_size: field(2 * FIELD_BYTES)?,
        })
    }

    /// Number of elements in the image.
    #[must_use]
    pub fn size(self) -> u16 {
        self.size
    }

    /// Capacity of the list the image was taken from.
    #[must_use]
    pub fn capacity(self) -> u16 {
        self.capacity
    }

    /// Element size of the list the image was taken from.
    #[must_use]
    pub fn element_size(self) -> u16 {
        self.element_size
    }

    /// Total length of the image described by this header, in bytes.
    #[must_use]
    pub fn image_len(self) -> usize {
        image_len(self.size, self.element_size)
    }

    fn write(self, buffer: &mut [u8]) {
        write_u16(buffer, 0, self.size);
        write_u16(buffer, FIELD_BYTES, self.capacity);
        write_u16(buffer, 2 * FIELD_BYTES, self.element_size);
    }
}

impl RawSlotList<'_> {
    /// Number of bytes [`serialize()`][Self::serialize] writes for the current contents.
    #[must_use]
    pub fn serialized_len(&self) -> usize {
        image_len(self.len, self.element_size())
    }

    /// Writes an image of the list into the start of `buffer` and returns the number of bytes
    /// written. The list itself is not modified.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferTooSmall`] if `buffer` is shorter than
    /// [`serialized_len()`][Self::serialized_len].
    pub fn serialize(&self, buffer: &mut [u8]) -> Result<usize> {
        let required = self.serialized_len();

        let Some(image) = buffer.get_mut(..required) else {
            return Err(Error::BufferTooSmall {
                required,
                actual: buffer.len(),
            });
        };

        let (header, records) = image.split_at_mut(HEADER_BYTES);

        ImageHeader {
            size: self.len,
            capacity: self.capacity(),
            element_size: self.element_size(),
        }
        .write(header);

        for ((key, element), record) in self
            .iter()
            .zip(records.chunks_exact_mut(record_len(self.element_size())))
        {
            let (slot, payload) = record.split_at_mut(FIELD_BYTES);
            write_u16(slot, 0, key.slot_index());
            payload.copy_from_slice(element);
        }

        trace!(len = self.len, bytes = required, "serialized slot list");

        Ok(required)
    }

    /// Replaces the contents of the list with those recorded in `image`, restoring every element
    /// into the same physical slot it occupied when the image was taken.
    ///
    /// The image may come from a list with a smaller capacity than this one but never a larger
    /// one, and it must have the same element size.
    ///
    /// # Errors
    ///
    /// Returns one of the `Error::Image*` variants if the image is incompatible with this list or
    /// corrupt. The list is cleared before the image is examined, so on failure it is left empty
    /// rather than partially restored.
    pub fn deserialize(&mut self, image: &[u8]) -> Result<()> {
        self.clear();

        let result = self.restore(image);

        if let Err(error) = &result {
            debug!(
                %error,
                capacity = self.capacity(),
                element_size = self.element_size(),
                image_len = image.len(),
                "rejected persisted slot list image"
            );

            self.pool.reset();
            self.head = None;
            self.tail = None;
            self.len = 0;
        } else {
            trace!(len = self.len, bytes = image.len(), "restored slot list");
        }

        #[cfg(debug_assertions)]
        self.integrity_check();

        result
    }

    fn restore(&mut self, image: &[u8]) -> Result<()> {
        let header = ImageHeader::read(image)?;

        if header.size > header.capacity {
            return Err(Error::ImageSizeExceedsCapacity {
                size: header.size,
                capacity: header.capacity,
            });
        }

        if header.element_size != self.element_size() {
            return Err(Error::ImageElementSize {
                expected: self.element_size(),
                persisted: header.element_size,
            });
        }

        if header.capacity > self.capacity() {
            return Err(Error::ImageCapacity {
                persisted: header.capacity,
                available: self.capacity(),
            });
        }

        let required = header.image_len();
        let records = image
            .get(HEADER_BYTES..required)
            .ok_or(Error::ImageTruncated {
                required,
                actual: image.len(),
            })?;

        self.pool.disband();

        for record in records.chunks_exact(record_len(header.element_size)) {
            let (slot, payload) = record.split_at(FIELD_BYTES);
            let index = read_u16(slot, 0).expect("record is longer than its slot field");

            if index >= self.capacity() {
                return Err(Error::ImageSlotOutOfRange {
                    index,
                    capacity: self.capacity(),
                });
            }

            if !self.pool.claim(index) {
                return Err(Error::ImageDuplicateSlot { index });
            }

            self.pool.data_mut(index).copy_from_slice(payload);
            self.link_before(index, None);
        }

        self.pool.rebuild_free_list();

        Ok(())
    }
}

fn record_len(element_size: u16) -> usize {
    FIELD_BYTES
        .checked_add(usize::from(element_size))
        .expect("u16 element size plus a slot field cannot overflow usize")
}

fn image_len(size: u16, element_size: u16) -> usize {
    record_len(element_size)
        .checked_mul(usize::from(size))
        .and_then(|records| records.checked_add(HEADER_BYTES))
        .expect("image of a u16-sized list cannot overflow usize")
}

fn read_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    let end = offset.checked_add(FIELD_BYTES)?;
    let field = bytes.get(offset..end)?;

    Some(u16::from_ne_bytes(field.try_into().ok()?))
}

fn write_u16(bytes: &mut [u8], offset: usize, value: u16) {
    let end = offset
        .checked_add(FIELD_BYTES)
        .expect("offsets are within a small header or record");

    bytes
        .get_mut(offset..end)
        .expect("caller sized the buffer for the whole image")
        .copy_from_slice(&value.to_ne_bytes());
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::SlotKey;

    fn image_of(list: &RawSlotList<'_>) -> Vec<u8> {
        let mut image = vec![0_u8; list.serialized_len()];
        let written = list.serialize(&mut image).unwrap();
        assert_eq!(written, image.len());
        image
    }

    fn image(size: u16, capacity: u16, element_size: u16, records: &[(u16, &[u8])]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&size.to_ne_bytes());
        bytes.extend_from_slice(&capacity.to_ne_bytes());
        bytes.extend_from_slice(&element_size.to_ne_bytes());

        for (index, payload) in records {
            bytes.extend_from_slice(&index.to_ne_bytes());
            bytes.extend_from_slice(payload);
        }

        bytes
    }

    fn entries(list: &RawSlotList<'_>) -> Vec<(u16, Vec<u8>)> {
        list.iter()
            .map(|(key, element)| (key.slot_index(), element.to_vec()))
            .collect()
    }

    #[test]
    fn layout_is_header_then_records() {
        let mut list = RawSlotList::new(4, 2).unwrap();
        list.push_back(&[1, 2]).unwrap();
        list.push_front(&[3, 4]).unwrap();

        assert_eq!(list.serialized_len(), 6 + 2 * (2 + 2));

        let expected = image(2, 4, 2, &[(1, &[3, 4]), (0, &[1, 2])]);
        assert_eq!(image_of(&list), expected);
    }

    #[test]
    fn empty_list_is_header_only() {
        let list = RawSlotList::new(3, 8).unwrap();

        assert_eq!(image_of(&list), image(0, 3, 8, &[]));
    }

    #[test]
    fn buffer_too_small() {
        let mut list = RawSlotList::new(3, 1).unwrap();
        list.push_back(&[1]).unwrap();

        let mut buffer = [0_u8; 8];
        assert_eq!(
            list.serialize(&mut buffer).unwrap_err(),
            Error::BufferTooSmall {
                required: 9,
                actual: 8
            }
        );

        // A larger buffer is fine; only the prefix is written.
        let mut buffer = [0xFF_u8; 12];
        assert_eq!(list.serialize(&mut buffer).unwrap(), 9);
        assert_eq!(buffer[9..], [0xFF; 3]);
    }

    #[test]
    fn round_trip_preserves_slots_after_churn() {
        let mut list = RawSlotList::new(6, 1).unwrap();
        for value in 0..6 {
            list.push_back(&[value]).unwrap();
        }

        list.erase(SlotKey::new(1)).unwrap();
        list.erase(SlotKey::new(4)).unwrap();
        list.reverse();
        list.push_front(&[9]).unwrap();

        let saved = image_of(&list);

        let mut restored = RawSlotList::new(6, 1).unwrap();
        restored.push_back(&[42]).unwrap();
        restored.deserialize(&saved).unwrap();

        assert_eq!(entries(&restored), entries(&list));
        restored.integrity_check();

        // The free list is rebuilt, so the pool fills up exactly.
        restored.push_back(&[7]).unwrap();
        assert!(restored.is_full());
    }

    #[test]
    fn restore_into_larger_capacity() {
        let mut small = RawSlotList::new(2, 1).unwrap();
        small.push_back(&[1]).unwrap();
        small.push_back(&[2]).unwrap();

        let mut large = RawSlotList::new(5, 1).unwrap();
        large.deserialize(&image_of(&small)).unwrap();

        assert_eq!(entries(&large), entries(&small));
        assert_eq!(large.capacity(), 5);
        large.integrity_check();

        for value in 3..6 {
            large.push_back(&[value]).unwrap();
        }
        assert!(large.is_full());
    }

    #[test]
    fn restore_into_smaller_capacity_fails_and_clears() {
        let large = RawSlotList::new(5, 1).unwrap();
        let saved = image_of(&large);

        let mut small = RawSlotList::new(2, 1).unwrap();
        small.push_back(&[1]).unwrap();

        assert_eq!(
            small.deserialize(&saved).unwrap_err(),
            Error::ImageCapacity {
                persisted: 5,
                available: 2
            }
        );
        assert!(small.is_empty());
        small.integrity_check();
    }

    #[test]
    fn validation_order() {
        let mut list = RawSlotList::new(4, 1).unwrap();

        assert_eq!(
            list.deserialize(&[0, 0, 0]).unwrap_err(),
            Error::ImageTruncated {
                required: 6,
                actual: 3
            }
        );

        // Size exceeds capacity wins over element size mismatch.
        assert_eq!(
            list.deserialize(&image(3, 2, 9, &[])).unwrap_err(),
            Error::ImageSizeExceedsCapacity {
                size: 3,
                capacity: 2
            }
        );

        // Element size mismatch wins over capacity.
        assert_eq!(
            list.deserialize(&image(0, 9, 2, &[])).unwrap_err(),
            Error::ImageElementSize {
                expected: 1,
                persisted: 2
            }
        );

        assert_eq!(
            list.deserialize(&image(2, 4, 1, &[(0, &[1])])).unwrap_err(),
            Error::ImageTruncated {
                required: 12,
                actual: 9
            }
        );
    }

    #[test]
    fn corrupt_records_leave_list_empty() {
        let mut list = RawSlotList::new(4, 1).unwrap();
        list.push_back(&[1]).unwrap();

        assert_eq!(
            list.deserialize(&image(2, 4, 1, &[(0, &[1]), (0, &[2])]))
                .unwrap_err(),
            Error::ImageDuplicateSlot { index: 0 }
        );
        assert!(list.is_empty());
        list.integrity_check();

        // Slot 8 does not exist in a pool of 8 slots.
        let mut list = RawSlotList::new(8, 1).unwrap();
        assert_eq!(
            list.deserialize(&image(1, 8, 1, &[(8, &[1])])).unwrap_err(),
            Error::ImageSlotOutOfRange {
                index: 8,
                capacity: 8
            }
        );
        assert!(list.is_empty());
        list.integrity_check();

        // The pool is fully usable afterwards.
        for value in 0..8 {
            list.push_back(&[value]).unwrap();
        }
    }

    #[test]
    fn header_can_be_read_alone() {
        let header = ImageHeader::read(&image(1, 3, 2, &[(2, &[5, 6])])).unwrap();

        assert_eq!(header.size(), 1);
        assert_eq!(header.capacity(), 3);
        assert_eq!(header.element_size(), 2);
        assert_eq!(header.image_len(), 10);

        assert!(matches!(
            ImageHeader::read(&[1]),
            Err(Error::ImageTruncated { .. })
        ));
    }
}
