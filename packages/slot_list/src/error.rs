use thiserror::Error;

/// Errors that can occur when creating, mutating or restoring a slot list.
///
/// Every failure leaves the list unchanged, with one exception: a failed restore from a persisted
/// image leaves the destination list empty (see [`RawSlotList::deserialize()`][1]).
///
/// [1]: crate::RawSlotList::deserialize
#[derive(Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// A list must be able to hold at least one element.
    #[error("slot list capacity must be non-zero")]
    ZeroCapacity,

    /// Elements must occupy at least one byte.
    #[error("slot list element size must be non-zero")]
    ZeroElementSize,

    /// The heap allocation for an owned slot pool could not be satisfied.
    #[error("failed to allocate {bytes} bytes of slot pool storage")]
    AllocationFailed {
        /// Size of the requested allocation.
        bytes: usize,
    },

    /// A caller-supplied storage buffer is not exactly the size the slot pool requires.
    #[error("slot pool storage must be exactly {required} bytes but {actual} bytes were provided")]
    StorageSize {
        /// Size returned by [`required_storage_bytes()`][crate::required_storage_bytes].
        required: usize,

        /// Size of the buffer that was provided.
        actual: usize,
    },

    /// An element (or an output buffer for one) does not match the element size of the list, or
    /// two lists taking part in one operation have different element sizes.
    #[error("expected an element size of {expected} bytes but got {actual} bytes")]
    ElementSize {
        /// Element size of the list being operated on.
        expected: usize,

        /// The mismatching size.
        actual: usize,
    },

    /// Every slot of the pool is already in use.
    #[error("all {capacity} slots of the pool are in use")]
    PoolExhausted {
        /// Capacity of the exhausted pool.
        capacity: u16,
    },

    /// The key does not refer to an active element of this list.
    #[error("slot {index} is not an active element of this list")]
    InvalidKey {
        /// Slot index carried by the key.
        index: u16,
    },

    /// The operation requires at least one element but the list is empty.
    #[error("the list is empty")]
    Empty,

    /// The end of a splice range is not reachable from its start.
    #[error("splice range end (slot {last}) does not follow range start (slot {first})")]
    InvalidRange {
        /// Slot index of the first element of the range.
        first: u16,

        /// Slot index of the exclusive end of the range.
        last: u16,
    },

    /// A two-list operation was given the same list as both operands.
    #[error("the source and destination of the operation are the same list")]
    SameList,

    /// A buffer is too small to hold the persisted image.
    #[error("buffer of {actual} bytes is too small, {required} bytes are required")]
    BufferTooSmall {
        /// Bytes required.
        required: usize,

        /// Bytes available.
        actual: usize,
    },

    /// A persisted image claims more elements than its own capacity.
    #[error("persisted image holds {size} elements but its capacity is only {capacity}")]
    ImageSizeExceedsCapacity {
        /// Element count recorded in the image.
        size: u16,

        /// Capacity recorded in the image.
        capacity: u16,
    },

    /// A persisted image was produced by a list with a different element size.
    #[error("persisted image has element size {persisted} but the list uses {expected}")]
    ImageElementSize {
        /// Element size of the destination list.
        expected: u16,

        /// Element size recorded in the image.
        persisted: u16,
    },

    /// A persisted image came from a list with a larger capacity than the destination.
    #[error("persisted image needs capacity {persisted} but the list only has {available}")]
    ImageCapacity {
        /// Capacity recorded in the image.
        persisted: u16,

        /// Capacity of the destination list.
        available: u16,
    },

    /// A persisted image is shorter than its header says it should be.
    #[error("persisted image is truncated: {required} bytes required, {actual} bytes available")]
    ImageTruncated {
        /// Bytes required by the header.
        required: usize,

        /// Bytes available.
        actual: usize,
    },

    /// A persisted record refers to a slot outside the destination pool.
    #[error("persisted record refers to slot {index} but the pool only has {capacity} slots")]
    ImageSlotOutOfRange {
        /// Slot index recorded in the image.
        index: u16,

        /// Capacity of the destination list.
        capacity: u16,
    },

    /// Two persisted records claim the same slot.
    #[error("persisted image claims slot {index} more than once")]
    ImageDuplicateSlot {
        /// The slot index that occurs more than once.
        index: u16,
    },
}

/// A specialized `Result` type for slot list operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn messages_carry_structured_fields() {
        let error = Error::ImageDuplicateSlot { index: 7 };
        assert_eq!(error.to_string(), "persisted image claims slot 7 more than once");

        let error = Error::StorageSize {
            required: 120,
            actual: 100,
        };
        assert!(error.to_string().contains("120"));
        assert!(error.to_string().contains("100"));
    }
}
