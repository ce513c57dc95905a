#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! This package provides [`SlotList`], a fixed-capacity doubly-linked list of opaque,
//! fixed-size byte elements that lives entirely inside a pool of slots allocated (or borrowed)
//! once at construction time.
//!
//! It is meant for hosts where allocating after startup is undesirable: the list never touches
//! the heap once built, and every insertion or removal is an O(1) relink plus a copy of the
//! element bytes.
//!
//! # Features
//!
//! - **Pre-allocated storage**: The pool is either a single heap allocation made by the
//!   constructor or a caller-provided buffer sized with [`required_storage_bytes()`].
//! - **Stable keys**: Elements are addressed by [`SlotKey`], the physical slot that holds them.
//!   Keys survive any reordering of the list.
//! - **Thread-safe and single-threaded variants**: [`SlotList`] for multi-threaded use,
//!   [`RawSlotList`] when the caller provides synchronization or needs none.
//! - **Two-list operations**: Move runs of elements between lists with
//!   [`splice()`][SlotList::splice] and [`merge()`][SlotList::merge], or exchange whole lists
//!   with [`swap()`][SlotList::swap], without risk of lock-order deadlocks.
//! - **Persistence**: [`serialize()`][SlotList::serialize] writes a flat image that
//!   [`deserialize()`][SlotList::deserialize] restores with every element back in its original
//!   slot, optionally into a list with a larger capacity.
//!
//! # Example
//!
//! ```rust
//! use slot_list::SlotList;
//!
//! let list = SlotList::new(8, 2).unwrap();
//!
//! list.push_back(&[1, 0]).unwrap();
//! let key = list.push_back(&[2, 0]).unwrap();
//! list.push_front(&[0, 0]).unwrap();
//!
//! assert_eq!(list.len(), 3);
//! assert_eq!(list.index_of(key), Some(2));
//!
//! // Save and restore into a bigger list.
//! let mut image = vec![0_u8; list.serialized_len()];
//! list.serialize(&mut image).unwrap();
//!
//! let restored = SlotList::new(16, 2).unwrap();
//! restored.deserialize(&image).unwrap();
//!
//! // The key refers to the same element in the restored list.
//! let mut element = [0_u8; 2];
//! restored.get_element(key, &mut element).unwrap();
//! assert_eq!(element, [2, 0]);
//! ```

mod builder;
mod error;
mod iter;
mod key;
mod list;
mod persist;
mod pool;
mod raw;

pub use builder::*;
pub use error::*;
pub use iter::*;
pub use key::*;
pub use list::*;
pub use persist::*;
pub use pool::required_storage_bytes;
pub(crate) use pool::SlotPool;
pub use raw::*;
