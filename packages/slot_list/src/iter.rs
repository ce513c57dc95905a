use std::iter::FusedIterator;

use crate::{SlotKey, SlotPool};

/// Iterator over the elements of a slot list, yielding each element's key and bytes.
///
/// Created by [`RawSlotList::iter()`][1]. Iterates front to back, or back to front when reversed.
///
/// [1]: crate::RawSlotList::iter
#[derive(Debug)]
pub struct Iter<'l> {
    pool: &'l SlotPool<'l>,

    front: Option<u16>,
    back: Option<u16>,

    remaining: usize,
}

impl<'l> Iter<'l> {
    pub(crate) fn new(
        pool: &'l SlotPool<'l>,
        head: Option<u16>,
        tail: Option<u16>,
        len: usize,
    ) -> Self {
        Self {
            pool,
            front: head,
            back: tail,
            remaining: len,
        }
    }
}

impl<'l> Iterator for Iter<'l> {
    type Item = (SlotKey, &'l [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let index = self.front?;

        self.front = self.pool.next(index);
        self.remaining = self
            .remaining
            .checked_sub(1)
            .expect("guarded by zero check above");

        Some((SlotKey::new(index), self.pool.data(index)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let index = self.back?;

        self.back = self.pool.prev(index);
        self.remaining = self
            .remaining
            .checked_sub(1)
            .expect("guarded by zero check above");

        Some((SlotKey::new(index), self.pool.data(index)))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl FusedIterator for Iter<'_> {}
