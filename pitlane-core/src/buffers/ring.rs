//! Fixed-capacity overwrite buffer.
//!
//! Wrap-around arithmetic lives here and nowhere else. After `k` inserts the
//! buffer holds `min(k, N)` rows; the logical order is recovered by rotating
//! the backing storage by the write index.

use crate::error::CoreError;

#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Box<[Option<T>]>,
    /// Next slot to overwrite, always `< slots.len()`.
    write: usize,
    inserted: u64,
}

impl<T> RingBuffer<T> {
    pub fn with_capacity(capacity: usize) -> Result<Self, CoreError> {
        if capacity == 0 {
            return Err(CoreError::InvalidCapacity(capacity));
        }
        let slots = (0..capacity)
            .map(|_| None)
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Ok(Self {
            slots,
            write: 0,
            inserted: 0,
        })
    }

    /// O(1); overwrites the oldest row once full.
    #[inline]
    pub fn insert(&mut self, row: T) {
        self.slots[self.write] = Some(row);
        self.write = (self.write + 1) % self.slots.len();
        self.inserted += 1;
    }

    /// Drops all rows and zeroes the write index.
    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.write = 0;
        self.inserted = 0;
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inserted.min(self.slots.len() as u64) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inserted == 0
    }

    /// Total inserts since creation or the last reset.
    #[inline]
    pub fn inserted(&self) -> u64 {
        self.inserted
    }

    /// Rows oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let (newer, older) = self.slots.split_at(self.write);
        older.iter().chain(newer.iter()).filter_map(Option::as_ref)
    }

    pub fn latest(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        let last = (self.write + self.slots.len() - 1) % self.slots.len();
        self.slots[last].as_ref()
    }
}

impl<T: Clone> RingBuffer<T> {
    /// The `min(inserted, capacity)` most recent rows, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}
