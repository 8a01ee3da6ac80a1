//! Ring Buffer Implementation

use crate::RingError;
use serde::{Deserialize, Serialize};

/// Default buffer capacity (slots)
pub const DEFAULT_CAPACITY: usize = 10;

/// Occupancy snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RingStats {
    pub capacity: usize,
    pub pos: usize,
    pub total_writes: usize,
    pub filled_slots: usize,
    pub fill_percent: f32,
    pub last_written: Option<usize>,
    pub occupied: usize,
}

/// Fixed-capacity ring of pre-initialized slots
///
/// Writes happen only at `pos`, which advances by one (mod capacity) per
/// commit. `total_writes` counts commits since construction or the last
/// cursor reset and drives the fill level. Writes always restart at slot 0,
/// so the slots ever written form the prefix `[0, occupied)`.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    /// Pre-allocated storage
    storage: Box<[T]>,
    /// Write cursor, always in `[0, capacity)`
    pos: usize,
    /// Commits since the last reset
    total_writes: usize,
    /// Slot of the most recent commit
    last_written: Option<usize>,
    /// High-water mark of written slots; survives `reset_cursor`
    occupied: usize,
}

impl<T: Clone + Default> RingBuffer<T> {
    /// Create a buffer with every slot set to `T::default()`
    pub fn new(capacity: usize) -> Result<Self, RingError> {
        if capacity == 0 {
            return Err(RingError::ZeroCapacity);
        }
        Ok(Self {
            storage: vec![T::default(); capacity].into_boxed_slice(),
            pos: 0,
            total_writes: 0,
            last_written: None,
            occupied: 0,
        })
    }

    /// Write `item` at the cursor and commit it
    pub fn push(&mut self, item: T) -> f32 {
        *self.reserve() = item;
        self.commit()
    }

    /// Copy of the last `count` committed slots, oldest first
    pub fn read_last(&self, count: usize) -> Vec<T> {
        self.iter_last(count).cloned().collect()
    }
}

impl<T> RingBuffer<T> {
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Current write cursor
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn total_writes(&self) -> usize {
        self.total_writes
    }

    /// Index of the most recently committed slot
    pub fn last_written_index(&self) -> Option<usize> {
        self.last_written
    }

    pub fn filled_slots(&self) -> usize {
        self.total_writes.min(self.capacity())
    }

    /// Number of slots that have ever held a committed item
    pub fn occupied(&self) -> usize {
        self.occupied
    }

    /// Percentage of slots written since the last reset (0.0 to 100.0)
    pub fn fill_percent(&self) -> f32 {
        self.filled_slots() as f32 * 100.0 / self.capacity() as f32
    }

    /// Slot at the cursor, to be filled before `commit`
    pub fn reserve(&mut self) -> &mut T {
        &mut self.storage[self.pos]
    }

    /// Advance past the reserved slot; returns the fill level this write produced
    pub fn commit(&mut self) -> f32 {
        self.last_written = Some(self.pos);
        self.occupied = self.occupied.max(self.pos + 1);
        self.pos = (self.pos + 1) % self.capacity();
        self.total_writes += 1;
        self.fill_percent()
    }

    /// Restart writing at slot 0; stored slots stay readable
    pub fn reset_cursor(&mut self) {
        self.pos = 0;
        self.total_writes = 0;
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.storage.get(index)
    }

    /// Most recently committed slot
    pub fn last(&self) -> Option<&T> {
        self.last_written.map(|i| &self.storage[i])
    }

    /// Up to `count` occupied slots ending at the last commit, oldest first
    ///
    /// Never-written slots are not part of the history. After a cursor reset
    /// the slots past the last commit still hold the previous cycle, which is
    /// older than everything from slot 0 up to the last commit.
    pub fn iter_last(&self, count: usize) -> impl Iterator<Item = &T> + '_ {
        let occupied = self.occupied;
        let (start, len) = match self.last_written {
            Some(last) => {
                let len = count.min(occupied);
                ((last + 1 + occupied - len) % occupied, len)
            }
            None => (0, 0),
        };
        (0..len).map(move |i| &self.storage[(start + i) % occupied])
    }

    pub fn stats(&self) -> RingStats {
        RingStats {
            capacity: self.capacity(),
            pos: self.pos,
            total_writes: self.total_writes,
            filled_slots: self.filled_slots(),
            fill_percent: self.fill_percent(),
            last_written: self.last_written,
            occupied: self.occupied,
        }
    }
}
