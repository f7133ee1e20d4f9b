//! Growable storage of fixed size records.
//!
//! Records are pushed to the end and addressed by index. Freeing a slot
//! leaves a tombstone in place, so the index of every other record and the
//! scan order stay the same.
//!
//! ```text
//!   index:   0        1        2        3
//!          +------+ +------+ +------+ +------+
//!          | item | | .... | | item | | item |    .... = tombstone
//!          +------+ +------+ +------+ +------+
//! ```

/// Slot based vector, the storage behind [`crate::freelist::FreeList`].
#[derive(Debug, Clone)]
pub struct SlotVec<T> {
    slots: Vec<Option<T>>,
    live: usize,
}

impl<T> Default for SlotVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SlotVec<T> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
        }
    }

    /// Number of live records. Tombstones are not counted.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Appends `item` and returns its index.
    pub fn push(&mut self, item: T) -> usize {
        self.slots.push(Some(item));
        self.live += 1;
        self.slots.len() - 1
    }

    /// Record at `index`, `None` for tombstones and out of range indexes.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index)?.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index)?.as_mut()
    }

    /// Overwrites the live record at `index`, returning the previous one.
    /// Tombstones can't be replaced, use [`SlotVec::push`] instead.
    pub fn replace(&mut self, index: usize, item: T) -> Option<T> {
        let slot = self.slots.get_mut(index)?;
        if slot.is_none() {
            return None;
        }
        slot.replace(item)
    }

    /// Turns the slot at `index` into a tombstone and returns its record.
    ///
    /// When the last live record goes away the tombstones are dropped too,
    /// the vector keeps its allocation.
    pub fn free_slot(&mut self, index: usize) -> Option<T> {
        let item = self.slots.get_mut(index)?.take()?;
        self.live -= 1;

        if self.live == 0 {
            self.slots.clear();
        }

        Some(item)
    }

    /// Vacated slots still taking room.
    #[inline]
    pub fn tombstones(&self) -> usize {
        self.slots.len() - self.live
    }

    /// Squeezes the tombstones out. Scan order is kept, indexes are not.
    pub fn compact(&mut self) {
        self.slots.retain(Option::is_some);
    }

    /// Drops every record.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.live = 0;
    }

    /// Live records with their index, in scan order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|item| (index, item)))
    }
}
