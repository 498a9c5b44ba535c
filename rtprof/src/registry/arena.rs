//! Dense id → entity storage
//!
//! Ids are small integers assigned in increasing order by the decoder, so a
//! vector indexed by id beats a hash map. Slots that were never referenced stay
//! `None`; a referenced slot is never cleared.
//!
//! An id far beyond the ids seen so far (a corrupt record, or a decoder that
//! does not number densely) goes to a sparse side table instead of growing the
//! vector to match it.

use std::collections::HashMap;

/// Ids below this always get a dense slot
const DENSE_FLOOR: usize = 4096;

/// Append-only storage of entities keyed by dense integer id
#[derive(Debug, Clone)]
pub struct Arena<T> {
    slots: Vec<Option<T>>,
    sparse: HashMap<usize, T>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self { slots: Vec::new(), sparse: HashMap::new(), len: 0 }
    }
}

impl<T> Arena<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Largest index the dense vector may grow to hold right now
    fn dense_limit(&self) -> usize {
        self.slots.len().max(DENSE_FLOOR).saturating_mul(2)
    }

    /// Entity at `index`, if one was ever created
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        match self.slots.get(index) {
            Some(Some(value)) => Some(value),
            _ => self.sparse.get(&index),
        }
    }

    /// Mutable entity at `index`, creating it with `make` if absent
    pub fn get_or_insert_with(&mut self, index: usize, make: impl FnOnce() -> T) -> &mut T {
        // An id parked in the sparse table stays there even once the dense
        // range has grown past it
        if self.sparse.contains_key(&index) || index >= self.dense_limit() {
            if !self.sparse.contains_key(&index) {
                log::debug!("Id {index} is outside the dense range, storing it sparsely");
                self.len += 1;
            }
            return self.sparse.entry(index).or_insert_with(make);
        }

        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        let slot = &mut self.slots[index];
        if slot.is_none() {
            self.len += 1;
        }
        slot.get_or_insert_with(make)
    }

    /// Number of populated slots
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Populated slots in id order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        let mut sparse: Vec<(usize, &T)> = self.sparse.iter().map(|(&i, v)| (i, v)).collect();
        sparse.sort_unstable_by_key(|&(i, _)| i);

        let mut all: Vec<(usize, &T)> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (i, v)))
            .collect();
        if !sparse.is_empty() {
            all.extend(sparse);
            all.sort_unstable_by_key(|&(i, _)| i);
        }
        all.into_iter()
    }
}

impl<T: Default> Arena<T> {
    /// Mutable entity at `index`, creating a default placeholder if absent
    pub fn get_or_default(&mut self, index: usize) -> &mut T {
        self.get_or_insert_with(index, T::default)
    }
}
