// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use ahash::AHashMap;
use kiln_core::ResourceHash;
use std::iter::{Copied, Flatten};
use std::slice;

/// Removed slots tolerated before a compaction is considered.
const MIN_TOMBSTONES_BEFORE_COMPACTION: usize = 32;

/// An insertion-ordered set of resource hashes with O(1) amortized insert,
/// remove and membership test.
///
/// Removal leaves a tombstone in place so the remaining entries keep their
/// relative order. The slots are compacted once tombstones outnumber the live
/// entries, which keeps iteration proportional to [`HashList::len`].
#[derive(Debug, Default, Clone)]
pub struct HashList {
    slots: Vec<Option<ResourceHash>>,
    positions: AHashMap<ResourceHash, usize>,
}

/// Iterator over the entries of a [`HashList`], in insertion order.
pub type Iter<'a> = Copied<Flatten<slice::Iter<'a, Option<ResourceHash>>>>;

impl HashList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `hash` unless it is already present. Returns `true` if it was added.
    pub fn insert(&mut self, hash: ResourceHash) -> bool {
        if self.positions.contains_key(&hash) {
            return false;
        }
        self.positions.insert(hash, self.slots.len());
        self.slots.push(Some(hash));
        true
    }

    /// Removes `hash` if present. Returns `true` if it was removed.
    pub fn remove(&mut self, hash: ResourceHash) -> bool {
        let Some(index) = self.positions.remove(&hash) else {
            return false;
        };
        self.slots[index] = None;

        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
        let tombstones = self.slots.len() - self.positions.len();
        if tombstones > MIN_TOMBSTONES_BEFORE_COMPACTION && tombstones > self.positions.len() {
            self.compact();
        }
        true
    }

    /// Whether `hash` is in the list.
    pub fn contains(&self, hash: ResourceHash) -> bool {
        self.positions.contains_key(&hash)
    }

    /// The entries in insertion order.
    pub fn iter(&self) -> Iter<'_> {
        self.slots.iter().flatten().copied()
    }

    /// The oldest entry.
    pub fn first(&self) -> Option<ResourceHash> {
        self.iter().next()
    }

    /// The entries in insertion order, collected.
    pub fn to_vec(&self) -> Vec<ResourceHash> {
        self.iter().collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    fn compact(&mut self) {
        self.slots.retain(Option::is_some);
        for (index, slot) in self.slots.iter().enumerate() {
            if let Some(hash) = slot {
                self.positions.insert(*hash, index);
            }
        }
    }
}

impl<'a> IntoIterator for &'a HashList {
    type Item = ResourceHash;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u64) -> ResourceHash {
        ResourceHash::from_parts(n, 0)
    }

    #[test]
    fn test_insert_ignores_duplicates() {
        let mut list = HashList::new();
        assert!(list.insert(h(1)));
        assert!(!list.insert(h(1)));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_remove_keeps_insertion_order() {
        let mut list = HashList::new();
        for n in 1..=4 {
            list.insert(h(n));
        }

        assert!(list.remove(h(1)));
        assert_eq!(list.to_vec(), vec![h(2), h(3), h(4)]);
        assert_eq!(list.first(), Some(h(2)));

        assert!(list.remove(h(3)));
        list.insert(h(5));
        assert_eq!(list.to_vec(), vec![h(2), h(4), h(5)]);
        assert!(!list.contains(h(3)));
    }

    #[test]
    fn test_remove_last_and_missing() {
        let mut list = HashList::new();
        list.insert(h(1));
        assert!(!list.remove(h(9)));
        assert!(list.remove(h(1)));
        assert!(list.is_empty());
        assert_eq!(list.first(), None);
    }

    #[test]
    fn test_compaction_keeps_order_and_positions() {
        let mut list = HashList::new();
        for n in 0..200 {
            list.insert(h(n));
        }
        // Draining from the front like an upload queue triggers compactions.
        for n in 0..150 {
            assert!(list.remove(h(n)));
        }

        assert_eq!(list.len(), 50);
        assert!(list.slots.len() < 2 * 50 + MIN_TOMBSTONES_BEFORE_COMPACTION + 1);
        assert_eq!(list.to_vec(), (150..200).map(h).collect::<Vec<_>>());

        // Positions were rebuilt, so entries are still removable by hash.
        assert!(list.remove(h(175)));
        assert!(!list.contains(h(175)));
        assert_eq!(list.len(), 49);
        assert_eq!(list.iter().count(), 49);
    }
}
