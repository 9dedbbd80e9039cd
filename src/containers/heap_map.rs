//! MinHeapMap / MaxHeapMap: a heap of `(key, priority)` pairs supporting
//! priority updates (spec.md §4.2).
//!
//! `std::collections::BinaryHeap` has no efficient update-by-key, so this is
//! a hand-rolled binary heap over a dense `Vec` with an index map from key to
//! its current array slot — the classic "indexed priority queue" shape,
//! mirrored from the teacher's `Dict`'s own "index table + dense vec"
//! strategy (`types/dict.rs`: `HashTable<usize>` + `Vec<DictEntry>`).

use indexmap::IndexMap;

use super::heap::HeapDirection;
use super::key::BinderKey;
use crate::error::EngineError;
use crate::value::Binder;

struct Slot {
    key: Binder,
    priority: Binder,
}

#[derive(Default)]
pub struct HeapMapContainer {
    direction_min: bool,
    data: Vec<Slot>,
    /// key -> index into `data`.
    positions: IndexMap<BinderKey, usize, ahash::RandomState>,
}

impl std::fmt::Debug for HeapMapContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapMapContainer").field("size", &self.data.len()).finish()
    }
}

impl HeapMapContainer {
    #[must_use]
    pub fn new(direction: HeapDirection) -> Self {
        Self { direction_min: direction == HeapDirection::Min, data: Vec::new(), positions: IndexMap::default() }
    }

    #[must_use]
    pub fn direction(&self) -> HeapDirection {
        if self.direction_min { HeapDirection::Min } else { HeapDirection::Max }
    }

    /// `true` iff `a` should be strictly higher priority than `b`.
    fn higher_priority(&self, a: &Binder, b: &Binder) -> bool {
        let ord = a.partial_cmp_primitive(b).unwrap_or(std::cmp::Ordering::Equal);
        if self.direction_min { ord.is_lt() } else { ord.is_gt() }
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.data.swap(i, j);
        self.positions.insert(BinderKey(self.data[i].key.clone()), i);
        self.positions.insert(BinderKey(self.data[j].key.clone()), j);
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.higher_priority(&self.data[i].priority, &self.data[parent].priority) {
                self.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut i: usize) {
        let len = self.data.len();
        loop {
            let (l, r) = (2 * i + 1, 2 * i + 2);
            let mut best = i;
            if l < len && self.higher_priority(&self.data[l].priority, &self.data[best].priority) {
                best = l;
            }
            if r < len && self.higher_priority(&self.data[r].priority, &self.data[best].priority) {
                best = r;
            }
            if best == i {
                break;
            }
            self.swap(i, best);
            i = best;
        }
    }

    /// Inserts `key` with `priority`, or updates its priority if already present.
    pub fn push(&mut self, key: Binder, priority: Binder) {
        if let Some(&idx) = self.positions.get(&BinderKey(key.clone())) {
            self.data[idx].priority = priority;
            self.sift_up(idx);
            self.sift_down(idx);
            return;
        }
        let idx = self.data.len();
        self.positions.insert(BinderKey(key.clone()), idx);
        self.data.push(Slot { key, priority });
        self.sift_up(idx);
    }

    pub fn pop(&mut self) -> Result<(Binder, Binder), EngineError> {
        if self.data.is_empty() {
            return Err(EngineError::container_error("pop from empty heap map"));
        }
        let last = self.data.len() - 1;
        self.swap(0, last);
        let slot = self.data.pop().unwrap();
        self.positions.shift_remove(&BinderKey(slot.key.clone()));
        if !self.data.is_empty() {
            self.sift_down(0);
        }
        Ok((slot.key, slot.priority))
    }

    #[must_use]
    pub fn has(&self, key: &Binder) -> bool {
        self.positions.contains_key(&BinderKey(key.clone()))
    }

    #[must_use]
    pub fn get_priority(&self, key: &Binder) -> Option<Binder> {
        self.positions.get(&BinderKey(key.clone())).map(|&idx| self.data[idx].priority.clone())
    }

    /// Re-heapifies up or down depending on the direction of change; fails
    /// if `key` is missing (spec.md §4.2).
    pub fn update_priority(&mut self, key: &Binder, priority: Binder) -> Result<(), EngineError> {
        let Some(&idx) = self.positions.get(&BinderKey(key.clone())) else {
            return Err(EngineError::container_error("updatePriority: key not present"));
        };
        self.data[idx].priority = priority;
        self.sift_up(idx);
        self.sift_down(idx);
        Ok(())
    }

    pub fn delete(&mut self, key: &Binder) -> bool {
        let Some(&idx) = self.positions.get(&BinderKey(key.clone())) else {
            return false;
        };
        let last = self.data.len() - 1;
        self.swap(idx, last);
        let removed = self.data.pop().unwrap();
        self.positions.shift_remove(&BinderKey(removed.key));
        if idx < self.data.len() {
            self.sift_up(idx);
            self.sift_down(idx);
        }
        true
    }

    pub fn entries(&self) -> impl Iterator<Item = (Binder, Binder)> + '_ {
        self.data.iter().map(|s| (s.key.clone(), s.priority.clone()))
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.positions.clear();
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_heap_map_pops_lowest_priority_first() {
        let mut h = HeapMapContainer::new(HeapDirection::Min);
        h.push(Binder::string("a"), Binder::int(5));
        h.push(Binder::string("b"), Binder::int(1));
        h.push(Binder::string("c"), Binder::int(3));
        let (k, _) = h.pop().unwrap();
        assert!(matches!(k.value, crate::value::Value::Str(s) if &*s == "b"));
    }

    #[test]
    fn update_priority_reorders() {
        let mut h = HeapMapContainer::new(HeapDirection::Min);
        h.push(Binder::string("a"), Binder::int(5));
        h.push(Binder::string("b"), Binder::int(1));
        h.update_priority(&Binder::string("b"), Binder::int(10)).unwrap();
        let (k, _) = h.pop().unwrap();
        assert!(matches!(k.value, crate::value::Value::Str(s) if &*s == "a"));
    }

    #[test]
    fn update_priority_missing_key_fails() {
        let mut h = HeapMapContainer::new(HeapDirection::Min);
        assert!(h.update_priority(&Binder::string("missing"), Binder::int(1)).is_err());
    }
}
