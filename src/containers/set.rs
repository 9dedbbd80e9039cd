//! Insertion-ordered set container (spec.md §4.2).

use indexmap::IndexSet;

use super::key::BinderKey;
use crate::value::Binder;

/// `add, has, delete, size, toArray, forEach`. Same key rules as `Map`.
#[derive(Debug, Default)]
pub struct SetContainer {
    entries: IndexSet<BinderKey, ahash::RandomState>,
}

impl SetContainer {
    #[must_use]
    pub fn new() -> Self {
        Self { entries: IndexSet::default() }
    }

    /// Returns whether the value was newly inserted.
    pub fn add(&mut self, value: Binder) -> bool {
        self.entries.insert(BinderKey(value))
    }

    #[must_use]
    pub fn has(&self, value: &Binder) -> bool {
        self.entries.contains(&BinderKey(value.clone()))
    }

    pub fn delete(&mut self, value: &Binder) -> bool {
        self.entries.shift_remove(&BinderKey(value.clone()))
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn to_array(&self) -> Vec<Binder> {
        self.entries.iter().map(|k| k.0.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = Binder> + '_ {
        self.entries.iter().map(|k| k.0.clone())
    }

    /// `subset_of`/`disjoint_from` compare multisets of *primitive-or-identity*
    /// keys, so reusing `has` against the other set's entries is correct.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.entries.iter().all(|k| other.has(&k.0))
    }

    #[must_use]
    pub fn is_disjoint_from(&self, other: &Self) -> bool {
        self.entries.iter().all(|k| !other.has(&k.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subset_and_disjoint() {
        let mut s1 = SetContainer::new();
        s1.add(Binder::int(1));
        s1.add(Binder::int(2));
        let mut s2 = SetContainer::new();
        s2.add(Binder::int(1));
        s2.add(Binder::int(2));
        s2.add(Binder::int(3));
        assert!(s1.is_subset_of(&s2));

        let mut s3 = SetContainer::new();
        s3.add(Binder::int(1));
        s3.add(Binder::int(2));
        s3.add(Binder::int(4));
        assert!(!s3.is_subset_of(&s2));

        let mut s4 = SetContainer::new();
        s4.add(Binder::int(3));
        s4.add(Binder::int(4));
        assert!(s1.is_disjoint_from(&s4));
    }
}
