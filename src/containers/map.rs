//! Insertion-ordered keyed store (spec.md §4.2).

use indexmap::IndexMap;

use super::key::BinderKey;
use crate::value::{Binder, Value};

/// `get, set, has, delete, size, keys, values, entries, forEach`.
///
/// Backed by `IndexMap` with the ahash-seeded default hasher, matching the
/// teacher's choice of a fast non-cryptographic hasher for its own
/// hash-table-backed `Dict`/`Set` (grounded on `types/dict.rs`).
#[derive(Debug, Default)]
pub struct MapContainer {
    entries: IndexMap<BinderKey, Binder, ahash::RandomState>,
}

impl MapContainer {
    #[must_use]
    pub fn new() -> Self {
        Self { entries: IndexMap::default() }
    }

    /// Non-existent `get` returns `void` (spec.md §4.2), so this returns an
    /// `Option` and callers substitute `Binder::void()` for `None`.
    #[must_use]
    pub fn get(&self, key: &Binder) -> Option<Binder> {
        self.entries.get(&BinderKey(key.clone())).cloned()
    }

    pub fn set(&mut self, key: Binder, value: Binder) {
        self.entries.insert(BinderKey(key), value);
    }

    #[must_use]
    pub fn has(&self, key: &Binder) -> bool {
        self.entries.contains_key(&BinderKey(key.clone()))
    }

    pub fn delete(&mut self, key: &Binder) -> bool {
        self.entries.shift_remove(&BinderKey(key.clone())).is_some()
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = Binder> + '_ {
        self.entries.keys().map(|k| k.0.clone())
    }

    pub fn values(&self) -> impl Iterator<Item = Binder> + '_ {
        self.entries.values().cloned()
    }

    pub fn entries(&self) -> impl Iterator<Item = (Binder, Binder)> + '_ {
        self.entries.iter().map(|(k, v)| (k.0.clone(), v.clone()))
    }
}

impl Value {
    /// Convenience: wraps a freshly built map as a `Value::Map`.
    pub fn new_map(map: MapContainer) -> Self {
        Value::Map(std::rc::Rc::new(std::cell::RefCell::new(map)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_get_and_delete_roundtrip() {
        let mut m = MapContainer::new();
        assert!(m.get(&Binder::int(1)).is_none());
        m.set(Binder::int(1), Binder::string("one"));
        assert!(m.has(&Binder::int(1)));
        assert_eq!(m.size(), 1);
        assert!(m.delete(&Binder::int(1)));
        assert_eq!(m.size(), 0);
    }

    #[test]
    fn primitive_keys_compare_by_value() {
        let mut m = MapContainer::new();
        m.set(Binder::int(5), Binder::string("five"));
        assert!(m.has(&Binder::int(5)));
        let got = m.get(&Binder::int(5)).unwrap();
        assert!(matches!(got.value, crate::value::Value::Str(_)));
    }
}
