//! Shared key-equality wrapper for keyed containers (spec.md §4.2).
//!
//! Map/Set/HeapMap/Graph all share the same key rule: "when the index binder
//! is a primitive-kind value, use primitive equality on `value`; otherwise
//! use binder identity." [`BinderKey`] makes that rule work with
//! [`indexmap::IndexMap`]/[`indexmap::IndexSet`] by delegating `Eq`/`Hash` to
//! [`Binder::key_eq`]/[`Binder::key_hash`].

use std::hash::{Hash, Hasher};

use crate::value::Binder;

#[derive(Debug, Clone)]
pub struct BinderKey(pub Binder);

impl PartialEq for BinderKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.key_eq(&other.0)
    }
}

impl Eq for BinderKey {}

impl Hash for BinderKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.key_hash());
    }
}
