//! Lexically-scoped environment chain (spec.md §3, §4.3).
//!
//! Grounded on the teacher's `namespace.rs` for the "chain of frames" shape,
//! but keyed by identifier (insertion-ordered) rather than compiled slot
//! index, since this engine's AST resolves names by string, not by a prior
//! compile pass. `Environment` is an `Rc<RefCell<Frame>>` handle so closures
//! can share the chain reference (spec.md §9 "Closures and recursion").

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::EngineError;
use crate::value::Binder;

/// `_` is reserved: "ignore the binding" for writes, "not a value" for reads
/// (spec.md §4.3).
pub const IGNORED: &str = "_";

struct Frame {
    bindings: IndexMap<String, Binder>,
    parent: Option<Environment>,
}

/// A shared handle to one frame in the environment chain.
#[derive(Clone)]
pub struct Environment(Rc<RefCell<Frame>>);

impl Environment {
    #[must_use]
    pub fn new_global() -> Self {
        Self(Rc::new(RefCell::new(Frame { bindings: IndexMap::new(), parent: None })))
    }

    /// A new child frame parented at `self`, as created on function call or
    /// block/loop-body entry (spec.md §4.3).
    #[must_use]
    pub fn child(&self) -> Self {
        Self(Rc::new(RefCell::new(Frame { bindings: IndexMap::new(), parent: Some(self.clone()) })))
    }

    /// Binds in the current frame unconditionally; shadowing allowed. A
    /// write to `_` is simply discarded (spec.md §4.3).
    pub fn define(&self, name: &str, value: Binder) {
        if name == IGNORED {
            return;
        }
        self.0.borrow_mut().bindings.insert(name.to_string(), value);
    }

    /// Walks parents and writes at the nearest frame holding `name`; fails if
    /// absent or if `name` is `_` (spec.md §4.3, §4.4 assignment rules).
    pub fn set(&self, name: &str, value: Binder) -> Result<(), EngineError> {
        if name == IGNORED {
            return Err(EngineError::resolution_error("cannot assign to '_'"));
        }
        let mut env = self.clone();
        loop {
            let found = env.0.borrow().bindings.contains_key(name);
            if found {
                env.0.borrow_mut().bindings.insert(name.to_string(), value);
                return Ok(());
            }
            let parent = env.0.borrow().parent.clone();
            match parent {
                Some(p) => env = p,
                None => {
                    return Err(EngineError::resolution_error(format!("assignment to undeclared variable '{name}'")));
                }
            }
        }
    }

    /// Walks parents and returns the bound value; fails if absent or `_`
    /// (spec.md §4.3, §4.4 "reading `_` fails").
    pub fn get(&self, name: &str) -> Result<Binder, EngineError> {
        if name == IGNORED {
            return Err(EngineError::resolution_error("'_' is not a value"));
        }
        let mut env = self.clone();
        loop {
            if let Some(v) = env.0.borrow().bindings.get(name) {
                return Ok(v.clone());
            }
            let parent = env.0.borrow().parent.clone();
            match parent {
                Some(p) => env = p,
                None => return Err(EngineError::resolution_error(format!("undefined variable '{name}'"))),
            }
        }
    }

    /// The flattened view where child shadows win (spec.md §3).
    #[must_use]
    pub fn get_all_bindings(&self) -> IndexMap<String, Binder> {
        let mut out = IndexMap::new();
        let mut chain = Vec::new();
        let mut env = Some(self.clone());
        while let Some(e) = env {
            chain.push(e.clone());
            env = e.0.borrow().parent.clone();
        }
        // Walk root-to-leaf so nearer (child) frames overwrite farther ones.
        for e in chain.into_iter().rev() {
            for (k, v) in &e.0.borrow().bindings {
                out.insert(k.clone(), v.clone());
            }
        }
        out
    }

    /// True iff `name` is bound to a function-typed value in any frame,
    /// usable to skip function bindings when the tracker walks scope
    /// (spec.md §4.6 "skips `_` and `function`-typed bindings").
    #[must_use]
    pub fn lookup_local(&self, name: &str) -> Option<Binder> {
        self.0.borrow().bindings.get(name).cloned()
    }

    /// Walks parents and applies `f` to the stored binder in place, at
    /// whichever frame declares `name`. Used by the invariant tracker to
    /// attach synthesized refinements to the actual binding rather than a
    /// clone that would be thrown away (spec.md §4.6 "Attachment").
    pub fn mutate(&self, name: &str, f: impl FnOnce(&mut Binder)) -> Result<(), EngineError> {
        if name == IGNORED {
            return Ok(());
        }
        let mut env = self.clone();
        loop {
            if env.0.borrow().bindings.contains_key(name) {
                f(env.0.borrow_mut().bindings.get_mut(name).expect("checked above"));
                return Ok(());
            }
            let parent = env.0.borrow().parent.clone();
            match parent {
                Some(p) => env = p,
                None => return Err(EngineError::resolution_error(format!("undefined variable '{name}'"))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Binder;

    #[test]
    fn child_sees_parent_bindings_and_shadows() {
        let parent = Environment::new_global();
        parent.define("x", Binder::int(1));
        let child = parent.child();
        assert!(matches!(child.get("x").unwrap().value, crate::value::Value::Int(1)));
        child.define("x", Binder::int(2));
        assert!(matches!(child.get("x").unwrap().value, crate::value::Value::Int(2)));
        assert!(matches!(parent.get("x").unwrap().value, crate::value::Value::Int(1)));
    }

    #[test]
    fn set_writes_through_to_declaring_frame() {
        let parent = Environment::new_global();
        parent.define("x", Binder::int(1));
        let child = parent.child();
        child.set("x", Binder::int(9)).unwrap();
        assert!(matches!(parent.get("x").unwrap().value, crate::value::Value::Int(9)));
    }

    #[test]
    fn undeclared_set_and_get_fail() {
        let env = Environment::new_global();
        assert!(env.get("missing").is_err());
        assert!(env.set("missing", Binder::int(1)).is_err());
    }

    #[test]
    fn underscore_is_reserved() {
        let env = Environment::new_global();
        env.define(crate::environment::IGNORED, Binder::int(1));
        assert!(env.get("_").is_err());
        assert!(env.set("_", Binder::int(2)).is_err());
    }
}
