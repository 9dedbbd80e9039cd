//! Static type kinds and runtime-type wrapper (spec.md §3).
//!
//! Grounded on the teacher's `types/type.rs`: a tagged enum covering every
//! static shape the resolver can produce, kept immutable once constructed.

use std::fmt;
use std::rc::Rc;

use crate::predicate::Predicate;

/// A static type, as assigned by the (external) type-inference pass.
///
/// Immutable once constructed, per spec.md §3. Composite kinds hold their
/// element/parameter types behind `Rc` so cloning a `Type` is cheap and
/// sharing a container's element type across many binders is free.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Int,
    Float,
    String,
    Boolean,
    Void,
    /// Parser's polymorphic placeholder awaiting refinement (e.g. `[]`).
    Weak,
    /// Resolved at runtime from the actual value (see `actual_runtime_kind`).
    Dynamic,
    Range,
    Array(Rc<Type>),
    Set(Rc<Type>),
    Map(Rc<Type>, Rc<Type>),
    Heap(Rc<Type>),
    HeapMap(Rc<Type>, Rc<Type>),
    Graph(Rc<Type>),
    BinaryTree(Rc<Type>),
    Tuple(Rc<[Type]>),
    Record(Rc<[(String, Type)]>),
    Function { params: Rc<[Type]>, ret: Rc<Type>, variadic: bool },
    Predicate,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::String => write!(f, "string"),
            Self::Boolean => write!(f, "boolean"),
            Self::Void => write!(f, "void"),
            Self::Weak => write!(f, "weak"),
            Self::Dynamic => write!(f, "dynamic"),
            Self::Range => write!(f, "range"),
            Self::Array(e) => write!(f, "array{{{e}}}"),
            Self::Set(e) => write!(f, "set{{{e}}}"),
            Self::Map(k, v) => write!(f, "map{{{k},{v}}}"),
            Self::Heap(e) => write!(f, "heap{{{e}}}"),
            Self::HeapMap(k, v) => write!(f, "heapmap{{{k},{v}}}"),
            Self::Graph(n) => write!(f, "graph{{{n}}}"),
            Self::BinaryTree(e) => write!(f, "binarytree{{{e}}}"),
            Self::Tuple(elems) => {
                write!(f, "tuple{{")?;
                for (i, t) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, "}}")
            }
            Self::Record(fields) => {
                write!(f, "record{{")?;
                for (i, (name, t)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "({name},{t})")?;
                }
                write!(f, "}}")
            }
            Self::Function { params, ret, variadic } => {
                write!(f, "function{{")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{p}")?;
                }
                if *variadic {
                    write!(f, "...")?;
                }
                write!(f, "->{ret}}}")
            }
            Self::Predicate => write!(f, "predicate"),
        }
    }
}

/// The kind tags produced by `actual_runtime_kind`, used to dispatch
/// binary operations, indexing, and equality when the static type is
/// `dynamic` or `weak`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum RuntimeKind {
    Int,
    Float,
    String,
    Boolean,
    Void,
    Array,
    Set,
    Map,
    Heap,
    HeapMap,
    Graph,
    BinaryTree,
    Range,
    Tuple,
    Record,
    Function,
    Predicate,
}

/// `{ static: Type, refinements: [Predicate] }` (spec.md §3).
///
/// Refinements grow monotonically over a binder's lifetime; they never
/// change static-kind dispatch, only inform the checker/tracker.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuntimeType {
    pub static_type: Option<Type>,
    pub refinements: Vec<Predicate>,
}

impl RuntimeType {
    #[must_use]
    pub fn new(static_type: Type) -> Self {
        Self { static_type: Some(static_type), refinements: Vec::new() }
    }

    /// Appends `p` unless an equal predicate is already present.
    pub fn add_refinement(&mut self, p: Predicate) {
        if !self.refinements.contains(&p) {
            self.refinements.push(p);
        }
    }
}
