//! Runtime value model (spec.md §3, §4.1).
//!
//! Grounded on the teacher's `value.rs`: a tagged sum type with a variant per
//! static kind ("tagged values over dynamic dispatch", spec.md §9), rather
//! than an open class hierarchy. Unlike the teacher, which stores
//! heap-allocated values behind an arena (`HeapId`) with manual refcounting,
//! containers here are `Rc<RefCell<_>>` handles directly: the language has no
//! reference cycles through user values (spec.md §9), so ordinary Rc suffices
//! and there is no garbage collector to write.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::containers::{
    array::Array, binary_tree::TreeContainer, graph::Graph, heap::HeapContainer, heap_map::HeapMapContainer,
    lazy_range::LazyRange, map::MapContainer, set::SetContainer,
};
use crate::environment::Environment;
use crate::error::EngineError;
use crate::types::{RuntimeKind, RuntimeType, Type};

/// A user-defined function value: parameters, body AST, and captured closure.
///
/// The closure is the environment chain *at declaration time*, not a copy
/// (spec.md §9 "Closures and recursion").
#[derive(Debug, Clone)]
pub struct UserFunction {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub variadic: bool,
    pub body: Rc<crate::ast::BlockStatement>,
    pub closure: Environment,
}

/// A native built-in function, dispatched by name (spec.md §6).
#[derive(Clone)]
pub struct BuiltinFunction {
    pub name: &'static str,
    pub func: Rc<dyn Fn(&[Binder]) -> Result<Binder, EngineError>>,
}

impl fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinFunction").field("name", &self.name).finish()
    }
}

/// A first-class predicate thunk: `@name(args)` evaluated as a value
/// (spec.md §9 "Meta-predicate composition").
#[derive(Debug, Clone)]
pub struct PredicateThunk {
    pub name: String,
    pub args: Vec<Binder>,
}

/// The runtime payload of a [`Binder`]. One variant per static kind.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Bool(bool),
    Void,
    Array(Rc<RefCell<Array>>),
    Set(Rc<RefCell<SetContainer>>),
    Map(Rc<RefCell<MapContainer>>),
    Heap(Rc<RefCell<HeapContainer>>),
    HeapMap(Rc<RefCell<HeapMapContainer>>),
    Graph(Rc<RefCell<Graph>>),
    BinaryTree(Rc<RefCell<TreeContainer>>),
    Range(Rc<LazyRange>),
    Tuple(Rc<Vec<Binder>>),
    Record(Rc<RefCell<indexmap::IndexMap<String, Binder>>>),
    Function(Rc<UserFunction>),
    Builtin(BuiltinFunction),
    Predicate(Rc<PredicateThunk>),
}

/// `{ value: V, type: RuntimeType }` (spec.md §3).
#[derive(Debug, Clone)]
pub struct Binder {
    pub value: Value,
    pub ty: RuntimeType,
}

impl Binder {
    #[must_use]
    pub fn new(value: Value, ty: Type) -> Self {
        Self { value, ty: RuntimeType::new(ty) }
    }

    #[must_use]
    pub fn int(v: i64) -> Self {
        Self::new(Value::Int(v), Type::Int)
    }

    #[must_use]
    pub fn float(v: f64) -> Self {
        Self::new(Value::Float(v), Type::Float)
    }

    #[must_use]
    pub fn string(v: impl Into<Rc<str>>) -> Self {
        Self::new(Value::Str(v.into()), Type::String)
    }

    #[must_use]
    pub fn boolean(v: bool) -> Self {
        Self::new(Value::Bool(v), Type::Boolean)
    }

    #[must_use]
    pub fn void() -> Self {
        Self::new(Value::Void, Type::Void)
    }

    /// `actualRuntimeKind` (spec.md §4.1): resolves `dynamic`/`weak` from the
    /// boxed value; otherwise trusts the static kind.
    #[must_use]
    pub fn actual_runtime_kind(&self) -> RuntimeKind {
        match &self.value {
            Value::Int(_) => RuntimeKind::Int,
            Value::Float(_) => RuntimeKind::Float,
            Value::Str(_) => RuntimeKind::String,
            Value::Bool(_) => RuntimeKind::Boolean,
            Value::Void => RuntimeKind::Void,
            Value::Array(_) => RuntimeKind::Array,
            Value::Set(_) => RuntimeKind::Set,
            Value::Map(_) | Value::Record(_) => RuntimeKind::Map,
            Value::Heap(_) => RuntimeKind::Heap,
            Value::HeapMap(_) => RuntimeKind::HeapMap,
            Value::Graph(_) => RuntimeKind::Graph,
            Value::BinaryTree(_) => RuntimeKind::BinaryTree,
            Value::Range(_) => RuntimeKind::Range,
            Value::Tuple(_) => RuntimeKind::Tuple,
            Value::Function(_) | Value::Builtin(_) => RuntimeKind::Function,
            Value::Predicate(_) => RuntimeKind::Predicate,
        }
    }

    /// Numeric coercion used by binary-operator dispatch; `None` for non-numerics.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self.value {
            Value::Int(i) => Some(i as f64),
            Value::Float(f) => Some(f),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self.value, Value::Int(_) | Value::Float(_))
    }

    /// Primitive-or-identity equality used by container key rules (spec.md §4.2):
    /// primitive-kind binders compare by value, everything else by `Rc` identity.
    #[must_use]
    pub fn key_eq(&self, other: &Self) -> bool {
        match (&self.value, &other.value) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Void, Value::Void) => true,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Set(a), Value::Set(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Heap(a), Value::Heap(b)) => Rc::ptr_eq(a, b),
            (Value::HeapMap(a), Value::HeapMap(b)) => Rc::ptr_eq(a, b),
            (Value::Graph(a), Value::Graph(b)) => Rc::ptr_eq(a, b),
            (Value::BinaryTree(a), Value::BinaryTree(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            (Value::Record(a), Value::Record(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Predicate(a), Value::Predicate(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// A hash consistent with [`Binder::key_eq`]: primitives hash by value,
    /// everything else hashes by pointer identity.
    #[must_use]
    pub fn key_hash(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = ahash::AHasher::default();
        match &self.value {
            Value::Int(i) => i.hash(&mut hasher),
            // `key_eq` cross-equates `Int(a)` and `Float(b)` when they denote
            // the same number, so an integral float must hash the same way
            // an `Int` of that value would, or equal keys could land in
            // different buckets.
            Value::Float(f) if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 => {
                (*f as i64).hash(&mut hasher);
            }
            Value::Float(f) => f.to_bits().hash(&mut hasher),
            Value::Str(s) => s.hash(&mut hasher),
            Value::Bool(b) => b.hash(&mut hasher),
            Value::Void => 0u8.hash(&mut hasher),
            Value::Array(a) => (Rc::as_ptr(a) as usize).hash(&mut hasher),
            Value::Set(a) => (Rc::as_ptr(a) as usize).hash(&mut hasher),
            Value::Map(a) => (Rc::as_ptr(a) as usize).hash(&mut hasher),
            Value::Heap(a) => (Rc::as_ptr(a) as usize).hash(&mut hasher),
            Value::HeapMap(a) => (Rc::as_ptr(a) as usize).hash(&mut hasher),
            Value::Graph(a) => (Rc::as_ptr(a) as usize).hash(&mut hasher),
            Value::BinaryTree(a) => (Rc::as_ptr(a) as usize).hash(&mut hasher),
            Value::Tuple(a) => (Rc::as_ptr(a) as usize).hash(&mut hasher),
            Value::Record(a) => (Rc::as_ptr(a) as usize).hash(&mut hasher),
            Value::Function(a) => (Rc::as_ptr(a) as usize).hash(&mut hasher),
            Value::Predicate(a) => (Rc::as_ptr(a) as usize).hash(&mut hasher),
        }
        hasher.finish()
    }

    /// Ordering used by `<`,`<=`,`>`,`>=` (numeric pairs only) and by the
    /// heap/sorted-predicate machinery, which additionally allow string
    /// pairs ("ordered by `<`/`>` on the wrapped primitive", spec.md §4.2).
    #[must_use]
    pub fn partial_cmp_primitive(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (&self.value, &other.value) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }

    /// `==`/`!=` operator semantics (spec.md §4.4): compare by actual runtime
    /// kind, primitives by value, `void == void` is true, all other kinds
    /// raise (spec.md §9 open question: no deep-equality fallback).
    pub fn equals(&self, other: &Self) -> Result<bool, EngineError> {
        use RuntimeKind::{Boolean, Float, Int, String as Str, Void};
        let (ak, bk) = (self.actual_runtime_kind(), other.actual_runtime_kind());
        match (ak, bk) {
            (Int, Int) | (Float, Float) | (Int, Float) | (Float, Int) => Ok(self.as_f64() == other.as_f64()),
            (Str, Str) => Ok(self.key_eq(other)),
            (Boolean, Boolean) => Ok(self.key_eq(other)),
            (Void, Void) => Ok(true),
            _ => Err(EngineError::type_error(format!("cannot compare {ak} with {bk} for equality"))),
        }
    }

    /// `toString` (spec.md §4.1), with the nested-vs-top-level string quoting
    /// rule spelled out in SPEC_FULL.md §4.1.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        self.render(false)
    }

    fn render(&self, nested: bool) -> String {
        match &self.value {
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => {
                if nested {
                    format!("\"{s}\"")
                } else {
                    s.to_string()
                }
            }
            Value::Bool(b) => b.to_string(),
            Value::Void => "void".to_string(),
            Value::Array(arr) => {
                let arr = arr.borrow();
                let items: Vec<String> = arr.items.iter().map(|b| b.render(true)).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Set(set) => {
                let set = set.borrow();
                let items: Vec<String> = set.iter().map(|b| b.render(true)).collect();
                format!("{{{}}}", items.join(", "))
            }
            Value::Map(map) => {
                let map = map.borrow();
                let items: Vec<String> =
                    map.entries().map(|(k, v)| format!("{}: {}", k.render(true), v.render(true))).collect();
                format!("{{{}}}", items.join(", "))
            }
            Value::Record(fields) => {
                let fields = fields.borrow();
                let items: Vec<String> = fields.iter().map(|(k, v)| format!("{k}: {}", v.render(true))).collect();
                format!("{{{}}}", items.join(", "))
            }
            Value::Tuple(items) => {
                let items: Vec<String> = items.iter().map(|b| b.render(true)).collect();
                format!("({})", items.join(", "))
            }
            Value::Heap(h) => format!("{:?}", h.borrow().direction()),
            Value::HeapMap(h) => format!("{:?}", h.borrow().direction()),
            Value::Graph(_) => "<graph>".to_string(),
            Value::BinaryTree(_) => "<tree>".to_string(),
            Value::Range(r) => match r.end {
                Some(end) => format!("{}..{}{}", r.start, if r.inclusive { "=" } else { "" }, end),
                None => format!("{}..", r.start),
            },
            Value::Function(f) => match &f.name {
                Some(name) => format!("<function {name}>"),
                None => "<function>".to_string(),
            },
            Value::Builtin(b) => format!("<function {}>", b.name),
            Value::Predicate(p) => format!("<predicate {}>", p.name),
        }
    }
}

/// Float rendering always shows a decimal point (SPEC_FULL.md §4.1).
#[must_use]
pub fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}
