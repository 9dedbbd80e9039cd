//! Global-environment population (spec.md §6 "Built-ins").
//!
//! Grounded on the teacher's `builtins/mod.rs` registration pattern (each
//! built-in is a plain Rust closure wrapped in a name-tagged callable and
//! inserted into the global namespace before user code runs), specialized
//! from the teacher's per-module `print.rs`/`abs.rs`/`min_max.rs` split.

use std::cell::RefCell;
use std::rc::Rc;

use crate::containers::binary_tree::TreeContainer;
use crate::containers::graph::Graph;
use crate::containers::heap::{HeapContainer, HeapDirection};
use crate::containers::heap_map::HeapMapContainer;
use crate::containers::map::MapContainer;
use crate::containers::set::SetContainer;
use crate::environment::Environment;
use crate::error::EngineError;
use crate::types::Type;
use crate::value::{Binder, BuiltinFunction, Value};

fn variadic_type() -> Type {
    Type::Function { params: Rc::new([]), ret: Rc::new(Type::Void), variadic: true }
}

fn define_builtin(env: &Environment, name: &'static str, ty: Type, func: impl Fn(&[Binder]) -> Result<Binder, EngineError> + 'static) {
    env.define(name, Binder::new(Value::Builtin(BuiltinFunction { name, func: Rc::new(func) }), ty));
}

/// Seeds `env` with every name listed in spec.md §6, before any user
/// statement runs. `output` is the shared sink `print` appends to.
pub fn install(env: &Environment, output: Rc<RefCell<Vec<String>>>) {
    define_builtin(env, "print", variadic_type(), move |args| {
        let line = args.iter().map(Binder::to_display_string).collect::<Vec<_>>().join(" ");
        output.borrow_mut().push(line);
        Ok(Binder::void())
    });

    define_builtin(env, "MinHeap", variadic_type(), |_args| {
        Ok(Binder::new(Value::Heap(Rc::new(RefCell::new(HeapContainer::new(HeapDirection::Min)))), Type::Heap(Rc::new(Type::Dynamic))))
    });
    define_builtin(env, "MaxHeap", variadic_type(), |_args| {
        Ok(Binder::new(Value::Heap(Rc::new(RefCell::new(HeapContainer::new(HeapDirection::Max)))), Type::Heap(Rc::new(Type::Dynamic))))
    });
    define_builtin(env, "MinHeapMap", variadic_type(), |_args| {
        Ok(Binder::new(
            Value::HeapMap(Rc::new(RefCell::new(HeapMapContainer::new(HeapDirection::Min)))),
            Type::HeapMap(Rc::new(Type::Dynamic), Rc::new(Type::Dynamic)),
        ))
    });
    define_builtin(env, "MaxHeapMap", variadic_type(), |_args| {
        Ok(Binder::new(
            Value::HeapMap(Rc::new(RefCell::new(HeapMapContainer::new(HeapDirection::Max)))),
            Type::HeapMap(Rc::new(Type::Dynamic), Rc::new(Type::Dynamic)),
        ))
    });
    define_builtin(env, "Map", variadic_type(), |_args| {
        Ok(Binder::new(Value::new_map(MapContainer::new()), Type::Map(Rc::new(Type::Dynamic), Rc::new(Type::Dynamic))))
    });
    define_builtin(env, "Set", variadic_type(), |_args| {
        Ok(Binder::new(Value::Set(Rc::new(RefCell::new(SetContainer::new()))), Type::Set(Rc::new(Type::Dynamic))))
    });
    define_builtin(env, "Graph", variadic_type(), |args| {
        let directed = match args.first() {
            None => false,
            Some(b) => match &b.value {
                Value::Bool(v) => *v,
                _ => return Err(EngineError::type_error("Graph(directed): argument must be boolean")),
            },
        };
        Ok(Binder::new(Value::Graph(Rc::new(RefCell::new(Graph::new(directed)))), Type::Graph(Rc::new(Type::Dynamic))))
    });
    define_builtin(env, "BinaryTree", variadic_type(), |_args| {
        Ok(Binder::new(Value::BinaryTree(Rc::new(RefCell::new(TreeContainer::new(false)))), Type::BinaryTree(Rc::new(Type::Dynamic))))
    });
    define_builtin(env, "AVLTree", variadic_type(), |_args| {
        Ok(Binder::new(Value::BinaryTree(Rc::new(RefCell::new(TreeContainer::new(true)))), Type::BinaryTree(Rc::new(Type::Dynamic))))
    });

    define_builtin(env, "int_min", variadic_type(), |args| numeric_reduce(args, "int_min", f64::min));
    define_builtin(env, "int_max", variadic_type(), |args| numeric_reduce(args, "int_max", f64::max));
    define_builtin(env, "float_min", variadic_type(), |args| numeric_reduce(args, "float_min", f64::min));
    define_builtin(env, "float_max", variadic_type(), |args| numeric_reduce(args, "float_max", f64::max));
    define_builtin(env, "int_abs", variadic_type(), |args| numeric_unary(args, "int_abs", f64::abs));
    define_builtin(env, "float_abs", variadic_type(), |args| numeric_unary(args, "float_abs", f64::abs));

    define_builtin(env, "len", variadic_type(), |args| match args {
        [b] => match &b.value {
            Value::Str(s) => Ok(Binder::int(s.chars().count() as i64)),
            _ => Err(EngineError::type_error("len(string) requires a string argument")),
        },
        _ => Err(EngineError::type_error("len expects exactly one argument")),
    });

    // Both constants surface the engine's single infinite-numeric sentinel;
    // `int` has no literal representation of infinity, so `int_inf` carries
    // the same IEEE-754 value as `float_inf` (see DESIGN.md).
    env.define("int_inf", Binder::float(f64::INFINITY));
    env.define("float_inf", Binder::float(f64::INFINITY));
}

/// `int_min`/`int_max`/`float_min`/`float_max`: variadic, numeric-only,
/// result stays `int` iff every argument was an int.
fn numeric_reduce(args: &[Binder], name: &str, pick: fn(f64, f64) -> f64) -> Result<Binder, EngineError> {
    if args.is_empty() {
        return Err(EngineError::type_error(format!("{name} requires at least one argument")));
    }
    let mut acc = args[0].as_f64().ok_or_else(|| EngineError::type_error(format!("{name} requires numeric arguments")))?;
    let mut all_int = matches!(args[0].value, Value::Int(_));
    for b in &args[1..] {
        let n = b.as_f64().ok_or_else(|| EngineError::type_error(format!("{name} requires numeric arguments")))?;
        acc = pick(acc, n);
        all_int &= matches!(b.value, Value::Int(_));
    }
    Ok(if all_int { Binder::int(acc as i64) } else { Binder::float(acc) })
}

fn numeric_unary(args: &[Binder], name: &str, f: fn(f64) -> f64) -> Result<Binder, EngineError> {
    let [b] = args else {
        return Err(EngineError::type_error(format!("{name} expects exactly one argument")));
    };
    match b.value {
        Value::Int(i) => Ok(Binder::int(f(i as f64) as i64)),
        Value::Float(v) => Ok(Binder::float(f(v))),
        _ => Err(EngineError::type_error(format!("{name} requires a numeric argument"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_appends_space_joined_line() {
        let env = Environment::new_global();
        let output = Rc::new(RefCell::new(Vec::new()));
        install(&env, output.clone());
        let print_fn = env.get("print").unwrap();
        let Value::Builtin(f) = &print_fn.value else { panic!("expected builtin") };
        (f.func)(&[Binder::int(1), Binder::string("x")]).unwrap();
        assert_eq!(output.borrow()[0], "1 x");
    }

    #[test]
    fn int_max_stays_int_float_max_promotes() {
        let env = Environment::new_global();
        install(&env, Rc::new(RefCell::new(Vec::new())));
        let Value::Builtin(f) = &env.get("int_max").unwrap().value else { panic!() };
        let r = (f.func)(&[Binder::int(3), Binder::int(7)]).unwrap();
        assert!(matches!(r.value, Value::Int(7)));

        let Value::Builtin(f2) = &env.get("int_max").unwrap().value else { panic!() };
        let r2 = (f2.func)(&[Binder::int(3), Binder::float(7.5)]).unwrap();
        assert!(matches!(r2.value, Value::Float(v) if v == 7.5));
    }

    #[test]
    fn len_requires_string() {
        let env = Environment::new_global();
        install(&env, Rc::new(RefCell::new(Vec::new())));
        let Value::Builtin(f) = &env.get("len").unwrap().value else { panic!() };
        assert_eq!((f.func)(&[Binder::string("hello")]).unwrap().as_f64(), Some(5.0));
        assert!((f.func)(&[Binder::int(1)]).is_err());
    }
}
