//! Tree-walking evaluator (spec.md §4.4) and the crate's public entry point.
//!
//! Grounded on the teacher's bytecode-VM dispatch split (`binary.rs`,
//! `compare.rs`, `call.rs`, `attr.rs`, `collections.rs`): one function per
//! concern (binary-operator dispatch, member/attribute dispatch, call
//! dispatch, container-method dispatch) rather than one giant match, even
//! though this engine walks the AST directly instead of executing bytecode.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::{
    AssignmentTarget, BinaryOperator, BlockStatement, Expression, Program, Statement, TypeAnnotation, UnaryOperator,
};
use crate::builtins;
use crate::containers::array::Array;
use crate::containers::lazy_range::LazyRange;
use crate::environment::Environment;
use crate::error::{EngineError, EngineResult};
use crate::limits::EngineLimits;
use crate::predicate::{self, CheckContext, Direction, Parity, Predicate, SortOrder};
use crate::trace::{EngineTracer, NoopTracer, TraceEvent};
use crate::types::{RuntimeKind, Type};
use crate::value::{Binder, PredicateThunk, UserFunction, Value};

/// How a statement or function body finished: ordinary fallthrough, or a
/// `return` unwinding with its value (spec.md §4.4 "Function application").
enum Flow {
    Normal,
    Return(Binder),
}

/// The library's single entry point, consumed by an external parser/driver
/// (SPEC_FULL.md §6 "Driver entry point").
pub struct Engine {
    limits: EngineLimits,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineLimits::default())
    }
}

impl Engine {
    #[must_use]
    pub fn new(limits: EngineLimits) -> Self {
        Self { limits }
    }

    /// Evaluates `program` against a fresh global environment, returning the
    /// ordered `print` outputs or the first unrecovered error.
    pub fn run(&self, program: &Program) -> EngineResult<Vec<String>> {
        self.run_traced(program, &mut NoopTracer)
    }

    /// As [`Engine::run`], but routes evaluator events through `tracer`.
    pub fn run_traced(&self, program: &Program, tracer: &mut dyn EngineTracer) -> EngineResult<Vec<String>> {
        let global = Environment::new_global();
        let output = Rc::new(RefCell::new(Vec::new()));
        builtins::install(&global, Rc::clone(&output));

        let mut interp = Interpreter { limits: self.limits, tracer, depth: 0 };
        let result = interp.eval_statements(&program.statements, &global);
        drop(global);
        result?;
        Ok(Rc::try_unwrap(output).map(RefCell::into_inner).unwrap_or_else(|rc| rc.borrow().clone()))
    }
}

struct Interpreter<'a> {
    limits: EngineLimits,
    tracer: &'a mut dyn EngineTracer,
    depth: usize,
}

/// One `@invariant` statement found lexically nested at body depth 0
/// (spec.md §4.4 rule a) — recursing into plain blocks/`if` branches but not
/// into nested loops or function bodies.
struct ExtractedInvariant<'a> {
    condition: &'a Expression,
    message: Option<&'a str>,
    line: u32,
    column: u32,
}

fn extract_invariants<'a>(body: &'a BlockStatement, out: &mut Vec<ExtractedInvariant<'a>>) {
    for stmt in &body.statements {
        match stmt {
            Statement::InvariantStatement { condition, message, line, column } => {
                out.push(ExtractedInvariant { condition, message: message.as_deref(), line: *line, column: *column });
            }
            Statement::Block(inner) => extract_invariants(inner, out),
            Statement::IfStatement { then_branch, else_branch, .. } => {
                extract_invariants(then_branch, out);
                if let Some(eb) = else_branch {
                    extract_invariants(eb, out);
                }
            }
            _ => {}
        }
    }
}

fn render_state_dump(env: &Environment) -> String {
    let mut lines = Vec::new();
    for (name, binder) in env.get_all_bindings() {
        if matches!(binder.value, Value::Function(_) | Value::Builtin(_)) {
            continue;
        }
        lines.push(format!("{name} = {}", binder.to_display_string()));
    }
    lines.join("\n")
}

fn resolve_type_annotation(ann: &TypeAnnotation) -> Type {
    match ann {
        TypeAnnotation::Simple { name } => match name.as_str() {
            "int" => Type::Int,
            "float" => Type::Float,
            "string" => Type::String,
            "boolean" => Type::Boolean,
            "void" => Type::Void,
            "weak" => Type::Weak,
            "range" => Type::Range,
            "predicate" => Type::Predicate,
            _ => Type::Dynamic,
        },
        TypeAnnotation::Generic { name, type_parameters } => {
            let params: Vec<Type> = type_parameters.iter().map(resolve_type_annotation).collect();
            match (name.as_str(), params.as_slice()) {
                ("array", [e]) => Type::Array(Rc::new(e.clone())),
                ("set", [e]) => Type::Set(Rc::new(e.clone())),
                ("map", [k, v]) => Type::Map(Rc::new(k.clone()), Rc::new(v.clone())),
                ("heap", [e]) => Type::Heap(Rc::new(e.clone())),
                ("heapmap", [k, v]) => Type::HeapMap(Rc::new(k.clone()), Rc::new(v.clone())),
                ("graph", [n]) => Type::Graph(Rc::new(n.clone())),
                ("binarytree" | "avltree", [e]) => Type::BinaryTree(Rc::new(e.clone())),
                _ => Type::Dynamic,
            }
        }
        TypeAnnotation::Function { parameter_types, return_type } => Type::Function {
            params: parameter_types.iter().map(resolve_type_annotation).collect::<Vec<_>>().into(),
            ret: Rc::new(resolve_type_annotation(return_type)),
            variadic: false,
        },
        TypeAnnotation::Tuple { element_types } => {
            Type::Tuple(element_types.iter().map(resolve_type_annotation).collect::<Vec<_>>().into())
        }
        TypeAnnotation::Record { field_types } => Type::Record(
            field_types.iter().map(|(n, t)| (n.clone(), resolve_type_annotation(t))).collect::<Vec<_>>().into(),
        ),
    }
}

fn runtime_kind_name(k: RuntimeKind) -> &'static str {
    match k {
        RuntimeKind::Int => "int",
        RuntimeKind::Float => "float",
        RuntimeKind::String => "string",
        RuntimeKind::Boolean => "boolean",
        RuntimeKind::Void => "void",
        RuntimeKind::Array => "array",
        RuntimeKind::Set => "set",
        RuntimeKind::Map => "map",
        RuntimeKind::Heap => "heap",
        RuntimeKind::HeapMap => "heapmap",
        RuntimeKind::Graph => "graph",
        RuntimeKind::BinaryTree => "binarytree",
        RuntimeKind::Range => "range",
        RuntimeKind::Tuple => "tuple",
        RuntimeKind::Record => "record",
        RuntimeKind::Function => "function",
        RuntimeKind::Predicate => "predicate",
    }
}

fn array_of(items: Vec<Binder>) -> Binder {
    let elem_type = items.first().and_then(|b| b.ty.static_type.clone()).unwrap_or(Type::Weak);
    Binder::new(Value::Array(Rc::new(RefCell::new(Array::from_vec(items)))), Type::Array(Rc::new(elem_type)))
}

fn tuple_binder(items: Vec<Binder>) -> Binder {
    let elem_types: Vec<Type> = items.iter().map(|b| b.ty.static_type.clone().unwrap_or(Type::Dynamic)).collect();
    Binder::new(Value::Tuple(Rc::new(items)), Type::Tuple(elem_types.into()))
}

fn record_binder(fields: Vec<(&'static str, Binder)>) -> Binder {
    let field_types: Vec<(String, Type)> =
        fields.iter().map(|(n, b)| ((*n).to_string(), b.ty.static_type.clone().unwrap_or(Type::Dynamic))).collect();
    let mut map = indexmap::IndexMap::new();
    for (n, b) in fields {
        map.insert(n.to_string(), b);
    }
    Binder::new(Value::Record(Rc::new(RefCell::new(map))), Type::Record(field_types.into()))
}

fn expect_arg<'a>(args: &'a [Binder], i: usize, name: &str) -> EngineResult<&'a Binder> {
    args.get(i).ok_or_else(|| EngineError::type_error(format!("@{name}: missing argument {i}")))
}

fn expect_int_arg(args: &[Binder], i: usize, name: &str) -> EngineResult<i64> {
    match expect_arg(args, i, name)?.value {
        Value::Int(v) => Ok(v),
        _ => Err(EngineError::type_error(format!("@{name}: argument {i} must be an int"))),
    }
}

fn expect_usize_arg(args: &[Binder], i: usize, name: &str) -> EngineResult<usize> {
    let v = expect_int_arg(args, i, name)?;
    usize::try_from(v).map_err(|_| EngineError::type_error(format!("@{name}: argument {i} must be non-negative")))
}

fn expect_num_arg(args: &[Binder], i: usize, name: &str) -> EngineResult<f64> {
    expect_arg(args, i, name)?.as_f64().ok_or_else(|| EngineError::type_error(format!("@{name}: argument {i} must be numeric")))
}

fn expect_bool_arg_or(args: &[Binder], i: usize, default: bool) -> EngineResult<bool> {
    match args.get(i) {
        None => Ok(default),
        Some(b) => match b.value {
            Value::Bool(v) => Ok(v),
            _ => Err(EngineError::type_error(format!("argument {i} must be boolean"))),
        },
    }
}

fn expect_str_arg(args: &[Binder], i: usize, name: &str) -> EngineResult<String> {
    match &expect_arg(args, i, name)?.value {
        Value::Str(s) => Ok(s.to_string()),
        _ => Err(EngineError::type_error(format!("@{name}: argument {i} must be a string"))),
    }
}

fn expect_array_arg(args: &[Binder], i: usize, name: &str) -> EngineResult<Vec<Binder>> {
    match &expect_arg(args, i, name)?.value {
        Value::Array(a) => Ok(a.borrow().items.clone()),
        _ => Err(EngineError::type_error(format!("@{name}: argument {i} must be an array"))),
    }
}

fn expect_set_arg(args: &[Binder], i: usize, name: &str) -> EngineResult<Vec<Binder>> {
    match &expect_arg(args, i, name)?.value {
        Value::Set(s) => Ok(s.borrow().to_array()),
        Value::Array(a) => Ok(a.borrow().items.clone()),
        _ => Err(EngineError::type_error(format!("@{name}: argument {i} must be a set"))),
    }
}

fn expect_direction_arg(args: &[Binder], i: usize, name: &str) -> EngineResult<Direction> {
    match expect_str_arg(args, i, name)?.as_str() {
        "increasing" => Ok(Direction::Increasing),
        "decreasing" => Ok(Direction::Decreasing),
        _ => Err(EngineError::type_error(format!("@{name}: direction must be 'increasing' or 'decreasing'"))),
    }
}

/// Parses a predicate name plus already-evaluated argument binders into a
/// `Predicate` (spec.md §4.5 taxonomy).
fn build_predicate(name: &str, args: &[Binder]) -> EngineResult<Predicate> {
    match name {
        "int_range" => Ok(Predicate::IntRange { min: expect_int_arg(args, 0, name)?, max: expect_int_arg(args, 1, name)? }),
        "positive" => Ok(Predicate::Positive { strict: expect_bool_arg_or(args, 0, false)? }),
        "negative" => Ok(Predicate::Negative { strict: expect_bool_arg_or(args, 0, false)? }),
        "greater_than" => Ok(Predicate::GreaterThan { threshold: expect_num_arg(args, 0, name)? }),
        "greater_equal_than" => Ok(Predicate::GreaterEqualThan { threshold: expect_num_arg(args, 0, name)? }),
        "divisible_by" => Ok(Predicate::DivisibleBy { divisor: expect_int_arg(args, 0, name)? }),
        "parity" => match expect_str_arg(args, 0, name)?.as_str() {
            "even" => Ok(Predicate::Parity(Parity::Even)),
            "odd" => Ok(Predicate::Parity(Parity::Odd)),
            _ => Err(EngineError::type_error("@parity expects 'even' or 'odd'")),
        },
        "size_range" => Ok(Predicate::SizeRange { min: expect_usize_arg(args, 0, name)?, max: expect_usize_arg(args, 1, name)? }),
        "size_equals" => Ok(Predicate::SizeEquals { n: expect_usize_arg(args, 0, name)? }),
        "non_empty" => Ok(Predicate::NonEmpty),
        "sorted" => match expect_str_arg(args, 0, name)?.as_str() {
            "asc" => Ok(Predicate::Sorted(SortOrder::Asc)),
            "desc" => Ok(Predicate::Sorted(SortOrder::Desc)),
            _ => Err(EngineError::type_error("@sorted expects 'asc' or 'desc'")),
        },
        "unique_elements" => Ok(Predicate::UniqueElements),
        "is_permutation_of" => Ok(Predicate::IsPermutationOf { original: expect_array_arg(args, 0, name)? }),
        "not" => Ok(Predicate::Not(Box::new(predicate_from_binder(expect_arg(args, 0, name)?)?))),
        "range_satisfies" => Ok(Predicate::RangeSatisfies {
            from: expect_usize_arg(args, 0, name)?,
            to: expect_usize_arg(args, 1, name)?,
            inner: Box::new(predicate_from_binder(expect_arg(args, 2, name)?)?),
        }),
        "all_elements_satisfy" => {
            Ok(Predicate::AllElementsSatisfy { inner: Box::new(predicate_from_binder(expect_arg(args, 0, name)?)?) })
        }
        "monotonic" => Ok(Predicate::Monotonic {
            direction: expect_direction_arg(args, 0, name)?,
            strict: expect_bool_arg_or(args, 1, true)?,
        }),
        "size_monotonic" => Ok(Predicate::SizeMonotonic {
            direction: expect_direction_arg(args, 0, name)?,
            strict: expect_bool_arg_or(args, 1, true)?,
        }),
        "all_weights_non_negative" => Ok(Predicate::AllWeightsNonNegative),
        "no_negative_cycles" => Ok(Predicate::NoNegativeCycles),
        "distance_to_self_zero" => Ok(Predicate::DistanceToSelfZero),
        "triangle_inequality" => Ok(Predicate::TriangleInequality),
        "subset_of" => Ok(Predicate::SubsetOf { other: expect_set_arg(args, 0, name)? }),
        "disjoint_from" => Ok(Predicate::DisjointFrom { other: expect_set_arg(args, 0, name)? }),
        _ => Err(EngineError::type_error(format!("unknown predicate '@{name}'"))),
    }
}

/// `not`/`range_satisfies`/`all_elements_satisfy` accept either a bare
/// predicate name (string) or an already-built predicate value (spec.md §9
/// "Meta-predicate composition").
fn predicate_from_binder(b: &Binder) -> EngineResult<Predicate> {
    match &b.value {
        Value::Str(s) => build_predicate(s, &[]),
        Value::Predicate(thunk) => build_predicate(&thunk.name, &thunk.args),
        _ => Err(EngineError::type_error("expected a predicate name or predicate value")),
    }
}

/// Generates the odometer-style lexicographic string range (spec.md §4.4
/// "Range expressions"), capped by `limits.max_string_range_steps`.
fn string_odometer_range(start: &str, end: &str, inclusive: bool, limits: &EngineLimits) -> EngineResult<Vec<String>> {
    if start.chars().count() != end.chars().count() {
        return Err(EngineError::type_error("string range endpoints must have equal length"));
    }
    if start.chars().count() == 1 {
        let s = start.chars().next().unwrap() as u32;
        let e = end.chars().next().unwrap() as u32;
        if s > e {
            return Ok(Vec::new());
        }
        let upper = if inclusive { e } else { e.saturating_sub(1) };
        if upper < s {
            return Ok(Vec::new());
        }
        if (upper - s + 1) as usize > limits.max_string_range_steps {
            return Err(EngineError::resource_limit("string range exceeds maximum step count"));
        }
        return Ok((s..=upper).filter_map(char::from_u32).map(String::from).collect());
    }

    let mut bytes: Vec<u8> = start.bytes().collect();
    let end_bytes: Vec<u8> = end.bytes().collect();
    let mut out = Vec::new();
    loop {
        if bytes == end_bytes {
            if inclusive {
                out.push(String::from_utf8_lossy(&bytes).into_owned());
            }
            break;
        }
        out.push(String::from_utf8_lossy(&bytes).into_owned());
        if out.len() > limits.max_string_range_steps {
            return Err(EngineError::resource_limit("string range exceeds maximum step count"));
        }
        let mut i = bytes.len();
        let mut overflowed = true;
        while i > 0 {
            i -= 1;
            if bytes[i] == u8::MAX {
                bytes[i] = 0;
                continue;
            }
            bytes[i] += 1;
            overflowed = false;
            break;
        }
        if overflowed {
            break;
        }
    }
    Ok(out)
}

impl<'a> Interpreter<'a> {
    fn eval_statements(&mut self, stmts: &[Statement], env: &Environment) -> EngineResult<Flow> {
        for stmt in stmts {
            match self.eval_statement(stmt, env)? {
                Flow::Normal => {}
                ret @ Flow::Return(_) => return Ok(ret),
            }
        }
        Ok(Flow::Normal)
    }

    fn eval_block(&mut self, block: &BlockStatement, env: &Environment) -> EngineResult<Flow> {
        self.eval_statements(&block.statements, env)
    }

    fn check_condition(&mut self, condition: &Expression, message: Option<&str>, line: u32, column: u32, env: &Environment) -> EngineResult<()> {
        let v = self.eval_expr(condition, env)?;
        let Value::Bool(b) = v.value else {
            return Err(EngineError::type_error("invariant/assert condition must be boolean").with_loc(line, column));
        };
        if b {
            self.tracer.on_event(TraceEvent::CheckPassed);
            Ok(())
        } else {
            let msg = message.unwrap_or("invariant/assertion failed").to_string();
            self.tracer.on_event(TraceEvent::CheckFailed { message: msg.clone() });
            Err(EngineError::predicate_violation(msg, render_state_dump(env)).with_loc(line, column))
        }
    }

    fn check_invariants(&mut self, invariants: &[ExtractedInvariant<'_>], env: &Environment) -> EngineResult<()> {
        for inv in invariants {
            self.check_condition(inv.condition, inv.message, inv.line, inv.column, env)?;
        }
        Ok(())
    }

    fn eval_statement(&mut self, stmt: &Statement, env: &Environment) -> EngineResult<Flow> {
        match stmt {
            Statement::ExpressionStatement { expression } => {
                self.eval_expr(expression, env)?;
                Ok(Flow::Normal)
            }
            Statement::ReturnStatement { value } => {
                let v = match value {
                    Some(e) => self.eval_expr(e, env)?,
                    None => Binder::void(),
                };
                Ok(Flow::Return(v))
            }
            Statement::VariableDeclaration { declarations } => {
                for decl in declarations {
                    let mut value = match &decl.initializer {
                        Some(e) => self.eval_expr(e, env)?,
                        None => Binder::void(),
                    };
                    if let Some(ann) = &decl.type_annotation {
                        value.ty.static_type = Some(resolve_type_annotation(ann));
                    }
                    env.define(&decl.name, value);
                }
                Ok(Flow::Normal)
            }
            Statement::AssignmentStatement { target, value } => {
                let v = self.eval_expr(value, env)?;
                self.assign(target, v, env)?;
                Ok(Flow::Normal)
            }
            Statement::IfStatement { condition, then_branch, else_branch } => {
                let cond = self.eval_expr(condition, env)?;
                let Value::Bool(b) = cond.value else {
                    return Err(EngineError::type_error("if condition must be boolean"));
                };
                if b {
                    self.eval_block(then_branch, &env.child())
                } else if let Some(eb) = else_branch {
                    self.eval_block(eb, &env.child())
                } else {
                    Ok(Flow::Normal)
                }
            }
            Statement::Block(b) => self.eval_block(b, &env.child()),
            Statement::WhileStatement { condition, body } => self.eval_while_until(condition, body, false, env),
            Statement::UntilStatement { condition, body } => self.eval_while_until(condition, body, true, env),
            Statement::ForStatement { variable, iterable, body } => self.eval_for(variable, iterable, body, env),
            Statement::FunctionDeclaration { name, parameters, return_type, body } => {
                let params: Vec<String> = parameters.iter().map(|p| p.name.clone()).collect();
                let func = UserFunction { name: Some(name.clone()), params, variadic: false, body: body.clone(), closure: env.clone() };
                let ty = Type::Function {
                    params: parameters.iter().map(|p| resolve_type_annotation(&p.type_annotation)).collect::<Vec<_>>().into(),
                    ret: Rc::new(resolve_type_annotation(return_type)),
                    variadic: false,
                };
                env.define(name, Binder::new(Value::Function(Rc::new(func)), ty));
                Ok(Flow::Normal)
            }
            Statement::InvariantStatement { condition, message, line, column } => {
                self.check_condition(condition, message.as_deref(), *line, *column, env)?;
                Ok(Flow::Normal)
            }
            Statement::AssertStatement { condition, message, line, column } => {
                self.check_condition(condition, message.as_deref(), *line, *column, env)?;
                Ok(Flow::Normal)
            }
        }
    }

    /// Shared by `while`/`until` (spec.md §4.4 rules a-g).
    fn eval_while_until(&mut self, condition: &Expression, body: &BlockStatement, until: bool, env: &Environment) -> EngineResult<Flow> {
        let mut invariants = Vec::new();
        extract_invariants(body, &mut invariants);
        let mut tracker = crate::tracker::Tracker::new();
        tracker.record(env);
        self.tracer.on_event(TraceEvent::LoopEnter);

        let mut iteration = 0usize;
        loop {
            let cond = self.eval_expr(condition, env)?;
            let Value::Bool(cond_val) = cond.value else {
                return Err(EngineError::type_error("loop condition must be boolean"));
            };
            if cond_val == until {
                break;
            }

            self.check_invariants(&invariants, env)?;
            let body_env = env.child();
            let flow = self.eval_block(body, &body_env)?;

            tracker.record(env);
            self.tracer.on_event(TraceEvent::LoopIteration { iteration });
            self.check_invariants(&invariants, env)?;

            if let Flow::Return(v) = flow {
                self.check_invariants(&invariants, env)?;
                return Ok(Flow::Return(v));
            }
            iteration += 1;
        }

        let refined = tracker.synthesize_and_attach(env);
        self.tracer.on_event(TraceEvent::LoopExit { refined_vars: refined });
        Ok(Flow::Normal)
    }

    fn eval_for(&mut self, variable: &str, iterable: &Expression, body: &BlockStatement, env: &Environment) -> EngineResult<Flow> {
        let iter_val = self.eval_expr(iterable, env)?;
        let mut invariants = Vec::new();
        extract_invariants(body, &mut invariants);
        let mut tracker = crate::tracker::Tracker::new();
        tracker.record(env);
        self.tracer.on_event(TraceEvent::LoopEnter);

        let items: Vec<Binder> = match &iter_val.value {
            Value::Array(a) => a.borrow().items.clone(),
            Value::Set(s) => s.borrow().to_array(),
            Value::Map(m) => m.borrow().keys().collect(),
            Value::Range(r) => r.generate().map(Binder::int).collect::<Vec<_>>(),
            _ => return Err(EngineError::type_error("for-loop iterable must be an array, set, map, or range")),
        };

        for (iteration, item) in items.into_iter().enumerate() {
            let iter_env = env.child();
            iter_env.define(variable, item);

            self.check_invariants(&invariants, &iter_env)?;
            let flow = self.eval_block(body, &iter_env)?;

            tracker.record(&iter_env);
            self.tracer.on_event(TraceEvent::LoopIteration { iteration });
            self.check_invariants(&invariants, &iter_env)?;

            if let Flow::Return(v) = flow {
                self.check_invariants(&invariants, &iter_env)?;
                return Ok(Flow::Return(v));
            }
        }

        let refined = tracker.synthesize_and_attach(env);
        self.tracer.on_event(TraceEvent::LoopExit { refined_vars: refined });
        Ok(Flow::Normal)
    }

    fn assign(&mut self, target: &AssignmentTarget, value: Binder, env: &Environment) -> EngineResult<()> {
        match target {
            AssignmentTarget::Identifier { name } => env.set(name, value),
            AssignmentTarget::Member { object, property } => {
                let obj = self.eval_expr(object, env)?;
                match &obj.value {
                    Value::Map(m) => {
                        m.borrow_mut().set(Binder::string(property.as_str()), value);
                        Ok(())
                    }
                    Value::Record(fields) => {
                        fields.borrow_mut().insert(property.clone(), value);
                        Ok(())
                    }
                    _ => Err(EngineError::type_error("'.prop =' requires a map or record")),
                }
            }
            AssignmentTarget::Index { object, index } => {
                let obj = self.eval_expr(object, env)?;
                let idx = self.eval_expr(index, env)?;
                match (&obj.value, &idx.value) {
                    (Value::Array(a), Value::Int(i)) => a.borrow_mut().set(*i, value),
                    (Value::Map(m), _) => {
                        m.borrow_mut().set(idx, value);
                        Ok(())
                    }
                    _ => Err(EngineError::type_error("'[i] =' requires array+int or map+any")),
                }
            }
        }
    }

    fn eval_expr(&mut self, expr: &Expression, env: &Environment) -> EngineResult<Binder> {
        match expr {
            Expression::IntegerLiteral { value } => Ok(Binder::int(*value)),
            Expression::FloatLiteral { value } => Ok(Binder::float(*value)),
            Expression::StringLiteral { value } => Ok(Binder::string(value.as_str())),
            Expression::BooleanLiteral { value } => Ok(Binder::boolean(*value)),
            Expression::ArrayLiteral { elements } => {
                let items: Vec<Binder> = elements.iter().map(|e| self.eval_expr(e, env)).collect::<Result<_, _>>()?;
                Ok(array_of(items))
            }
            Expression::Identifier { name } => env.get(name),
            Expression::MetaIdentifier { name } => {
                Ok(Binder::new(Value::Predicate(Rc::new(PredicateThunk { name: name.clone(), args: Vec::new() })), Type::Predicate))
            }
            Expression::UnaryExpression { operator, operand } => {
                let v = self.eval_expr(operand, env)?;
                match (operator, &v.value) {
                    (UnaryOperator::Neg, Value::Int(i)) => Ok(Binder::int(-i)),
                    (UnaryOperator::Neg, Value::Float(f)) => Ok(Binder::float(-f)),
                    (UnaryOperator::Neg, _) => Err(EngineError::type_error("unary '-' requires a numeric operand")),
                    (UnaryOperator::Not, Value::Bool(b)) => Ok(Binder::boolean(!b)),
                    (UnaryOperator::Not, _) => Err(EngineError::type_error("unary '!' requires a boolean operand")),
                }
            }
            Expression::BinaryExpression { operator, left, right, line, column } => {
                self.eval_binary_expr(*operator, left, right, *line, *column, env)
            }
            Expression::CallExpression { callee, arguments } => self.eval_call(callee, arguments, env),
            Expression::MemberExpression { object, property } => {
                let obj = self.eval_expr(object, env)?;
                self.call_method(&obj, &property.name, &[])
            }
            Expression::IndexExpression { object, index } => {
                let obj = self.eval_expr(object, env)?;
                let idx = self.eval_expr(index, env)?;
                eval_index(&obj, &idx)
            }
            Expression::RangeExpression { start, end, inclusive } => self.eval_range(start, end, *inclusive, env),
            Expression::PredicateCheckExpression { subject, predicate_name, predicate_args } => {
                let subj = self.eval_expr(subject, env)?;
                let args: Vec<Binder> = predicate_args.iter().map(|e| self.eval_expr(e, env)).collect::<Result<_, _>>()?;
                let pred = build_predicate(predicate_name, &args)?;
                let result = predicate::check(&pred, &CheckContext::standalone(&subj))?;
                Ok(Binder::boolean(result))
            }
            Expression::TypeOfExpression { operand } => {
                let v = self.eval_expr(operand, env)?;
                Ok(Binder::string(runtime_kind_name(v.actual_runtime_kind())))
            }
        }
    }

    fn eval_binary_expr(
        &mut self,
        operator: BinaryOperator,
        left: &Expression,
        right: &Expression,
        line: u32,
        column: u32,
        env: &Environment,
    ) -> EngineResult<Binder> {
        match operator {
            BinaryOperator::And => {
                let l = self.eval_expr(left, env)?;
                let Value::Bool(lb) = l.value else {
                    return Err(EngineError::type_error("'&&' requires boolean operands").with_loc(line, column));
                };
                if !lb {
                    return Ok(Binder::boolean(false));
                }
                let r = self.eval_expr(right, env)?;
                let Value::Bool(rb) = r.value else {
                    return Err(EngineError::type_error("'&&' requires boolean operands").with_loc(line, column));
                };
                Ok(Binder::boolean(rb))
            }
            BinaryOperator::Or => {
                let l = self.eval_expr(left, env)?;
                let Value::Bool(lb) = l.value else {
                    return Err(EngineError::type_error("'||' requires boolean operands").with_loc(line, column));
                };
                if lb {
                    return Ok(Binder::boolean(true));
                }
                let r = self.eval_expr(right, env)?;
                let Value::Bool(rb) = r.value else {
                    return Err(EngineError::type_error("'||' requires boolean operands").with_loc(line, column));
                };
                Ok(Binder::boolean(rb))
            }
            _ => {
                let l = self.eval_expr(left, env)?;
                let r = self.eval_expr(right, env)?;
                eval_binary(operator, &l, &r).map_err(|e| e.with_loc(line, column))
            }
        }
    }

    fn eval_call(&mut self, callee: &Expression, arguments: &[Expression], env: &Environment) -> EngineResult<Binder> {
        match callee {
            Expression::MetaIdentifier { name } => {
                let args: Vec<Binder> = arguments.iter().map(|a| self.eval_expr(a, env)).collect::<Result<_, _>>()?;
                Ok(Binder::new(Value::Predicate(Rc::new(PredicateThunk { name: name.clone(), args })), Type::Predicate))
            }
            Expression::MemberExpression { object, property } => {
                let obj = self.eval_expr(object, env)?;
                let args: Vec<Binder> = arguments.iter().map(|a| self.eval_expr(a, env)).collect::<Result<_, _>>()?;
                self.call_method(&obj, &property.name, &args)
            }
            _ => {
                let callee_val = self.eval_expr(callee, env)?;
                let args: Vec<Binder> = arguments.iter().map(|a| self.eval_expr(a, env)).collect::<Result<_, _>>()?;
                self.apply(&callee_val, &args)
            }
        }
    }

    fn apply(&mut self, callee: &Binder, args: &[Binder]) -> EngineResult<Binder> {
        match &callee.value {
            Value::Builtin(b) => (b.func)(args),
            Value::Function(f) => {
                self.depth += 1;
                if self.depth > self.limits.max_recursion_depth {
                    self.depth -= 1;
                    return Err(EngineError::resource_limit("maximum recursion depth exceeded"));
                }
                self.tracer.on_event(TraceEvent::Call { name: f.name.clone().unwrap_or_default(), depth: self.depth });

                let call_env = f.closure.child();
                if args.len() != f.params.len() {
                    self.depth -= 1;
                    return Err(EngineError::type_error(format!(
                        "function expects {} argument(s), got {}",
                        f.params.len(),
                        args.len()
                    )));
                }
                for (p, a) in f.params.iter().zip(args) {
                    call_env.define(p, a.clone());
                }

                let flow = self.eval_statements(&f.body.statements, &call_env);
                self.depth -= 1;
                match flow? {
                    Flow::Return(v) => Ok(v),
                    Flow::Normal => Ok(Binder::void()),
                }
            }
            _ => Err(EngineError::type_error("value is not callable")),
        }
    }

    fn eval_range(&mut self, start: &Option<Box<Expression>>, end: &Option<Box<Expression>>, inclusive: bool, env: &Environment) -> EngineResult<Binder> {
        let Some(start_expr) = start else {
            return Err(EngineError::type_error("range expression requires a start bound"));
        };
        let start_v = self.eval_expr(start_expr, env)?;
        let end_v = match end {
            Some(e) => Some(self.eval_expr(e, env)?),
            None => None,
        };
        match (&start_v.value, end_v.as_ref().map(|b| &b.value)) {
            (Value::Int(s), Some(Value::Int(e))) => {
                let end_excl = if inclusive { e + 1 } else { *e };
                let items: Vec<Binder> = (*s..end_excl).map(Binder::int).collect();
                Ok(Binder::new(Value::Array(Rc::new(RefCell::new(Array::from_vec(items)))), Type::Array(Rc::new(Type::Int))))
            }
            (Value::Int(s), None) => Ok(Binder::new(Value::Range(Rc::new(LazyRange::new(*s, None, inclusive))), Type::Range)),
            (Value::Str(s), Some(Value::Str(e))) => {
                let strs = string_odometer_range(s, e, inclusive, &self.limits)?;
                Ok(array_of(strs.into_iter().map(Binder::string).collect()))
            }
            _ => Err(EngineError::type_error("range endpoints must both be int (end optional) or equal-length strings")),
        }
    }

    fn call_method(&mut self, obj: &Binder, method: &str, args: &[Binder]) -> EngineResult<Binder> {
        match &obj.value {
            Value::Array(a) => match method {
                "len" | "length" => Ok(Binder::int(a.borrow().len() as i64)),
                "get" => Ok(a.borrow().get(expect_int_arg(args, 0, "get")?).unwrap_or_else(Binder::void)),
                "set" => {
                    let idx = expect_int_arg(args, 0, "set")?;
                    a.borrow_mut().set(idx, expect_arg(args, 1, "set")?.clone())?;
                    Ok(Binder::void())
                }
                "push" => {
                    a.borrow_mut().push(expect_arg(args, 0, "push")?.clone());
                    Ok(Binder::void())
                }
                "pop" => a.borrow_mut().pop(),
                "forEach" => {
                    let items = a.borrow().items.clone();
                    let f = expect_arg(args, 0, "forEach")?.clone();
                    for item in items {
                        self.apply(&f, &[item])?;
                    }
                    Ok(Binder::void())
                }
                "toString" => Ok(Binder::string(obj.to_display_string())),
                _ => Err(EngineError::type_error(format!("array has no method '{method}'"))),
            },
            Value::Map(m) => match method {
                "get" => Ok(m.borrow().get(expect_arg(args, 0, "get")?).unwrap_or_else(Binder::void)),
                "set" => {
                    m.borrow_mut().set(expect_arg(args, 0, "set")?.clone(), expect_arg(args, 1, "set")?.clone());
                    Ok(Binder::void())
                }
                "has" => Ok(Binder::boolean(m.borrow().has(expect_arg(args, 0, "has")?))),
                "delete" => Ok(Binder::boolean(m.borrow_mut().delete(expect_arg(args, 0, "delete")?))),
                "size" => Ok(Binder::int(m.borrow().size() as i64)),
                "keys" => Ok(array_of(m.borrow().keys().collect())),
                "values" => Ok(array_of(m.borrow().values().collect())),
                "entries" => Ok(array_of(m.borrow().entries().map(|(k, v)| tuple_binder(vec![k, v])).collect())),
                "forEach" => {
                    let entries: Vec<(Binder, Binder)> = m.borrow().entries().collect();
                    let f = expect_arg(args, 0, "forEach")?.clone();
                    for (k, v) in entries {
                        self.apply(&f, &[k, v])?;
                    }
                    Ok(Binder::void())
                }
                "toString" => Ok(Binder::string(obj.to_display_string())),
                _ => Err(EngineError::type_error(format!("map has no method '{method}'"))),
            },
            Value::Set(s) => match method {
                "add" => Ok(Binder::boolean(s.borrow_mut().add(expect_arg(args, 0, "add")?.clone()))),
                "has" => Ok(Binder::boolean(s.borrow().has(expect_arg(args, 0, "has")?))),
                "delete" => Ok(Binder::boolean(s.borrow_mut().delete(expect_arg(args, 0, "delete")?))),
                "size" => Ok(Binder::int(s.borrow().size() as i64)),
                "toArray" => Ok(array_of(s.borrow().to_array())),
                "forEach" => {
                    let items = s.borrow().to_array();
                    let f = expect_arg(args, 0, "forEach")?.clone();
                    for item in items {
                        self.apply(&f, &[item])?;
                    }
                    Ok(Binder::void())
                }
                "toString" => Ok(Binder::string(obj.to_display_string())),
                _ => Err(EngineError::type_error(format!("set has no method '{method}'"))),
            },
            Value::Heap(h) => match method {
                "push" => {
                    h.borrow_mut().push(expect_arg(args, 0, "push")?.clone());
                    Ok(Binder::void())
                }
                "pop" => h.borrow_mut().pop(),
                "peek" => Ok(h.borrow().peek().unwrap_or_else(Binder::void)),
                "size" => Ok(Binder::int(h.borrow().size() as i64)),
                "isEmpty" => Ok(Binder::boolean(h.borrow().is_empty())),
                "toString" => Ok(Binder::string(obj.to_display_string())),
                _ => Err(EngineError::type_error(format!("heap has no method '{method}'"))),
            },
            Value::HeapMap(h) => match method {
                "push" => {
                    h.borrow_mut().push(expect_arg(args, 0, "push")?.clone(), expect_arg(args, 1, "push")?.clone());
                    Ok(Binder::void())
                }
                "pop" => {
                    let (k, p) = h.borrow_mut().pop()?;
                    Ok(tuple_binder(vec![k, p]))
                }
                "has" => Ok(Binder::boolean(h.borrow().has(expect_arg(args, 0, "has")?))),
                "getPriority" => Ok(h.borrow().get_priority(expect_arg(args, 0, "getPriority")?).unwrap_or_else(Binder::void)),
                "updatePriority" => {
                    h.borrow_mut().update_priority(expect_arg(args, 0, "updatePriority")?, expect_arg(args, 1, "updatePriority")?.clone())?;
                    Ok(Binder::void())
                }
                "delete" => Ok(Binder::boolean(h.borrow_mut().delete(expect_arg(args, 0, "delete")?))),
                "entries" => Ok(array_of(h.borrow().entries().map(|(k, v)| tuple_binder(vec![k, v])).collect())),
                "clear" => {
                    h.borrow_mut().clear();
                    Ok(Binder::void())
                }
                "size" => Ok(Binder::int(h.borrow().size() as i64)),
                "toString" => Ok(Binder::string(obj.to_display_string())),
                _ => Err(EngineError::type_error(format!("heap map has no method '{method}'"))),
            },
            Value::Graph(g) => match method {
                "addVertex" => {
                    g.borrow_mut().add_vertex(expect_arg(args, 0, "addVertex")?.clone());
                    Ok(Binder::void())
                }
                "addEdge" => {
                    let from = expect_arg(args, 0, "addEdge")?.clone();
                    let to = expect_arg(args, 1, "addEdge")?.clone();
                    g.borrow_mut().add_edge(from, to, args.get(2))?;
                    Ok(Binder::void())
                }
                "hasVertex" => Ok(Binder::boolean(g.borrow().has_vertex(expect_arg(args, 0, "hasVertex")?))),
                "hasEdge" => Ok(Binder::boolean(g.borrow().has_edge(expect_arg(args, 0, "hasEdge")?, expect_arg(args, 1, "hasEdge")?))),
                "isDirected" => Ok(Binder::boolean(g.borrow().is_directed())),
                "getVertices" => Ok(array_of(g.borrow().get_vertices().collect())),
                "getNeighbors" => {
                    let nbrs = g.borrow().get_neighbors(expect_arg(args, 0, "getNeighbors")?);
                    Ok(array_of(nbrs.into_iter().map(|n| record_binder(vec![("to", n.to), ("weight", Binder::float(n.weight))])).collect()))
                }
                "getEdgeWeight" => {
                    Ok(Binder::float(g.borrow().get_edge_weight(expect_arg(args, 0, "getEdgeWeight")?, expect_arg(args, 1, "getEdgeWeight")?)?))
                }
                "getEdges" => {
                    let edges = g.borrow().get_edges();
                    Ok(array_of(
                        edges
                            .into_iter()
                            .map(|e| record_binder(vec![("from", e.from), ("to", e.to), ("weight", Binder::float(e.weight))]))
                            .collect(),
                    ))
                }
                "toString" => Ok(Binder::string(obj.to_display_string())),
                _ => Err(EngineError::type_error(format!("graph has no method '{method}'"))),
            },
            Value::BinaryTree(t) => match method {
                "insert" => {
                    t.borrow_mut().insert(expect_arg(args, 0, "insert")?.clone())?;
                    Ok(Binder::void())
                }
                "search" => Ok(Binder::boolean(t.borrow().search(expect_arg(args, 0, "search")?)?)),
                "inOrderTraversal" => Ok(array_of(t.borrow().in_order())),
                "preOrderTraversal" => Ok(array_of(t.borrow().pre_order())),
                "postOrderTraversal" => Ok(array_of(t.borrow().post_order())),
                "getHeight" => Ok(Binder::int(i64::from(t.borrow().get_height()))),
                "toString" => Ok(Binder::string(obj.to_display_string())),
                _ => Err(EngineError::type_error(format!("tree has no method '{method}'"))),
            },
            Value::Range(r) => match method {
                "isInfinite" => Ok(Binder::boolean(r.is_infinite())),
                "toArray" => Ok(array_of(r.to_array()?.into_iter().map(Binder::int).collect())),
                "generate" => Ok(obj.clone()),
                "toString" => Ok(Binder::string(obj.to_display_string())),
                _ => Err(EngineError::type_error(format!("range has no method '{method}'"))),
            },
            _ if method == "toString" => Ok(Binder::string(obj.to_display_string())),
            _ => Err(EngineError::type_error(format!("{} has no method '{method}'", runtime_kind_name(obj.actual_runtime_kind())))),
        }
    }
}

fn eval_index(obj: &Binder, idx: &Binder) -> EngineResult<Binder> {
    match &obj.value {
        Value::Array(a) => match &idx.value {
            Value::Int(i) => Ok(a.borrow().get(*i).unwrap_or_else(Binder::void)),
            Value::Array(idxs) => {
                let items = a.borrow();
                let out: Vec<Binder> =
                    idxs.borrow().items.iter().filter_map(|ib| if let Value::Int(i) = ib.value { items.get(i) } else { None }).collect();
                Ok(array_of(out))
            }
            Value::Range(r) => {
                let items = a.borrow();
                let len = items.len() as i64;
                let start = r.start.clamp(0, len);
                let end_excl = match r.end {
                    Some(e) => (if r.inclusive { e + 1 } else { e }).clamp(0, len),
                    None => len,
                };
                let slice = if start < end_excl { items.items[start as usize..end_excl as usize].to_vec() } else { Vec::new() };
                Ok(array_of(slice))
            }
            _ => Err(EngineError::type_error("array index must be int, array of int, or range")),
        },
        Value::Map(m) => Ok(m.borrow().get(idx).unwrap_or_else(Binder::void)),
        Value::Tuple(items) => match idx.value {
            Value::Int(i) if i >= 0 && (i as usize) < items.len() => Ok(items[i as usize].clone()),
            Value::Int(_) => Err(EngineError::container_error("tuple index out of bounds")),
            _ => Err(EngineError::type_error("tuple index must be an int")),
        },
        Value::Record(fields) => match &idx.value {
            Value::Str(s) => fields.borrow().get(s.as_ref()).cloned().ok_or_else(|| EngineError::container_error(format!("no such field '{s}'"))),
            _ => Err(EngineError::type_error("record index must be a string")),
        },
        _ => Err(EngineError::type_error("value is not indexable")),
    }
}

fn as_int(b: &Binder) -> i64 {
    match b.value {
        Value::Int(i) => i,
        _ => unreachable!("caller confirmed actual_runtime_kind() == Int"),
    }
}

/// Binary-operator dispatch table (spec.md §4.4), keyed on `actualRuntimeKind`
/// of each operand per spec.md §9.
fn eval_binary(op: BinaryOperator, l: &Binder, r: &Binder) -> EngineResult<Binder> {
    use RuntimeKind::{Float, Int, String as Str};
    let (lk, rk) = (l.actual_runtime_kind(), r.actual_runtime_kind());
    match op {
        BinaryOperator::Add => match (lk, rk) {
            (Int, Int) => Ok(Binder::int(as_int(l) + as_int(r))),
            (Float, Float) | (Int, Float) | (Float, Int) => Ok(Binder::float(l.as_f64().unwrap() + r.as_f64().unwrap())),
            (Str, Str) => match (&l.value, &r.value) {
                (Value::Str(a), Value::Str(b)) => Ok(Binder::string(format!("{a}{b}"))),
                _ => unreachable!(),
            },
            _ => Err(EngineError::type_error(format!("'+' not supported between {} and {}", runtime_kind_name(lk), runtime_kind_name(rk)))),
        },
        BinaryOperator::Sub => match (lk, rk) {
            (Int, Int) => Ok(Binder::int(as_int(l) - as_int(r))),
            _ => numeric_or_err(l, r, "-", |a, b| a - b),
        },
        BinaryOperator::Mul => match (lk, rk) {
            (Int, Int) => Ok(Binder::int(as_int(l) * as_int(r))),
            _ => numeric_or_err(l, r, "*", |a, b| a * b),
        },
        BinaryOperator::Div => {
            if lk == Int && rk == Int {
                let (a, b) = (as_int(l), as_int(r));
                if b == 0 {
                    return Err(EngineError::type_error("integer division by zero"));
                }
                Ok(Binder::int(floor_div(a, b)))
            } else {
                Err(EngineError::type_error("'/' requires int, int operands (use '/.' for float division)"))
            }
        }
        BinaryOperator::FloatDiv => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => Ok(Binder::float(a / b)),
            _ => Err(EngineError::type_error("'/.' requires numeric operands")),
        },
        BinaryOperator::Mod => {
            if lk == Int && rk == Int {
                let (a, b) = (as_int(l), as_int(r));
                if b == 0 {
                    return Err(EngineError::type_error("modulo by zero"));
                }
                Ok(Binder::int(floor_mod(a, b)))
            } else {
                numeric_or_err(l, r, "%", |a, b| a % b)
            }
        }
        BinaryOperator::Shl | BinaryOperator::Shr => {
            if lk == Int && rk == Int {
                let (a, b) = (as_int(l), as_int(r));
                Ok(Binder::int(if op == BinaryOperator::Shl { a << b } else { a >> b }))
            } else {
                Err(EngineError::type_error("shift operators require int, int operands"))
            }
        }
        BinaryOperator::Lt | BinaryOperator::Le | BinaryOperator::Gt | BinaryOperator::Ge => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => Ok(Binder::boolean(match op {
                BinaryOperator::Lt => a < b,
                BinaryOperator::Le => a <= b,
                BinaryOperator::Gt => a > b,
                BinaryOperator::Ge => a >= b,
                _ => unreachable!(),
            })),
            _ => Err(EngineError::type_error("comparison operators require numeric operands")),
        },
        BinaryOperator::Eq => Ok(Binder::boolean(l.equals(r)?)),
        BinaryOperator::Ne => Ok(Binder::boolean(!l.equals(r)?)),
        BinaryOperator::And | BinaryOperator::Or => unreachable!("&&/|| are short-circuited before reaching eval_binary"),
    }
}

fn numeric_or_err(l: &Binder, r: &Binder, op: &str, f: fn(f64, f64) -> f64) -> EngineResult<Binder> {
    match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) => Ok(Binder::float(f(a, b))),
        _ => Err(EngineError::type_error(format!("'{op}' requires numeric operands"))),
    }
}

/// True floor division (spec.md §4.4), matching Python's `//`: the quotient
/// rounds toward negative infinity rather than toward zero.
fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) { q - 1 } else { q }
}

/// Modulo consistent with [`floor_div`]: the result takes the sign of the
/// divisor, matching Python's `%` (e.g. `7 % -2 == -1`).
fn floor_mod(a: i64, b: i64) -> i64 {
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) { r + b } else { r }
}
