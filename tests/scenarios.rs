//! End-to-end scenarios (spec.md §8 "End-to-end scenarios").
//!
//! This crate has no parser of its own, so each scenario is built directly
//! as an `ast::Program` through small local constructors rather than parsed
//! from source text.

use std::rc::Rc;

use axiom_engine::ast::{
    AssignmentTarget, BinaryOperator, BlockStatement, Expression, MemberProperty, Parameter, Program, Statement,
    TypeAnnotation, UnaryOperator, VariableDeclarator,
};
use axiom_engine::{Engine, EngineLimits};
use pretty_assertions::assert_eq;

fn int(v: i64) -> Expression {
    Expression::IntegerLiteral { value: v }
}

fn id(name: &str) -> Expression {
    Expression::Identifier { name: name.to_string() }
}

fn bin(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    Expression::BinaryExpression { operator, left: Box::new(left), right: Box::new(right), line: 0, column: 0 }
}

fn not_expr(operand: Expression) -> Expression {
    Expression::UnaryExpression { operator: UnaryOperator::Not, operand: Box::new(operand) }
}

fn call(callee: Expression, args: Vec<Expression>) -> Expression {
    Expression::CallExpression { callee: Box::new(callee), arguments: args }
}

fn member(object: Expression, name: &str) -> Expression {
    Expression::MemberExpression { object: Box::new(object), property: MemberProperty { name: name.to_string() } }
}

fn method_call(object: Expression, name: &str, args: Vec<Expression>) -> Expression {
    call(member(object, name), args)
}

fn index(object: Expression, idx: Expression) -> Expression {
    Expression::IndexExpression { object: Box::new(object), index: Box::new(idx) }
}

fn array_lit(elements: Vec<Expression>) -> Expression {
    Expression::ArrayLiteral { elements }
}

fn predicate_check(subject: Expression, predicate_name: &str, predicate_args: Vec<Expression>) -> Expression {
    Expression::PredicateCheckExpression { subject: Box::new(subject), predicate_name: predicate_name.to_string(), predicate_args }
}

fn block(statements: Vec<Statement>) -> BlockStatement {
    BlockStatement { statements }
}

fn expr_stmt(e: Expression) -> Statement {
    Statement::ExpressionStatement { expression: e }
}

fn let_decl(name: &str, init: Expression) -> Statement {
    Statement::VariableDeclaration { declarations: vec![VariableDeclarator { name: name.to_string(), type_annotation: None, initializer: Some(init) }] }
}

fn assign_id(name: &str, value: Expression) -> Statement {
    Statement::AssignmentStatement { target: AssignmentTarget::Identifier { name: name.to_string() }, value }
}

fn assign_index(object: Expression, idx: Expression, value: Expression) -> Statement {
    Statement::AssignmentStatement { target: AssignmentTarget::Index { object, index: idx }, value }
}

fn while_stmt(condition: Expression, body: BlockStatement) -> Statement {
    Statement::WhileStatement { condition, body }
}

fn if_stmt(condition: Expression, then_branch: BlockStatement) -> Statement {
    Statement::IfStatement { condition, then_branch, else_branch: None }
}

fn return_stmt(value: Option<Expression>) -> Statement {
    Statement::ReturnStatement { value }
}

fn assert_stmt(condition: Expression) -> Statement {
    Statement::AssertStatement { condition, message: None, line: 0, column: 0 }
}

fn print_call(args: Vec<Expression>) -> Statement {
    expr_stmt(call(id("print"), args))
}

fn dynamic_ty() -> TypeAnnotation {
    TypeAnnotation::Simple { name: "dynamic".to_string() }
}

fn param(name: &str) -> Parameter {
    Parameter { name: name.to_string(), type_annotation: dynamic_ty() }
}

fn program(statements: Vec<Statement>) -> Program {
    Program { statements }
}

fn run(statements: Vec<Statement>) -> Vec<String> {
    Engine::new(EngineLimits::default()).run(&program(statements)).expect("scenario program should not raise")
}

#[test]
fn fibonacci_via_recursion() {
    // do fib(n) { if n<=1 { return n } return fib(n-1)+fib(n-2) }
    let fib_body = block(vec![
        if_stmt(bin(BinaryOperator::Le, id("n"), int(1)), block(vec![return_stmt(Some(id("n")))])),
        return_stmt(Some(bin(
            BinaryOperator::Add,
            call(id("fib"), vec![bin(BinaryOperator::Sub, id("n"), int(1))]),
            call(id("fib"), vec![bin(BinaryOperator::Sub, id("n"), int(2))]),
        ))),
    ]);
    let statements = vec![
        Statement::FunctionDeclaration { name: "fib".to_string(), parameters: vec![param("n")], return_type: dynamic_ty(), body: Rc::new(fib_body) },
        print_call(vec![call(id("fib"), vec![int(0)])]),
        print_call(vec![call(id("fib"), vec![int(1)])]),
        print_call(vec![call(id("fib"), vec![int(5)])]),
    ];
    assert_eq!(run(statements), vec!["0", "1", "5"]);
}

#[test]
fn insertion_sort_reaches_sorted_final_array() {
    // let arr=[5,2,4,6,1,3]; let i=1;
    // while i<arr.length() {
    //   let key=arr[i]; let j=i-1;
    //   while j>=0 && arr[j]>key { arr[j+1]=arr[j]; j=j-1 }
    //   arr[j+1]=key; i=i+1
    // }
    let inner_while = while_stmt(
        bin(BinaryOperator::And, bin(BinaryOperator::Ge, id("j"), int(0)), bin(BinaryOperator::Gt, index(id("arr"), id("j")), id("key"))),
        block(vec![
            assign_index(id("arr"), bin(BinaryOperator::Add, id("j"), int(1)), index(id("arr"), id("j"))),
            assign_id("j", bin(BinaryOperator::Sub, id("j"), int(1))),
        ]),
    );
    let outer_body = block(vec![
        let_decl("key", index(id("arr"), id("i"))),
        let_decl("j", bin(BinaryOperator::Sub, id("i"), int(1))),
        inner_while,
        assign_index(id("arr"), bin(BinaryOperator::Add, id("j"), int(1)), id("key")),
        assign_id("i", bin(BinaryOperator::Add, id("i"), int(1))),
    ]);
    let statements = vec![
        let_decl("arr", array_lit(vec![int(5), int(2), int(4), int(6), int(1), int(3)])),
        let_decl("i", int(1)),
        while_stmt(bin(BinaryOperator::Lt, id("i"), method_call(id("arr"), "length", vec![])), outer_body),
        print_call(vec![method_call(id("arr"), "toString", vec![])]),
        assert_stmt(predicate_check(id("arr"), "sorted", vec![Expression::StringLiteral { value: "asc".to_string() }])),
    ];
    assert_eq!(run(statements), vec!["[1, 2, 3, 4, 5, 6]"]);
}

fn graph_edges_program(last_weight: i64) -> Vec<Statement> {
    let g = call(id("Graph"), vec![Expression::BooleanLiteral { value: true }]);
    vec![
        let_decl("g", g),
        expr_stmt(method_call(id("g"), "addEdge", vec![int(1), int(2), int(5)])),
        expr_stmt(method_call(id("g"), "addEdge", vec![int(2), int(3), int(3)])),
        expr_stmt(method_call(id("g"), "addEdge", vec![int(3), int(1), int(last_weight)])),
        print_call(vec![predicate_check(id("g"), "no_negative_cycles", vec![])]),
    ]
}

#[test]
fn graph_negative_cycle_detection() {
    assert_eq!(run(graph_edges_program(-10)), vec!["false"]);
    assert_eq!(run(graph_edges_program(10)), vec!["true"]);
}

fn distance_matrix_program(last_entry: i64) -> Vec<Statement> {
    let row = |a: i64, b: i64, c: i64| {
        let m = call(id("Map"), vec![]);
        block(vec![
            let_decl("row", m),
            expr_stmt(method_call(id("row"), "set", vec![int(1), int(a)])),
            expr_stmt(method_call(id("row"), "set", vec![int(2), int(b)])),
            expr_stmt(method_call(id("row"), "set", vec![int(3), int(c)])),
        ])
        .statements
    };
    let mut statements = vec![let_decl("dist", call(id("Map"), vec![]))];
    statements.extend(row(0, 5, 7));
    statements.push(expr_stmt(method_call(id("dist"), "set", vec![int(1), id("row")])));
    statements.extend(row(5, 0, 3));
    statements.push(expr_stmt(method_call(id("dist"), "set", vec![int(2), id("row")])));
    statements.extend(row(7, 3, 0));
    statements.push(assign_index(id("row"), int(3), int(last_entry)));
    statements.push(expr_stmt(method_call(id("dist"), "set", vec![int(3), id("row")])));
    statements.push(print_call(vec![predicate_check(id("dist"), "triangle_inequality", vec![])]));
    statements
}

#[test]
fn distance_matrix_triangle_inequality() {
    assert_eq!(run(distance_matrix_program(0)), vec!["true"]);
    assert_eq!(run(distance_matrix_program(100)), vec!["false"]);
}

#[test]
fn subset_and_disjoint_checks() {
    let set_of = |name: &str, items: Vec<i64>| {
        let mut statements = vec![let_decl(name, call(id("Set"), vec![]))];
        for item in items {
            statements.push(expr_stmt(method_call(id(name), "add", vec![int(item)])));
        }
        statements
    };

    let mut statements = set_of("s1", vec![1, 2]);
    statements.extend(set_of("s2", vec![1, 2, 3]));
    statements.push(print_call(vec![predicate_check(id("s1"), "subset_of", vec![id("s2")])]));
    assert_eq!(run(statements), vec!["true"]);

    let mut statements = set_of("s1", vec![1, 2, 4]);
    statements.extend(set_of("s2", vec![1, 2, 3]));
    statements.push(print_call(vec![predicate_check(id("s1"), "subset_of", vec![id("s2")])]));
    assert_eq!(run(statements), vec!["false"]);

    let mut statements = set_of("s1", vec![1, 2]);
    statements.extend(set_of("s2", vec![3, 4]));
    statements.push(print_call(vec![predicate_check(id("s1"), "disjoint_from", vec![id("s2")])]));
    assert_eq!(run(statements), vec!["true"]);
}

#[test]
fn frozen_constant_and_incrementing_counter() {
    // let k=42; let i=0; while i<5 { i=i+1 }
    let statements = vec![
        let_decl("k", int(42)),
        let_decl("i", int(0)),
        while_stmt(bin(BinaryOperator::Lt, id("i"), int(5)), block(vec![assign_id("i", bin(BinaryOperator::Add, id("i"), int(1)))])),
        print_call(vec![id("k")]),
        print_call(vec![id("i")]),
        print_call(vec![predicate_check(id("k"), "int_range", vec![int(42), int(42)])]),
        print_call(vec![not_expr(predicate_check(id("i"), "int_range", vec![int(0), int(0)]))]),
    ];
    assert_eq!(run(statements), vec!["42", "5", "true", "true"]);
}

#[test]
fn assert_failure_raises_predicate_violation() {
    let failing = program(vec![
        let_decl("x", int(-1)),
        assert_stmt(predicate_check(id("x"), "positive", vec![Expression::BooleanLiteral { value: true }])),
    ]);
    assert!(Engine::new(EngineLimits::default()).run(&failing).is_err());

    let passing = vec![let_decl("x", int(3)), assert_stmt(predicate_check(id("x"), "positive", vec![Expression::BooleanLiteral { value: true }]))];
    assert_eq!(run(passing), Vec::<String>::new());
}
