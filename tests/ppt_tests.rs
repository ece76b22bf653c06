//! Integration tests for Perfect Process Tree construction
//! (`ppt::PptBuilder`), covering base-case/recursive-case detection for
//! transitive-closure-shaped predicates.

use flowml_core::core_ir::Ident;
use flowml_core::ppt::{PptBuilder, PptNode};
use flowml_core::types::Type;
use flowml_core::value::Value;
use std::collections::HashSet;

use flowml_core::core_ir::Expr;

fn var(name: &str, ordinal: u32, ty: Type) -> Expr {
    Expr::Var(Ident::with_ordinal(name, ordinal), ty)
}

fn eq_expr(l: Expr, r: Expr) -> Expr {
    Expr::App(
        Box::new(Expr::App(Box::new(Expr::Var(Ident::with_ordinal("=", 0), Type::Unit)), Box::new(l), Type::Unit)),
        Box::new(r),
        Type::Bool,
    )
}

fn orelse_expr(l: Expr, r: Expr) -> Expr {
    Expr::App(
        Box::new(Expr::App(Box::new(Expr::Var(Ident::with_ordinal("orelse", 0), Type::Unit)), Box::new(l), Type::Unit)),
        Box::new(r),
        Type::Bool,
    )
}

fn andalso_expr(l: Expr, r: Expr) -> Expr {
    Expr::App(
        Box::new(Expr::App(Box::new(Expr::Var(Ident::with_ordinal("andalso", 0), Type::Unit)), Box::new(l), Type::Unit)),
        Box::new(r),
        Type::Bool,
    )
}

/// A transitive-closure-shaped predicate (`y = x orelse reach y`) builds a
/// branch whose right side is marked recursive, letting downstream
/// inversion treat it as a base-case/recursive-case pair.
#[test]
fn a_transitive_closure_predicate_produces_a_branch_with_a_recursive_right_side() {
    let x = Ident::with_ordinal("x", 1);
    let y = Ident::with_ordinal("y", 2);
    let base = eq_expr(var("y", 2, Type::Int), var("x", 1, Type::Int));
    let recursive_call = Expr::App(
        Box::new(Expr::Var(Ident::with_ordinal("reach", 0), Type::Function(Box::new(Type::Int), Box::new(Type::Bool)))),
        Box::new(var("y", 2, Type::Int)),
        Type::Bool,
    );
    let body = orelse_expr(base, recursive_call);
    let goal: HashSet<Ident> = [y].into_iter().collect();
    let bound: HashSet<Ident> = [x].into_iter().collect();

    let tree = PptBuilder::new("reach", 64).build(&body, &goal, &bound);

    assert!(tree.has_base_case());
    assert!(tree.has_recursive_case());
}

/// A non-recursive disjunction of two point equalities has neither a base
/// case nor a recursive case by this definition -- both sides ground
/// directly, there is no self-call, so `has_recursive_case` is false.
#[test]
fn a_non_recursive_disjunction_reports_no_recursive_case() {
    let p = Ident::with_ordinal("p", 1);
    let lhs = eq_expr(var("p", 1, Type::Int), Expr::Literal(Value::Int(1), Type::Int));
    let rhs = eq_expr(var("p", 1, Type::Int), Expr::Literal(Value::Int(2), Type::Int));
    let body = orelse_expr(lhs, rhs);
    let goal: HashSet<Ident> = [p].into_iter().collect();

    let tree = PptBuilder::new("unrelated_predicate", 64).build(&body, &goal, &HashSet::new());

    assert!(!tree.has_recursive_case());
}

/// A conjunction of two conjuncts builds a `Sequence` node ordered so the
/// generator precedes the dependent filter, mirroring `mode_analyzer`'s
/// own scheduling.
#[test]
fn a_conjunction_builds_a_sequence_with_the_generator_scheduled_first() {
    let p = Ident::with_ordinal("p", 1);
    let q = Ident::with_ordinal("q", 2);
    let generator = eq_expr(var("p", 1, Type::Int), Expr::Literal(Value::Int(7), Type::Int));
    let filter = eq_expr(var("q", 2, Type::Int), var("p", 1, Type::Int));
    let body = andalso_expr(filter.clone(), generator.clone());
    let goal: HashSet<Ident> = [p, q].into_iter().collect();

    let tree = PptBuilder::new("unused", 64).build(&body, &goal, &HashSet::new());

    match tree {
        PptNode::Sequence { children, .. } => {
            assert_eq!(children.len(), 2);
            match &children[0] {
                PptNode::Terminal { conjunct, .. } => assert_eq!(*conjunct, generator),
                other => panic!("expected the generator terminal first, got {other:?}"),
            }
        }
        other => panic!("expected a sequence, got {other:?}"),
    }
}

/// Construction never panics at an exhausted depth cap -- it degrades to
/// an uninverted terminal instead.
#[test]
fn exhausting_the_depth_cap_degrades_to_an_uninverted_terminal_without_panicking() {
    let x = Ident::with_ordinal("x", 1);
    let body = eq_expr(var("x", 1, Type::Int), Expr::Literal(Value::Int(1), Type::Int));
    let goal: HashSet<Ident> = [x].into_iter().collect();

    let tree = PptBuilder::new("p", 0).build(&body, &goal, &HashSet::new());

    assert!(matches!(tree, PptNode::Terminal { result: None, .. }));
}
