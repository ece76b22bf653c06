//! # Generator Synthesis
//!
//! Given a pattern variable `p` and a conjunction of constraints, synthesise
//! a finite (or known-infinite) `Generator` that enumerates a superset of
//! the values satisfying the constraints (spec §4.7). Consumed by the
//! PredicateInverter when it turns a predicate into an enumerable source
//! for relational lowering or interpretation.
//!
//! Grounded on the teacher's `magic_sets::Adornment` (bound/free position
//! tagging) and `QueryBinding::bound_constants` (detecting which argument
//! position a constant pins down) — the same "does this conjunct pin a
//! variable to a point or a range" detection, generalised from adornment
//! strings over Datalog argument positions to generator synthesis over
//! Core IR comparison conjuncts.

use crate::core_ir::{Expr, Ident};
use crate::types::Type;
use crate::value::Value;

/// How many values a generator's extent is known to enumerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    Finite,
    Infinite,
}

/// A synthesised enumeration of a variable's possible values (spec §3
/// "Generator").
#[derive(Debug, Clone, PartialEq)]
pub enum Generator {
    /// `p = e`: a one-element extent.
    Point(Expr),
    /// A closed integer interval `[low, high]`, both inclusive.
    Range { low: Expr, high: Expr },
    /// The union of several generators' extents.
    Union(Vec<Generator>),
    /// All values of a type; `Infinite` unless the type is known-enumerable
    /// (spec §4.7.4 — this implementation never marks a type enumerable,
    /// since Core IR carries no enumerable-type registry).
    Extent(Type),
}

impl Generator {
    pub fn cardinality(&self) -> Cardinality {
        match self {
            Generator::Point(_) => Cardinality::Single,
            Generator::Range { .. } => Cardinality::Finite,
            Generator::Union(members) => {
                if members
                    .iter()
                    .all(|g| g.cardinality() != Cardinality::Infinite)
                {
                    Cardinality::Finite
                } else {
                    Cardinality::Infinite
                }
            }
            Generator::Extent(_) => Cardinality::Infinite,
        }
    }

    /// Core expression enumerating this generator's extent.
    pub fn enumerate(&self, elem_ty: &Type) -> Expr {
        match self {
            Generator::Point(e) => Expr::Tuple(vec![e.clone()], Type::Tuple(vec![elem_ty.clone()])),
            Generator::Range { low, high } => {
                tabulate_range(low, high, elem_ty)
            }
            Generator::Union(members) => {
                let lists: Vec<Expr> = members.iter().map(|g| g.enumerate(elem_ty)).collect();
                Expr::App(
                    Box::new(Expr::Var(
                        Ident::with_ordinal("List.concat", 0),
                        Type::Function(
                            Box::new(Type::List(Box::new(Type::List(Box::new(elem_ty.clone()))))),
                            Box::new(Type::List(Box::new(elem_ty.clone()))),
                        ),
                    )),
                    Box::new(Expr::Tuple(lists, Type::Tuple(vec![]))),
                    Type::List(Box::new(elem_ty.clone())),
                )
            }
            Generator::Extent(ty) => Expr::Var(
                Ident::with_ordinal("_extent", 0),
                Type::List(Box::new(ty.clone())),
            ),
        }
    }

    /// Whether `filter` is already fully accounted for by this generator's
    /// extent; if so, the filter can be dropped as a redundant conjunct
    /// after the generator replaces it (spec §4.7 last paragraph, §8
    /// "Generator soundness").
    pub fn simplify(&self, pat: &Ident, filter: &Expr) -> bool {
        match self {
            Generator::Point(value) => is_point_equality(filter, pat, value),
            Generator::Range { low, high } => is_subsumed_range(filter, pat, low, high),
            Generator::Union(members) => members.iter().any(|g| g.simplify(pat, filter)),
            Generator::Extent(_) => false,
        }
    }
}

fn tabulate_range(low: &Expr, high: &Expr, elem_ty: &Type) -> Expr {
    let count_ty = Type::Int;
    let count = Expr::App(
        Box::new(Expr::App(
            Box::new(Expr::Var(
                Ident::with_ordinal("Int.-", 0),
                Type::Function(
                    Box::new(Type::Int),
                    Box::new(Type::Function(Box::new(Type::Int), Box::new(Type::Int))),
                ),
            )),
            Box::new(high.clone()),
            Type::Function(Box::new(Type::Int), Box::new(Type::Int)),
        )),
        Box::new(low.clone()),
        count_ty,
    );
    let k = Ident::with_ordinal("k", 0);
    let offset_fn = Expr::Fn(
        Box::new(crate::core_ir::Pat::Ident(k.clone(), Type::Int)),
        Box::new(Expr::App(
            Box::new(Expr::App(
                Box::new(Expr::Var(
                    Ident::with_ordinal("Int.+", 0),
                    Type::Function(
                        Box::new(Type::Int),
                        Box::new(Type::Function(Box::new(Type::Int), Box::new(Type::Int))),
                    ),
                )),
                Box::new(low.clone()),
                Type::Function(Box::new(Type::Int), Box::new(Type::Int)),
            )),
            Box::new(Expr::Var(k, Type::Int)),
            Type::Int,
        )),
        Type::Function(Box::new(Type::Int), Box::new(elem_ty.clone())),
    );
    Expr::App(
        Box::new(Expr::App(
            Box::new(Expr::Var(
                Ident::with_ordinal("List.tabulate", 0),
                Type::Function(
                    Box::new(Type::Int),
                    Box::new(Type::Function(
                        Box::new(Type::Function(Box::new(Type::Int), Box::new(elem_ty.clone()))),
                        Box::new(Type::List(Box::new(elem_ty.clone()))),
                    )),
                ),
            )),
            Box::new(count),
            Type::Function(
                Box::new(Type::Function(Box::new(Type::Int), Box::new(elem_ty.clone()))),
                Box::new(Type::List(Box::new(elem_ty.clone()))),
            ),
        )),
        Box::new(offset_fn),
        Type::List(Box::new(elem_ty.clone())),
    )
}

/// A conjunct broken into an infix-style comparison, if it has that shape.
enum Comparison<'a> {
    Eq(&'a Expr, &'a Expr),
    Lt(&'a Expr, &'a Expr),
    Le(&'a Expr, &'a Expr),
    Gt(&'a Expr, &'a Expr),
    Ge(&'a Expr, &'a Expr),
}

fn as_comparison(expr: &Expr) -> Option<Comparison<'_>> {
    let Expr::App(outer_f, rhs, _) = expr else {
        return None;
    };
    let Expr::App(inner_f, lhs, _) = outer_f.as_ref() else {
        return None;
    };
    let Expr::Var(id, _) = inner_f.as_ref() else {
        return None;
    };
    match id.name.as_str() {
        "=" => Some(Comparison::Eq(lhs, rhs)),
        "<" => Some(Comparison::Lt(lhs, rhs)),
        "<=" => Some(Comparison::Le(lhs, rhs)),
        ">" => Some(Comparison::Gt(lhs, rhs)),
        ">=" => Some(Comparison::Ge(lhs, rhs)),
        _ => None,
    }
}

fn is_pat_var(expr: &Expr, pat: &Ident) -> bool {
    matches!(expr, Expr::Var(id, _) if id == pat)
}

/// Split `conjuncts` on top-level `andalso` (spec §4.7 works over a flat
/// conjunction; nested `andalso` nodes are flattened first).
pub fn flatten_conjunction(expr: &Expr) -> Vec<Expr> {
    fn is_andalso(expr: &Expr) -> Option<(&Expr, &Expr)> {
        let Expr::App(outer_f, rhs, _) = expr else {
            return None;
        };
        let Expr::App(inner_f, lhs, _) = outer_f.as_ref() else {
            return None;
        };
        let Expr::Var(id, _) = inner_f.as_ref() else {
            return None;
        };
        (id.name == "andalso").then_some((lhs.as_ref(), rhs.as_ref()))
    }
    match is_andalso(expr) {
        Some((l, r)) => {
            let mut out = flatten_conjunction(l);
            out.extend(flatten_conjunction(r));
            out
        }
        None => vec![expr.clone()],
    }
}

/// Split a disjunction `a orelse b` into its top-level disjuncts, each of
/// which is itself a flattened conjunction (spec §4.7.3).
fn flatten_disjunction(expr: &Expr) -> Option<Vec<Vec<Expr>>> {
    fn as_orelse(expr: &Expr) -> Option<(&Expr, &Expr)> {
        let Expr::App(outer_f, rhs, _) = expr else {
            return None;
        };
        let Expr::App(inner_f, lhs, _) = outer_f.as_ref() else {
            return None;
        };
        let Expr::Var(id, _) = inner_f.as_ref() else {
            return None;
        };
        (id.name == "orelse").then_some((lhs.as_ref(), rhs.as_ref()))
    }
    as_orelse(expr).map(|(l, r)| {
        let mut branches = vec![flatten_conjunction(l)];
        match flatten_disjunction(r) {
            Some(more) => branches.extend(more),
            None => branches.push(flatten_conjunction(r)),
        }
        branches
    })
}

/// Try to synthesise a generator for `pat` from a conjunction of
/// constraints, in the order spec §4.7 specifies: point, range, union,
/// extent, inverter registry (the registry lookup lives in
/// [`crate::inverters`] and is tried by the caller when this returns
/// `None`).
pub fn synthesize(pat: &Ident, conjuncts: &[Expr]) -> Option<Generator> {
    if let Some(point) = try_point(pat, conjuncts) {
        return Some(point);
    }
    if let Some(range) = try_range(pat, conjuncts) {
        return Some(range);
    }
    for φ in conjuncts {
        if let Some(branches) = flatten_disjunction(φ) {
            let mut members = Vec::with_capacity(branches.len());
            for branch in &branches {
                members.push(synthesize(pat, branch)?);
            }
            return Some(Generator::Union(members));
        }
    }
    None
}

fn try_point(pat: &Ident, conjuncts: &[Expr]) -> Option<Generator> {
    for φ in conjuncts {
        if let Some(Comparison::Eq(lhs, rhs)) = as_comparison(φ) {
            if is_pat_var(lhs, pat) {
                return Some(Generator::Point(rhs.clone()));
            }
            if is_pat_var(rhs, pat) {
                return Some(Generator::Point(lhs.clone()));
            }
        }
    }
    None
}

fn try_range(pat: &Ident, conjuncts: &[Expr]) -> Option<Generator> {
    let int_one = || Expr::Literal(Value::Int(1), Type::Int);
    let add_one = |e: &Expr| {
        Expr::App(
            Box::new(Expr::App(
                Box::new(Expr::Var(
                    Ident::with_ordinal("Int.+", 0),
                    Type::Function(
                        Box::new(Type::Int),
                        Box::new(Type::Function(Box::new(Type::Int), Box::new(Type::Int))),
                    ),
                )),
                Box::new(e.clone()),
                Type::Function(Box::new(Type::Int), Box::new(Type::Int)),
            )),
            Box::new(int_one()),
            Type::Int,
        )
    };
    let sub_one = |e: &Expr| {
        Expr::App(
            Box::new(Expr::App(
                Box::new(Expr::Var(
                    Ident::with_ordinal("Int.-", 0),
                    Type::Function(
                        Box::new(Type::Int),
                        Box::new(Type::Function(Box::new(Type::Int), Box::new(Type::Int))),
                    ),
                )),
                Box::new(e.clone()),
                Type::Function(Box::new(Type::Int), Box::new(Type::Int)),
            )),
            Box::new(int_one()),
            Type::Int,
        )
    };

    let mut low: Option<Expr> = None;
    let mut high: Option<Expr> = None;
    for φ in conjuncts {
        match as_comparison(φ) {
            Some(Comparison::Gt(lhs, rhs)) if is_pat_var(lhs, pat) => low = Some(add_one(rhs)),
            Some(Comparison::Ge(lhs, rhs)) if is_pat_var(lhs, pat) => low = Some(rhs.clone()),
            Some(Comparison::Lt(rhs, lhs)) if is_pat_var(lhs, pat) => low = Some(add_one(rhs)),
            Some(Comparison::Le(rhs, lhs)) if is_pat_var(lhs, pat) => low = Some(rhs.clone()),
            Some(Comparison::Lt(lhs, rhs)) if is_pat_var(lhs, pat) => high = Some(sub_one(rhs)),
            Some(Comparison::Le(lhs, rhs)) if is_pat_var(lhs, pat) => high = Some(rhs.clone()),
            Some(Comparison::Gt(rhs, lhs)) if is_pat_var(lhs, pat) => high = Some(sub_one(rhs)),
            Some(Comparison::Ge(rhs, lhs)) if is_pat_var(lhs, pat) => high = Some(rhs.clone()),
            _ => {}
        }
    }
    match (low, high) {
        (Some(low), Some(high)) => Some(Generator::Range { low, high }),
        _ => None,
    }
}

fn is_point_equality(filter: &Expr, pat: &Ident, value: &Expr) -> bool {
    matches!(as_comparison(filter), Some(Comparison::Eq(lhs, rhs))
        if (is_pat_var(lhs, pat) && rhs == value) || (is_pat_var(rhs, pat) && lhs == value))
}

fn literal_int(expr: &Expr) -> Option<i64> {
    match expr {
        Expr::Literal(Value::Int(n), _) => Some(*n),
        _ => None,
    }
}

fn is_subsumed_range(filter: &Expr, pat: &Ident, low: &Expr, high: &Expr) -> bool {
    match as_comparison(filter) {
        Some(Comparison::Gt(lhs, rhs)) if is_pat_var(lhs, pat) => {
            matches!((literal_int(low), literal_int(rhs)), (Some(l), Some(r)) if l >= r + 1)
        }
        Some(Comparison::Ge(lhs, rhs)) if is_pat_var(lhs, pat) => rhs == low,
        Some(Comparison::Lt(lhs, rhs)) if is_pat_var(lhs, pat) => {
            matches!((literal_int(high), literal_int(rhs)), (Some(h), Some(r)) if h <= r - 1)
        }
        Some(Comparison::Le(lhs, rhs)) if is_pat_var(lhs, pat) => rhs == high,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str, ty: Type) -> Expr {
        Expr::Var(Ident::with_ordinal(name, 1), ty)
    }

    fn int_lit(n: i64) -> Expr {
        Expr::Literal(Value::Int(n), Type::Int)
    }

    fn eq_expr(l: Expr, r: Expr) -> Expr {
        Expr::App(
            Box::new(Expr::App(
                Box::new(Expr::Var(Ident::with_ordinal("=", 0), Type::Unit)),
                Box::new(l),
                Type::Unit,
            )),
            Box::new(r),
            Type::Bool,
        )
    }

    fn gt_expr(l: Expr, r: Expr) -> Expr {
        Expr::App(
            Box::new(Expr::App(
                Box::new(Expr::Var(Ident::with_ordinal(">", 0), Type::Unit)),
                Box::new(l),
                Type::Unit,
            )),
            Box::new(r),
            Type::Bool,
        )
    }

    fn le_expr(l: Expr, r: Expr) -> Expr {
        Expr::App(
            Box::new(Expr::App(
                Box::new(Expr::Var(Ident::with_ordinal("<=", 0), Type::Unit)),
                Box::new(l),
                Type::Unit,
            )),
            Box::new(r),
            Type::Bool,
        )
    }

    #[test]
    fn point_equality_synthesizes_a_singleton_generator() {
        let p = Ident::with_ordinal("p", 1);
        let conjuncts = vec![eq_expr(var("p", Type::Int), int_lit(7))];
        let gen = synthesize(&p, &conjuncts).expect("point generator");
        assert_eq!(gen, Generator::Point(int_lit(7)));
        assert_eq!(gen.cardinality(), Cardinality::Single);
        assert!(gen.simplify(&p, &conjuncts[0]));
    }

    #[test]
    fn range_conjunction_synthesizes_a_finite_generator() {
        let p = Ident::with_ordinal("p", 1);
        let conjuncts = vec![
            gt_expr(var("p", Type::Int), int_lit(3)),
            le_expr(var("p", Type::Int), int_lit(8)),
        ];
        let gen = synthesize(&p, &conjuncts).expect("range generator");
        match &gen {
            Generator::Range { low, high } => {
                assert_eq!(*low, int_lit(4));
                assert_eq!(*high, int_lit(8));
            }
            other => panic!("expected range, got {other:?}"),
        }
        assert_eq!(gen.cardinality(), Cardinality::Finite);
    }

    #[test]
    fn disjunction_of_points_synthesizes_a_union_generator() {
        let p = Ident::with_ordinal("p", 1);
        let lhs = eq_expr(var("p", Type::Int), int_lit(1));
        let rhs = eq_expr(var("p", Type::Int), int_lit(2));
        let orelse = Expr::App(
            Box::new(Expr::App(
                Box::new(Expr::Var(Ident::with_ordinal("orelse", 0), Type::Unit)),
                Box::new(lhs),
                Type::Unit,
            )),
            Box::new(rhs),
            Type::Bool,
        );
        let gen = synthesize(&p, &[orelse]).expect("union generator");
        match gen {
            Generator::Union(members) => assert_eq!(members.len(), 2),
            other => panic!("expected union, got {other:?}"),
        }
    }

    #[test]
    fn unrelated_conjunction_synthesizes_nothing() {
        let p = Ident::with_ordinal("p", 1);
        let q = var("q", Type::Int);
        let conjuncts = vec![eq_expr(q, int_lit(7))];
        assert!(synthesize(&p, &conjuncts).is_none());
    }
}
