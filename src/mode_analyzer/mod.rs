//! # ModeAnalyzer
//!
//! Orders a conjunction of predicate conjuncts so that generators run
//! before the filters that depend on their bindings (spec §4.8) — the
//! same problem the teacher's join planner solves for relations (order
//! joins to bound variables as early as possible), generalised from
//! join-graph edges (shared columns between relations) to conjunct
//! readiness (shared variables between comparison/call conjuncts).
//!
//! Grounded on `join_planning::mod.rs`'s greedy scoring loop (pick the
//! highest-weight unplaced node, extend the placed set, repeat).

use crate::core_ir::{Expr, Ident};
use crate::generators::{self, Generator};
use crate::inverters;
use std::collections::HashSet;

/// Relative preference when several conjuncts tie on bound-variable count
/// (spec §4.8: "generators < ranges < filters", i.e. lower values are
/// scheduled first when scores tie).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Priority {
    Generator,
    Range,
    Filter,
}

/// What a single conjunct can contribute under a given set of bound
/// variables.
#[derive(Debug, Clone)]
pub struct ModeSignature {
    /// Goal variables this conjunct can newly bind if scheduled now.
    pub can_generate: HashSet<Ident>,
    pub is_finite: bool,
    /// Variables that must already be bound for this conjunct to act as a
    /// generator (e.g. the `s` in `String.isPrefix x s`).
    pub required_bound: HashSet<Ident>,
    /// Variables shared with conjuncts already scheduled.
    pub join_vars: HashSet<Ident>,
    priority: Priority,
}

fn free_vars_in(expr: &Expr) -> HashSet<Ident> {
    expr.free_vars()
}

/// Compute the `ModeSignature` of `conjunct` given the variables already
/// bound by earlier conjuncts and the full set of goal variables this
/// predicate needs to ground.
fn signature(conjunct: &Expr, bound: &HashSet<Ident>, goals: &HashSet<Ident>) -> ModeSignature {
    let free = free_vars_in(conjunct);
    let unbound_goal_vars: Vec<&Ident> = free.iter().filter(|v| goals.contains(v) && !bound.contains(v)).collect();

    let mut can_generate = HashSet::new();
    let mut priority = Priority::Filter;
    let mut is_finite = true;

    for v in &unbound_goal_vars {
        let rest: Vec<Expr> = vec![conjunct.clone()];
        if let Some(gen) = generators::synthesize(v, &rest) {
            can_generate.insert((*v).clone());
            is_finite = is_finite && gen.cardinality() != generators::Cardinality::Infinite;
            priority = match priority {
                Priority::Filter | Priority::Range => {
                    if matches!(gen, Generator::Range { .. }) {
                        Priority::Range
                    } else {
                        Priority::Generator
                    }
                }
                Priority::Generator => Priority::Generator,
            };
        } else if inverters::invert(v, conjunct).is_some() {
            can_generate.insert((*v).clone());
            priority = Priority::Generator;
        }
    }

    let required_bound: HashSet<Ident> = free.difference(&can_generate).cloned().collect();
    let join_vars: HashSet<Ident> = free.intersection(bound).cloned().collect();

    ModeSignature {
        can_generate,
        is_finite,
        required_bound,
        join_vars,
        priority,
    }
}

fn score(sig: &ModeSignature, bound: &HashSet<Ident>) -> i64 {
    let base = 1000 * sig.can_generate.len() as i64 - (sig.priority as i64);
    if sig.required_bound.iter().all(|v| bound.contains(v)) {
        base + 10_000
    } else {
        base
    }
}

/// Greedily order `conjuncts` so that each one's `required_bound` set is
/// already satisfied by the time it's scheduled, per spec §4.8's
/// algorithm. Conjuncts that never make progress are appended, in their
/// original relative order, as trailing filters.
pub fn order_predicates(conjuncts: &[Expr], goals: &HashSet<Ident>) -> Vec<Expr> {
    let mut remaining: Vec<Expr> = conjuncts.to_vec();
    let mut bound: HashSet<Ident> = HashSet::new();
    let mut ordered = Vec::with_capacity(conjuncts.len());

    loop {
        if remaining.is_empty() {
            break;
        }
        let scored: Vec<(i64, ModeSignature)> = remaining
            .iter()
            .map(|c| {
                let sig = signature(c, &bound, goals);
                (score(&sig, &bound), sig)
            })
            .collect();
        let best_idx = scored
            .iter()
            .enumerate()
            .max_by_key(|(_, (s, _))| *s)
            .map(|(i, _)| i);

        match best_idx {
            Some(idx) if scored[idx].0 > 0 || !scored[idx].1.can_generate.is_empty() => {
                let chosen = remaining.remove(idx);
                let sig = scored.into_iter().nth(idx).unwrap().1;
                bound.extend(sig.can_generate);
                ordered.push(chosen);
            }
            _ => {
                ordered.extend(remaining.drain(..));
                break;
            }
        }
    }

    ordered
}

/// True iff greedily ordering `conjuncts` grounds every variable in
/// `goals` (spec §4.8 `canGround`).
pub fn can_ground(conjuncts: &[Expr], goals: &HashSet<Ident>) -> bool {
    let mut bound: HashSet<Ident> = HashSet::new();
    let mut remaining: Vec<Expr> = conjuncts.to_vec();
    loop {
        if goals.is_subset(&bound) {
            return true;
        }
        if remaining.is_empty() {
            return false;
        }
        let mut progressed = false;
        let mut next_remaining = Vec::new();
        for c in &remaining {
            let sig = signature(c, &bound, goals);
            if sig.required_bound.iter().all(|v| bound.contains(v)) && !sig.can_generate.is_empty() {
                bound.extend(sig.can_generate.clone());
                progressed = true;
            } else {
                next_remaining.push(c.clone());
            }
        }
        remaining = next_remaining;
        if !progressed {
            return goals.is_subset(&bound);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;
    use crate::value::Value;

    fn var(name: &str, ordinal: u32, ty: Type) -> Expr {
        Expr::Var(Ident::with_ordinal(name, ordinal), ty)
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

    #[test]
    fn point_equality_is_ordered_before_a_filter_that_depends_on_it() {
        let p = Ident::with_ordinal("p", 1);
        let q = Ident::with_ordinal("q", 2);
        let generator = eq_expr(var("p", 1, Type::Int), Expr::Literal(Value::Int(7), Type::Int));
        let dependent_filter = gt_expr(var("p", 1, Type::Int), var("q", 2, Type::Int));
        let goals: HashSet<Ident> = [p.clone()].into_iter().collect();
        let ordered = order_predicates(&[dependent_filter.clone(), generator.clone()], &goals);
        assert_eq!(ordered[0], generator);
        assert_eq!(ordered[1], dependent_filter);
    }

    #[test]
    fn can_ground_succeeds_when_all_goals_reach_bound() {
        let p = Ident::with_ordinal("p", 1);
        let generator = eq_expr(var("p", 1, Type::Int), Expr::Literal(Value::Int(7), Type::Int));
        let goals: HashSet<Ident> = [p].into_iter().collect();
        assert!(can_ground(&[generator], &goals));
    }

    #[test]
    fn can_ground_fails_when_a_goal_variable_is_never_produced() {
        let p = Ident::with_ordinal("p", 1);
        let unrelated = eq_expr(
            var("q", 9, Type::Int),
            Expr::Literal(Value::Int(1), Type::Int),
        );
        let goals: HashSet<Ident> = [p].into_iter().collect();
        assert!(!can_ground(&[unrelated], &goals));
    }
}
