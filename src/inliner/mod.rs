//! # Inliner
//!
//! Bottom-up rewriting that substitutes safe bindings, folds record
//! selectors over known tuple/record values, beta-reduces applied
//! lambdas, folds case expressions over statically-known scrutinees,
//! drops or inlines single-use `let` bindings (spec §4.5, rules 1-6), and
//! evaluates a known scalar built-in applied to literal operands (rule 7 -
//! not numbered in spec §4.5's list, but needed for its own end-to-end
//! scenarios in §8 to reach the literal result they name, rather than
//! stalling on an unevaluated operator application over literals).
//! [`run_to_fixpoint`] drives the bounded loop spec §5 requires, re-deriving
//! usage classification after every pass.
//!
//! Grounded on the teacher's `optimizer::Optimizer` fixpoint driver
//! (`for _iteration in 0..self.max_iterations { ...; if Self::ir_equals(..)
//! { break } }`) and its per-rule rewrite functions, generalized from
//! relational-IR rewrites (identity-map elimination, filter fusion) to
//! Core-IR term rewrites.

use crate::analyzer::{self, Analysis};
use crate::core_ir::{CompStep, Expr, Field, Ident, Match, Pat, Source};
use crate::error::{CompileError, CompileResult};
use crate::types::Type;
use crate::value::Value;
use tracing::{debug, warn};

/// Run one bottom-up inlining pass over `expr`, using `analysis` (derived
/// from the tree *before* this pass) to decide which identifier uses may
/// be substituted.
pub fn inline_once(expr: &Expr, analysis: &Analysis) -> Expr {
    let rebuilt = rebuild_children(expr, analysis);
    apply_top_level_rules(rebuilt, analysis)
}

fn rebuild_children(expr: &Expr, analysis: &Analysis) -> Expr {
    match expr {
        Expr::Literal(_, _) | Expr::Var(_, _) | Expr::Con0(_, _) => expr.clone(),
        Expr::Con(name, arg, t) => Expr::Con(name.clone(), Box::new(inline_once(arg, analysis)), t.clone()),
        Expr::Fn(pat, body, t) => Expr::Fn(pat.clone(), Box::new(inline_once(body, analysis)), t.clone()),
        Expr::App(f, a, t) => Expr::App(
            Box::new(inline_once(f, analysis)),
            Box::new(inline_once(a, analysis)),
            t.clone(),
        ),
        Expr::Let {
            pat,
            value,
            body,
            ty,
        } => Expr::Let {
            pat: pat.clone(),
            value: Box::new(inline_once(value, analysis)),
            body: Box::new(inline_once(body, analysis)),
            ty: ty.clone(),
        },
        Expr::LetRec { bindings, body, ty } => Expr::LetRec {
            bindings: bindings
                .iter()
                .map(|(id, rhs)| (id.clone(), inline_once(rhs, analysis)))
                .collect(),
            body: Box::new(inline_once(body, analysis)),
            ty: ty.clone(),
        },
        Expr::Case(scrutinee, matches, t) => Expr::Case(
            Box::new(inline_once(scrutinee, analysis)),
            matches
                .iter()
                .map(|m| Match {
                    pat: m.pat.clone(),
                    body: inline_once(&m.body, analysis),
                })
                .collect(),
            t.clone(),
        ),
        Expr::Tuple(items, t) => Expr::Tuple(
            items.iter().map(|e| inline_once(e, analysis)).collect(),
            t.clone(),
        ),
        Expr::Record(fields, t) => Expr::Record(
            fields
                .iter()
                .map(|(n, e)| (n.clone(), inline_once(e, analysis)))
                .collect(),
            t.clone(),
        ),
        Expr::Select(inner, field, t) => Expr::Select(
            Box::new(inline_once(inner, analysis)),
            field.clone(),
            t.clone(),
        ),
        Expr::LocalType { decls, body, ty } => Expr::LocalType {
            decls: decls.clone(),
            body: Box::new(inline_once(body, analysis)),
            ty: ty.clone(),
        },
        Expr::Comprehension {
            sources,
            steps,
            yield_expr,
            is_default_yield,
            ty,
        } => Expr::Comprehension {
            sources: sources
                .iter()
                .map(|s| Source {
                    pat: s.pat.clone(),
                    expr: inline_once(&s.expr, analysis),
                })
                .collect(),
            steps: steps.iter().map(|s| inline_step(s, analysis)).collect(),
            yield_expr: Box::new(inline_once(yield_expr, analysis)),
            is_default_yield: *is_default_yield,
            ty: ty.clone(),
        },
        Expr::Aggregate(func, arg, t) => {
            Expr::Aggregate(*func, Box::new(inline_once(arg, analysis)), t.clone())
        }
    }
}

fn inline_step(step: &CompStep, analysis: &Analysis) -> CompStep {
    match step {
        CompStep::Where(e) => CompStep::Where(inline_once(e, analysis)),
        CompStep::Order(items) => CompStep::Order(
            items
                .iter()
                .map(|(e, dir)| (inline_once(e, analysis), *dir))
                .collect(),
        ),
        CompStep::Group { keys, aggs } => CompStep::Group {
            keys: keys.iter().map(|e| inline_once(e, analysis)).collect(),
            aggs: aggs
                .iter()
                .map(|(name, func, e)| (name.clone(), *func, inline_once(e, analysis)))
                .collect(),
        },
    }
}

fn apply_top_level_rules(expr: Expr, analysis: &Analysis) -> Expr {
    match expr {
        // Rule 1: identifier substitution for atomic/once-safe bindings.
        Expr::Var(ref id, ref _ty) => match analysis.rhs_of(id) {
            Some(rhs) if analysis.classify(id).permits_unconditional_inline() => {
                inline_once(&rhs.clone(), analysis)
            }
            _ => expr,
        },

        // Rule 2: record/tuple selector over a known literal aggregate.
        Expr::Select(ref inner, ref field, ref _ty) => match (inner.as_ref(), field) {
            (Expr::Tuple(items, _), Field::Index(i)) if *i < items.len() => items[*i].clone(),
            (Expr::Record(fields, _), Field::Label(name)) => fields
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, e)| e.clone())
                .unwrap_or_else(|| expr.clone()),
            _ => expr,
        },

        // Rule 3: beta-reduction via let-binding. Rule 7: fold a known
        // scalar built-in applied to literal operands.
        Expr::App(ref f, ref a, ref ty) => match f.as_ref() {
            Expr::Fn(pat, body, _) => Expr::Let {
                pat: pat.clone(),
                value: a.clone(),
                body: body.clone(),
                ty: ty.clone(),
            },
            _ => fold_builtin_application(f.as_ref(), a.as_ref(), ty).unwrap_or(expr),
        },

        // Rule 4 / rule 5: case folding.
        Expr::Case(ref scrutinee, ref matches, ref ty) => {
            if matches.len() == 1 && is_irrefutable(&matches[0].pat) {
                Expr::Let {
                    pat: Box::new(matches[0].pat.clone()),
                    value: scrutinee.clone(),
                    body: Box::new(matches[0].body.clone()),
                    ty: ty.clone(),
                }
            } else if let Some(folded) = fold_case_of_literal(scrutinee, matches, ty) {
                folded
            } else {
                expr
            }
        }

        // Rule 6: dead / single-use let elimination.
        Expr::Let {
            ref pat,
            ref value,
            ref body,
            ..
        } => match pat.as_ident() {
            Some(id) => {
                let occurrences = occurs_count(body, id);
                if occurrences == 0 {
                    (**body).clone()
                } else if occurrences == 1 && value.is_pure_shape() {
                    substitute(body, id, value)
                } else {
                    expr
                }
            }
            None => expr,
        },

        _ => expr,
    }
}

/// Rule 7: fold a known scalar built-in (spec §8 scenarios 4 and 5 both
/// need the full chain - beta-reduction or case-folding alone only gets
/// an operator application down to literal operands, never further)
/// applied to literal operands into the literal result. Recognises the
/// same two call shapes `relationalizer::as_curried_call` and
/// `predicate_inversion`'s `andalso` builder use: a unary `App(Var(op),
/// arg)` and a curried binary `App(App(Var(op), lhs), rhs)`.
fn fold_builtin_application(f: &Expr, a: &Expr, ty: &Type) -> Option<Expr> {
    if let Expr::Var(id, _) = f {
        if let Expr::Literal(arg, _) = a {
            if crate::registry::is_known_scalar_operator(&id.name) {
                let folded = Value::eval_unary_builtin(&id.name, arg)?;
                return Some(Expr::Literal(folded, ty.clone()));
            }
        }
        return None;
    }
    let Expr::App(inner_f, lhs, _) = f else {
        return None;
    };
    let Expr::Var(id, _) = inner_f.as_ref() else {
        return None;
    };
    if !crate::registry::is_known_scalar_operator(&id.name) {
        return None;
    }
    let (Expr::Literal(lhs, _), Expr::Literal(rhs, _)) = (lhs.as_ref(), a) else {
        return None;
    };
    let folded = Value::eval_binary_builtin(&id.name, lhs, rhs)?;
    Some(Expr::Literal(folded, ty.clone()))
}

fn is_irrefutable(pat: &Pat) -> bool {
    match pat {
        Pat::Wildcard(_) | Pat::Ident(_, _) => true,
        Pat::Tuple(items, _) => items.iter().all(is_irrefutable),
        Pat::Record(fields, _) => fields.iter().all(|(_, p)| is_irrefutable(p)),
        Pat::As(_, inner, _) => is_irrefutable(inner),
        _ => false,
    }
}

enum PatTest {
    Matches(Vec<(Ident, Expr)>),
    NoMatch,
    Unknown,
}

fn constructor_name(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Con0(name, _) => Some(name),
        Expr::Con(name, _, _) => Some(name),
        _ => None,
    }
}

fn test_pat(pat: &Pat, scrutinee: &Expr) -> PatTest {
    match pat {
        Pat::Wildcard(_) => PatTest::Matches(vec![]),
        Pat::Ident(id, _) => PatTest::Matches(vec![(id.clone(), scrutinee.clone())]),
        Pat::Literal(lit, _) => match scrutinee {
            Expr::Literal(v, _) => {
                if v.literal_eq(lit) {
                    PatTest::Matches(vec![])
                } else {
                    PatTest::NoMatch
                }
            }
            _ => PatTest::Unknown,
        },
        Pat::Con0(name, _) => match constructor_name(scrutinee) {
            Some(sname) if sname == name => PatTest::Matches(vec![]),
            Some(_) => PatTest::NoMatch,
            None => PatTest::Unknown,
        },
        Pat::Con(name, inner, _) => match constructor_name(scrutinee) {
            Some(sname) if sname == name => match scrutinee {
                Expr::Con(_, sarg, _) => test_pat(inner, sarg),
                _ => PatTest::NoMatch,
            },
            Some(_) => PatTest::NoMatch,
            None => PatTest::Unknown,
        },
        Pat::As(id, inner, _) => match test_pat(inner, scrutinee) {
            PatTest::Matches(mut bindings) => {
                bindings.push((id.clone(), scrutinee.clone()));
                PatTest::Matches(bindings)
            }
            other => other,
        },
        _ => PatTest::Unknown,
    }
}

fn fold_case_of_literal(scrutinee: &Expr, matches: &[Match], ty: &Type) -> Option<Expr> {
    if !matches!(scrutinee, Expr::Literal(_, _) | Expr::Con0(_, _) | Expr::Con(_, _, _)) {
        return None;
    }
    for m in matches {
        match test_pat(&m.pat, scrutinee) {
            PatTest::Matches(bindings) => {
                let mut result = m.body.clone();
                for (id, value) in bindings.into_iter().rev() {
                    let value_ty = value.ty().clone();
                    result = Expr::Let {
                        pat: Box::new(Pat::Ident(id, value_ty)),
                        value: Box::new(value),
                        body: Box::new(result),
                        ty: ty.clone(),
                    };
                }
                return Some(result);
            }
            PatTest::NoMatch => continue,
            PatTest::Unknown => return None,
        }
    }
    None
}

/// Exact occurrence count of `id` as a free variable in `expr`. Split from
/// `free_vars` (which only reports presence) since rule 6 needs the count,
/// not just whether it occurs.
fn occurs_count(expr: &Expr, id: &Ident) -> usize {
    match expr {
        Expr::Literal(_, _) | Expr::Con0(_, _) => 0,
        Expr::Var(v, _) => usize::from(v == id),
        Expr::Con(_, arg, _) => occurs_count(arg, id),
        Expr::Fn(pat, body, _) => {
            if pat.binders().contains(id) {
                0
            } else {
                occurs_count(body, id)
            }
        }
        Expr::App(f, a, _) => occurs_count(f, id) + occurs_count(a, id),
        Expr::Let {
            pat, value, body, ..
        } => {
            occurs_count(value, id)
                + if pat.binders().contains(id) {
                    0
                } else {
                    occurs_count(body, id)
                }
        }
        Expr::LetRec { bindings, body, .. } => {
            let shadowed = bindings.iter().any(|(bid, _)| bid == id);
            if shadowed {
                0
            } else {
                bindings.iter().map(|(_, rhs)| occurs_count(rhs, id)).sum::<usize>()
                    + occurs_count(body, id)
            }
        }
        Expr::Case(scrutinee, arms, _) => {
            occurs_count(scrutinee, id)
                + arms
                    .iter()
                    .map(|m| {
                        if m.pat.binders().contains(id) {
                            0
                        } else {
                            occurs_count(&m.body, id)
                        }
                    })
                    .sum::<usize>()
        }
        Expr::Tuple(items, _) => items.iter().map(|e| occurs_count(e, id)).sum(),
        Expr::Record(fields, _) => fields.iter().map(|(_, e)| occurs_count(e, id)).sum(),
        Expr::Select(inner, _, _) => occurs_count(inner, id),
        Expr::LocalType { body, .. } => occurs_count(body, id),
        Expr::Comprehension {
            sources,
            steps,
            yield_expr,
            ..
        } => {
            let mut total = 0;
            let mut shadowed = false;
            for src in sources {
                if !shadowed {
                    total += occurs_count(&src.expr, id);
                }
                if src.pat.binders().contains(id) {
                    shadowed = true;
                }
            }
            if !shadowed {
                for step in steps {
                    total += match step {
                        CompStep::Where(e) => occurs_count(e, id),
                        CompStep::Order(items) => items.iter().map(|(e, _)| occurs_count(e, id)).sum(),
                        CompStep::Group { keys, aggs } => {
                            keys.iter().map(|e| occurs_count(e, id)).sum::<usize>()
                                + aggs.iter().map(|(_, _, e)| occurs_count(e, id)).sum::<usize>()
                        }
                    };
                }
                total += occurs_count(yield_expr, id);
            }
            total
        }
        Expr::Aggregate(_, arg, _) => occurs_count(arg, id),
    }
}

fn substitute(expr: &Expr, id: &Ident, value: &Expr) -> Expr {
    match expr {
        Expr::Var(v, _) if v == id => value.clone(),
        _ => expr.clone(),
    }
}

/// Run the Analyzer/Inliner loop to a fixed point (spec §2 control flow,
/// §4.5: "The caller iterates inlining until the tree is a fixed point").
/// Fails with [`CompileError::InternalLimit`] if `max_iterations` is
/// exceeded without convergence.
pub fn run_to_fixpoint(expr: &Expr, max_iterations: usize) -> CompileResult<Expr> {
    let mut current = expr.clone();
    for iteration in 0..max_iterations {
        let analysis = analyzer::analyze(&current);
        let next = inline_once(&current, &analysis);
        if next == current {
            debug!(iteration, "inliner reached a fixed point");
            return Ok(next);
        }
        current = next;
    }
    warn!(max_iterations, "inliner did not converge");
    Err(CompileError::InternalLimit {
        pass: "inliner",
        iterations: max_iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_ir::OrderDir;
    use crate::value::Value;

    fn int_ty() -> Type {
        Type::Int
    }

    #[test]
    fn beta_reduction_rewrites_application_of_a_lambda_to_a_let() {
        // (fn x => x) 5 -- one inline_once pass only reaches the
        // let-binding rule 3 produces; folding the now-dead binding away
        // is rule 6's job on a later pass (see run_to_fixpoint below).
        let x = Ident::with_ordinal("x", 1);
        let pat = Pat::Ident(x.clone(), int_ty());
        let f = Expr::Fn(
            Box::new(pat.clone()),
            Box::new(Expr::Var(x.clone(), int_ty())),
            Type::Function(Box::new(int_ty()), Box::new(int_ty())),
        );
        let app = Expr::App(Box::new(f), Box::new(Expr::Literal(Value::Int(5), int_ty())), int_ty());
        let analysis = analyzer::analyze(&app);
        let reduced = inline_once(&app, &analysis);
        assert_eq!(
            reduced,
            Expr::Let {
                pat: Box::new(pat),
                value: Box::new(Expr::Literal(Value::Int(5), int_ty())),
                body: Box::new(Expr::Var(x, int_ty())),
                ty: int_ty(),
            }
        );
    }

    #[test]
    fn beta_redex_fully_reduces_to_a_literal_at_the_fixpoint() {
        // (fn x => x + 1) 5, driven through run_to_fixpoint rather than a
        // single inline_once call.
        let x = Ident::with_ordinal("x", 1);
        let plus_one = Expr::App(
            Box::new(Expr::App(
                Box::new(Expr::Var(Ident::fresh("+"), Type::Unit)),
                Box::new(Expr::Var(x.clone(), int_ty())),
                Type::Unit,
            )),
            Box::new(Expr::Literal(Value::Int(1), int_ty())),
            int_ty(),
        );
        let f = Expr::Fn(
            Box::new(Pat::Ident(x, int_ty())),
            Box::new(plus_one),
            Type::Function(Box::new(int_ty()), Box::new(int_ty())),
        );
        let app = Expr::App(Box::new(f), Box::new(Expr::Literal(Value::Int(5), int_ty())), int_ty());
        let reduced = run_to_fixpoint(&app, 20).expect("converges");
        assert_eq!(reduced, Expr::Literal(Value::Int(6), int_ty()));
    }

    #[test]
    fn known_binary_builtin_over_literals_folds_to_a_literal() {
        // 5 + 1
        let expr = Expr::App(
            Box::new(Expr::App(
                Box::new(Expr::Var(Ident::fresh("+"), Type::Unit)),
                Box::new(Expr::Literal(Value::Int(5), int_ty())),
                Type::Unit,
            )),
            Box::new(Expr::Literal(Value::Int(1), int_ty())),
            int_ty(),
        );
        let analysis = analyzer::analyze(&expr);
        let folded = inline_once(&expr, &analysis);
        assert_eq!(folded, Expr::Literal(Value::Int(6), int_ty()));
    }

    #[test]
    fn division_by_zero_is_left_unfolded() {
        let expr = Expr::App(
            Box::new(Expr::App(
                Box::new(Expr::Var(Ident::fresh("/"), Type::Unit)),
                Box::new(Expr::Literal(Value::Int(5), int_ty())),
                Type::Unit,
            )),
            Box::new(Expr::Literal(Value::Int(0), int_ty())),
            int_ty(),
        );
        let analysis = analyzer::analyze(&expr);
        let folded = inline_once(&expr, &analysis);
        assert_eq!(folded, expr);
    }

    #[test]
    fn unary_negation_of_a_literal_folds() {
        let expr = Expr::App(
            Box::new(Expr::Var(Ident::fresh("~"), Type::Unit)),
            Box::new(Expr::Literal(Value::Int(5), int_ty())),
            int_ty(),
        );
        let analysis = analyzer::analyze(&expr);
        let folded = inline_once(&expr, &analysis);
        assert_eq!(folded, Expr::Literal(Value::Int(-5), int_ty()));
    }

    #[test]
    fn case_of_known_constructor_folds_to_the_matching_branch() {
        // case SOME 3 of NONE => 0 | SOME y => y
        let scrutinee = Expr::Con(
            "SOME".into(),
            Box::new(Expr::Literal(Value::Int(3), int_ty())),
            Type::Datatype {
                name: "option".into(),
                args: vec![int_ty()],
            },
        );
        let matches = vec![
            Match {
                pat: Pat::Con0("NONE".into(), Type::Datatype { name: "option".into(), args: vec![int_ty()] }),
                body: Expr::Literal(Value::Int(0), int_ty()),
            },
            Match {
                pat: Pat::Con(
                    "SOME".into(),
                    Box::new(Pat::Ident(Ident::with_ordinal("y", 2), int_ty())),
                    Type::Datatype { name: "option".into(), args: vec![int_ty()] },
                ),
                body: Expr::Var(Ident::with_ordinal("y", 2), int_ty()),
            },
        ];
        let case_expr = Expr::Case(Box::new(scrutinee), matches, int_ty());
        let analysis = analyzer::analyze(&case_expr);
        let reduced = inline_once(&case_expr, &analysis);
        let analysis2 = analyzer::analyze(&reduced);
        let reduced2 = inline_once(&reduced, &analysis2);
        assert_eq!(reduced2, Expr::Literal(Value::Int(3), int_ty()));
    }

    #[test]
    fn dead_let_binding_is_dropped() {
        let expr = Expr::Let {
            pat: Box::new(Pat::Ident(Ident::with_ordinal("unused", 1), int_ty())),
            value: Box::new(Expr::Literal(Value::Int(99), int_ty())),
            body: Box::new(Expr::Literal(Value::Int(1), int_ty())),
            ty: int_ty(),
        };
        let analysis = analyzer::analyze(&expr);
        let reduced = inline_once(&expr, &analysis);
        assert_eq!(reduced, Expr::Literal(Value::Int(1), int_ty()));
    }

    #[test]
    fn singleton_case_over_bare_identifier_becomes_a_let() {
        let scrutinee = Expr::Var(Ident::with_ordinal("pair", 1), Type::Tuple(vec![int_ty(), int_ty()]));
        let case_expr = Expr::Case(
            Box::new(scrutinee.clone()),
            vec![Match {
                pat: Pat::Ident(Ident::with_ordinal("p", 2), Type::Tuple(vec![int_ty(), int_ty()])),
                body: Expr::Var(Ident::with_ordinal("p", 2), Type::Tuple(vec![int_ty(), int_ty()])),
            }],
            Type::Tuple(vec![int_ty(), int_ty()]),
        );
        let analysis = analyzer::analyze(&case_expr);
        let reduced = inline_once(&case_expr, &analysis);
        match reduced {
            Expr::Let { value, .. } => assert_eq!(*value, scrutinee),
            _ => panic!("expected let"),
        }
    }

    #[test]
    fn run_to_fixpoint_converges_within_configured_cap() {
        let expr = Expr::Let {
            pat: Box::new(Pat::Ident(Ident::with_ordinal("a", 1), int_ty())),
            value: Box::new(Expr::Literal(Value::Int(10), int_ty())),
            body: Box::new(Expr::Var(Ident::with_ordinal("a", 1), int_ty())),
            ty: int_ty(),
        };
        let result = run_to_fixpoint(&expr, 20).unwrap();
        assert_eq!(result, Expr::Literal(Value::Int(10), int_ty()));
    }

    #[test]
    fn comprehension_order_step_is_rewritten_by_child_recursion() {
        let order_expr = Expr::Literal(Value::Int(1), int_ty());
        let comp = Expr::Comprehension {
            sources: vec![Source {
                pat: Pat::Ident(Ident::with_ordinal("x", 1), int_ty()),
                expr: Expr::Var(Ident::with_ordinal("xs", 9), Type::List(Box::new(int_ty()))),
            }],
            steps: vec![CompStep::Order(vec![(order_expr.clone(), OrderDir::Asc)])],
            yield_expr: Box::new(Expr::Var(Ident::with_ordinal("x", 1), int_ty())),
            is_default_yield: false,
            ty: Type::List(Box::new(int_ty())),
        };
        let analysis = analyzer::analyze(&comp);
        let reduced = inline_once(&comp, &analysis);
        match reduced {
            Expr::Comprehension { steps, .. } => {
                assert_eq!(steps.len(), 1);
            }
            _ => panic!("expected comprehension"),
        }
    }
}
