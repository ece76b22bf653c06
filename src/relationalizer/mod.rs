//! # Relationalizer
//!
//! Rewrites `List.map f xs` into `from e in xs yield f e` and
//! `List.filter p xs` into `from e in xs where p e` (spec §4.6), so later
//! passes only have to reason about one iteration construct
//! (comprehensions) instead of two. When `xs` is already a comprehension
//! carrying the Resolver's implicit default yield, the new step is
//! appended to it in place instead of wrapping a fresh comprehension
//! around it.
//!
//! Grounded on the teacher's `optimizer::fuse_to_flatmap` /
//! `fuse_to_join_flatmap` passes (which likewise recognise a known-shaped
//! wrapper around an existing plan and splice into it rather than
//! nesting), generalized from relational IR fusion to Core-IR
//! comprehension fusion.

use crate::core_ir::{CompStep, Expr, Ident, Pat, Source};
use crate::types::Type;
use std::sync::atomic::{AtomicU32, Ordering};

const LIST_MAP: &str = "List.map";
const LIST_FILTER: &str = "List.filter";

/// Relationalization runs inside the Analyzer/Inliner/Relationalizer
/// fixpoint loop, after the one-shot Uniquifier pass has already assigned
/// every surface binder a unique ordinal (spec §2 control flow). A
/// comprehension source binder synthesised here therefore can't go
/// through the Uniquifier again; instead it draws from a disjoint
/// ordinal range so it can never collide with one the Uniquifier assigned.
static NEXT_SYNTHETIC_ORDINAL: AtomicU32 = AtomicU32::new(1 << 24);

fn fresh_source_binder(base_name: &str) -> Ident {
    let ordinal = NEXT_SYNTHETIC_ORDINAL.fetch_add(1, Ordering::Relaxed);
    Ident::with_ordinal(base_name, ordinal)
}

/// Run one bottom-up relationalisation pass over `expr`.
pub fn relationalize_once(expr: &Expr) -> Expr {
    let rebuilt = rebuild_children(expr);
    apply_rule(rebuilt)
}

fn rebuild_children(expr: &Expr) -> Expr {
    match expr {
        Expr::Literal(_, _) | Expr::Var(_, _) | Expr::Con0(_, _) => expr.clone(),
        Expr::Con(name, arg, t) => Expr::Con(name.clone(), Box::new(relationalize_once(arg)), t.clone()),
        Expr::Fn(pat, body, t) => Expr::Fn(pat.clone(), Box::new(relationalize_once(body)), t.clone()),
        Expr::App(f, a, t) => Expr::App(
            Box::new(relationalize_once(f)),
            Box::new(relationalize_once(a)),
            t.clone(),
        ),
        Expr::Let {
            pat,
            value,
            body,
            ty,
        } => Expr::Let {
            pat: pat.clone(),
            value: Box::new(relationalize_once(value)),
            body: Box::new(relationalize_once(body)),
            ty: ty.clone(),
        },
        Expr::LetRec { bindings, body, ty } => Expr::LetRec {
            bindings: bindings
                .iter()
                .map(|(id, rhs)| (id.clone(), relationalize_once(rhs)))
                .collect(),
            body: Box::new(relationalize_once(body)),
            ty: ty.clone(),
        },
        Expr::Case(scrutinee, matches, t) => Expr::Case(
            Box::new(relationalize_once(scrutinee)),
            matches
                .iter()
                .map(|m| crate::core_ir::Match {
                    pat: m.pat.clone(),
                    body: relationalize_once(&m.body),
                })
                .collect(),
            t.clone(),
        ),
        Expr::Tuple(items, t) => Expr::Tuple(items.iter().map(relationalize_once).collect(), t.clone()),
        Expr::Record(fields, t) => Expr::Record(
            fields
                .iter()
                .map(|(n, e)| (n.clone(), relationalize_once(e)))
                .collect(),
            t.clone(),
        ),
        Expr::Select(inner, field, t) => {
            Expr::Select(Box::new(relationalize_once(inner)), field.clone(), t.clone())
        }
        Expr::LocalType { decls, body, ty } => Expr::LocalType {
            decls: decls.clone(),
            body: Box::new(relationalize_once(body)),
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
                    expr: relationalize_once(&s.expr),
                })
                .collect(),
            steps: steps.clone(),
            yield_expr: Box::new(relationalize_once(yield_expr)),
            is_default_yield: *is_default_yield,
            ty: ty.clone(),
        },
        Expr::Aggregate(func, arg, t) => {
            Expr::Aggregate(*func, Box::new(relationalize_once(arg)), t.clone())
        }
    }
}

/// Recognise `App(App(Var(name), arg), xs)` — the curried two-argument
/// call shape `name arg xs`.
fn as_curried_call<'a>(expr: &'a Expr) -> Option<(&'a str, &'a Expr, &'a Expr)> {
    if let Expr::App(outer_f, xs, _) = expr {
        if let Expr::App(inner_f, arg, _) = outer_f.as_ref() {
            if let Expr::Var(id, _) = inner_f.as_ref() {
                return Some((id.name.as_str(), arg.as_ref(), xs.as_ref()));
            }
        }
    }
    None
}

fn element_type(list_ty: &Type) -> Type {
    match list_ty {
        Type::List(elem) => (**elem).clone(),
        other => other.clone(),
    }
}

fn apply_rule(expr: Expr) -> Expr {
    let Some((name, arg, xs)) = as_curried_call(&expr) else {
        return expr;
    };
    if name != LIST_MAP && name != LIST_FILTER {
        return expr;
    }
    let result_ty = expr.ty().clone();
    let elem_ty = element_type(xs.ty());
    let bound = fresh_source_binder("e");
    let bound_var = Expr::Var(bound.clone(), elem_ty.clone());
    let new_step = if name == LIST_MAP {
        None
    } else {
        Some(CompStep::Where(Expr::App(
            Box::new(arg.clone()),
            Box::new(bound_var.clone()),
            Type::Bool,
        )))
    };
    let new_yield = if name == LIST_MAP {
        Expr::App(Box::new(arg.clone()), Box::new(bound_var.clone()), element_type(&result_ty))
    } else {
        bound_var.clone()
    };

    if let Expr::Comprehension {
        sources,
        steps,
        yield_expr,
        is_default_yield: true,
        ty,
    } = xs
    {
        // `xs` is already a default-yield comprehension: splice the new
        // step and yield into it rather than nesting a fresh one.
        let mut new_steps = steps.clone();
        let is_filter = name == LIST_FILTER;
        let splice_yield = if is_filter {
            new_steps.push(CompStep::Where(Expr::App(
                Box::new(arg.clone()),
                Box::new((**yield_expr).clone()),
                Type::Bool,
            )));
            (**yield_expr).clone()
        } else {
            Expr::App(
                Box::new(arg.clone()),
                Box::new((**yield_expr).clone()),
                element_type(&result_ty),
            )
        };
        return Expr::Comprehension {
            sources: sources.clone(),
            steps: new_steps,
            yield_expr: Box::new(splice_yield),
            is_default_yield: is_filter,
            ty: result_ty,
        };
    }

    Expr::Comprehension {
        sources: vec![Source {
            pat: Pat::Ident(bound, elem_ty),
            expr: xs.clone(),
        }],
        steps: new_step.into_iter().collect(),
        yield_expr: Box::new(new_yield),
        is_default_yield: name == LIST_FILTER,
        ty: result_ty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_ty(elem: Type) -> Type {
        Type::List(Box::new(elem))
    }

    fn predicate_var(name: &str, ordinal: u32) -> Expr {
        Expr::Var(
            Ident::with_ordinal(name, ordinal),
            Type::Function(Box::new(Type::Int), Box::new(Type::Bool)),
        )
    }

    #[test]
    fn list_map_becomes_a_yield_comprehension() {
        let f = predicate_var("f", 1);
        let xs = Expr::Var(Ident::with_ordinal("xs", 2), list_ty(Type::Int));
        let call = Expr::App(
            Box::new(Expr::App(
                Box::new(Expr::Var(Ident::with_ordinal("List.map", 0), Type::Unit)),
                Box::new(f),
                Type::Unit,
            )),
            Box::new(xs.clone()),
            list_ty(Type::Int),
        );
        let rewritten = relationalize_once(&call);
        match rewritten {
            Expr::Comprehension { sources, steps, is_default_yield, .. } => {
                assert_eq!(sources.len(), 1);
                assert_eq!(sources[0].expr, xs);
                assert!(steps.is_empty());
                assert!(is_default_yield);
            }
            other => panic!("expected comprehension, got {other:?}"),
        }
    }

    #[test]
    fn list_filter_becomes_a_where_comprehension() {
        let p = predicate_var("p", 1);
        let xs = Expr::Var(Ident::with_ordinal("xs", 2), list_ty(Type::Int));
        let call = Expr::App(
            Box::new(Expr::App(
                Box::new(Expr::Var(Ident::with_ordinal("List.filter", 0), Type::Unit)),
                Box::new(p),
                Type::Unit,
            )),
            Box::new(xs.clone()),
            list_ty(Type::Int),
        );
        let rewritten = relationalize_once(&call);
        match rewritten {
            Expr::Comprehension { sources, steps, .. } => {
                assert_eq!(sources.len(), 1);
                assert_eq!(steps.len(), 1);
                assert!(matches!(steps[0], CompStep::Where(_)));
            }
            other => panic!("expected comprehension, got {other:?}"),
        }
    }

    #[test]
    fn non_map_filter_application_is_left_untouched() {
        let f = predicate_var("g", 1);
        let xs = Expr::Var(Ident::with_ordinal("xs", 2), list_ty(Type::Int));
        let call = Expr::App(
            Box::new(Expr::App(
                Box::new(Expr::Var(Ident::with_ordinal("List.fold", 0), Type::Unit)),
                Box::new(f),
                Type::Unit,
            )),
            Box::new(xs.clone()),
            Type::Int,
        );
        let rewritten = relationalize_once(&call);
        assert_eq!(rewritten, call);
    }

    #[test]
    fn filter_over_an_existing_default_yield_comprehension_appends_in_place() {
        let bound = Ident::with_ordinal("e", 5);
        let inner_xs = Expr::Var(Ident::with_ordinal("xs", 2), list_ty(Type::Int));
        let inner_comp = Expr::Comprehension {
            sources: vec![Source {
                pat: Pat::Ident(bound.clone(), Type::Int),
                expr: inner_xs,
            }],
            steps: vec![],
            yield_expr: Box::new(Expr::Var(bound.clone(), Type::Int)),
            is_default_yield: true,
            ty: list_ty(Type::Int),
        };
        let p = predicate_var("p", 1);
        let call = Expr::App(
            Box::new(Expr::App(
                Box::new(Expr::Var(Ident::with_ordinal("List.filter", 0), Type::Unit)),
                Box::new(p),
                Type::Unit,
            )),
            Box::new(inner_comp),
            list_ty(Type::Int),
        );
        let rewritten = relationalize_once(&call);
        match rewritten {
            Expr::Comprehension { sources, steps, .. } => {
                assert_eq!(sources.len(), 1, "should not nest a new source");
                assert_eq!(steps.len(), 1);
            }
            other => panic!("expected spliced comprehension, got {other:?}"),
        }
    }
}
