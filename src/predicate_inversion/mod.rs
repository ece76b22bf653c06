//! # Predicate inversion (comprehension sources)
//!
//! Ties [`crate::generators`], [`crate::inverters`], and [`crate::ppt`]
//! together for the one place the pipeline actually needs them: a
//! comprehension source the Resolver left ungrounded because the surface
//! `from` had no explicit `in` clause, just a constraining predicate
//! (spec §1 item 3, §4.7-§4.9). Such a source's `expr` is the canonical
//! "enumerate everything of this type" marker [`crate::generators::Generator::Extent`]
//! produces — a reference to a well-known `_extent` identifier — which is
//! not something any backend can actually enumerate. This pass tries to
//! replace it with a real, finite-or-known-infinite generator built from
//! the comprehension's own `where` conjuncts, and drops whichever
//! conjuncts that generator already accounts for (spec §3 `Generator`:
//! `simplify`).
//!
//! Grounded on the teacher's `ir_builder`'s habit of running a small,
//! focused rewrite over a sub-tree before handing it to the next stage;
//! the actual synthesis work is delegated entirely to
//! `generators`/`inverters`, which are themselves grounded on
//! `magic_sets::Adornment`/`QueryBinding`.

use crate::core_ir::{CompStep, Expr, Ident, Source};
use crate::generators::{self, Generator};
use crate::inverters;
use crate::types::Type;
use std::collections::HashSet;

const EXTENT_MARKER: &str = "_extent";

fn is_extent_source(expr: &Expr) -> bool {
    matches!(expr, Expr::Var(id, _) if id.name == EXTENT_MARKER)
}

fn andalso(exprs: Vec<Expr>) -> Option<Expr> {
    let mut iter = exprs.into_iter();
    let first = iter.next()?;
    Some(iter.fold(first, |acc, next| {
        Expr::App(
            Box::new(Expr::App(
                Box::new(Expr::Var(Ident::fresh("andalso"), Type::Unit)),
                Box::new(acc),
                Type::Unit,
            )),
            Box::new(next),
            Type::Bool,
        )
    }))
}

/// Walk `expr` bottom-up, running [`invert_comprehension`] over every
/// comprehension node found anywhere in the tree. Mirrors
/// `relationalizer::relationalize_once`'s recursion shape: rebuild
/// children first, then apply the local rule.
pub fn invert_all(expr: &Expr) -> Expr {
    let rebuilt = rebuild_children(expr);
    match rebuilt {
        Expr::Comprehension {
            sources,
            steps,
            yield_expr,
            is_default_yield,
            ty,
        } => {
            let (sources, steps) = invert_comprehension(&sources, &steps);
            Expr::Comprehension {
                sources,
                steps,
                yield_expr,
                is_default_yield,
                ty,
            }
        }
        other => other,
    }
}

fn rebuild_children(expr: &Expr) -> Expr {
    match expr {
        Expr::Literal(_, _) | Expr::Var(_, _) | Expr::Con0(_, _) => expr.clone(),
        Expr::Con(name, arg, t) => Expr::Con(name.clone(), Box::new(invert_all(arg)), t.clone()),
        Expr::Fn(pat, body, t) => Expr::Fn(pat.clone(), Box::new(invert_all(body)), t.clone()),
        Expr::App(f, a, t) => Expr::App(Box::new(invert_all(f)), Box::new(invert_all(a)), t.clone()),
        Expr::Let { pat, value, body, ty } => Expr::Let {
            pat: pat.clone(),
            value: Box::new(invert_all(value)),
            body: Box::new(invert_all(body)),
            ty: ty.clone(),
        },
        Expr::LetRec { bindings, body, ty } => Expr::LetRec {
            bindings: bindings.iter().map(|(id, rhs)| (id.clone(), invert_all(rhs))).collect(),
            body: Box::new(invert_all(body)),
            ty: ty.clone(),
        },
        Expr::Case(scrutinee, matches, t) => Expr::Case(
            Box::new(invert_all(scrutinee)),
            matches
                .iter()
                .map(|m| crate::core_ir::Match {
                    pat: m.pat.clone(),
                    body: invert_all(&m.body),
                })
                .collect(),
            t.clone(),
        ),
        Expr::Tuple(items, t) => Expr::Tuple(items.iter().map(invert_all).collect(), t.clone()),
        Expr::Record(fields, t) => Expr::Record(
            fields.iter().map(|(n, e)| (n.clone(), invert_all(e))).collect(),
            t.clone(),
        ),
        Expr::Select(inner, field, t) => Expr::Select(Box::new(invert_all(inner)), field.clone(), t.clone()),
        Expr::LocalType { decls, body, ty } => Expr::LocalType {
            decls: decls.clone(),
            body: Box::new(invert_all(body)),
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
                .map(|s| Source { pat: s.pat.clone(), expr: invert_all(&s.expr) })
                .collect(),
            steps: steps.clone(),
            yield_expr: Box::new(invert_all(yield_expr)),
            is_default_yield: *is_default_yield,
            ty: ty.clone(),
        },
        Expr::Aggregate(func, arg, t) => Expr::Aggregate(*func, Box::new(invert_all(arg)), t.clone()),
    }
}

/// Try to invert every ungrounded (`_extent`-sourced) source in a
/// comprehension, using the combined `where` conjuncts as the constraint
/// pool. Returns possibly-rewritten sources and steps; returns the inputs
/// unchanged, conjunct for conjunct, wherever inversion doesn't fire —
/// per spec §7, that is never an error, only a missed optimisation left
/// for the interpreter to evaluate directly.
pub fn invert_comprehension(sources: &[Source], steps: &[CompStep]) -> (Vec<Source>, Vec<CompStep>) {
    let bound: HashSet<Ident> = sources
        .iter()
        .filter(|s| !is_extent_source(&s.expr))
        .flat_map(|s| s.pat.binders())
        .collect();

    let conjuncts: Vec<Expr> = steps
        .iter()
        .filter_map(|s| match s {
            CompStep::Where(e) => Some(e),
            _ => None,
        })
        .flat_map(generators::flatten_conjunction)
        .collect();

    let mut new_sources = sources.to_vec();
    let mut consumed = vec![false; conjuncts.len()];

    for source in &mut new_sources {
        if !is_extent_source(&source.expr) {
            continue;
        }
        let Some(goal) = source.pat.as_ident() else { continue };
        if bound.contains(goal) {
            continue;
        }
        let Some(generator) = invert_one(goal, &conjuncts) else { continue };
        source.expr = generator.enumerate(source.pat.ty());
        for (idx, conjunct) in conjuncts.iter().enumerate() {
            if !consumed[idx] && generator.simplify(goal, conjunct) {
                consumed[idx] = true;
            }
        }
    }

    let new_steps = rebuild_steps(steps, &conjuncts, &consumed);
    (new_sources, new_steps)
}

fn invert_one(goal: &Ident, conjuncts: &[Expr]) -> Option<Generator> {
    if let Some(g) = generators::synthesize(goal, conjuncts) {
        return Some(g);
    }
    conjuncts.iter().find_map(|c| inverters::invert(goal, c))
}

fn rebuild_steps(steps: &[CompStep], conjuncts: &[Expr], consumed: &[bool]) -> Vec<CompStep> {
    if !consumed.iter().any(|c| *c) {
        return steps.to_vec();
    }
    let mut remaining = conjuncts
        .iter()
        .zip(consumed.iter())
        .filter(|(_, used)| !**used)
        .map(|(c, _)| c.clone());
    let mut out = Vec::with_capacity(steps.len());
    let mut where_emitted = false;
    for step in steps {
        match step {
            CompStep::Where(_) => {
                if where_emitted {
                    continue;
                }
                where_emitted = true;
                let kept: Vec<Expr> = remaining.by_ref().collect();
                if let Some(merged) = andalso(kept) {
                    out.push(CompStep::Where(merged));
                }
            }
            other => out.push(other.clone()),
        }
    }
    out
}
