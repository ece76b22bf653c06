//! # Environment-carrying shuttle
//!
//! A generic Core-IR traversal that threads an `Environment` through every
//! binding-introducing node, pushing a fresh frame before recursing into a
//! scope and popping it back out on the way up (spec §4.2). Two flavours:
//! `Shuttle` rebuilds the tree (used by the Uniquifier, Inliner,
//! Relationalizer); `Visitor` only observes it (used by the Analyzer).
//!
//! Grounded on the teacher's recursive `IRNode` walkers in `optimizer/mod.rs`
//! (each optimisation rule recurses structurally over every `IRNode`
//! variant), generalized into a reusable framework with default
//! per-variant methods so a pass overrides only the nodes it cares about —
//! spec §9: "Keep a minimal Shuttle helper ... but realise each pass as a
//! concrete function, not a subclass."

use crate::core_ir::{CompStep, Decl, Expr, Match, Source, ValDecl};
use crate::environment::{Binding, Environment};

/// A tree transformer: visits every Core expression, pushing a new
/// environment frame at each binding site before recursing into the scope
/// it introduces. Override only the hooks a pass needs; the default
/// implementation recurses structurally and leaves the tree unchanged.
pub trait EnvShuttle {
    /// Called on every expression node, with the environment valid at that
    /// point. The default dispatches to `walk_expr`, which recurses
    /// structurally, pushing frames at `Fn`, `Let`, `LetRec`, `Case`
    /// arms, and comprehension sources.
    fn visit_expr(&mut self, env: &Environment, expr: &Expr) -> Expr {
        self.walk_expr(env, expr)
    }

    fn walk_expr(&mut self, env: &Environment, expr: &Expr) -> Expr {
        match expr {
            Expr::Literal(v, t) => Expr::Literal(v.clone(), t.clone()),
            Expr::Var(id, t) => Expr::Var(id.clone(), t.clone()),
            Expr::Con0(name, t) => Expr::Con0(name.clone(), t.clone()),
            Expr::Con(name, arg, t) => Expr::Con(name.clone(), Box::new(self.visit_expr(env, arg)), t.clone()),
            Expr::Fn(pat, body, t) => {
                let new_pat = self.visit_pat(env, pat);
                let inner_env = bind_pat(env, &new_pat);
                let new_body = self.visit_expr(&inner_env, body);
                Expr::Fn(Box::new(new_pat), Box::new(new_body), t.clone())
            }
            Expr::App(f, a, t) => {
                let new_f = self.visit_expr(env, f);
                let new_a = self.visit_expr(env, a);
                Expr::App(Box::new(new_f), Box::new(new_a), t.clone())
            }
            Expr::Let {
                pat,
                value,
                body,
                ty,
            } => {
                let new_value = self.visit_expr(env, value);
                let new_pat = self.visit_pat(env, pat);
                let inner_env = bind_pat(env, &new_pat);
                let new_body = self.visit_expr(&inner_env, body);
                Expr::Let {
                    pat: Box::new(new_pat),
                    value: Box::new(new_value),
                    body: Box::new(new_body),
                    ty: ty.clone(),
                }
            }
            Expr::LetRec { bindings, body, ty } => {
                let mut inner_env = env.clone();
                for (id, _) in bindings {
                    inner_env = inner_env.bind(id.name.clone(), Binding::Value(Expr::Var(id.clone(), ty.clone())));
                }
                let new_bindings = bindings
                    .iter()
                    .map(|(id, rhs)| (id.clone(), self.visit_expr(&inner_env, rhs)))
                    .collect();
                let new_body = self.visit_expr(&inner_env, body);
                Expr::LetRec {
                    bindings: new_bindings,
                    body: Box::new(new_body),
                    ty: ty.clone(),
                }
            }
            Expr::Case(scrutinee, matches, t) => {
                let new_scrutinee = self.visit_expr(env, scrutinee);
                let new_matches = matches
                    .iter()
                    .map(|m| {
                        let new_pat = self.visit_pat(env, &m.pat);
                        let inner_env = bind_pat(env, &new_pat);
                        Match {
                            pat: new_pat,
                            body: self.visit_expr(&inner_env, &m.body),
                        }
                    })
                    .collect();
                Expr::Case(Box::new(new_scrutinee), new_matches, t.clone())
            }
            Expr::Tuple(items, t) => {
                Expr::Tuple(items.iter().map(|e| self.visit_expr(env, e)).collect(), t.clone())
            }
            Expr::Record(fields, t) => Expr::Record(
                fields
                    .iter()
                    .map(|(name, e)| (name.clone(), self.visit_expr(env, e)))
                    .collect(),
                t.clone(),
            ),
            Expr::Select(inner, field, t) => {
                Expr::Select(Box::new(self.visit_expr(env, inner)), field.clone(), t.clone())
            }
            Expr::LocalType { decls, body, ty } => Expr::LocalType {
                decls: decls.clone(),
                body: Box::new(self.visit_expr(env, body)),
                ty: ty.clone(),
            },
            Expr::Comprehension {
                sources,
                steps,
                yield_expr,
                is_default_yield,
                ty,
            } => {
                let mut inner_env = env.clone();
                let mut new_sources = Vec::with_capacity(sources.len());
                for src in sources {
                    let new_src_expr = self.visit_expr(&inner_env, &src.expr);
                    let new_pat = self.visit_pat(&inner_env, &src.pat);
                    inner_env = bind_pat(&inner_env, &new_pat);
                    new_sources.push(Source {
                        pat: new_pat,
                        expr: new_src_expr,
                    });
                }
                let new_steps = steps
                    .iter()
                    .map(|step| self.visit_comp_step(&inner_env, step))
                    .collect();
                let new_yield = self.visit_expr(&inner_env, yield_expr);
                Expr::Comprehension {
                    sources: new_sources,
                    steps: new_steps,
                    yield_expr: Box::new(new_yield),
                    is_default_yield: *is_default_yield,
                    ty: ty.clone(),
                }
            }
            Expr::Aggregate(func, arg, t) => {
                Expr::Aggregate(*func, Box::new(self.visit_expr(env, arg)), t.clone())
            }
        }
    }

    fn visit_comp_step(&mut self, env: &Environment, step: &CompStep) -> CompStep {
        match step {
            CompStep::Where(e) => CompStep::Where(self.visit_expr(env, e)),
            CompStep::Order(items) => CompStep::Order(
                items
                    .iter()
                    .map(|(e, dir)| (self.visit_expr(env, e), *dir))
                    .collect(),
            ),
            CompStep::Group { keys, aggs } => CompStep::Group {
                keys: keys.iter().map(|e| self.visit_expr(env, e)).collect(),
                aggs: aggs
                    .iter()
                    .map(|(name, func, e)| (name.clone(), *func, self.visit_expr(env, e)))
                    .collect(),
            },
        }
    }

    /// Patterns carry no inner expressions to rewrite structurally in this
    /// IR (all embedded literals are closed values), so the default is
    /// identity; overridden by the Uniquifier to rewrite binder
    /// identifiers.
    fn visit_pat(&mut self, _env: &Environment, pat: &crate::core_ir::Pat) -> crate::core_ir::Pat {
        pat.clone()
    }

    fn visit_decl(&mut self, env: &Environment, decl: &Decl) -> Decl {
        match decl {
            Decl::Val(ValDecl { pat, value }) => Decl::Val(ValDecl {
                pat: self.visit_pat(env, pat),
                value: self.visit_expr(env, value),
            }),
            Decl::ValRec(bindings) => {
                let mut inner_env = env.clone();
                for (id, _) in bindings {
                    inner_env = inner_env.bind(
                        id.name.clone(),
                        Binding::Value(Expr::Var(id.clone(), crate::types::Type::Unit)),
                    );
                }
                Decl::ValRec(
                    bindings
                        .iter()
                        .map(|(id, rhs)| (id.clone(), self.visit_expr(&inner_env, rhs)))
                        .collect(),
                )
            }
            Decl::Datatype(defs) => Decl::Datatype(defs.clone()),
        }
    }
}

/// A read-only traversal: visits every node but returns nothing. Used by
/// the Analyzer, which accumulates usage counts as a side effect rather
/// than rebuilding a tree.
pub trait EnvVisitor {
    fn visit_expr(&mut self, env: &Environment, expr: &Expr) {
        self.walk_expr(env, expr);
    }

    fn walk_expr(&mut self, env: &Environment, expr: &Expr) {
        match expr {
            Expr::Literal(_, _) | Expr::Var(_, _) | Expr::Con0(_, _) => {}
            Expr::Con(_, arg, _) => self.visit_expr(env, arg),
            Expr::Fn(pat, body, _) => {
                let inner_env = bind_pat(env, pat);
                self.visit_expr(&inner_env, body);
            }
            Expr::App(f, a, _) => {
                self.visit_expr(env, f);
                self.visit_expr(env, a);
            }
            Expr::Let {
                pat, value, body, ..
            } => {
                self.visit_expr(env, value);
                let inner_env = bind_pat(env, pat);
                self.visit_expr(&inner_env, body);
            }
            Expr::LetRec { bindings, body, .. } => {
                let mut inner_env = env.clone();
                for (id, _) in bindings {
                    inner_env = inner_env.bind(
                        id.name.clone(),
                        Binding::Value(Expr::Var(id.clone(), crate::types::Type::Unit)),
                    );
                }
                for (_, rhs) in bindings {
                    self.visit_expr(&inner_env, rhs);
                }
                self.visit_expr(&inner_env, body);
            }
            Expr::Case(scrutinee, matches, _) => {
                self.visit_expr(env, scrutinee);
                for m in matches {
                    let inner_env = bind_pat(env, &m.pat);
                    self.visit_expr(&inner_env, &m.body);
                }
            }
            Expr::Tuple(items, _) => {
                for e in items {
                    self.visit_expr(env, e);
                }
            }
            Expr::Record(fields, _) => {
                for (_, e) in fields {
                    self.visit_expr(env, e);
                }
            }
            Expr::Select(inner, _, _) => self.visit_expr(env, inner),
            Expr::LocalType { body, .. } => self.visit_expr(env, body),
            Expr::Comprehension {
                sources,
                steps,
                yield_expr,
                ..
            } => {
                let mut inner_env = env.clone();
                for src in sources {
                    self.visit_expr(&inner_env, &src.expr);
                    inner_env = bind_pat(&inner_env, &src.pat);
                }
                for step in steps {
                    self.visit_comp_step(&inner_env, step);
                }
                self.visit_expr(&inner_env, yield_expr);
            }
            Expr::Aggregate(_, arg, _) => self.visit_expr(env, arg),
        }
    }

    fn visit_comp_step(&mut self, env: &Environment, step: &CompStep) {
        match step {
            CompStep::Where(e) => self.visit_expr(env, e),
            CompStep::Order(items) => {
                for (e, _) in items {
                    self.visit_expr(env, e);
                }
            }
            CompStep::Group { keys, aggs } => {
                for e in keys {
                    self.visit_expr(env, e);
                }
                for (_, _, e) in aggs {
                    self.visit_expr(env, e);
                }
            }
        }
    }
}

/// Push a frame per identifier bound by `pat`, each mapped to a `Var`
/// placeholder of the same identifier (used so lookups inside the scope
/// resolve to *some* binding; passes that need the real right-hand side —
/// e.g. the Inliner — track that separately via `Analysis`).
pub(crate) fn bind_pat(env: &Environment, pat: &crate::core_ir::Pat) -> Environment {
    let mut inner = env.clone();
    for id in pat.binders() {
        let ty = pat.ty().clone();
        inner = inner.bind(id.name.clone(), Binding::Value(Expr::Var(id, ty)));
    }
    inner
}
