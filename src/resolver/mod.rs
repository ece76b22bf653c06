//! # Resolver
//!
//! Lowers the surface AST into Core IR (spec §4.1): desugars multi-binding
//! `val`, multi-match `fn`, `if`, infix operators, partial/disordered
//! record patterns, and comprehension normalisation (implicit default
//! yield). Every node's type comes from the ambient `TypeMap` — the
//! Resolver never infers or reconstructs a type itself.
//!
//! Grounded on the teacher's `ir_builder::IRBuilder` — a single-purpose
//! struct holding the ambient lookup table (`Catalog` there, `TypeMap`
//! here) with one public `build_ir`-style entry point per surface
//! construct, generalized from Datalog-rule lowering to expression
//! lowering.

use crate::core_ir::{
    AggFunc, CompStep, ConstructorDef, DatatypeDef, Decl, Expr, Field, Ident, Match, OrderDir, Pat,
    Source, ValDecl,
};
use crate::error::{CompileError, CompileResult};
use crate::surface_ast::{
    InfixOp, SurfaceCompStep, SurfaceConstructor, SurfaceDatatypeDecl, SurfaceExpr, SurfaceMatch,
    SurfacePat, SurfaceSource, SurfaceValBinding,
};
use crate::types::{NodeId, SharedTypeMap, Type};
use std::collections::HashMap;

/// Whether a known constructor takes an argument, tracked so the Resolver
/// can tell a bare application of a constructor name apart from an
/// ordinary function call (spec §4.1 "zero-arity constructors are emitted
/// as `Con0Pat`/`Con0`").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtorArity {
    Nullary,
    Unary,
}

/// The set of constructor names visible at a point in the surface tree —
/// seeded by the caller from the ambient environment (module-level
/// datatypes) and extended as the Resolver descends into `local datatype`
/// scopes.
pub type CtorTable = HashMap<String, CtorArity>;

/// Translates surface syntax into Core IR, consulting `type_map` for
/// every node's resolved type.
pub struct Resolver {
    type_map: SharedTypeMap,
}

impl Resolver {
    pub fn new(type_map: SharedTypeMap) -> Self {
        Resolver { type_map }
    }

    fn ty_of(&self, node: NodeId) -> CompileResult<Type> {
        self.type_map
            .lookup(node)
            .ok_or_else(|| CompileError::MalformedInput(format!("node {node} has no resolved type")))
    }

    /// Lower a top-level declaration.
    pub fn resolve_decl(&self, ctors: &CtorTable, decl: &SurfaceValBinding) -> CompileResult<Decl> {
        Ok(Decl::Val(ValDecl {
            pat: self.resolve_pat(ctors, &decl.pat)?,
            value: self.resolve_expr(ctors, &decl.value)?,
        }))
    }

    pub fn resolve_expr(&self, ctors: &CtorTable, expr: &SurfaceExpr) -> CompileResult<Expr> {
        let ty = self.ty_of(expr.node())?;
        match expr {
            SurfaceExpr::Literal(v, _) => Ok(Expr::Literal(v.clone(), ty)),

            SurfaceExpr::Ident(name, _) => self.resolve_ident(ctors, name, ty),

            SurfaceExpr::Fn(matches, _) => self.resolve_fn(ctors, matches, ty),

            SurfaceExpr::App(f, a, _) => self.resolve_app(ctors, f, a, ty),

            SurfaceExpr::If(c, t, e, _) => {
                let scrutinee = self.resolve_expr(ctors, c)?;
                let then_branch = self.resolve_expr(ctors, t)?;
                let else_branch = self.resolve_expr(ctors, e)?;
                Ok(Expr::Case(
                    Box::new(scrutinee),
                    vec![
                        Match {
                            pat: Pat::Con0("true".to_string(), Type::Bool),
                            body: then_branch,
                        },
                        Match {
                            pat: Pat::Con0("false".to_string(), Type::Bool),
                            body: else_branch,
                        },
                    ],
                    ty,
                ))
            }

            SurfaceExpr::Infix(op, l, r, _) => self.resolve_infix(ctors, *op, l, r, ty),

            SurfaceExpr::Val { bindings, body, .. } => self.resolve_val(ctors, bindings, body),

            SurfaceExpr::ValRec { bindings, body, .. } => {
                let mut resolved = Vec::with_capacity(bindings.len());
                for (name, rhs) in bindings {
                    resolved.push((Ident::fresh(name.clone()), self.resolve_expr(ctors, rhs)?));
                }
                Ok(Expr::LetRec {
                    bindings: resolved,
                    body: Box::new(self.resolve_expr(ctors, body)?),
                    ty,
                })
            }

            SurfaceExpr::Case(scrutinee, matches, _) => {
                let resolved_scrutinee = self.resolve_expr(ctors, scrutinee)?;
                let resolved_matches = matches
                    .iter()
                    .map(|m| self.resolve_match(ctors, m))
                    .collect::<CompileResult<Vec<_>>>()?;
                Ok(Expr::Case(Box::new(resolved_scrutinee), resolved_matches, ty))
            }

            SurfaceExpr::Tuple(items, _) => {
                let resolved = items
                    .iter()
                    .map(|e| self.resolve_expr(ctors, e))
                    .collect::<CompileResult<Vec<_>>>()?;
                Ok(Expr::Tuple(resolved, ty))
            }

            SurfaceExpr::Record(fields, _) => {
                let resolved = fields
                    .iter()
                    .map(|(name, e)| Ok((name.clone(), self.resolve_expr(ctors, e)?)))
                    .collect::<CompileResult<Vec<_>>>()?;
                Ok(Expr::Record(resolved, ty))
            }

            SurfaceExpr::Datatype { decls, body, .. } => {
                let mut extended = ctors.clone();
                let core_decls = decls
                    .iter()
                    .map(|d| self.resolve_datatype_decl(&mut extended, d))
                    .collect();
                Ok(Expr::LocalType {
                    decls: core_decls,
                    body: Box::new(self.resolve_expr(&extended, body)?),
                    ty,
                })
            }

            SurfaceExpr::From {
                sources,
                steps,
                yield_expr,
                ..
            } => self.resolve_comprehension(ctors, sources, steps, yield_expr.as_deref(), ty),
        }
    }

    fn resolve_ident(&self, ctors: &CtorTable, name: &str, ty: Type) -> CompileResult<Expr> {
        match ctors.get(name) {
            Some(CtorArity::Nullary) => Ok(Expr::Con0(name.to_string(), ty)),
            // A unary constructor used bare (not yet applied) resolves to an
            // ordinary identifier reference; the Resolver only emits
            // `Con(name, arg, _)` at the application site (`resolve_app`).
            _ => Ok(Expr::Var(Ident::fresh(name.to_string()), ty)),
        }
    }

    fn resolve_app(
        &self,
        ctors: &CtorTable,
        f: &SurfaceExpr,
        a: &SurfaceExpr,
        ty: Type,
    ) -> CompileResult<Expr> {
        if let SurfaceExpr::Ident(name, _) = f {
            if ctors.get(name.as_str()) == Some(&CtorArity::Unary) {
                return Ok(Expr::Con(name.clone(), Box::new(self.resolve_expr(ctors, a)?), ty));
            }
        }
        Ok(Expr::App(
            Box::new(self.resolve_expr(ctors, f)?),
            Box::new(self.resolve_expr(ctors, a)?),
            ty,
        ))
    }

    /// `fn p1 => e1 | p2 => e2 | ...` — a single identifier-pattern arm
    /// lowers directly to `Expr::Fn`; anything else (multiple arms, or a
    /// single non-identifier pattern) desugars to `fn x => case x of ...`
    /// with a fresh `x` (spec §4.1).
    fn resolve_fn(&self, ctors: &CtorTable, matches: &[SurfaceMatch], ty: Type) -> CompileResult<Expr> {
        let arg_ty = match &ty {
            Type::Function(arg, _) => (**arg).clone(),
            other => other.clone(),
        };
        if let [single] = matches {
            if let SurfacePat::Ident(_, _) = &single.pat {
                let pat = self.resolve_pat(ctors, &single.pat)?;
                let body = self.resolve_expr(ctors, &single.body)?;
                return Ok(Expr::Fn(Box::new(pat), Box::new(body), ty));
            }
        }
        let fresh = Ident::fresh("x");
        let resolved_matches = matches
            .iter()
            .map(|m| self.resolve_match(ctors, m))
            .collect::<CompileResult<Vec<_>>>()?;
        let result_ty = match &ty {
            Type::Function(_, result) => (**result).clone(),
            other => other.clone(),
        };
        let scrutinee = Expr::Var(fresh.clone(), arg_ty.clone());
        Ok(Expr::Fn(
            Box::new(Pat::Ident(fresh, arg_ty)),
            Box::new(Expr::Case(Box::new(scrutinee), resolved_matches, result_ty)),
            ty,
        ))
    }

    fn resolve_match(&self, ctors: &CtorTable, m: &SurfaceMatch) -> CompileResult<Match> {
        Ok(Match {
            pat: self.resolve_pat(ctors, &m.pat)?,
            body: self.resolve_expr(ctors, &m.body)?,
        })
    }

    /// `val p1=e1 and p2=e2 ... in body` (n≥1). A single binding lowers
    /// directly to `let`; n≥2 bindings become `let v=(e1,...,en) in case v
    /// of (p1,...,pn) => body` with a fresh `v` (spec §4.1).
    fn resolve_val(
        &self,
        ctors: &CtorTable,
        bindings: &[SurfaceValBinding],
        body: &SurfaceExpr,
    ) -> CompileResult<Expr> {
        if let [single] = bindings {
            let pat = self.resolve_pat(ctors, &single.pat)?;
            let value = self.resolve_expr(ctors, &single.value)?;
            let resolved_body = self.resolve_expr(ctors, body)?;
            let ty = resolved_body.ty().clone();
            return Ok(Expr::Let {
                pat: Box::new(pat),
                value: Box::new(value),
                body: Box::new(resolved_body),
                ty,
            });
        }

        let mut pats = Vec::with_capacity(bindings.len());
        let mut values = Vec::with_capacity(bindings.len());
        for b in bindings {
            pats.push(self.resolve_pat(ctors, &b.pat)?);
            values.push(self.resolve_expr(ctors, &b.value)?);
        }
        let value_tys: Vec<Type> = values.iter().map(|v| v.ty().clone()).collect();
        let tuple_ty = Type::Tuple(value_tys.clone());
        let fresh = Ident::fresh("v");
        let resolved_body = self.resolve_expr(ctors, body)?;
        let body_ty = resolved_body.ty().clone();
        Ok(Expr::Let {
            pat: Box::new(Pat::Ident(fresh.clone(), tuple_ty.clone())),
            value: Box::new(Expr::Tuple(values, tuple_ty.clone())),
            body: Box::new(Expr::Case(
                Box::new(Expr::Var(fresh, tuple_ty)),
                vec![Match {
                    pat: Pat::Tuple(pats, Type::Tuple(value_tys)),
                    body: resolved_body,
                }],
                body_ty.clone(),
            )),
            ty: body_ty,
        })
    }

    fn resolve_infix(
        &self,
        ctors: &CtorTable,
        op: InfixOp,
        l: &SurfaceExpr,
        r: &SurfaceExpr,
        ty: Type,
    ) -> CompileResult<Expr> {
        let name = infix_builtin_name(op);
        let lhs = self.resolve_expr(ctors, l)?;
        let rhs = self.resolve_expr(ctors, r)?;
        let lhs_ty = lhs.ty().clone();
        let rhs_ty = rhs.ty().clone();
        Ok(Expr::App(
            Box::new(Expr::App(
                Box::new(Expr::Var(
                    Ident::fresh(name),
                    Type::Function(
                        Box::new(lhs_ty.clone()),
                        Box::new(Type::Function(Box::new(rhs_ty.clone()), Box::new(ty.clone()))),
                    ),
                )),
                Box::new(lhs),
                Type::Function(Box::new(rhs_ty), Box::new(ty.clone())),
            )),
            Box::new(rhs),
            ty,
        ))
    }

    fn resolve_datatype_decl(&self, ctors: &mut CtorTable, decl: &SurfaceDatatypeDecl) -> DatatypeDef {
        let mut constructors = Vec::with_capacity(decl.constructors.len());
        for c in &decl.constructors {
            let arity = if c.arg.is_some() {
                CtorArity::Unary
            } else {
                CtorArity::Nullary
            };
            ctors.insert(c.name.clone(), arity);
            constructors.push(self.resolve_constructor_def(c));
        }
        DatatypeDef {
            name: decl.name.clone(),
            constructors,
        }
    }

    fn resolve_constructor_def(&self, c: &SurfaceConstructor) -> ConstructorDef {
        ConstructorDef {
            name: c.name.clone(),
            arg: c.arg.clone(),
        }
    }

    /// Canonicalises a possibly-partial, possibly-disordered record
    /// pattern (spec §4.1). When the pattern's resolved type is a known
    /// record, every field of that type appears in the result, in the
    /// type's field order, with absent surface fields filled by a
    /// wildcard; otherwise the surface order is kept as given.
    fn resolve_pat(&self, ctors: &CtorTable, pat: &SurfacePat) -> CompileResult<Pat> {
        let ty = self.ty_of(pat.node())?;
        match pat {
            SurfacePat::Wildcard(_) => Ok(Pat::Wildcard(ty)),
            SurfacePat::Ident(name, _) => Ok(Pat::Ident(Ident::fresh(name.clone()), ty)),
            SurfacePat::Literal(v, _) => Ok(Pat::Literal(v.clone(), ty)),
            SurfacePat::Tuple(items, _) => {
                let resolved = items
                    .iter()
                    .map(|p| self.resolve_pat(ctors, p))
                    .collect::<CompileResult<Vec<_>>>()?;
                Ok(Pat::Tuple(resolved, ty))
            }
            SurfacePat::Record(fields, _) => self.resolve_record_pat(ctors, fields, ty),
            SurfacePat::List(items, _) => {
                let resolved = items
                    .iter()
                    .map(|p| self.resolve_pat(ctors, p))
                    .collect::<CompileResult<Vec<_>>>()?;
                Ok(Pat::List(resolved, ty))
            }
            SurfacePat::Cons(head, tail, _) => Ok(Pat::Cons(
                Box::new(self.resolve_pat(ctors, head)?),
                Box::new(self.resolve_pat(ctors, tail)?),
                ty,
            )),
            SurfacePat::Con0(name, _) => Ok(Pat::Con0(name.clone(), ty)),
            SurfacePat::Con(name, arg, _) => {
                Ok(Pat::Con(name.clone(), Box::new(self.resolve_pat(ctors, arg)?), ty))
            }
            SurfacePat::As(name, inner, _) => Ok(Pat::As(
                Ident::fresh(name.clone()),
                Box::new(self.resolve_pat(ctors, inner)?),
                ty,
            )),
        }
    }

    fn resolve_record_pat(
        &self,
        ctors: &CtorTable,
        fields: &[(String, SurfacePat)],
        ty: Type,
    ) -> CompileResult<Pat> {
        let schema = match &ty {
            Type::Record(schema_fields) => Some(schema_fields.clone()),
            _ => None,
        };
        let Some(schema) = schema else {
            let resolved = fields
                .iter()
                .map(|(n, p)| Ok((n.clone(), self.resolve_pat(ctors, p)?)))
                .collect::<CompileResult<Vec<_>>>()?;
            return Ok(Pat::Record(resolved, ty));
        };
        let mut by_name: HashMap<&str, &SurfacePat> =
            fields.iter().map(|(n, p)| (n.as_str(), p)).collect();
        let mut resolved = Vec::with_capacity(schema.len());
        for (field_name, field_ty) in &schema {
            match by_name.remove(field_name.as_str()) {
                Some(p) => resolved.push((field_name.clone(), self.resolve_pat(ctors, p)?)),
                None => resolved.push((field_name.clone(), Pat::Wildcard(field_ty.clone()))),
            }
        }
        Ok(Pat::Record(resolved, ty))
    }

    fn resolve_comprehension(
        &self,
        ctors: &CtorTable,
        sources: &[SurfaceSource],
        steps: &[SurfaceCompStep],
        yield_expr: Option<&SurfaceExpr>,
        ty: Type,
    ) -> CompileResult<Expr> {
        let mut resolved_sources = Vec::with_capacity(sources.len());
        let mut bound_names: Vec<(Ident, Type)> = Vec::new();
        for s in sources {
            let pat = self.resolve_pat(ctors, &s.pat)?;
            for id in pat.binders() {
                bound_names.push((id.clone(), pat.ty().clone()));
            }
            resolved_sources.push(Source {
                pat,
                expr: self.resolve_expr(ctors, &s.expr)?,
            });
        }

        let resolved_steps = steps
            .iter()
            .map(|s| self.resolve_step(ctors, s))
            .collect::<CompileResult<Vec<_>>>()?;

        let (yield_expr, is_default_yield) = match yield_expr {
            Some(y) => (self.resolve_expr(ctors, y)?, false),
            None => {
                let record_fields: Vec<(String, Expr)> = bound_names
                    .iter()
                    .map(|(id, t)| (id.name.clone(), Expr::Var(id.clone(), t.clone())))
                    .collect();
                let record_ty = Type::Record(
                    record_fields
                        .iter()
                        .map(|(n, e)| (n.clone(), e.ty().clone()))
                        .collect(),
                );
                (Expr::Record(record_fields, record_ty), true)
            }
        };

        Ok(Expr::Comprehension {
            sources: resolved_sources,
            steps: resolved_steps,
            yield_expr: Box::new(yield_expr),
            is_default_yield,
            ty,
        })
    }

    fn resolve_step(&self, ctors: &CtorTable, step: &SurfaceCompStep) -> CompileResult<CompStep> {
        match step {
            SurfaceCompStep::Where(e) => Ok(CompStep::Where(self.resolve_expr(ctors, e)?)),
            SurfaceCompStep::Order(items) => {
                let resolved = items
                    .iter()
                    .map(|(e, dir)| Ok((self.resolve_expr(ctors, e)?, *dir)))
                    .collect::<CompileResult<Vec<(Expr, OrderDir)>>>()?;
                Ok(CompStep::Order(resolved))
            }
            SurfaceCompStep::Group { keys, aggs } => {
                let resolved_keys = keys
                    .iter()
                    .map(|e| self.resolve_expr(ctors, e))
                    .collect::<CompileResult<Vec<_>>>()?;
                let resolved_aggs = aggs
                    .iter()
                    .map(|(name, func, e)| Ok((name.clone(), *func, self.resolve_expr(ctors, e)?)))
                    .collect::<CompileResult<Vec<(String, AggFunc, Expr)>>>()?;
                Ok(CompStep::Group {
                    keys: resolved_keys,
                    aggs: resolved_aggs,
                })
            }
        }
    }
}

/// The fixed operator→built-in table (spec §4.1, §9 "Global registries").
fn infix_builtin_name(op: InfixOp) -> &'static str {
    crate::registry::builtin_name(op)
}
