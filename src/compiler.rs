//! # Compiler entry points
//!
//! `compile` and `toRel` (spec §6), the two exposed interfaces. Together
//! they run the whole pipeline spec §2 lays out in dependency order:
//!
//! ```text
//! surface AST
//!     -> Resolver                                   (surface -> Core IR)
//!     -> Uniquifier (monotonic)                      (fresh binders)
//!     -> {Analyzer -> Inliner -> Relationalizer}*     (to a fixed point)
//!     -> predicate inversion (per comprehension)      (generators/ppt)
//!     -> relational lowering attempt                  (per comprehension)
//! ```
//!
//! Relational lowering is attempted opportunistically by [`to_rel`]; it
//! is not run as part of [`compile`] itself, since `compile` has no
//! `RelBuilder` to lower into (spec §6: `toRel` is its own exposed
//! interface, called by whatever evaluator decides a given expression is
//! worth lowering).
//!
//! Grounded on the teacher's top-level `DatalogEngine`/`lib.rs` pipeline
//! orchestration: a thin sequence of named stages, each instrumented with
//! a `tracing` span so a slow compilation can be attributed to a single
//! pass.

use crate::analyzer;
use crate::config::CompilerConfig;
use crate::core_ir::{Decl, Expr, ValDecl};
use crate::error::{CompileError, CompileResult};
use crate::inliner;
use crate::predicate_inversion;
use crate::rel_lowering::{self, RelBuilder};
use crate::relationalizer;
use crate::resolver::{CtorTable, Resolver};
use crate::surface_ast::SurfaceValBinding;
use crate::types::SharedTypeMap;
use crate::uniquifier;
use tracing::{debug, instrument, warn};

/// The opaque handle an interpreter would evaluate (spec §6: "`Code` is
/// an opaque handle the interpreter evaluates; it may internally be a
/// relational plan, a Core expression, or a mix"). This crate has no
/// interpreter of its own, so `Code` carries the fully-optimised Core IR
/// the interpreter would consume; any comprehension within it that
/// happens to be relational is discovered lazily by calling [`to_rel`]
/// on it, rather than being pre-lowered and stored here.
#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    pub decl: Decl,
}

/// Run the full compilation pipeline on a single top-level value
/// declaration (spec §6 `compile(env, decl)`). `env` here is the
/// `TypeMap` every Core IR node's type is resolved from — the `env`
/// parameter name follows spec §6's own signature, which uses "env" for
/// whatever ambient lookup context a stage needs; the Resolver's need is
/// a `TypeMap`, not an `Environment` binding frame.
#[instrument(skip_all)]
pub fn compile(
    type_map: SharedTypeMap,
    ctors: &CtorTable,
    config: &CompilerConfig,
    decl: &SurfaceValBinding,
) -> CompileResult<Code> {
    let resolver = Resolver::new(type_map);
    let resolved = resolver.resolve_decl(ctors, decl)?;
    debug!("resolved surface declaration to Core IR");

    let optimized = optimize_decl(resolved, config)?;
    Ok(Code { decl: optimized })
}

/// Try to lower a Core expression to a relational plan (spec §6
/// `toRel(env, exp)`). Returns `None` if any part of `exp` has no
/// relational counterpart — never an error (spec §4.10.3, §7).
pub fn to_rel<B: RelBuilder>(builder: &mut B, expr: &Expr) -> Option<B::Plan> {
    let inverted = predicate_inversion::invert_all(expr);
    rel_lowering::to_rel(builder, &inverted)
}

fn optimize_decl(decl: Decl, config: &CompilerConfig) -> CompileResult<Decl> {
    match decl {
        Decl::Val(ValDecl { pat, value }) => {
            let optimized = optimize_expr(&value, config)?;
            Ok(Decl::Val(ValDecl { pat, value: optimized }))
        }
        Decl::ValRec(bindings) => {
            let mut out = Vec::with_capacity(bindings.len());
            for (name, value) in bindings {
                out.push((name, optimize_expr(&value, config)?));
            }
            Ok(Decl::ValRec(out))
        }
        // A datatype group carries no expressions to optimise.
        Decl::Datatype(defs) => Ok(Decl::Datatype(defs)),
    }
}

/// Run the Uniquifier once, then the Analyzer/Inliner/Relationalizer
/// loop to a fixed point (spec §2 control flow; spec §5's iteration cap
/// applies to the whole three-pass loop, not just the Inliner alone,
/// since any of the three can still be making progress when another has
/// stalled).
#[instrument(skip_all)]
fn optimize_expr(expr: &Expr, config: &CompilerConfig) -> CompileResult<Expr> {
    let uniquified = uniquifier::run_monotonic(expr);
    run_optimizer_fixpoint(&uniquified, config.optimizer.max_inline_iterations)
}

fn run_optimizer_fixpoint(expr: &Expr, max_iterations: usize) -> CompileResult<Expr> {
    let mut current = expr.clone();
    for iteration in 0..max_iterations {
        let analysis = analyzer::analyze(&current);
        let inlined = inliner::inline_once(&current, &analysis);
        let next = relationalizer::relationalize_once(&inlined);
        if next == current {
            debug!(iteration, "optimizer fixpoint reached");
            return Ok(next);
        }
        current = next;
    }
    warn!(max_iterations, "analyzer/inliner/relationalizer loop did not converge");
    Err(CompileError::InternalLimit {
        pass: "optimizer",
        iterations: max_iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_ir::{Ident, Pat};
    use crate::rel_lowering::test_builder::PlanBuilder;
    use crate::surface_ast::{SurfaceExpr, SurfacePat};
    use crate::types::{MapTypeMap, Type};
    use crate::value::Value;
    use std::sync::Arc;

    fn binding_of(node: crate::types::NodeId, ty: Type, map: &mut MapTypeMap) {
        map.insert(node, ty);
    }

    #[test]
    fn compile_resolves_and_inlines_a_beta_redex() {
        // val r = (fn x => x + 1) 5
        let mut map = MapTypeMap::new();
        binding_of(1, Type::Function(Box::new(Type::Int), Box::new(Type::Int)), &mut map);
        binding_of(2, Type::Int, &mut map);
        binding_of(3, Type::Int, &mut map);
        binding_of(4, Type::Int, &mut map);
        binding_of(5, Type::Int, &mut map);
        binding_of(6, Type::Int, &mut map);
        binding_of(7, Type::Int, &mut map);

        let decl = SurfaceValBinding {
            pat: SurfacePat::Ident("r".into(), 7),
            value: SurfaceExpr::App(
                Box::new(SurfaceExpr::Fn(
                    vec![crate::surface_ast::SurfaceMatch {
                        pat: SurfacePat::Ident("x".into(), 2),
                        body: SurfaceExpr::Infix(
                            crate::surface_ast::InfixOp::Plus,
                            Box::new(SurfaceExpr::Ident("x".into(), 3)),
                            Box::new(SurfaceExpr::Literal(Value::Int(1), 4)),
                            5,
                        ),
                    }],
                    1,
                )),
                Box::new(SurfaceExpr::Literal(Value::Int(5), 6)),
                7,
            ),
        };

        let type_map: SharedTypeMap = Arc::new(map);
        let config = CompilerConfig::default();
        let ctors = CtorTable::new();
        let code = compile(type_map, &ctors, &config, &decl).expect("compiles");
        match code.decl {
            Decl::Val(ValDecl { value, .. }) => {
                assert_eq!(value, Expr::Literal(Value::Int(6), Type::Int));
            }
            other => panic!("expected a value declaration, got {other:?}"),
        }
    }

    #[test]
    fn to_rel_lowers_a_where_yield_comprehension() {
        use crate::core_ir::{CompStep, Field, Source};

        let e = Ident::with_ordinal("e", 1);
        let record_ty = Type::Record(vec![("a".into(), Type::Int), ("b".into(), Type::Int)]);
        let xs = Expr::Var(Ident::with_ordinal("xs", 2), Type::List(Box::new(record_ty.clone())));
        let filter = Expr::App(
            Box::new(Expr::App(
                Box::new(Expr::Var(Ident::fresh(">"), Type::Unit)),
                Box::new(Expr::Select(
                    Box::new(Expr::Var(e.clone(), record_ty.clone())),
                    Field::Label("a".into()),
                    Type::Int,
                )),
                Type::Unit,
            )),
            Box::new(Expr::Literal(Value::Int(1), Type::Int)),
            Type::Bool,
        );
        let comp = Expr::Comprehension {
            sources: vec![Source { pat: Pat::Ident(e.clone(), record_ty.clone()), expr: xs }],
            steps: vec![CompStep::Where(filter)],
            yield_expr: Box::new(Expr::Select(
                Box::new(Expr::Var(e, record_ty)),
                Field::Label("b".into()),
                Type::Int,
            )),
            is_default_yield: false,
            ty: Type::List(Box::new(Type::Int)),
        };

        let mut builder = PlanBuilder::new();
        let plan = to_rel(&mut builder, &comp).expect("should lower relationally");
        assert_eq!(plan.describe(), "project(filter(project(scan(xs))))");
    }
}
