//! Inliner fixpoint-convergence benchmarks on synthetic `let`-chains.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use flowml_core::core_ir::{Expr, Ident, Pat};
use flowml_core::inliner;
use flowml_core::types::Type;
use flowml_core::value::Value;
use std::hint::black_box;

/// `let x0 = 0 in let x1 = x0 + 1 in ... let xN = x(N-1) + 1 in xN`, each
/// binding used exactly once by the next — the shape rule 6 (single-use
/// inlining) and rule 7 (builtin constant folding) chase all the way down
/// to a single literal.
fn build_let_chain(depth: u32) -> Expr {
    let int_ty = Type::Int;

    fn go(i: u32, depth: u32, int_ty: &Type) -> Expr {
        let id = Ident::with_ordinal("x", i);
        if i > depth {
            return Expr::Var(Ident::with_ordinal("x", depth), int_ty.clone());
        }
        let value = if i == 0 {
            Expr::Literal(Value::Int(0), int_ty.clone())
        } else {
            let prev = Ident::with_ordinal("x", i - 1);
            Expr::App(
                Box::new(Expr::App(
                    Box::new(Expr::Var(Ident::fresh("+"), Type::Unit)),
                    Box::new(Expr::Var(prev, int_ty.clone())),
                    Type::Unit,
                )),
                Box::new(Expr::Literal(Value::Int(1), int_ty.clone())),
                int_ty.clone(),
            )
        };
        Expr::Let {
            pat: Box::new(Pat::Ident(id, int_ty.clone())),
            value: Box::new(value),
            body: Box::new(go(i + 1, depth, int_ty)),
            ty: int_ty.clone(),
        }
    }

    go(0, depth, &int_ty)
}

fn bench_fixpoint_convergence(c: &mut Criterion) {
    let mut group = c.benchmark_group("inliner_fixpoint");
    for depth in [10u32, 50, 200] {
        let chain = build_let_chain(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &chain, |b, chain| {
            b.iter(|| inliner::run_to_fixpoint(black_box(chain), 1_000).expect("converges"));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fixpoint_convergence);
criterion_main!(benches);
