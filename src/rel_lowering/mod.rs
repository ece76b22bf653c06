//! # Relational lowering
//!
//! Offers a `from` comprehension to an opaque `RelBuilder` backend (spec
//! §4.10): sources chain via inner joins, steps translate in order, the
//! yield expression becomes the final projection. Lowering is a *silent*
//! fallback — any unsupported shape returns `None` rather than an error,
//! and the caller keeps evaluating the original Core tree (§4.10.3).
//!
//! Grounded on the teacher's `ir_builder::build_ir` pipeline: scan sources,
//! chain joins, apply computed columns and filters, project — the same
//! staged shape, retargeted from a Datalog rule body to a comprehension's
//! sources/steps/yield. The `RelBuilder` trait itself mirrors the stack
//! discipline spec §4.10's own operation list implies (`union(n)`,
//! `minus(n)`, `join(inner)` — parameterised by counts/flags rather than
//! explicit operands — is a push/pop builder, not a pure combinator API).

use crate::core_ir::{AggFunc, CompStep, Expr, Field, Ident, OrderDir, Pat, Source};
use crate::types::Type;
use crate::value::Value;
use std::collections::HashMap;

/// A scalar relational expression ("rex" in spec §4.10) — the translated
/// form of a Core scalar passed to `RelBuilder::filter`/`project`/etc.
#[derive(Debug, Clone, PartialEq)]
pub enum RelExpr {
    Literal(Value),
    /// A single column of the current row, by canonical dotted name
    /// (`alias.field`).
    Column(String),
    /// A reference to an entire aliased row — used when a variable denotes
    /// a whole record-typed source rather than one of its fields.
    Range(String),
    /// A known operator from the fixed table (§4.10.1) applied to
    /// already-lowered operands.
    Op(&'static str, Vec<RelExpr>),
    /// The scalar escape hatch (§4.10.1): an expression the relational
    /// backend can't evaluate itself, carried opaquely for the
    /// interpreter. `printed` and `expected_ty` are both backend-opaque
    /// strings (spec §6).
    ScalarEscape { printed: String, expected_ty: String },
}

/// The relational construction API consumed from an external collaborator
/// (spec §4.10, §6). Implementations are a stack machine: most operations
/// pop plan(s) off an internal stack and push a transformed result back —
/// `union`/`intersect`/`minus` take a pop-count, `join` takes only an
/// "is inner" flag, matching the parameter lists spec §4.10 gives each
/// operation.
pub trait RelBuilder {
    type Plan: Clone;

    /// Push a literal row set with the given schema.
    fn values(&mut self, schema: Vec<(String, Type)>, rows: Vec<Vec<Value>>) -> bool;
    /// Push the result of an opaque backend function call used as a
    /// source (e.g. scanning an externally-bound collection).
    fn function_scan(&mut self, op: &str, args: Vec<RelExpr>, schema: Vec<(String, Type)>) -> bool;
    /// Push an already-built plan onto the stack.
    fn push(&mut self, plan: Self::Plan);
    /// Rename the alias of the relation on top of the stack.
    fn alias(&mut self, name: &str) -> bool;
    fn project(&mut self, fields: Vec<RelExpr>, names: Vec<String>) -> bool;
    fn filter(&mut self, rex: RelExpr) -> bool;
    fn sort(&mut self, items: Vec<(RelExpr, OrderDir)>) -> bool;
    fn aggregate(&mut self, keys: Vec<RelExpr>, aggs: Vec<(String, AggFunc, RelExpr)>) -> bool;
    /// Pop two plans (left pushed first), push their join.
    fn join(&mut self, inner: bool) -> bool;
    fn union(&mut self, n: usize) -> bool;
    fn intersect(&mut self, n: usize) -> bool;
    fn minus(&mut self, n: usize) -> bool;
    /// The row schema of the plan currently on top of the stack.
    fn peek_schema(&self) -> Option<Vec<(String, Type)>>;
    /// Pop the plan currently on top of the stack.
    fn pop(&mut self) -> Option<Self::Plan>;
}

/// How a comprehension source binder resolves in the row currently being
/// built.
#[derive(Debug, Clone)]
enum VarBinding {
    /// The variable denotes an entire record-typed row.
    Row { alias: String, fields: Vec<(String, Type)> },
    /// The variable denotes a single column.
    Column { name: String, ty: Type },
}

/// Try to lower `expr` to a relational plan. Returns `None` if any part of
/// `expr` has no relational counterpart (spec §4.10.3: the caller falls
/// back to interpreting the original Core tree).
pub fn to_rel<B: RelBuilder>(builder: &mut B, expr: &Expr) -> Option<B::Plan> {
    match expr {
        Expr::Comprehension { sources, steps, yield_expr, .. } => {
            lower_comprehension(builder, sources, steps, yield_expr)
        }
        _ => lower_set_op(builder, expr),
    }
}

fn as_binary_builtin<'a>(expr: &'a Expr, name: &str) -> Option<(&'a Expr, &'a Expr)> {
    let Expr::App(outer_f, b, _) = expr else { return None };
    let Expr::App(inner_f, a, _) = outer_f.as_ref() else { return None };
    let Expr::Var(id, _) = inner_f.as_ref() else { return None };
    (id.name == name).then_some((a.as_ref(), b.as_ref()))
}

/// `a union b` / `a except b` / `a intersect b` (spec §4.10.2): lower both
/// sides, harmonise their row types, then combine.
fn lower_set_op<B: RelBuilder>(builder: &mut B, expr: &Expr) -> Option<B::Plan> {
    let combine: fn(&mut B, usize) -> bool = if as_binary_builtin(expr, "union").is_some() {
        B::union
    } else if as_binary_builtin(expr, "intersect").is_some() {
        B::intersect
    } else if as_binary_builtin(expr, "except").is_some() {
        B::minus
    } else {
        return None;
    };
    let (a, b) = as_binary_builtin(expr, "union")
        .or_else(|| as_binary_builtin(expr, "intersect"))
        .or_else(|| as_binary_builtin(expr, "except"))?;
    let left = to_rel(builder, a)?;
    let right = to_rel(builder, b)?;
    let (left, right) = harmonize(builder, left, right)?;
    builder.push(left);
    builder.push(right);
    if !combine(builder, 2) {
        return None;
    }
    builder.pop()
}

/// Reconcile two plans to a common row type by widening mismatched
/// primitive columns (only `int`/`real` widen; anything else must already
/// match). Returns the (possibly reprojected) pair, or `None` if the row
/// types can't be reconciled at all.
fn harmonize<B: RelBuilder>(builder: &mut B, left: B::Plan, right: B::Plan) -> Option<(B::Plan, B::Plan)> {
    let (left, left_schema) = schema_of(builder, left);
    let (right, right_schema) = schema_of(builder, right);
    if left_schema.len() != right_schema.len() {
        return None;
    }
    let mut common = Vec::with_capacity(left_schema.len());
    for ((ln, lt), (_, rt)) in left_schema.iter().zip(right_schema.iter()) {
        common.push((ln.clone(), widen(lt, rt)?));
    }
    let project_to = |builder: &mut B, plan: B::Plan, schema: &[(String, Type)]| -> Option<B::Plan> {
        builder.push(plan);
        let ok = builder.project(
            schema.iter().map(|(n, _)| RelExpr::Column(n.clone())).collect(),
            common.iter().map(|(n, _)| n.clone()).collect(),
        );
        if !ok {
            return None;
        }
        builder.pop()
    };
    let left = project_to(builder, left, &left_schema)?;
    let right = project_to(builder, right, &right_schema)?;
    Some((left, right))
}

fn widen(a: &Type, b: &Type) -> Option<Type> {
    if a == b {
        return Some(a.clone());
    }
    matches!((a, b), (Type::Int, Type::Real) | (Type::Real, Type::Int)).then_some(Type::Real)
}

fn schema_of<B: RelBuilder>(builder: &mut B, plan: B::Plan) -> (B::Plan, Vec<(String, Type)>) {
    builder.push(plan);
    let schema = builder.peek_schema().unwrap_or_default();
    let plan = builder.pop().expect("just-pushed plan must be poppable");
    (plan, schema)
}

fn lower_comprehension<B: RelBuilder>(
    builder: &mut B,
    sources: &[Source],
    steps: &[CompStep],
    yield_expr: &Expr,
) -> Option<B::Plan> {
    let mut bindings: HashMap<Ident, VarBinding> = HashMap::new();
    let mut flat_schema: Vec<(String, Type)> = Vec::new();
    let mut chain: Option<B::Plan> = None;

    for (idx, source) in sources.iter().enumerate() {
        let alias = format!("s{idx}");
        let source_plan = lower_source(builder, &source.expr)?;
        let (source_plan, source_schema) = schema_of(builder, source_plan);
        bind_pattern(&source.pat, &alias, &source_schema, &mut bindings)?;

        // Step 3: project this source's fields to a canonical, dotted-name
        // column order before it joins the chain, so sources with
        // colliding field names never collide in the joined row.
        let prefixed_schema: Vec<(String, Type)> = source_schema
            .iter()
            .map(|(n, t)| (format!("{alias}.{n}"), t.clone()))
            .collect();
        builder.push(source_plan);
        if !builder.project(
            source_schema.iter().map(|(n, _)| RelExpr::Column(n.clone())).collect(),
            prefixed_schema.iter().map(|(n, _)| n.clone()).collect(),
        ) {
            return None;
        }
        let prefixed_plan = builder.pop()?;
        flat_schema.extend(prefixed_schema);

        chain = Some(match chain {
            None => prefixed_plan,
            Some(left) => {
                builder.push(left);
                builder.push(prefixed_plan);
                if !builder.join(true) {
                    return None;
                }
                builder.pop()?
            }
        });
    }
    let mut current = chain?;
    let _ = &flat_schema;

    for step in steps {
        current = lower_step(builder, current, step, &bindings)?;
    }

    lower_yield(builder, current, yield_expr, &bindings)
}

fn lower_step<B: RelBuilder>(
    builder: &mut B,
    current: B::Plan,
    step: &CompStep,
    bindings: &HashMap<Ident, VarBinding>,
) -> Option<B::Plan> {
    builder.push(current);
    match step {
        CompStep::Where(filter_expr) => {
            let rex = lower_scalar(filter_expr, bindings)?;
            if !builder.filter(rex) {
                return None;
            }
            builder.pop()
        }
        CompStep::Order(items) => {
            let translated = items
                .iter()
                .map(|(e, dir)| Some((lower_scalar(e, bindings)?, *dir)))
                .collect::<Option<Vec<_>>>()?;
            if !builder.sort(translated) {
                return None;
            }
            builder.pop()
        }
        CompStep::Group { keys, aggs } => {
            let translated_keys = keys
                .iter()
                .map(|e| lower_scalar(e, bindings))
                .collect::<Option<Vec<_>>>()?;
            let translated_aggs = aggs
                .iter()
                .map(|(name, func, e)| Some((name.clone(), *func, lower_scalar(e, bindings)?)))
                .collect::<Option<Vec<_>>>()?;
            if !builder.aggregate(translated_keys, translated_aggs) {
                return None;
            }
            let plan = builder.pop()?;
            // After aggregate, permute fields to name-sorted order so the
            // result matches a canonical record layout (spec §4.10 step 4).
            let (plan, mut schema) = schema_of(builder, plan);
            schema.sort_by(|a, b| a.0.cmp(&b.0));
            builder.push(plan);
            if !builder.project(
                schema.iter().map(|(n, _)| RelExpr::Column(n.clone())).collect(),
                schema.iter().map(|(n, _)| n.clone()).collect(),
            ) {
                return None;
            }
            builder.pop()
        }
    }
}

fn lower_yield<B: RelBuilder>(
    builder: &mut B,
    current: B::Plan,
    yield_expr: &Expr,
    bindings: &HashMap<Ident, VarBinding>,
) -> Option<B::Plan> {
    builder.push(current);
    let ok = match yield_expr {
        Expr::Record(fields, _) => {
            let rexes = fields
                .iter()
                .map(|(_, e)| lower_scalar(e, bindings))
                .collect::<Option<Vec<_>>>()?;
            let names = fields.iter().map(|(n, _)| n.clone()).collect();
            builder.project(rexes, names)
        }
        Expr::Tuple(items, _) => {
            let rexes = items
                .iter()
                .map(|e| lower_scalar(e, bindings))
                .collect::<Option<Vec<_>>>()?;
            let names = (0..items.len()).map(|i| format!("_{}", i + 1)).collect();
            builder.project(rexes, names)
        }
        other => {
            let rex = lower_scalar(other, bindings)?;
            builder.project(vec![rex], vec!["it".to_string()])
        }
    };
    if !ok {
        return None;
    }
    builder.pop()
}

/// Lower a single comprehension source expression to a relational subplan
/// (spec §4.10 step 1). Nested comprehensions recurse through `to_rel`; a
/// bare variable of list type becomes a named scan.
fn lower_source<B: RelBuilder>(builder: &mut B, expr: &Expr) -> Option<B::Plan> {
    match expr {
        Expr::Comprehension { .. } => to_rel(builder, expr),
        Expr::Var(id, ty) => {
            let schema = source_row_schema(ty)?;
            if !builder.function_scan("scan", vec![RelExpr::Column(id.name.clone())], schema) {
                return None;
            }
            builder.pop()
        }
        _ => None,
    }
}

fn source_row_schema(list_ty: &Type) -> Option<Vec<(String, Type)>> {
    let Type::List(elem) = list_ty else { return None };
    match elem.as_ref() {
        Type::Record(fields) => Some(fields.clone()),
        other => Some(vec![("it".to_string(), other.clone())]),
    }
}

/// Bind a source pattern's binders to references into `source_schema`
/// (spec §4.10 step 2's "map: variable → reference-producing function").
/// Only identifier and flat-tuple patterns are supported; anything richer
/// aborts lowering (the caller falls back to the interpreter).
fn bind_pattern(
    pat: &Pat,
    alias: &str,
    source_schema: &[(String, Type)],
    bindings: &mut HashMap<Ident, VarBinding>,
) -> Option<()> {
    match pat {
        Pat::Wildcard(_) => Some(()),
        Pat::Ident(id, ty) => {
            if ty.is_record() {
                bindings.insert(
                    id.clone(),
                    VarBinding::Row { alias: alias.to_string(), fields: source_schema.to_vec() },
                );
            } else {
                let (name, field_ty) = source_schema.first()?;
                bindings.insert(
                    id.clone(),
                    VarBinding::Column { name: format!("{alias}.{name}"), ty: field_ty.clone() },
                );
            }
            Some(())
        }
        Pat::Tuple(items, _) if items.len() == source_schema.len() => {
            for (item, (name, ty)) in items.iter().zip(source_schema.iter()) {
                match item {
                    Pat::Ident(id, _) => {
                        bindings.insert(
                            id.clone(),
                            VarBinding::Column { name: format!("{alias}.{name}"), ty: ty.clone() },
                        );
                    }
                    Pat::Wildcard(_) => {}
                    _ => return None,
                }
            }
            Some(())
        }
        _ => None,
    }
}

fn as_known_operator<'a>(expr: &'a Expr) -> Option<(&'static str, &'a Expr, &'a Expr)> {
    let Expr::App(outer_f, b, _) = expr else { return None };
    let Expr::App(inner_f, a, _) = outer_f.as_ref() else { return None };
    let Expr::Var(id, _) = inner_f.as_ref() else { return None };
    let name = *crate::registry::known_scalar_operator_names()
        .iter()
        .find(|n| **n == id.name)?;
    Some((name, a.as_ref(), b.as_ref()))
}

/// Translate a Core scalar into a `RelExpr` (spec §4.10.1). Falls back to
/// the scalar escape hatch for anything not covered by the known-operator
/// table or a direct variable/selector reference.
fn lower_scalar(expr: &Expr, bindings: &HashMap<Ident, VarBinding>) -> Option<RelExpr> {
    match expr {
        Expr::Literal(v, _) => Some(RelExpr::Literal(v.clone())),
        Expr::Var(id, _) => match bindings.get(id) {
            Some(VarBinding::Row { alias, .. }) => Some(RelExpr::Range(alias.clone())),
            Some(VarBinding::Column { name, .. }) => Some(RelExpr::Column(name.clone())),
            None => scalar_escape(expr),
        },
        Expr::Select(inner, field, _) => {
            if let Expr::Var(id, _) = inner.as_ref() {
                if let Some(VarBinding::Row { alias, fields }) = bindings.get(id) {
                    let label = match field {
                        Field::Label(l) => Some(l.clone()),
                        Field::Index(i) => fields.get(*i).map(|(n, _)| n.clone()),
                    };
                    if let Some(label) = label {
                        return Some(RelExpr::Column(format!("{alias}.{label}")));
                    }
                }
            }
            scalar_escape(expr)
        }
        _ => {
            if let Some((op, a, b)) = as_known_operator(expr) {
                let l = lower_scalar(a, bindings)?;
                let r = lower_scalar(b, bindings)?;
                Some(RelExpr::Op(op, vec![l, r]))
            } else {
                scalar_escape(expr)
            }
        }
    }
}

/// Build the scalar escape hatch (spec §4.10.1, §6): the Core expression's
/// printed form alongside a JSON-encoded expected type, both opaque to
/// this crate. Pretty-printing is an out-of-scope collaborator (spec §1),
/// so `printed` uses the expression's debug form as a stand-in.
fn scalar_escape(expr: &Expr) -> Option<RelExpr> {
    let expected_ty = serde_json::json!({ "type": expr.ty().to_string() }).to_string();
    Some(RelExpr::ScalarEscape { printed: format!("{expr:?}"), expected_ty })
}


pub mod test_builder;
