//! An in-memory, structural `RelBuilder` used only by this crate's own
//! tests. Every operation records a one-word description of itself so
//! tests can assert on the shape of the plan tree (`describe()`) without
//! needing a real relational backend wired in.
//!
//! Grounded on (and structurally close to) the teacher's
//! `ir::IRNode`/`Predicate`/`IRExpression` — a small closed tree with a
//! `pretty_print`-style rendering method — trimmed of every
//! Datalog-recursion/vector/temporal variant spec.md §4.10 has no use for.

use super::{RelBuilder, RelExpr};
use crate::core_ir::{AggFunc, OrderDir};
use crate::types::Type;
use crate::value::Value;

/// A single node of the in-memory reference plan tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    op: String,
    alias: Option<String>,
    schema: Vec<(String, Type)>,
}

impl Plan {
    /// A compact, parenthesised rendering of this plan's operator tree
    /// (e.g. `"project(filter(project(scan(xs))))"`), used by tests.
    pub fn describe(&self) -> String {
        self.op.clone()
    }

    pub fn schema(&self) -> &[(String, Type)] {
        &self.schema
    }
}

/// A stack-based, in-memory `RelBuilder` reference implementation.
#[derive(Debug, Default)]
pub struct PlanBuilder {
    stack: Vec<Plan>,
}

impl PlanBuilder {
    pub fn new() -> Self {
        PlanBuilder::default()
    }

    fn infer_type(rex: &RelExpr, schema: &[(String, Type)]) -> Type {
        match rex {
            RelExpr::Literal(Value::Bool(_)) => Type::Bool,
            RelExpr::Literal(Value::Char(_)) => Type::Char,
            RelExpr::Literal(Value::Int(_)) => Type::Int,
            RelExpr::Literal(Value::Real(_)) => Type::Real,
            RelExpr::Literal(Value::Str(_)) => Type::Str,
            RelExpr::Literal(Value::Unit | Value::Opaque(_)) => Type::Unit,
            RelExpr::Column(name) => schema
                .iter()
                .find(|(n, _)| n == name)
                .map_or(Type::Unit, |(_, t)| t.clone()),
            RelExpr::Range(_) => Type::Record(schema.to_vec()),
            RelExpr::Op(op, _) if matches!(*op, "=" | "<>" | "<" | "<=" | ">" | ">=" | "andalso" | "orelse") => {
                Type::Bool
            }
            RelExpr::Op(_, args) => args
                .first()
                .map_or(Type::Unit, |a| Self::infer_type(a, schema)),
            RelExpr::ScalarEscape { .. } => Type::Unit,
        }
    }
}

impl RelBuilder for PlanBuilder {
    type Plan = Plan;

    fn values(&mut self, schema: Vec<(String, Type)>, rows: Vec<Vec<Value>>) -> bool {
        if rows.iter().any(|row| row.len() != schema.len()) {
            return false;
        }
        self.stack.push(Plan {
            op: format!("values({})", rows.len()),
            alias: None,
            schema,
        });
        true
    }

    fn function_scan(&mut self, op: &str, args: Vec<RelExpr>, schema: Vec<(String, Type)>) -> bool {
        let label = match args.first() {
            Some(RelExpr::Column(name)) => name.clone(),
            _ => op.to_string(),
        };
        self.stack.push(Plan {
            op: format!("scan({label})"),
            alias: None,
            schema,
        });
        true
    }

    fn push(&mut self, plan: Plan) {
        self.stack.push(plan);
    }

    fn alias(&mut self, name: &str) -> bool {
        let Some(top) = self.stack.last_mut() else { return false };
        top.alias = Some(name.to_string());
        true
    }

    fn project(&mut self, fields: Vec<RelExpr>, names: Vec<String>) -> bool {
        if fields.len() != names.len() {
            return false;
        }
        let Some(inner) = self.stack.pop() else { return false };
        let schema = names
            .into_iter()
            .zip(fields.iter())
            .map(|(name, rex)| (name, Self::infer_type(rex, &inner.schema)))
            .collect();
        self.stack.push(Plan {
            op: format!("project({})", inner.op),
            alias: None,
            schema,
        });
        true
    }

    fn filter(&mut self, _rex: RelExpr) -> bool {
        let Some(inner) = self.stack.pop() else { return false };
        self.stack.push(Plan {
            op: format!("filter({})", inner.op),
            alias: None,
            schema: inner.schema,
        });
        true
    }

    fn sort(&mut self, _items: Vec<(RelExpr, OrderDir)>) -> bool {
        let Some(inner) = self.stack.pop() else { return false };
        self.stack.push(Plan {
            op: format!("sort({})", inner.op),
            alias: None,
            schema: inner.schema,
        });
        true
    }

    fn aggregate(&mut self, keys: Vec<RelExpr>, aggs: Vec<(String, AggFunc, RelExpr)>) -> bool {
        let Some(inner) = self.stack.pop() else { return false };
        let mut schema: Vec<(String, Type)> = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (format!("k{i}"), Self::infer_type(k, &inner.schema)))
            .collect();
        schema.extend(
            aggs.iter()
                .map(|(name, _, rex)| (name.clone(), Self::infer_type(rex, &inner.schema))),
        );
        self.stack.push(Plan {
            op: format!("aggregate({})", inner.op),
            alias: None,
            schema,
        });
        true
    }

    fn join(&mut self, inner: bool) -> bool {
        let Some(right) = self.stack.pop() else { return false };
        let Some(left) = self.stack.pop() else { return false };
        let kind = if inner { "join" } else { "outer_join" };
        let mut schema = left.schema.clone();
        schema.extend(right.schema.clone());
        self.stack.push(Plan {
            op: format!("{kind}({}, {})", left.op, right.op),
            alias: None,
            schema,
        });
        true
    }

    fn union(&mut self, n: usize) -> bool {
        self.combine("union", n)
    }

    fn intersect(&mut self, n: usize) -> bool {
        self.combine("intersect", n)
    }

    fn minus(&mut self, n: usize) -> bool {
        self.combine("minus", n)
    }

    fn peek_schema(&self) -> Option<Vec<(String, Type)>> {
        self.stack.last().map(|p| p.schema.clone())
    }

    fn pop(&mut self) -> Option<Plan> {
        self.stack.pop()
    }
}

impl PlanBuilder {
    fn combine(&mut self, op: &str, n: usize) -> bool {
        if self.stack.len() < n || n == 0 {
            return false;
        }
        let mut popped: Vec<Plan> = (0..n).filter_map(|_| self.stack.pop()).collect();
        popped.reverse();
        let schema = popped[0].schema.clone();
        let rendered: Vec<String> = popped.iter().map(|p| p.op.clone()).collect();
        self.stack.push(Plan {
            op: format!("{op}({})", rendered.join(", ")),
            alias: None,
            schema,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_then_project_renders_nested_description() {
        let mut builder = PlanBuilder::new();
        builder.function_scan("scan", vec![RelExpr::Column("xs".to_string())], vec![("a".to_string(), Type::Int)]);
        builder.project(vec![RelExpr::Column("a".to_string())], vec!["a".to_string()]);
        let plan = builder.pop().unwrap();
        assert_eq!(plan.describe(), "project(scan(xs))");
    }

    #[test]
    fn join_concatenates_both_sides_schemas() {
        let mut builder = PlanBuilder::new();
        builder.function_scan("scan", vec![RelExpr::Column("xs".to_string())], vec![("a".to_string(), Type::Int)]);
        builder.function_scan("scan", vec![RelExpr::Column("ys".to_string())], vec![("b".to_string(), Type::Int)]);
        builder.join(true);
        let plan = builder.pop().unwrap();
        assert_eq!(plan.schema().len(), 2);
        assert_eq!(plan.describe(), "join(scan(xs), scan(ys))");
    }

    #[test]
    fn union_of_two_plans_renders_both_operands() {
        let mut builder = PlanBuilder::new();
        builder.values(vec![("a".to_string(), Type::Int)], vec![vec![Value::Int(1)]]);
        builder.values(vec![("a".to_string(), Type::Int)], vec![vec![Value::Int(2)]]);
        assert!(builder.union(2));
        let plan = builder.pop().unwrap();
        assert!(plan.describe().starts_with("union("));
    }
}
