//! # Global registries
//!
//! The operator↔built-in name table relational lowering and the Resolver
//! both need to agree on, read-only after first access (spec §9 "Global
//! registries: ... Represent as immutable maps initialised at module
//! load"). The inverter registry described in the same paragraph lives
//! separately in [`crate::inverters`], which already owns its own
//! `OnceLock`-backed table of built-in call shapes.
//!
//! Grounded on the teacher's `join_planning` cost-table constants and
//! `inverters::registry`'s `OnceLock` idiom, generalised from a single
//! lookup table to the two-way operator/built-in-name mapping spec §4.1
//! (Resolver) and §4.10.1 (scalar translation) both consume.

use crate::surface_ast::InfixOp;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

const OPERATOR_TABLE: &[(InfixOp, &str)] = &[
    (InfixOp::Andalso, "andalso"),
    (InfixOp::Orelse, "orelse"),
    (InfixOp::Eq, "="),
    (InfixOp::Ne, "<>"),
    (InfixOp::Lt, "<"),
    (InfixOp::Le, "<="),
    (InfixOp::Gt, ">"),
    (InfixOp::Ge, ">="),
    (InfixOp::Cons, "::"),
    (InfixOp::Plus, "+"),
    (InfixOp::Minus, "-"),
    (InfixOp::Times, "*"),
    (InfixOp::Div, "/"),
    (InfixOp::Mod, "mod"),
];

/// Built-in names relational lowering's scalar translation (spec §4.10.1)
/// maps directly to a relational operator rather than falling back to the
/// scalar escape hatch. A superset of `OPERATOR_TABLE`'s names: it also
/// carries `~` (unary minus), which has no infix counterpart.
const KNOWN_SCALAR_OPERATORS: &[&str] = &[
    "=", "<>", "<", "<=", ">", ">=", "+", "-", "~", "*", "/", "mod", "andalso", "orelse",
];

fn builtin_names() -> &'static HashMap<InfixOp, &'static str> {
    static TABLE: OnceLock<HashMap<InfixOp, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| OPERATOR_TABLE.iter().copied().collect())
}

fn infix_ops() -> &'static HashMap<&'static str, InfixOp> {
    static TABLE: OnceLock<HashMap<&'static str, InfixOp>> = OnceLock::new();
    TABLE.get_or_init(|| OPERATOR_TABLE.iter().map(|(op, name)| (*name, *op)).collect())
}

fn known_scalar_operators() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| KNOWN_SCALAR_OPERATORS.iter().copied().collect())
}

/// The fixed built-in name an infix operator desugars to (spec §4.1).
pub fn builtin_name(op: InfixOp) -> &'static str {
    builtin_names()
        .get(&op)
        .copied()
        .expect("every InfixOp variant is registered in OPERATOR_TABLE")
}

/// The infix operator a built-in name came from, if any. Mostly useful to
/// passes walking already-lowered Core IR that want to recognise an
/// operator application without re-parsing surface syntax.
pub fn infix_op_for_builtin(name: &str) -> Option<InfixOp> {
    infix_ops().get(name).copied()
}

/// True iff relational lowering's scalar translator (§4.10.1) has a
/// direct mapping for `name`.
pub fn is_known_scalar_operator(name: &str) -> bool {
    known_scalar_operators().contains(name)
}

/// The full set of scalar operator names relational lowering recognises,
/// for callers that need the `'static` string itself rather than a
/// membership test.
pub fn known_scalar_operator_names() -> &'static [&'static str] {
    KNOWN_SCALAR_OPERATORS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_infix_operator_round_trips_through_the_registry() {
        for (op, name) in OPERATOR_TABLE {
            assert_eq!(builtin_name(*op), *name);
            assert_eq!(infix_op_for_builtin(name), Some(*op));
        }
    }

    #[test]
    fn unary_minus_is_a_known_scalar_operator_with_no_infix_counterpart() {
        assert!(is_known_scalar_operator("~"));
        assert_eq!(infix_op_for_builtin("~"), None);
    }

    #[test]
    fn unregistered_name_is_not_a_known_scalar_operator() {
        assert!(!is_known_scalar_operator("List.length"));
    }
}
