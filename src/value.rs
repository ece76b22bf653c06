//! # Literal Value Universe
//!
//! The closed set of literal values Core IR expressions can carry (spec
//! §3: "literal (bool/char/int/real/string/unit/opaque-value)"). Grounded
//! on the teacher's `value::Value` enum, trimmed to the literal forms a
//! typed functional language needs — no vector/timestamp/int8 variants,
//! since those belong to the teacher's vector-search domain, not this one.

use std::fmt;

/// A literal value carried by a Core IR `Expr::Literal` node.
///
/// `Opaque` represents a value produced by an external collaborator (e.g.
/// a constructed datatype value, or a host value threaded through from the
/// environment seed) that this crate never needs to interpret structurally
/// — it is compared and printed, never pattern-matched into.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Char(char),
    Int(i64),
    Real(f64),
    Str(String),
    Unit,
    /// An opaque host value, identified only by a printable tag.
    Opaque(String),
}

impl Value {
    /// Structural equality used by case-of-literal folding (spec §4.5.5).
    /// `Real` uses bitwise comparison via `PartialEq` on `f64`, which is
    /// intentional here: the inliner only folds literals that were
    /// syntactically identical in the source, never the result of runtime
    /// arithmetic, so NaN/precision concerns don't arise.
    pub fn literal_eq(&self, other: &Value) -> bool {
        self == other
    }

    /// Evaluate a known scalar built-in (spec §4.10.1's operator set, the
    /// same names [`crate::registry::is_known_scalar_operator`] recognises)
    /// applied to literal operands. Returns `None` for anything not a
    /// closed arithmetic/comparison/boolean operator over matching operand
    /// types, including division or modulo by zero — the inliner leaves
    /// those applications unfolded rather than fabricate a result.
    pub fn eval_binary_builtin(op: &str, lhs: &Value, rhs: &Value) -> Option<Value> {
        use Value::{Bool, Int, Real};
        match (op, lhs, rhs) {
            ("+", Int(a), Int(b)) => Some(Int(a.checked_add(*b)?)),
            ("-", Int(a), Int(b)) => Some(Int(a.checked_sub(*b)?)),
            ("*", Int(a), Int(b)) => Some(Int(a.checked_mul(*b)?)),
            ("/", Int(a), Int(b)) if *b != 0 => Some(Int(a.checked_div(*b)?)),
            ("mod", Int(a), Int(b)) if *b != 0 => Some(Int(a.rem_euclid(*b))),
            ("+", Real(a), Real(b)) => Some(Real(a + b)),
            ("-", Real(a), Real(b)) => Some(Real(a - b)),
            ("*", Real(a), Real(b)) => Some(Real(a * b)),
            ("/", Real(a), Real(b)) if *b != 0.0 => Some(Real(a / b)),
            ("=", a, b) => Some(Bool(a.literal_eq(b))),
            ("<>", a, b) => Some(Bool(!a.literal_eq(b))),
            ("<", Int(a), Int(b)) => Some(Bool(a < b)),
            ("<=", Int(a), Int(b)) => Some(Bool(a <= b)),
            (">", Int(a), Int(b)) => Some(Bool(a > b)),
            (">=", Int(a), Int(b)) => Some(Bool(a >= b)),
            ("<", Real(a), Real(b)) => Some(Bool(a < b)),
            ("<=", Real(a), Real(b)) => Some(Bool(a <= b)),
            (">", Real(a), Real(b)) => Some(Bool(a > b)),
            (">=", Real(a), Real(b)) => Some(Bool(a >= b)),
            ("andalso", Bool(a), Bool(b)) => Some(Bool(*a && *b)),
            ("orelse", Bool(a), Bool(b)) => Some(Bool(*a || *b)),
            _ => None,
        }
    }

    /// Evaluate a known unary scalar built-in (currently just `~`, integer
    /// and real negation) applied to a literal operand.
    pub fn eval_unary_builtin(op: &str, arg: &Value) -> Option<Value> {
        match (op, arg) {
            ("~", Value::Int(a)) => Some(Value::Int(a.checked_neg()?)),
            ("~", Value::Real(a)) => Some(Value::Real(-a)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Char(c) => write!(f, "#\"{c}\""),
            Value::Int(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Unit => write!(f, "()"),
            Value::Opaque(tag) => write!(f, "<{tag}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_eq_is_structural() {
        assert!(Value::Int(7).literal_eq(&Value::Int(7)));
        assert!(!Value::Int(7).literal_eq(&Value::Int(8)));
        assert!(!Value::Int(7).literal_eq(&Value::Bool(true)));
    }

    #[test]
    fn display_matches_source_texture() {
        assert_eq!(Value::Int(4).to_string(), "4");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Unit.to_string(), "()");
    }

    #[test]
    fn eval_binary_builtin_covers_arithmetic_and_comparison() {
        assert_eq!(Value::eval_binary_builtin("+", &Value::Int(5), &Value::Int(1)), Some(Value::Int(6)));
        assert_eq!(Value::eval_binary_builtin("mod", &Value::Int(7), &Value::Int(3)), Some(Value::Int(1)));
        assert_eq!(
            Value::eval_binary_builtin("<", &Value::Int(3), &Value::Int(5)),
            Some(Value::Bool(true))
        );
        assert_eq!(
            Value::eval_binary_builtin("=", &Value::Int(3), &Value::Int(3)),
            Some(Value::Bool(true))
        );
    }

    #[test]
    fn eval_binary_builtin_refuses_division_by_zero() {
        assert_eq!(Value::eval_binary_builtin("/", &Value::Int(5), &Value::Int(0)), None);
        assert_eq!(Value::eval_binary_builtin("mod", &Value::Int(5), &Value::Int(0)), None);
    }

    #[test]
    fn eval_unary_builtin_negates() {
        assert_eq!(Value::eval_unary_builtin("~", &Value::Int(5)), Some(Value::Int(-5)));
        assert_eq!(Value::eval_unary_builtin("~", &Value::Bool(true)), None);
    }
}
