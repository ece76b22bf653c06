//! # Inverter Registry
//!
//! A small, read-only table mapping a known built-in call shape to a
//! generator synthesiser, tried after the structural point/range/union
//! rules in [`crate::generators`] fail (spec §4.7.5). Example: `x elem xs`
//! inverts to the generator `xs` itself; `String.isPrefix x s` inverts to
//! `prefixesOf s`.
//!
//! Grounded on the teacher's global registry idiom (`std::sync::OnceLock`
//! for read-only maps initialised once at first access, as in
//! `join_planning`'s cost-table constants) per spec §9 "Global registries:
//! ... Represent as immutable maps initialised at module load."

use crate::core_ir::{Expr, Ident};
use crate::generators::Generator;
use crate::types::Type;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Which argument position of the built-in call is the pattern variable
/// being solved for; the other position supplies the generator's extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SolvedArg {
    First,
    Second,
}

/// An inverter entry: recognises `built_in` applied to two arguments and,
/// given which argument is the pattern being solved for, builds a
/// replacement generator from the other argument.
struct InverterEntry {
    solved_arg: SolvedArg,
    build: fn(&Expr) -> Generator,
}

fn registry() -> &'static HashMap<&'static str, InverterEntry> {
    static REGISTRY: OnceLock<HashMap<&'static str, InverterEntry>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert(
            "elem",
            InverterEntry {
                solved_arg: SolvedArg::First,
                build: |xs: &Expr| Generator::Extent(element_type_hint(xs)),
            },
        );
        map.insert(
            "String.isPrefix",
            InverterEntry {
                solved_arg: SolvedArg::First,
                build: |s: &Expr| prefixes_of(s),
            },
        );
        map
    })
}

fn element_type_hint(xs: &Expr) -> Type {
    match xs.ty() {
        Type::List(elem) => (**elem).clone(),
        other => other.clone(),
    }
}

/// Builds the Core expression `prefixesOf s` — a call to a named built-in
/// that, for a string `s`, enumerates every prefix of `s` (used to invert
/// `String.isPrefix x s` into a generator for `x`).
fn prefixes_of(s: &Expr) -> Generator {
    let call = Expr::App(
        Box::new(Expr::Var(
            Ident::with_ordinal("prefixesOf", 0),
            Type::Function(Box::new(Type::Str), Box::new(Type::List(Box::new(Type::Str)))),
        )),
        Box::new(s.clone()),
        Type::List(Box::new(Type::Str)),
    );
    Generator::Union(vec![Generator::Point(call)])
}

/// Recognise `App(App(Var(name), a), b)` and, if `name` is registered,
/// produce a generator for `pat` from whichever argument is not `pat`
/// itself. Returns `None` if the call shape doesn't match the registry or
/// `pat` doesn't occur in the expected position.
pub fn invert(pat: &Ident, expr: &Expr) -> Option<Generator> {
    let Expr::App(outer_f, second, _) = expr else {
        return None;
    };
    let Expr::App(inner_f, first, _) = outer_f.as_ref() else {
        return None;
    };
    let Expr::Var(id, _) = inner_f.as_ref() else {
        return None;
    };
    let entry = registry().get(id.name.as_str())?;
    let (solved, extent_source) = match entry.solved_arg {
        SolvedArg::First => (first.as_ref(), second.as_ref()),
        SolvedArg::Second => (second.as_ref(), first.as_ref()),
    };
    match solved {
        Expr::Var(v, _) if v == pat => Some((entry.build)(extent_source)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn call(op: &str, a: Expr, b: Expr, result_ty: Type) -> Expr {
        Expr::App(
            Box::new(Expr::App(
                Box::new(Expr::Var(Ident::with_ordinal(op, 0), Type::Unit)),
                Box::new(a),
                Type::Unit,
            )),
            Box::new(b),
            result_ty,
        )
    }

    #[test]
    fn elem_inverts_to_the_extent_of_the_list_argument() {
        let x = Ident::with_ordinal("x", 1);
        let xs = Expr::Var(
            Ident::with_ordinal("xs", 2),
            Type::List(Box::new(Type::Int)),
        );
        let expr = call("elem", Expr::Var(x.clone(), Type::Int), xs, Type::Bool);
        let gen = invert(&x, &expr).expect("inverter should fire for elem");
        assert_eq!(gen, Generator::Extent(Type::Int));
    }

    #[test]
    fn unregistered_built_in_does_not_invert() {
        let x = Ident::with_ordinal("x", 1);
        let expr = call(
            "List.length",
            Expr::Var(x.clone(), Type::Int),
            Expr::Literal(Value::Unit, Type::Unit),
            Type::Int,
        );
        assert!(invert(&x, &expr).is_none());
    }
}
