//! # Type System
//!
//! `Type` is the closed type-tag universe Core IR nodes carry (spec §3,
//! invariant 1: "every expression node carries a type; types are never
//! reconstructed from context"). `TypeSystem` is the constructor interface
//! named in spec §6; `TypeMap` is the consumed lookup interface from the
//! external Hindley-Milner unifier.
//!
//! Grounded on the teacher's `schema::SchemaType` (a closed type tag enum
//! with a lowering method), generalized from relation-column types to full
//! ML types with tuples/records/functions/datatypes/substitution.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A resolved ML type.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Bool,
    Char,
    Int,
    Real,
    Str,
    Unit,
    /// Positional product type (record fields are represented as a tuple
    /// with labels carried alongside, per spec §3: "record (treated as a
    /// tuple with labelled fields)").
    Tuple(Vec<Type>),
    /// A record type: canonically-ordered labelled fields.
    Record(Vec<(String, Type)>),
    Function(Box<Type>, Box<Type>),
    List(Box<Type>),
    /// A user datatype, named and (for parametric datatypes) instantiated
    /// with type arguments.
    Datatype {
        name: String,
        args: Vec<Type>,
    },
    /// A type variable awaiting substitution; should not survive into
    /// fully-resolved Core IR, but the unifier may hand back datatype
    /// applications with free variables mid-resolution.
    Var(u32),
}

impl Type {
    /// Apply a substitution map (type-variable id -> concrete type).
    /// Used when the Inliner specialises a polymorphic binding's type at
    /// an inlining site (spec §4.5.4).
    pub fn substitute(&self, subst: &HashMap<u32, Type>) -> Type {
        match self {
            Type::Var(id) => subst.get(id).cloned().unwrap_or_else(|| self.clone()),
            Type::Tuple(items) => {
                Type::Tuple(items.iter().map(|t| t.substitute(subst)).collect())
            }
            Type::Record(fields) => Type::Record(
                fields
                    .iter()
                    .map(|(name, t)| (name.clone(), t.substitute(subst)))
                    .collect(),
            ),
            Type::Function(a, b) => Type::Function(
                Box::new(a.substitute(subst)),
                Box::new(b.substitute(subst)),
            ),
            Type::List(elem) => Type::List(Box::new(elem.substitute(subst))),
            Type::Datatype { name, args } => Type::Datatype {
                name: name.clone(),
                args: args.iter().map(|t| t.substitute(subst)).collect(),
            },
            _ => self.clone(),
        }
    }

    /// True if this is a record (as opposed to a positionally-labelled
    /// tuple); used by the Resolver when canonicalising record patterns.
    pub fn is_record(&self) -> bool {
        matches!(self, Type::Record(_))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Char => write!(f, "char"),
            Type::Int => write!(f, "int"),
            Type::Real => write!(f, "real"),
            Type::Str => write!(f, "string"),
            Type::Unit => write!(f, "unit"),
            Type::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(Type::to_string).collect();
                write!(f, "({})", parts.join(" * "))
            }
            Type::Record(fields) => {
                let parts: Vec<String> =
                    fields.iter().map(|(n, t)| format!("{n}: {t}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Type::Function(a, b) => write!(f, "{a} -> {b}"),
            Type::List(elem) => write!(f, "{elem} list"),
            Type::Datatype { name, args } => {
                if args.is_empty() {
                    write!(f, "{name}")
                } else {
                    let parts: Vec<String> = args.iter().map(Type::to_string).collect();
                    write!(f, "({}) {name}", parts.join(", "))
                }
            }
            Type::Var(id) => write!(f, "'t{id}"),
        }
    }
}

/// Constructs types. Named in spec §6 as a consumed interface ("`TypeSystem`:
/// constructs types — primitive, tuple/record, function, list, data-type,
/// and substitution").
pub trait TypeSystem {
    fn tuple(&self, items: Vec<Type>) -> Type {
        Type::Tuple(items)
    }
    fn record(&self, fields: Vec<(String, Type)>) -> Type {
        Type::Record(fields)
    }
    fn function(&self, arg: Type, result: Type) -> Type {
        Type::Function(Box::new(arg), Box::new(result))
    }
    fn list(&self, elem: Type) -> Type {
        Type::List(Box::new(elem))
    }
    fn datatype(&self, name: impl Into<String>, args: Vec<Type>) -> Type {
        Type::Datatype {
            name: name.into(),
            args,
        }
    }
}

/// The default, stateless `TypeSystem` — types are plain values with no
/// interning, so there is nothing to store.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTypeSystem;

impl TypeSystem for DefaultTypeSystem {}

/// A stable identity for an AST node, used as the key into a `TypeMap`.
/// The external parser/unifier is expected to assign these; this crate
/// never manufactures one except in tests.
pub type NodeId = u64;

/// Lookup from AST node identity to its resolved type (spec §6: consumed
/// interface from the external unifier). `lookup` returns `None` for nodes
/// the unifier discarded (e.g. dead branches eliminated before resolution).
pub trait TypeMap {
    fn lookup(&self, node: NodeId) -> Option<Type>;
}

/// A `HashMap`-backed `TypeMap`, used by tests and by any embedder that
/// pre-computes the full type assignment up front.
#[derive(Debug, Clone, Default)]
pub struct MapTypeMap {
    types: HashMap<NodeId, Type>,
}

impl MapTypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: NodeId, ty: Type) -> &mut Self {
        self.types.insert(node, ty);
        self
    }
}

impl TypeMap for MapTypeMap {
    fn lookup(&self, node: NodeId) -> Option<Type> {
        self.types.get(&node).cloned()
    }
}

/// Shared, cheaply-cloneable handle to a `TypeMap`, used so the Resolver
/// can hold one without taking ownership of the caller's map.
pub type SharedTypeMap = Arc<dyn TypeMap + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_replaces_only_bound_variables() {
        let mut subst = HashMap::new();
        subst.insert(0, Type::Int);
        let ty = Type::List(Box::new(Type::Var(0)));
        assert_eq!(ty.substitute(&subst), Type::List(Box::new(Type::Int)));

        let unbound = Type::Var(1);
        assert_eq!(unbound.substitute(&subst), Type::Var(1));
    }

    #[test]
    fn map_type_map_reports_missing_nodes_as_none() {
        let mut map = MapTypeMap::new();
        map.insert(1, Type::Int);
        assert_eq!(map.lookup(1), Some(Type::Int));
        assert_eq!(map.lookup(2), None);
    }

    #[test]
    fn display_formats_match_ml_surface_texture() {
        assert_eq!(Type::Function(Box::new(Type::Int), Box::new(Type::Bool)).to_string(), "int -> bool");
        assert_eq!(Type::List(Box::new(Type::Int)).to_string(), "int list");
    }
}
