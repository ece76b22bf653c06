//! # Surface AST
//!
//! The syntax tree handed to the Resolver by the external parser, already
//! annotated with types via `NodeId` keys into a `TypeMap` (spec §4.1,
//! §6). This crate never constructs a surface tree from source text — the
//! lexer/parser is an out-of-scope collaborator — but the Resolver needs a
//! concrete shape to lower, and tests need one to construct fixtures.
//!
//! Unlike Core IR, the surface tree still carries the sugar the Resolver
//! desugars away: multi-binding `val`, multi-match `fn`, `if`, infix
//! operators, and possibly-disordered or partial record patterns.
//!
//! Grounded on the teacher's `ast::Term`/`ast::Atom` closed-union style,
//! generalized to the richer desugaring-source shape spec §4.1 requires.

use crate::core_ir::{AggFunc, OrderDir};
use crate::types::{NodeId, Type};
use crate::value::Value;

/// A surface pattern, still possibly record-partial or disordered — the
/// Resolver canonicalises these into Core `Pat` (spec §4.1).
#[derive(Debug, Clone, PartialEq)]
pub enum SurfacePat {
    Wildcard(NodeId),
    Ident(String, NodeId),
    Literal(Value, NodeId),
    Tuple(Vec<SurfacePat>, NodeId),
    /// Possibly missing fields, possibly out of label order; the Resolver
    /// expands this to a canonically-ordered tuple pattern with wildcards
    /// for absent fields (spec §4.1).
    Record(Vec<(String, SurfacePat)>, NodeId),
    List(Vec<SurfacePat>, NodeId),
    Cons(Box<SurfacePat>, Box<SurfacePat>, NodeId),
    Con0(String, NodeId),
    Con(String, Box<SurfacePat>, NodeId),
    As(String, Box<SurfacePat>, NodeId),
}

impl SurfacePat {
    pub fn node(&self) -> NodeId {
        match self {
            SurfacePat::Wildcard(n)
            | SurfacePat::Ident(_, n)
            | SurfacePat::Literal(_, n)
            | SurfacePat::Tuple(_, n)
            | SurfacePat::Record(_, n)
            | SurfacePat::List(_, n)
            | SurfacePat::Cons(_, _, n)
            | SurfacePat::Con0(_, n)
            | SurfacePat::Con(_, _, n)
            | SurfacePat::As(_, _, n) => *n,
        }
    }
}

/// The fixed surface infix-operator vocabulary (spec §4.1: "Infix
/// operators ... become applications of named built-ins via a fixed
/// operator→built-in table").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfixOp {
    Andalso,
    Orelse,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Cons,
    Plus,
    Minus,
    Times,
    Div,
    Mod,
}

/// One arm of a multi-match `fn` or a `case`.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMatch {
    pub pat: SurfacePat,
    pub body: SurfaceExpr,
}

/// One binding of a multi-binding `val p1 = e1 and p2 = e2 ...`.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceValBinding {
    pub pat: SurfacePat,
    pub value: SurfaceExpr,
}

/// One comprehension source: `p in e`.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceSource {
    pub pat: SurfacePat,
    pub expr: SurfaceExpr,
}

/// A comprehension step, pre-desugaring. Identical shape to the Core
/// `CompStep` except its sub-expressions are still surface expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCompStep {
    Where(SurfaceExpr),
    Order(Vec<(SurfaceExpr, OrderDir)>),
    Group {
        keys: Vec<SurfaceExpr>,
        aggs: Vec<(String, AggFunc, SurfaceExpr)>,
    },
}

/// One constructor in a surface datatype declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceConstructor {
    pub name: String,
    pub arg: Option<Type>,
}

/// A surface datatype declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceDatatypeDecl {
    pub name: String,
    pub constructors: Vec<SurfaceConstructor>,
}

/// A surface expression, as handed to the Resolver.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceExpr {
    Literal(Value, NodeId),
    Ident(String, NodeId),
    /// `fn p1 => e1 | p2 => e2 | ...` — one or more match arms. A
    /// single-arm `fn` is the common case; the Resolver desugars the
    /// multi-arm case to `fn x => case x of ...` (spec §4.1).
    Fn(Vec<SurfaceMatch>, NodeId),
    App(Box<SurfaceExpr>, Box<SurfaceExpr>, NodeId),
    If(Box<SurfaceExpr>, Box<SurfaceExpr>, Box<SurfaceExpr>, NodeId),
    Infix(InfixOp, Box<SurfaceExpr>, Box<SurfaceExpr>, NodeId),
    /// `val p1 = e1 and p2 = e2 ... in body` — one or more simultaneous,
    /// non-recursive bindings (spec §4.1).
    Val {
        bindings: Vec<SurfaceValBinding>,
        body: Box<SurfaceExpr>,
        node: NodeId,
    },
    /// `val rec f1 = e1 and f2 = e2 ... in body`.
    ValRec {
        bindings: Vec<(String, SurfaceExpr)>,
        body: Box<SurfaceExpr>,
        node: NodeId,
    },
    Case(Box<SurfaceExpr>, Vec<SurfaceMatch>, NodeId),
    Tuple(Vec<SurfaceExpr>, NodeId),
    Record(Vec<(String, SurfaceExpr)>, NodeId),
    /// `local datatype ... in body` — installs constructors, scoped to
    /// `body` (spec §4.1, §3 "local-type scope").
    Datatype {
        decls: Vec<SurfaceDatatypeDecl>,
        body: Box<SurfaceExpr>,
        node: NodeId,
    },
    /// `from p1 in s1, p2 in s2, steps..., yield y`. `yield_expr` is
    /// `None` when the source omitted an explicit `yield`; the Resolver
    /// materialises the implicit default yield (spec §4.1).
    From {
        sources: Vec<SurfaceSource>,
        steps: Vec<SurfaceCompStep>,
        yield_expr: Option<Box<SurfaceExpr>>,
        node: NodeId,
    },
}

impl SurfaceExpr {
    pub fn node(&self) -> NodeId {
        match self {
            SurfaceExpr::Literal(_, n)
            | SurfaceExpr::Ident(_, n)
            | SurfaceExpr::Fn(_, n)
            | SurfaceExpr::App(_, _, n)
            | SurfaceExpr::If(_, _, _, n)
            | SurfaceExpr::Infix(_, _, _, n)
            | SurfaceExpr::Val { node: n, .. }
            | SurfaceExpr::ValRec { node: n, .. }
            | SurfaceExpr::Case(_, _, n)
            | SurfaceExpr::Tuple(_, n)
            | SurfaceExpr::Record(_, n)
            | SurfaceExpr::Datatype { node: n, .. }
            | SurfaceExpr::From { node: n, .. } => *n,
        }
    }
}
