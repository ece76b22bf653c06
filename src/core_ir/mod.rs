//! # Core IR
//!
//! The normalised, explicitly-typed intermediate representation described
//! in spec §3: a closed family of expression, pattern, comprehension-step,
//! and declaration variants, each carrying its resolved type. Grounded on
//! the teacher's `ir::IRNode`/`ir::Predicate` closed-tagged-union style
//! (one enum per concern, `output_schema`/`pretty_print` derived methods),
//! generalized from a relational-algebra IR to a typed ML expression tree.
//!
//! Invariants (binding, spec §3):
//! 1. Every expression node carries a type; types are never reconstructed
//!    from context.
//! 2. Every pattern binds a set of identifiers; after uniquification the
//!    union of its binders is disjoint from identifiers already in scope.
//! 3. `case` matches are ordered: earlier matches shadow later ones.
//! 4. Comprehension sources are ordered, executed as left-deep inner
//!    joins; each source's pattern binders enter scope for later sources
//!    and steps.
//! 5. A recursive value group binds all of its names before evaluating any
//!    right-hand-side.

use crate::types::Type;
use crate::value::Value;
use std::collections::HashSet;

/// A binder identifier. `name` is the surface name (preserved through
/// uniquification for diagnostics); `ordinal` is a per-compilation unique
/// tag assigned by the Uniquifier. Two identifiers are the same binding
/// iff both fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    pub name: String,
    pub ordinal: u32,
}

impl Ident {
    /// A fresh, not-yet-uniquified identifier (ordinal 0 is a sentinel the
    /// Uniquifier always replaces — spec §4.3 requires uniquification
    /// before the Analyzer ever inspects a tree).
    pub fn fresh(name: impl Into<String>) -> Self {
        Ident {
            name: name.into(),
            ordinal: 0,
        }
    }

    pub fn with_ordinal(name: impl Into<String>, ordinal: u32) -> Self {
        Ident {
            name: name.into(),
            ordinal,
        }
    }
}

/// Sort direction for an `order` comprehension step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDir {
    Asc,
    Desc,
}

/// Built-in aggregate functions usable in `group` steps and `Expr::Aggregate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Sum,
    Count,
    Min,
    Max,
    Avg,
}

/// Which member of a record or tuple a `Select` projects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Label(String),
    Index(usize),
}

/// A pattern, binding zero or more identifiers.
#[derive(Debug, Clone, PartialEq)]
pub enum Pat {
    Wildcard(Type),
    Ident(Ident, Type),
    Literal(Value, Type),
    Tuple(Vec<Pat>, Type),
    /// Canonically-ordered labelled fields — the Resolver is responsible
    /// for expanding surface record patterns (possibly missing fields or
    /// out of order) into this canonical form (spec §4.1).
    Record(Vec<(String, Pat)>, Type),
    List(Vec<Pat>, Type),
    Cons(Box<Pat>, Box<Pat>, Type),
    /// A zero-arity constructor pattern, e.g. `NONE`.
    Con0(String, Type),
    /// An applied constructor pattern, e.g. `SOME y`.
    Con(String, Box<Pat>, Type),
    As(Ident, Box<Pat>, Type),
}

impl Pat {
    pub fn ty(&self) -> &Type {
        match self {
            Pat::Wildcard(t)
            | Pat::Ident(_, t)
            | Pat::Literal(_, t)
            | Pat::Tuple(_, t)
            | Pat::Record(_, t)
            | Pat::List(_, t)
            | Pat::Cons(_, _, t)
            | Pat::Con0(_, t)
            | Pat::Con(_, _, t)
            | Pat::As(_, _, t) => t,
        }
    }

    /// All identifiers bound by this pattern (spec §3 invariant 2).
    pub fn binders(&self) -> HashSet<Ident> {
        let mut out = HashSet::new();
        self.collect_binders(&mut out);
        out
    }

    fn collect_binders(&self, out: &mut HashSet<Ident>) {
        match self {
            Pat::Wildcard(_) | Pat::Literal(_, _) | Pat::Con0(_, _) => {}
            Pat::Ident(id, _) => {
                out.insert(id.clone());
            }
            Pat::Tuple(items, _) | Pat::List(items, _) => {
                for p in items {
                    p.collect_binders(out);
                }
            }
            Pat::Record(fields, _) => {
                for (_, p) in fields {
                    p.collect_binders(out);
                }
            }
            Pat::Cons(head, tail, _) => {
                head.collect_binders(out);
                tail.collect_binders(out);
            }
            Pat::Con(_, arg, _) => arg.collect_binders(out),
            Pat::As(id, inner, _) => {
                out.insert(id.clone());
                inner.collect_binders(out);
            }
        }
    }

    /// True if this is a bare identifier pattern (used by inlining rule 4:
    /// a singleton case over a bare-identifier pattern substitutes
    /// directly rather than building a `let`).
    pub fn as_ident(&self) -> Option<&Ident> {
        match self {
            Pat::Ident(id, _) => Some(id),
            _ => None,
        }
    }
}

/// A single match arm in a `case` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub pat: Pat,
    pub body: Expr,
}

/// A comprehension source: `p in e`.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub pat: Pat,
    pub expr: Expr,
}

/// A comprehension step (spec §3: `where`/`order`/`group`).
#[derive(Debug, Clone, PartialEq)]
pub enum CompStep {
    Where(Expr),
    Order(Vec<(Expr, OrderDir)>),
    /// `group` by `keys`, producing named aggregates over `aggs`.
    Group {
        keys: Vec<Expr>,
        aggs: Vec<(String, AggFunc, Expr)>,
    },
}

/// A non-recursive value declaration: a single pattern bound to a value.
/// Multi-binding `val ... and ...` is desugared away by the Resolver
/// (spec §4.1) before Core IR is ever constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValDecl {
    pub pat: Pat,
    pub value: Expr,
}

/// One constructor in a datatype declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorDef {
    pub name: String,
    /// `None` for a zero-arity constructor.
    pub arg: Option<Type>,
}

/// A single datatype definition within a (possibly mutually recursive)
/// group.
#[derive(Debug, Clone, PartialEq)]
pub struct DatatypeDef {
    pub name: String,
    pub constructors: Vec<ConstructorDef>,
}

/// A declaration (spec §3: non-recursive value, recursive value group,
/// datatype group).
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Val(ValDecl),
    /// A recursive value group: all names are bound before any
    /// right-hand-side is evaluated (spec §3 invariant 5). Each binding is
    /// `(name, value)` where `value` is typically a `Fn` — Core IR does
    /// not require it, but non-function recursive bindings are typically
    /// ill-founded and the Resolver never produces them.
    ValRec(Vec<(Ident, Expr)>),
    Datatype(Vec<DatatypeDef>),
}

/// A Core IR expression. Every variant carries its resolved `Type` as its
/// last field.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value, Type),
    Var(Ident, Type),
    /// A zero-arity constructor value, e.g. `NONE`.
    Con0(String, Type),
    /// An applied constructor value, e.g. `SOME 3`. Kept distinct from a
    /// generic `App` so case-of-literal folding (spec §4.5 rule 5) can
    /// statically recognise "a known nullary/unary constructor value"
    /// without needing to know which identifiers name constructors.
    Con(String, Box<Expr>, Type),
    /// A single-parameter function abstraction. Multi-match `fn` is
    /// desugared by the Resolver to `fn x => case x of ...` (spec §4.1).
    Fn(Box<Pat>, Box<Expr>, Type),
    App(Box<Expr>, Box<Expr>, Type),
    /// `let p = value in body` — a single non-recursive declaration.
    Let {
        pat: Box<Pat>,
        value: Box<Expr>,
        body: Box<Expr>,
        ty: Type,
    },
    /// `let rec f1 = e1 and f2 = e2 ... in body`.
    LetRec {
        bindings: Vec<(Ident, Expr)>,
        body: Box<Expr>,
        ty: Type,
    },
    /// `case scrutinee of m1 | m2 | ...` — matches are ordered (spec §3
    /// invariant 3).
    Case(Box<Expr>, Vec<Match>, Type),
    Tuple(Vec<Expr>, Type),
    /// Canonically-ordered labelled fields (spec §3: "record (treated as a
    /// tuple with labelled fields)").
    Record(Vec<(String, Expr)>, Type),
    /// A field or positional selector, e.g. `#a e` or `#1 e` (spec §8
    /// scenario 6, §4.5 rule 2 "record selector over a known tuple
    /// value"). The Resolver produces this for both labelled-record and
    /// positional-tuple projection.
    Select(Box<Expr>, Field, Type),
    /// A local datatype declaration scoping the rest of `body` (spec §3:
    /// "local-type scope").
    LocalType {
        decls: Vec<DatatypeDef>,
        body: Box<Expr>,
        ty: Type,
    },
    /// A `from` comprehension: ordered sources, ordered steps, and a
    /// yield expression (always present after resolution — spec §4.1's
    /// "implicit default yield" is materialised by the Resolver, never
    /// left implicit in Core IR). `is_default_yield` marks a yield the
    /// Resolver synthesised itself (the record of all in-scope source
    /// variables) rather than one written by the source program; the
    /// Relationalizer uses it to decide whether a `map`/`filter` step may
    /// be appended in place instead of nesting a new comprehension
    /// (spec §4.6).
    Comprehension {
        sources: Vec<Source>,
        steps: Vec<CompStep>,
        yield_expr: Box<Expr>,
        is_default_yield: bool,
        ty: Type,
    },
    /// A standalone aggregate application, e.g. inside a `group` step's
    /// aggregate list before it is folded into `CompStep::Group`.
    Aggregate(AggFunc, Box<Expr>, Type),
}

impl Expr {
    pub fn ty(&self) -> &Type {
        match self {
            Expr::Literal(_, t)
            | Expr::Var(_, t)
            | Expr::Con0(_, t)
            | Expr::Con(_, _, t)
            | Expr::Fn(_, _, t)
            | Expr::App(_, _, t)
            | Expr::Let { ty: t, .. }
            | Expr::LetRec { ty: t, .. }
            | Expr::Case(_, _, t)
            | Expr::Tuple(_, t)
            | Expr::Record(_, t)
            | Expr::Select(_, _, t)
            | Expr::LocalType { ty: t, .. }
            | Expr::Comprehension { ty: t, .. }
            | Expr::Aggregate(_, _, t) => t,
        }
    }

    /// Free variables of this expression (identifiers referenced but not
    /// bound within it). Used by the Analyzer and by free-variable
    /// collection across lambda boundaries (spec §2, "Analyzer").
    pub fn free_vars(&self) -> HashSet<Ident> {
        let mut out = HashSet::new();
        self.collect_free_vars(&mut out);
        out
    }

    fn collect_free_vars(&self, out: &mut HashSet<Ident>) {
        match self {
            Expr::Literal(_, _) | Expr::Con0(_, _) => {}
            Expr::Var(id, _) => {
                out.insert(id.clone());
            }
            Expr::Con(_, arg, _) => arg.collect_free_vars(out),
            Expr::Fn(pat, body, _) => {
                let mut inner = HashSet::new();
                body.collect_free_vars(&mut inner);
                for bound in pat.binders() {
                    inner.remove(&bound);
                }
                out.extend(inner);
            }
            Expr::App(f, a, _) => {
                f.collect_free_vars(out);
                a.collect_free_vars(out);
            }
            Expr::Let {
                pat, value, body, ..
            } => {
                value.collect_free_vars(out);
                let mut inner = HashSet::new();
                body.collect_free_vars(&mut inner);
                for bound in pat.binders() {
                    inner.remove(&bound);
                }
                out.extend(inner);
            }
            Expr::LetRec { bindings, body, .. } => {
                let bound: HashSet<Ident> = bindings.iter().map(|(id, _)| id.clone()).collect();
                let mut inner = HashSet::new();
                for (_, rhs) in bindings {
                    rhs.collect_free_vars(&mut inner);
                }
                body.collect_free_vars(&mut inner);
                for id in &bound {
                    inner.remove(id);
                }
                out.extend(inner);
            }
            Expr::Case(scrutinee, matches, _) => {
                scrutinee.collect_free_vars(out);
                for m in matches {
                    let mut inner = HashSet::new();
                    m.body.collect_free_vars(&mut inner);
                    for bound in m.pat.binders() {
                        inner.remove(&bound);
                    }
                    out.extend(inner);
                }
            }
            Expr::Tuple(items, _) => {
                for e in items {
                    e.collect_free_vars(out);
                }
            }
            Expr::Record(fields, _) => {
                for (_, e) in fields {
                    e.collect_free_vars(out);
                }
            }
            Expr::Select(inner, _, _) => inner.collect_free_vars(out),
            Expr::LocalType { body, .. } => body.collect_free_vars(out),
            Expr::Comprehension {
                sources,
                steps,
                yield_expr,
                ..
            } => {
                let mut bound = HashSet::new();
                for src in sources {
                    let mut src_free = HashSet::new();
                    src.expr.collect_free_vars(&mut src_free);
                    for b in &bound {
                        src_free.remove(b);
                    }
                    out.extend(src_free);
                    bound.extend(src.pat.binders());
                }
                for step in steps {
                    let mut step_free = HashSet::new();
                    match step {
                        CompStep::Where(e) => e.collect_free_vars(&mut step_free),
                        CompStep::Order(items) => {
                            for (e, _) in items {
                                e.collect_free_vars(&mut step_free);
                            }
                        }
                        CompStep::Group { keys, aggs } => {
                            for e in keys {
                                e.collect_free_vars(&mut step_free);
                            }
                            for (_, _, e) in aggs {
                                e.collect_free_vars(&mut step_free);
                            }
                        }
                    }
                    for b in &bound {
                        step_free.remove(b);
                    }
                    out.extend(step_free);
                }
                let mut yield_free = HashSet::new();
                yield_expr.collect_free_vars(&mut yield_free);
                for b in &bound {
                    yield_free.remove(b);
                }
                out.extend(yield_free);
            }
            Expr::Aggregate(_, arg, _) => arg.collect_free_vars(out),
        }
    }

    /// True if evaluating this expression is guaranteed to be
    /// side-effect-free. Conservative: literals, identifiers, and function
    /// abstractions are safe (spec §4.4); everything else is not trusted
    /// without deeper analysis.
    pub fn is_pure_shape(&self) -> bool {
        match self {
            Expr::Literal(_, _) | Expr::Var(_, _) | Expr::Fn(_, _, _) | Expr::Con0(_, _) => true,
            Expr::Con(_, arg, _) => arg.is_pure_shape(),
            _ => false,
        }
    }

    /// True if this expression is "atomic" in the sense of spec §4.4: a
    /// literal or a bare identifier.
    pub fn is_atomic(&self) -> bool {
        matches!(self, Expr::Literal(_, _) | Expr::Var(_, _))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    fn var(name: &str, ordinal: u32, ty: Type) -> Expr {
        Expr::Var(Ident::with_ordinal(name, ordinal), ty)
    }

    #[test]
    fn fn_abstraction_removes_its_own_parameter_from_free_vars() {
        let pat = Pat::Ident(Ident::with_ordinal("x", 1), Type::Int);
        let body = var("x", 1, Type::Int);
        let f = Expr::Fn(Box::new(pat), Box::new(body), Type::Function(Box::new(Type::Int), Box::new(Type::Int)));
        assert!(f.free_vars().is_empty());
    }

    #[test]
    fn fn_abstraction_keeps_outer_free_vars() {
        let pat = Pat::Ident(Ident::with_ordinal("x", 1), Type::Int);
        let body = var("y", 2, Type::Int);
        let f = Expr::Fn(Box::new(pat), Box::new(body), Type::Function(Box::new(Type::Int), Box::new(Type::Int)));
        let fv = f.free_vars();
        assert_eq!(fv.len(), 1);
        assert!(fv.contains(&Ident::with_ordinal("y", 2)));
    }

    #[test]
    fn comprehension_source_binders_scope_over_later_sources() {
        // from x in xs, y in f x where y > 0 yield y
        let ty_int = Type::Int;
        let xs = Expr::Var(Ident::with_ordinal("xs", 10), Type::List(Box::new(Type::Int)));
        let x_pat = Pat::Ident(Ident::with_ordinal("x", 1), ty_int.clone());
        let f_app = Expr::App(
            Box::new(Expr::Var(Ident::with_ordinal("f", 11), Type::Function(Box::new(Type::Int), Box::new(Type::List(Box::new(Type::Int)))))),
            Box::new(var("x", 1, ty_int.clone())),
            Type::List(Box::new(Type::Int)),
        );
        let y_pat = Pat::Ident(Ident::with_ordinal("y", 2), ty_int.clone());
        let comp = Expr::Comprehension {
            sources: vec![
                Source { pat: x_pat, expr: xs },
                Source { pat: y_pat, expr: f_app },
            ],
            steps: vec![CompStep::Where(var("y", 2, ty_int.clone()))],
            yield_expr: Box::new(var("y", 2, ty_int.clone())),
            is_default_yield: false,
            ty: Type::List(Box::new(ty_int)),
        };
        let fv = comp.free_vars();
        assert_eq!(fv.len(), 2);
        assert!(fv.contains(&Ident::with_ordinal("xs", 10)));
        assert!(fv.contains(&Ident::with_ordinal("f", 11)));
        assert!(!fv.contains(&Ident::with_ordinal("x", 1)));
        assert!(!fv.contains(&Ident::with_ordinal("y", 2)));
    }

    #[test]
    fn pattern_binders_collects_as_and_inner_binders() {
        let inner = Pat::Tuple(
            vec![
                Pat::Ident(Ident::with_ordinal("a", 1), Type::Int),
                Pat::Ident(Ident::with_ordinal("b", 2), Type::Int),
            ],
            Type::Tuple(vec![Type::Int, Type::Int]),
        );
        let as_pat = Pat::As(Ident::with_ordinal("whole", 3), Box::new(inner), Type::Tuple(vec![Type::Int, Type::Int]));
        let binders = as_pat.binders();
        assert_eq!(binders.len(), 3);
    }
}
