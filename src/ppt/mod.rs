//! # Perfect Process Tree (PPT)
//!
//! Represents every evaluation path of a predicate under partially-known
//! inputs, used for Universal Resolving Algorithm (URA)-style inversion of
//! recursive predicates such as transitive closure (spec §4.9).
//!
//! Grounded on the teacher's `sip_rewriting::SipRewriter` — specifically
//! its `recursive_relations: HashSet<String>` cycle guard, carried through
//! a rewrite pass that must not recurse into relations currently being
//! rewritten. The same "don't re-enter while still inverting this
//! predicate" guard drives `Terminal::is_recursive` here.

use crate::core_ir::{Expr, Ident};
use crate::generators::{self, Generator};
use crate::inverters;
use std::collections::HashSet;

/// The variable bookkeeping carried at every PPT node (spec §3 "Every node
/// carries its current variable environment").
#[derive(Debug, Clone, Default)]
pub struct NodeEnv {
    pub goal: HashSet<Ident>,
    pub bound: HashSet<Ident>,
    pub join: HashSet<Ident>,
}

/// A node in the Perfect Process Tree.
#[derive(Debug, Clone)]
pub enum PptNode {
    /// A non-composite conjunct. Inversion is attempted locally; `result`
    /// is `Some` iff inversion succeeded.
    Terminal {
        conjunct: Expr,
        env: NodeEnv,
        result: Option<Generator>,
        is_recursive: bool,
    },
    /// `orelse` — both children are explored independently; the solution
    /// is the union of both.
    Branch {
        left: Box<PptNode>,
        right: Box<PptNode>,
        env: NodeEnv,
    },
    /// `andalso` — an ordered conjunction; every child must be satisfied.
    /// Always has at least two children (spec §4.9 construction
    /// invariant).
    Sequence {
        children: Vec<PptNode>,
        env: NodeEnv,
    },
}

impl PptNode {
    pub fn env(&self) -> &NodeEnv {
        match self {
            PptNode::Terminal { env, .. } => env,
            PptNode::Branch { env, .. } => env,
            PptNode::Sequence { env, .. } => env,
        }
    }

    /// A terminal is *inverted* iff it has an inversion result and that
    /// generator leaves no remaining filter once applied (spec §4.9: "A
    /// `Terminal` is considered inverted iff its inversion result is
    /// present and has no remaining filters").
    pub fn is_inverted_terminal(&self) -> bool {
        matches!(self, PptNode::Terminal { result: Some(_), is_recursive: false, .. })
    }

    /// A branch has a base case iff its left child is an inverted
    /// terminal (spec §4.9).
    pub fn has_base_case(&self) -> bool {
        match self {
            PptNode::Branch { left, .. } => left.is_inverted_terminal(),
            _ => false,
        }
    }

    /// A branch has a recursive case iff any descendant of its right
    /// child is recursive.
    pub fn has_recursive_case(&self) -> bool {
        match self {
            PptNode::Branch { right, .. } => right.contains_recursive_descendant(),
            _ => false,
        }
    }

    fn contains_recursive_descendant(&self) -> bool {
        match self {
            PptNode::Terminal { is_recursive, .. } => *is_recursive,
            PptNode::Branch { left, right, .. } => {
                left.contains_recursive_descendant() || right.contains_recursive_descendant()
            }
            PptNode::Sequence { children, .. } => {
                children.iter().any(PptNode::contains_recursive_descendant)
            }
        }
    }
}

/// Builds a PPT for a predicate body, given the name of the predicate
/// currently being inverted (to detect self-recursive calls) and a depth
/// cap (spec §9 "Recursion in predicate inversion" + DESIGN.md's
/// `CompilerConfig::max_ppt_depth` resolution of the otherwise-unbounded
/// construction spec.md leaves open).
pub struct PptBuilder {
    predicate_name: String,
    max_depth: usize,
}

impl PptBuilder {
    pub fn new(predicate_name: impl Into<String>, max_depth: usize) -> Self {
        PptBuilder {
            predicate_name: predicate_name.into(),
            max_depth,
        }
    }

    /// Build a PPT for `body` trying to ground `goal`, starting from the
    /// variables already `bound`.
    pub fn build(&self, body: &Expr, goal: &HashSet<Ident>, bound: &HashSet<Ident>) -> PptNode {
        self.build_at_depth(body, goal, bound, 0)
    }

    fn build_at_depth(
        &self,
        body: &Expr,
        goal: &HashSet<Ident>,
        bound: &HashSet<Ident>,
        depth: usize,
    ) -> PptNode {
        let env = NodeEnv {
            goal: goal.clone(),
            bound: bound.clone(),
            join: HashSet::new(),
        };

        if depth >= self.max_depth {
            return PptNode::Terminal {
                conjunct: body.clone(),
                env,
                result: None,
                is_recursive: false,
            };
        }

        if let Some((l, r)) = as_orelse(body) {
            return PptNode::Branch {
                left: Box::new(self.build_at_depth(l, goal, bound, depth + 1)),
                right: Box::new(self.build_at_depth(r, goal, bound, depth + 1)),
                env,
            };
        }

        let conjuncts = generators::flatten_conjunction(body);
        if conjuncts.len() >= 2 {
            let ordered = crate::mode_analyzer::order_predicates(&conjuncts, goal);
            let mut running_bound = bound.clone();
            let mut children = Vec::with_capacity(ordered.len());
            for conjunct in &ordered {
                let child = self.build_at_depth(conjunct, goal, &running_bound, depth + 1);
                if let PptNode::Terminal { result: Some(_), env: child_env, .. } = &child {
                    running_bound.extend(child_env.goal.intersection(goal).cloned());
                }
                children.push(child);
            }
            return PptNode::Sequence { children, env };
        }

        self.build_terminal(body, env)
    }

    fn build_terminal(&self, conjunct: &Expr, env: NodeEnv) -> PptNode {
        if calls_predicate(conjunct, &self.predicate_name) {
            return PptNode::Terminal {
                conjunct: conjunct.clone(),
                env,
                result: None,
                is_recursive: true,
            };
        }
        let unbound_goals: Vec<Ident> = env
            .goal
            .iter()
            .filter(|v| !env.bound.contains(*v))
            .cloned()
            .collect();
        let result = unbound_goals.iter().find_map(|v| {
            generators::synthesize(v, std::slice::from_ref(conjunct))
                .or_else(|| inverters::invert(v, conjunct))
        });
        PptNode::Terminal {
            conjunct: conjunct.clone(),
            env,
            result,
            is_recursive: false,
        }
    }
}

fn as_orelse(expr: &Expr) -> Option<(&Expr, &Expr)> {
    let Expr::App(outer_f, rhs, _) = expr else {
        return None;
    };
    let Expr::App(inner_f, lhs, _) = outer_f.as_ref() else {
        return None;
    };
    let Expr::Var(id, _) = inner_f.as_ref() else {
        return None;
    };
    (id.name == "orelse").then_some((lhs.as_ref(), rhs.as_ref()))
}

/// True iff `expr` contains an application of a variable named
/// `predicate_name` anywhere (a crude but sound over-approximation of
/// "calls the predicate being inverted" — spec §9 doesn't require arity
/// or argument-shape precision, only that the cycle is detected).
fn calls_predicate(expr: &Expr, predicate_name: &str) -> bool {
    match expr {
        Expr::Var(id, _) => id.name == predicate_name,
        Expr::App(f, a, _) => calls_predicate(f, predicate_name) || calls_predicate(a, predicate_name),
        Expr::Con(_, a, _) => calls_predicate(a, predicate_name),
        Expr::Fn(_, body, _) => calls_predicate(body, predicate_name),
        Expr::Let { value, body, .. } => {
            calls_predicate(value, predicate_name) || calls_predicate(body, predicate_name)
        }
        Expr::LetRec { bindings, body, .. } => {
            bindings.iter().any(|(_, e)| calls_predicate(e, predicate_name))
                || calls_predicate(body, predicate_name)
        }
        Expr::Case(scrutinee, matches, _) => {
            calls_predicate(scrutinee, predicate_name)
                || matches.iter().any(|m| calls_predicate(&m.body, predicate_name))
        }
        Expr::Tuple(items, _) => items.iter().any(|e| calls_predicate(e, predicate_name)),
        Expr::Record(fields, _) => fields.iter().any(|(_, e)| calls_predicate(e, predicate_name)),
        Expr::Select(inner, _, _) => calls_predicate(inner, predicate_name),
        Expr::LocalType { body, .. } => calls_predicate(body, predicate_name),
        Expr::Comprehension { sources, steps, yield_expr, .. } => {
            sources.iter().any(|s| calls_predicate(&s.expr, predicate_name))
                || steps.iter().any(|s| step_calls_predicate(s, predicate_name))
                || calls_predicate(yield_expr, predicate_name)
        }
        Expr::Aggregate(_, arg, _) => calls_predicate(arg, predicate_name),
        Expr::Literal(_, _) | Expr::Con0(_, _) => false,
    }
}

fn step_calls_predicate(step: &crate::core_ir::CompStep, predicate_name: &str) -> bool {
    use crate::core_ir::CompStep;
    match step {
        CompStep::Where(e) => calls_predicate(e, predicate_name),
        CompStep::Order(items) => items.iter().any(|(e, _)| calls_predicate(e, predicate_name)),
        CompStep::Group { keys, aggs } => {
            keys.iter().any(|e| calls_predicate(e, predicate_name))
                || aggs.iter().any(|(_, _, e)| calls_predicate(e, predicate_name))
        }
    }
}
