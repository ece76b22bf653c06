//! # Environment
//!
//! An immutable, persistent linked stack of single-binding frames (spec
//! §3 "Environment", §6 "Environment seed"). `bind` never mutates; it
//! returns a new frame sharing the rest of the chain with its parent, so
//! multiple trees may reference the same ancestor environment safely
//! (spec §5: "Environments ... are logically immutable").
//!
//! Grounded on the teacher's `catalog`-style name registries, generalized
//! from a flat relation catalog to a chained, shadowing lexical scope with
//! ancestor-distance queries — the shape the Resolver and the
//! environment-carrying shuttle both depend on.

use crate::core_ir::Expr;
use crate::types::Type;
use std::collections::HashMap;
use std::rc::Rc;

/// What a name is bound to. `Macro` is a named rewrite applied at the use
/// site rather than a value to substitute directly (spec §9: "Macros and
/// opaque values").
#[derive(Clone)]
pub enum Binding {
    Value(Expr),
    /// `f(type_system_request, environment, argument_type) -> expansion`.
    /// Stored as a plain function pointer: macros are a fixed, built-in
    /// vocabulary, never constructed dynamically by resolved programs.
    Macro(fn(&Environment, &Type) -> Expr),
}

struct Frame {
    name: String,
    binding: Binding,
    parent: Option<Rc<Frame>>,
}

/// An immutable linked stack of single-binding frames. Cloning an
/// `Environment` is `O(1)` (it is a reference-counted pointer to the top
/// frame); `bind` is the only way to extend it, and always returns a new
/// handle.
#[derive(Clone)]
pub struct Environment {
    top: Option<Rc<Frame>>,
}

impl Environment {
    /// The empty environment.
    pub fn empty() -> Self {
        Environment { top: None }
    }

    /// Seed an environment from an initial map of named constants (spec
    /// §6: "Environment seed: an initial map of named constants"). Order
    /// is unspecified since names are assumed distinct in a seed map; each
    /// entry becomes its own frame.
    pub fn seeded(bindings: impl IntoIterator<Item = (String, Binding)>) -> Self {
        let mut env = Environment::empty();
        for (name, binding) in bindings {
            env = env.bind(name, binding);
        }
        env
    }

    /// Push a new frame binding `name` to `binding`, shadowing any
    /// earlier binding of the same name. Returns a new environment; `self`
    /// is untouched.
    pub fn bind(&self, name: impl Into<String>, binding: Binding) -> Environment {
        Environment {
            top: Some(Rc::new(Frame {
                name: name.into(),
                binding,
                parent: self.top.clone(),
            })),
        }
    }

    /// Look up the most recent binding of `name`, walking the chain from
    /// the top. Earlier bindings of the same name are *obscured*, never
    /// removed.
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        let mut cursor = self.top.as_deref();
        while let Some(frame) = cursor {
            if frame.name == name {
                return Some(&frame.binding);
            }
            cursor = frame.parent.as_deref();
        }
        None
    }

    /// The distance (number of frames) from the top of this environment
    /// to the nearest binding of `name`, if any — used for free-variable
    /// distance queries (spec §3).
    pub fn distance_to(&self, name: &str) -> Option<usize> {
        let mut cursor = self.top.as_deref();
        let mut distance = 0;
        while let Some(frame) = cursor {
            if frame.name == name {
                return Some(distance);
            }
            distance += 1;
            cursor = frame.parent.as_deref();
        }
        None
    }

    /// The full value map this environment currently presents: for every
    /// name with at least one binding, its most-recent value. Earlier,
    /// obscured bindings are not included.
    pub fn value_map(&self) -> HashMap<String, Binding> {
        let mut seen = HashMap::new();
        let mut cursor = self.top.as_deref();
        while let Some(frame) = cursor {
            seen.entry(frame.name.clone()).or_insert_with(|| frame.binding.clone());
            cursor = frame.parent.as_deref();
        }
        seen
    }

    /// True if `ancestor` is reachable from `self` by walking parent
    /// pointers (i.e. `self` was built by zero or more `bind` calls on top
    /// of `ancestor`).
    pub fn is_descendant_of(&self, ancestor: &Environment) -> bool {
        let target = match &ancestor.top {
            Some(rc) => Rc::as_ptr(rc),
            None => return true,
        };
        let mut cursor = self.top.clone();
        while let Some(frame) = cursor {
            if Rc::as_ptr(&frame) == target {
                return true;
            }
            cursor = frame.parent.clone();
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.top.is_none()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::empty()
    }
}
