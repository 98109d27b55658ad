//! The narrow interfaces to the engine's external knowledge sources.
//!
//! Expansion consults two collaborators it does not own: the struct registry
//! built by source discovery, and the host runtime's introspection over
//! compiled modules. Both are read-only from the engine's point of view and
//! must tolerate concurrent reads if expansions run on multiple threads.

use crate::{ast::Ast, atom::Atom, env::TypeKind};

/// Registry of known structs and their declared fields.
pub trait StructRegistry {
    fn is_struct(&self, module: &Atom) -> bool;

    /// Declared fields of a struct module, `__struct__` included, in
    /// declaration order. `None` when the module is not a known struct.
    fn fields(&self, module: &Atom) -> Option<Vec<Atom>>;
}

/// One documented function head: its arity and how many of the trailing
/// parameters carry defaults.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DocEntry {
    pub fun: Atom,
    pub arity: usize,
    pub defaults: usize,
}

impl DocEntry {
    /// Whether a call at `called` lands on this head via default parameters.
    #[must_use]
    pub fn accepts(&self, called: usize) -> bool {
        self.arity.saturating_sub(self.defaults) <= called && called <= self.arity
    }
}

/// Introspection over the host's compiled modules.
///
/// Specs and type definitions are returned as already-quoted [`Ast`] trees,
/// the same normalized form the engine's own spec-text parser produces.
pub trait Introspection {
    /// Documentation entries for a module, or `None` when the module has
    /// none (not compiled, not loaded, or docs stripped).
    fn docs(&self, module: &Atom) -> Option<Vec<DocEntry>>;

    /// Whether the module exports the function at exactly this arity.
    fn function_exported(&self, module: &Atom, fun: &Atom, arity: usize) -> bool;

    /// Quoted spec variants for `(module, fun, arity)`, or `None` when the
    /// function carries no spec.
    fn spec(&self, module: &Atom, fun: &Atom, arity: usize) -> Option<Vec<Ast>>;

    /// Quoted definition of a named type, or `None` when unknown.
    fn type_spec(&self, module: &Atom, name: &Atom, arity: usize) -> Option<(TypeKind, Ast)>;
}

/// Struct registry that knows no structs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStructs;

impl StructRegistry for NoStructs {
    fn is_struct(&self, _module: &Atom) -> bool {
        false
    }

    fn fields(&self, _module: &Atom) -> Option<Vec<Atom>> {
        None
    }
}

/// Introspection with no compiled modules behind it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIntrospection;

impl Introspection for NoIntrospection {
    fn docs(&self, _module: &Atom) -> Option<Vec<DocEntry>> {
        None
    }

    fn function_exported(&self, _module: &Atom, _fun: &Atom, _arity: usize) -> bool {
        false
    }

    fn spec(&self, _module: &Atom, _fun: &Atom, _arity: usize) -> Option<Vec<Ast>> {
        None
    }

    fn type_spec(&self, _module: &Atom, _name: &Atom, _arity: usize) -> Option<(TypeKind, Ast)> {
        None
    }
}
