use ahash::AHashMap;

use crate::{
    atom::Atom,
    providers::{Introspection, StructRegistry},
    ty::Ty,
};

/// How a function was defined in user code.
///
/// Determines whether the function is visible to callers outside its module;
/// the private kinds resolve only when expansion runs with private access
/// (i.e. for calls inside the defining module itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FunKind {
    Def,
    Defp,
    Defmacro,
    Defmacrop,
    Defguard,
    Defguardp,
    Defdelegate,
}

impl FunKind {
    /// Whether the function is callable from outside its defining module.
    #[must_use]
    pub fn is_public(self) -> bool {
        matches!(self, Self::Def | Self::Defmacro | Self::Defguard | Self::Defdelegate)
    }
}

/// How a named type was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TypeKind {
    /// Public, structure visible to everyone.
    Type,
    /// Public name, structure hidden outside the defining module.
    Opaque,
    /// Private to the defining module.
    Typep,
}

/// An observed local variable and the binding expression recorded for it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VarInfo {
    pub name: Atom,
    pub ty: Ty,
}

/// An observed module attribute and the binding expression recorded for it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AttributeInfo {
    pub name: Atom,
    pub ty: Ty,
}

/// The spec variants attached to one `(module, fun, arity)`.
///
/// Stored in surface syntax (`name(params) :: result when bindings`). A
/// function with overloaded specs carries one string per variant; the
/// resolver joins their result types as a union.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct SpecInfo {
    pub specs: Vec<String>,
}

impl SpecInfo {
    pub fn one(spec: impl Into<String>) -> Self {
        Self { specs: vec![spec.into()] }
    }
}

/// A user-declared named type: its kind and definition source.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TypeInfo {
    pub kind: TypeKind,
    /// Definition in surface syntax, e.g. `t(x) :: {:ok, x}`.
    pub spec: String,
}

/// One declared arity of a function together with its default count.
///
/// A head `def f(a, b \\ 1, c \\ 2)` declares arity 3 with 2 defaults and is
/// callable at arities 1 through 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FunArity {
    pub arity: usize,
    pub defaults: usize,
}

impl FunArity {
    pub fn exact(arity: usize) -> Self {
        Self { arity, defaults: 0 }
    }

    /// Whether a call at `called` lands on this head via default parameters.
    #[must_use]
    pub fn accepts(self, called: usize) -> bool {
        self.arity.saturating_sub(self.defaults) <= called && called <= self.arity
    }
}

/// Everything the environment knows about one defined function name.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ModFunInfo {
    pub kind: FunKind,
    pub arities: Vec<FunArity>,
}

impl ModFunInfo {
    pub fn new(kind: FunKind, arities: Vec<FunArity>) -> Self {
        Self { kind, arities }
    }

    /// The declared arity a call at `called` resolves to, if any.
    #[must_use]
    pub fn resolve_arity(&self, called: usize) -> Option<usize> {
        self.arities
            .iter()
            .find(|head| head.accepts(called))
            .map(|head| head.arity)
    }
}

/// The immutable knowledge bundle one expansion runs against.
///
/// Variables and attributes come from local observation of the enclosing
/// code; the spec, type and function tables hold user-declared metadata
/// keyed the way the language keys them. The two provider handles reach the
/// knowledge sources the engine does not own: the struct registry and the
/// host's compiled-module introspection. The environment is never mutated
/// during a call, so distinct expansions may share one freely across
/// threads as long as the providers tolerate concurrent reads.
pub struct Env<'a> {
    pub structs: &'a dyn StructRegistry,
    pub introspection: &'a dyn Introspection,
    /// Observed variables; the first record matching a name wins.
    pub variables: Vec<VarInfo>,
    pub attributes: Vec<AttributeInfo>,
    pub current_module: Option<Atom>,
    /// Modules whose functions are callable unqualified, in scan order.
    pub imports: Vec<Atom>,
    /// `(module, fun, arity)` → declared spec variants.
    pub specs: AHashMap<(Atom, Atom, usize), SpecInfo>,
    /// `(module, name, arity)` → declared named type.
    pub types: AHashMap<(Atom, Atom, usize), TypeInfo>,
    /// `(module, fun)` → definition kind and declared arities.
    pub mods_funs: AHashMap<(Atom, Atom), ModFunInfo>,
}

impl<'a> Env<'a> {
    pub fn new(structs: &'a dyn StructRegistry, introspection: &'a dyn Introspection) -> Self {
        Self {
            structs,
            introspection,
            variables: Vec::new(),
            attributes: Vec::new(),
            current_module: None,
            imports: Vec::new(),
            specs: AHashMap::new(),
            types: AHashMap::new(),
            mods_funs: AHashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameters_widen_the_accepted_arity_range() {
        let head = FunArity { arity: 3, defaults: 2 };
        assert!(head.accepts(1));
        assert!(head.accepts(2));
        assert!(head.accepts(3));
        assert!(!head.accepts(0));
        assert!(!head.accepts(4));
    }

    #[test]
    fn arity_resolution_returns_the_declared_arity() {
        let info = ModFunInfo::new(
            FunKind::Def,
            vec![FunArity::exact(0), FunArity { arity: 3, defaults: 1 }],
        );
        assert_eq!(info.resolve_arity(0), Some(0));
        assert_eq!(info.resolve_arity(2), Some(3));
        assert_eq!(info.resolve_arity(3), Some(3));
        assert_eq!(info.resolve_arity(5), None);
    }
}
