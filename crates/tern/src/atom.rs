use std::{borrow::Borrow, fmt, ops::Deref};

/// The `__struct__` field carried by every tagged struct value.
pub(crate) const STRUCT_FIELD: &str = "__struct__";

/// Module holding the language's auto-imported functions.
pub(crate) const KERNEL: &str = "Kernel";

/// Module holding the language's special forms; consulted last for local calls.
pub(crate) const SPECIAL_FORMS: &str = "Kernel.SpecialForms";

/// Module holding the structural map manipulators of the standard library.
pub(crate) const MAP_MODULE: &str = "Map";

/// An atom: an interned-by-name constant of the analyzed language.
///
/// Atoms name everything the engine touches: map keys, modules, functions,
/// variables, attributes. They compare and hash by their text. The engine is
/// a pure per-call function with no arena, so atoms own their text rather
/// than index an interner table; structural equality is all the expansion
/// algorithm relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Atom(String);

impl Atom {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this atom names an intentionally ignored binding (`_`, `_acc`).
    #[must_use]
    pub(crate) fn is_underscored(&self) -> bool {
        self.0.starts_with('_')
    }

    /// Whether this atom is one of the non-module literals `nil`, `true`,
    /// `false`. Calls can never resolve through these.
    #[must_use]
    pub(crate) fn is_reserved_literal(&self) -> bool {
        matches!(self.0.as_str(), "nil" | "true" | "false")
    }
}

impl From<&str> for Atom {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for Atom {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Deref for Atom {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Atom {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
