use ahash::AHashMap;

use crate::atom::Atom;

/// Operator form names, as they appear in quoted trees.
pub(crate) const OP_UNION: &str = "|";
pub(crate) const OP_ANNOTATION: &str = "::";
pub(crate) const OP_WHEN: &str = "when";
pub(crate) const FORM_MAP: &str = "%{}";
pub(crate) const FORM_STRUCT: &str = "%";
pub(crate) const FORM_TUPLE: &str = "{}";

/// A quoted syntax tree for stored type specifications.
///
/// This mirrors the analyzed language's own quoted form: literals quote to
/// themselves, two-element tuples quote structurally, and every other
/// construct, operators included, quotes to a call-shaped node. The trees
/// come either from [`parse`](crate::parse) (metadata stores spec text) or
/// directly from the [`Introspection`](crate::providers::Introspection)
/// provider (compiled modules store them pre-quoted).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Ast {
    /// Atom literal: `:ok`, `true`, `nil`.
    Atom(Atom),
    /// Integer literal.
    Integer(i64),
    /// List literal; keyword lists arrive as lists of pairs.
    List(Vec<Ast>),
    /// Literal two-element tuple; `{a, b}` quotes directly to a pair.
    Pair(Box<Ast>, Box<Ast>),
    /// Bare lowercase identifier. In spec sources these are variable-shaped;
    /// whether one is a type parameter or a zero-argument type reference is
    /// only known after substitution.
    Var(Atom),
    /// Alias chain (`Mod.Sub`), already joined to its module atom.
    Alias(Atom),
    /// Unqualified call, including the operator forms `|`, `::`, `when`,
    /// `%{}`, `%` and `{}`.
    Local(Atom, Vec<Ast>),
    /// Qualified call; the target is an alias or a module atom.
    Remote(Box<Ast>, Atom, Vec<Ast>),
}

impl Ast {
    pub(crate) fn local(name: &str, args: Vec<Ast>) -> Self {
        Self::Local(Atom::from(name), args)
    }

    /// The module atom named by an alias or atom node.
    pub(crate) fn module_atom(&self) -> Option<Atom> {
        match self {
            Self::Atom(atom) | Self::Alias(atom) => Some(atom.clone()),
            _ => None,
        }
    }

    /// Replaces variable-shaped references with their bound subtrees.
    ///
    /// Used for parameterized types (`t(x) :: {x, x}` applied to arguments)
    /// and `when` binding lists on specs. Unbound variables survive as-is.
    pub(crate) fn substitute(&self, bindings: &AHashMap<Atom, Ast>) -> Ast {
        if bindings.is_empty() {
            return self.clone();
        }
        match self {
            Self::Var(name) => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
            Self::Atom(_) | Self::Integer(_) | Self::Alias(_) => self.clone(),
            Self::List(items) => {
                Self::List(items.iter().map(|item| item.substitute(bindings)).collect())
            }
            Self::Pair(left, right) => Self::Pair(
                Box::new(left.substitute(bindings)),
                Box::new(right.substitute(bindings)),
            ),
            Self::Local(name, args) => Self::Local(
                name.clone(),
                args.iter().map(|arg| arg.substitute(bindings)).collect(),
            ),
            Self::Remote(target, fun, args) => Self::Remote(
                Box::new(target.substitute(bindings)),
                fun.clone(),
                args.iter().map(|arg| arg.substitute(bindings)).collect(),
            ),
        }
    }
}

/// A spec split into its head, result type, and `when` bindings.
///
/// Spec sources share one surface shape, `head :: result when bindings`,
/// where the head is `name` or `name(params)` and both the `when` clause and
/// the parameters are optional. Splitting is shared between function specs
/// (the result side is what gets expanded) and type definitions (the head
/// parameters bind the use-site arguments).
pub(crate) struct SpecParts {
    pub params: Vec<Atom>,
    pub result: Ast,
    pub bindings: AHashMap<Atom, Ast>,
}

/// Splits a quoted spec into [`SpecParts`].
///
/// Returns `None` when the tree has no `::` at its spine, i.e. is not a
/// spec-shaped quotation at all.
pub(crate) fn split_spec(ast: &Ast) -> Option<SpecParts> {
    let mut bindings = AHashMap::new();
    let annotated = match ast {
        Ast::Local(name, args) if name.as_str() == OP_WHEN && args.len() == 2 => {
            collect_bindings(&args[1], &mut bindings);
            &args[0]
        }
        other => other,
    };
    let Ast::Local(name, args) = annotated else {
        return None;
    };
    if name.as_str() != OP_ANNOTATION || args.len() != 2 {
        return None;
    }
    let params = match &args[0] {
        Ast::Local(_, params) => params
            .iter()
            .map(|param| match param {
                Ast::Var(name) => Some(name.clone()),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    Some(SpecParts {
        params,
        result: args[1].clone(),
        bindings,
    })
}

/// Collects `name: type` entries from a `when` binding list.
fn collect_bindings(list: &Ast, bindings: &mut AHashMap<Atom, Ast>) {
    let Ast::List(entries) = list else { return };
    for entry in entries {
        if let Ast::Pair(key, value) = entry
            && let Ast::Atom(name) = key.as_ref()
        {
            bindings.insert(name.clone(), value.as_ref().clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `t(x) :: {x, atom}` splits into one parameter and a pair result.
    #[test]
    fn split_parameterized_type() {
        let spec = Ast::local(
            OP_ANNOTATION,
            vec![
                Ast::local("t", vec![Ast::Var(Atom::from("x"))]),
                Ast::Pair(
                    Box::new(Ast::Var(Atom::from("x"))),
                    Box::new(Ast::local("atom", vec![])),
                ),
            ],
        );
        let parts = split_spec(&spec).unwrap();
        assert_eq!(parts.params, vec![Atom::from("x")]);
        assert!(parts.bindings.is_empty());
    }

    /// `f() :: x when x: atom` yields a binding for `x`.
    #[test]
    fn split_when_bindings() {
        let spec = Ast::local(
            OP_WHEN,
            vec![
                Ast::local(
                    OP_ANNOTATION,
                    vec![
                        Ast::local("f", vec![]),
                        Ast::Var(Atom::from("x")),
                    ],
                ),
                Ast::List(vec![Ast::Pair(
                    Box::new(Ast::Atom(Atom::from("x"))),
                    Box::new(Ast::local("atom", vec![])),
                )]),
            ],
        );
        let parts = split_spec(&spec).unwrap();
        let substituted = parts.result.substitute(&parts.bindings);
        assert_eq!(substituted, Ast::local("atom", vec![]));
    }

    #[test]
    fn substitution_reaches_nested_positions() {
        let mut bindings = AHashMap::new();
        bindings.insert(Atom::from("x"), Ast::Integer(1));
        let tree = Ast::local(
            FORM_TUPLE,
            vec![
                Ast::Var(Atom::from("x")),
                Ast::local("t", vec![Ast::Var(Atom::from("x"))]),
                Ast::Var(Atom::from("y")),
            ],
        );
        let substituted = tree.substitute(&bindings);
        assert_eq!(
            substituted,
            Ast::local(
                FORM_TUPLE,
                vec![
                    Ast::Integer(1),
                    Ast::local("t", vec![Ast::Integer(1)]),
                    Ast::Var(Atom::from("y")),
                ]
            )
        );
    }
}
