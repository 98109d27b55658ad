use std::fmt;

use indexmap::IndexMap;

use crate::atom::{Atom, STRUCT_FIELD};

/// Ordered association from atom keys to lattice values.
///
/// Insertion order is preserved for iteration (struct expansion emits fields
/// in declared order) while equality ignores it; `insert` is last-write-wins,
/// which is exactly the overlay semantics map updates need.
pub type Fields = IndexMap<Atom, Ty>;

/// A lattice value: a partially known type, or the symbolic binding
/// expression that will be expanded into one.
///
/// The same closed variant set serves both roles. `Variable`, `Attribute`,
/// `Call`, `LocalCall`, `TupleNth` and `Intersection` are input-only
/// constructors; [`expand`](crate::expand) eliminates them, so fully
/// expanded output consists of `Atom`, `Integer`, `Tuple`, `Map`, `Struct`,
/// `Union`, `None` and `Unknown` only.
///
/// `Unknown` and `None` are distinct sentinels: `Unknown` means "plausible
/// but not provable" and is the identity of intersection, while `None` means
/// "proven impossible" and absorbs everything it touches. Neither is the
/// atom `nil`, which is an ordinary `Atom` value.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Ty {
    /// The singleton atom value is known.
    Atom(Atom),
    /// The singleton integer value is known.
    Integer(i64),
    /// Tuple of known arity; one lattice value per position.
    Tuple(Vec<Ty>),
    /// Map whose statically known keys are atoms. The second slot optionally
    /// holds a base expression to merge under the literal fields (the
    /// `%{base | k: v}` update form); it is always `None` after expansion.
    Map(Fields, Option<Box<Ty>>),
    /// Map tagged with its defining module. The module slot holds `None`
    /// while the module is unknown, or an expression (a literal atom or an
    /// attribute reference) before expansion; after expansion it is always
    /// `Ty::Atom` and the fields expose a matching `__struct__` entry.
    Struct(Fields, Option<Box<Ty>>, Option<Box<Ty>>),
    /// Disjunction of variants.
    Union(Vec<Ty>),
    /// Conjunction of constraints on one expression; folded away by the
    /// intersection combiner during expansion.
    Intersection(Vec<Ty>),
    /// Reference to a local variable slot.
    Variable(Atom),
    /// Reference to a module attribute.
    Attribute(Atom),
    /// Remote call; the target is itself a lattice value.
    Call(Box<Ty>, Atom, Vec<Ty>),
    /// Unqualified call, resolved through the current module, then imports,
    /// then the built-in modules.
    LocalCall(Atom, Vec<Ty>),
    /// Zero-based tuple projection.
    TupleNth(Box<Ty>, usize),
    /// The absurd type: proven impossible. Absorbing element.
    None,
    /// Unknown but plausible. Identity element.
    Unknown,
}

impl Ty {
    /// Convenience constructor for singleton atoms.
    pub fn atom(name: impl Into<Atom>) -> Self {
        Self::Atom(name.into())
    }

    /// The module atom of an expanded struct, if known.
    #[must_use]
    pub fn struct_module(&self) -> Option<&Atom> {
        match self {
            Self::Struct(_, Some(module), _) => match module.as_ref() {
                Self::Atom(atom) => Some(atom),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Collapses a union whose members all expanded to the same value.
///
/// No wider normalization happens here: unequal members are kept verbatim,
/// duplicates included, so the output stays a faithful syntactic union.
pub(crate) fn normalize_union(variants: Vec<Ty>) -> Ty {
    let all_equal = match variants.first() {
        Option::None => return Ty::Unknown,
        Some(first) => variants.iter().all(|variant| variant == first),
    };
    if all_equal {
        variants.into_iter().next().unwrap_or(Ty::Unknown)
    } else {
        Ty::Union(variants)
    }
}

/// Overlays `over` onto `base`, last write winning per key.
pub(crate) fn overlay(mut base: Fields, over: &Fields) -> Fields {
    for (key, value) in over {
        base.insert(key.clone(), value.clone());
    }
    base
}

/// Removes the `__struct__` tag, turning struct fields into plain map fields.
pub(crate) fn untagged(mut fields: Fields) -> Fields {
    fields.shift_remove(STRUCT_FIELD);
    fields
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atom(atom) => {
                let name = atom.as_str();
                let module_like = name.starts_with(|c: char| c.is_ascii_uppercase());
                if module_like || matches!(name, "nil" | "true" | "false") {
                    f.write_str(name)
                } else {
                    write!(f, ":{name}")
                }
            }
            Self::Integer(value) => write!(f, "{value}"),
            Self::Tuple(elements) => {
                f.write_str("{")?;
                write_separated(f, elements, ", ")?;
                f.write_str("}")
            }
            Self::Map(fields, updated) => write_fields(f, None, fields, updated.as_deref()),
            Self::Struct(fields, module, updated) => {
                write_fields(f, module.as_deref(), fields, updated.as_deref())
            }
            Self::Union(variants) => write_separated(f, variants, " | "),
            Self::Intersection(variants) => write_separated(f, variants, " and "),
            Self::Variable(name) => write!(f, "{name}"),
            Self::Attribute(name) => write!(f, "@{name}"),
            Self::Call(target, fun, args) => {
                write!(f, "{target}.{fun}(")?;
                write_separated(f, args, ", ")?;
                f.write_str(")")
            }
            Self::LocalCall(fun, args) => {
                write!(f, "{fun}(")?;
                write_separated(f, args, ", ")?;
                f.write_str(")")
            }
            Self::TupleNth(tuple, index) => write!(f, "elem({tuple}, {index})"),
            Self::None => f.write_str("none()"),
            Self::Unknown => f.write_str("term()"),
        }
    }
}

fn write_separated(f: &mut fmt::Formatter<'_>, items: &[Ty], separator: &str) -> fmt::Result {
    for (position, item) in items.iter().enumerate() {
        if position > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_fields(
    f: &mut fmt::Formatter<'_>,
    module: Option<&Ty>,
    fields: &Fields,
    updated: Option<&Ty>,
) -> fmt::Result {
    f.write_str("%")?;
    if let Some(module) = module {
        write!(f, "{module}")?;
    }
    f.write_str("{")?;
    if let Some(updated) = updated {
        write!(f, "{updated} | ")?;
    }
    for (position, (key, value)) in fields.iter().enumerate() {
        if position > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{key}: {value}")?;
    }
    f.write_str("}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, Ty)]) -> Fields {
        pairs
            .iter()
            .map(|(key, value)| (Atom::from(*key), value.clone()))
            .collect()
    }

    /// Field equality ignores insertion order; iteration does not.
    #[test]
    fn field_equality_is_order_insensitive() {
        let ab = fields(&[("a", Ty::Integer(1)), ("b", Ty::Integer(2))]);
        let ba = fields(&[("b", Ty::Integer(2)), ("a", Ty::Integer(1))]);
        assert_eq!(ab, ba);
        assert_eq!(ab.keys().next(), Some(&Atom::from("a")));
        assert_eq!(ba.keys().next(), Some(&Atom::from("b")));
    }

    #[test]
    fn overlay_is_last_write_wins() {
        let base = fields(&[("a", Ty::atom("x")), ("b", Ty::Integer(1))]);
        let over = fields(&[("a", Ty::atom("y"))]);
        let merged = overlay(base, &over);
        assert_eq!(merged.get("a"), Some(&Ty::atom("y")));
        assert_eq!(merged.get("b"), Some(&Ty::Integer(1)));
    }

    #[test]
    fn all_equal_union_collapses() {
        let collapsed = normalize_union(vec![Ty::atom("ok"), Ty::atom("ok"), Ty::atom("ok")]);
        assert_eq!(collapsed, Ty::atom("ok"));
    }

    #[test]
    fn mixed_union_is_kept_verbatim() {
        let union = normalize_union(vec![Ty::atom("ok"), Ty::atom("error"), Ty::atom("ok")]);
        assert_eq!(
            union,
            Ty::Union(vec![Ty::atom("ok"), Ty::atom("error"), Ty::atom("ok")])
        );
    }

    #[test]
    fn display_renders_surface_syntax() {
        let ty = Ty::Struct(
            fields(&[
                ("__struct__", Ty::atom("User")),
                ("name", Ty::Unknown),
                ("age", Ty::Integer(7)),
            ]),
            Some(Box::new(Ty::atom("User"))),
            None,
        );
        assert_eq!(ty.to_string(), "%User{__struct__: User, name: term(), age: 7}");
        assert_eq!(Ty::atom("ok").to_string(), ":ok");
        assert_eq!(Ty::atom("nil").to_string(), "nil");
    }
}
