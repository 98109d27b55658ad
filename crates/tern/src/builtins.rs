//! Structural built-ins resolved without consulting any spec.
//!
//! The standard library's map manipulators (and `Kernel.elem`) are common
//! enough in binding expressions that the resolver models them directly on
//! the field tables instead of going through spec lookup; a spec would only
//! say `map()` where the field-level effect is statically obvious.

use crate::{
    expand::Expander,
    ty::{Fields, Ty, overlay, untagged},
};

/// The map-module functions the resolver models structurally.
///
/// Names map through their snake_case (or bang) spellings, so dispatch is a
/// `from_str` on the called atom plus an arity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum MapBuiltin {
    Fetch,
    #[strum(serialize = "fetch!")]
    FetchBang,
    Get,
    GetLazy,
    Put,
    PutNew,
    PutNewLazy,
    #[strum(serialize = "replace!")]
    ReplaceBang,
    Delete,
    Merge,
    Update,
    #[strum(serialize = "update!")]
    UpdateBang,
    FromStruct,
}

impl MapBuiltin {
    /// Whether the catalog covers this function at the called arity.
    /// Other arities fall through to ordinary spec resolution.
    pub(crate) fn accepts_arity(self, arity: usize) -> bool {
        match self {
            Self::FromStruct => arity == 1,
            Self::Fetch | Self::FetchBang | Self::Delete => arity == 2,
            Self::Get | Self::Merge => arity == 2 || arity == 3,
            Self::GetLazy
            | Self::Put
            | Self::PutNew
            | Self::PutNewLazy
            | Self::ReplaceBang
            | Self::UpdateBang => arity == 3,
            Self::Update => arity == 4,
        }
    }
}

/// What a put-family call stores under the key.
enum Stored<'a> {
    /// The value argument as the caller resolved it; stored verbatim.
    Value(&'a Ty),
    /// The value is opaque (lazy callbacks, user update functions).
    Unknown,
}

impl Expander<'_, '_> {
    pub(crate) fn map_builtin(&mut self, builtin: MapBuiltin, args: &[Ty]) -> Ty {
        match builtin {
            MapBuiltin::Get if args.len() == 3 => {
                self.map_get(&args[0], &args[1], Some(&args[2]))
            }
            MapBuiltin::Get | MapBuiltin::GetLazy | MapBuiltin::Fetch | MapBuiltin::FetchBang => {
                self.map_get(&args[0], &args[1], None)
            }
            MapBuiltin::Put | MapBuiltin::ReplaceBang => {
                self.map_put(&args[0], &args[1], Stored::Value(&args[2]), true)
            }
            MapBuiltin::PutNew => self.map_put(&args[0], &args[1], Stored::Value(&args[2]), false),
            MapBuiltin::PutNewLazy => self.map_put(&args[0], &args[1], Stored::Unknown, false),
            MapBuiltin::Update | MapBuiltin::UpdateBang => {
                self.map_put(&args[0], &args[1], Stored::Unknown, true)
            }
            MapBuiltin::Delete => self.map_delete(&args[0], &args[1]),
            MapBuiltin::Merge if args.len() == 2 => self.map_merge(&args[0], &args[1], false),
            MapBuiltin::Merge => self.map_merge(&args[0], &args[1], true),
            MapBuiltin::FromStruct => self.map_from_struct(&args[0]),
        }
    }

    /// `Kernel.elem(tuple, index)` reduces to a tuple projection once the
    /// index expands to a known integer.
    pub(crate) fn kernel_elem(&mut self, tuple: &Ty, index: &Ty) -> Ty {
        match self.expand(index) {
            Ty::Integer(position) => match usize::try_from(position) {
                Ok(position) => self.expand(&Ty::TupleNth(Box::new(tuple.clone()), position)),
                Err(_) => Ty::None,
            },
            Ty::Unknown => Ty::Unknown,
            _ => Ty::None,
        }
    }

    /// The field table of a map-shaped argument: empty when the argument is
    /// unknown, `None` (refuting the whole call) when it expands to
    /// something that is not a map or struct.
    fn known_fields(&mut self, expr: &Ty) -> Option<Fields> {
        match self.expand(expr) {
            Ty::Map(fields, None) | Ty::Struct(fields, _, None) => Some(fields),
            Ty::Unknown => Some(Fields::new()),
            _ => None,
        }
    }

    fn map_get(&mut self, map: &Ty, key: &Ty, default: Option<&Ty>) -> Ty {
        let Some(fields) = self.known_fields(map) else {
            return Ty::None;
        };
        match self.expand(key) {
            Ty::Atom(key) => match fields.get(&key).cloned() {
                Some(value) => self.expand(&value),
                None => match default {
                    Some(default) => self.expand(default),
                    None => Ty::Unknown,
                },
            },
            Ty::Unknown => Ty::Unknown,
            _ => Ty::None,
        }
    }

    fn map_put(&mut self, map: &Ty, key: &Ty, stored: Stored<'_>, overwrite: bool) -> Ty {
        let Some(mut fields) = self.known_fields(map) else {
            return Ty::None;
        };
        match self.expand(key) {
            Ty::Atom(key) => {
                let value = match stored {
                    Stored::Value(value) => value.clone(),
                    Stored::Unknown => Ty::Unknown,
                };
                if overwrite || !fields.contains_key(&key) {
                    fields.insert(key, value);
                }
                Ty::Map(fields, None)
            }
            // Which key changed is unknown; the shape survives, the
            // contents do not improve.
            Ty::Unknown => Ty::Map(fields, None),
            _ => Ty::None,
        }
    }

    fn map_delete(&mut self, map: &Ty, key: &Ty) -> Ty {
        let Some(mut fields) = self.known_fields(map) else {
            return Ty::None;
        };
        match self.expand(key) {
            Ty::Atom(key) => {
                fields.shift_remove(&key);
                Ty::Map(fields, None)
            }
            Ty::Unknown => Ty::Map(fields, None),
            _ => Ty::None,
        }
    }

    fn map_merge(&mut self, first: &Ty, second: &Ty, conflicts_opaque: bool) -> Ty {
        let Some(first_fields) = self.known_fields(first) else {
            return Ty::None;
        };
        let Some(second_fields) = self.known_fields(second) else {
            return Ty::None;
        };
        if !conflicts_opaque {
            return Ty::Map(overlay(first_fields, &second_fields), None);
        }
        // merge/3 runs a user combiner over conflicting keys; its result is
        // opaque, so those keys degrade to unknown.
        let mut merged = first_fields;
        for (key, value) in second_fields {
            if merged.contains_key(&key) {
                merged.insert(key, Ty::Unknown);
            } else {
                merged.insert(key, value);
            }
        }
        Ty::Map(merged, None)
    }

    fn map_from_struct(&mut self, argument: &Ty) -> Ty {
        match self.expand(argument) {
            Ty::Struct(fields, _, None) => Ty::Map(untagged(fields), None),
            Ty::Atom(module) => {
                let synthesized =
                    Ty::Struct(Fields::new(), Some(Box::new(Ty::Atom(module))), None);
                match self.expand(&synthesized) {
                    Ty::Struct(fields, _, _) => Ty::Map(untagged(fields), None),
                    _ => Ty::None,
                }
            }
            Ty::Unknown => Ty::Unknown,
            _ => Ty::None,
        }
    }
}
