//! Pairwise meet of two expanded types.
//!
//! The expander folds this over `Intersection` variants to reduce multiple
//! constraints on one expression to a single type. `Unknown` is the identity,
//! `None` absorbs, and a meet that cannot be reconciled is `None`; an
//! impossible intersection is a proof, not a shrug. The function is
//! associative up to `None` propagation.

use crate::ty::{Fields, Ty};

/// Computes the greatest lower bound of two expanded types.
#[must_use]
pub fn combine(left: Ty, right: Ty) -> Ty {
    if left == Ty::None || right == Ty::None {
        return Ty::None;
    }
    if left == Ty::Unknown {
        return right;
    }
    if right == Ty::Unknown {
        return left;
    }
    if left == right {
        return left;
    }
    match (left, right) {
        (Ty::Union(variants), other) => combine_union(variants, &other, false),
        (other, Ty::Union(variants)) => combine_union(variants, &other, true),
        (Ty::Struct(left_fields, left_module, None), Ty::Struct(right_fields, right_module, None)) => {
            combine_structs(left_fields, left_module, right_fields, right_module)
        }
        (Ty::Struct(struct_fields, module, None), Ty::Map(map_fields, None))
        | (Ty::Map(map_fields, None), Ty::Struct(struct_fields, module, None)) => {
            combine_struct_map(struct_fields, module, &map_fields)
        }
        (Ty::Map(left_fields, None), Ty::Map(right_fields, None)) => {
            match combine_keyed(&left_fields, &right_fields, KeySet::Union) {
                Some(fields) => Ty::Map(fields, None),
                None => Ty::None,
            }
        }
        (Ty::Tuple(left_elements), Ty::Tuple(right_elements))
            if left_elements.len() == right_elements.len() =>
        {
            combine_tuples(left_elements, right_elements)
        }
        _ => Ty::None,
    }
}

/// Meets a union against another type: the first reconcilable variant wins.
fn combine_union(variants: Vec<Ty>, other: &Ty, union_on_right: bool) -> Ty {
    for variant in variants {
        let met = if union_on_right {
            combine(other.clone(), variant)
        } else {
            combine(variant, other.clone())
        };
        if met != Ty::None {
            return met;
        }
    }
    Ty::None
}

enum KeySet {
    /// Every key of either side.
    Union,
    /// Only the left side's keys; the right narrows values.
    Left,
}

/// Per-key meet over the chosen key set; `None` when any key is impossible.
fn combine_keyed(left: &Fields, right: &Fields, key_set: KeySet) -> Option<Fields> {
    let mut combined = Fields::new();
    for (key, left_value) in left {
        let right_value = right.get(key).cloned().unwrap_or(Ty::Unknown);
        let met = combine(left_value.clone(), right_value);
        if met == Ty::None {
            return None;
        }
        combined.insert(key.clone(), met);
    }
    if let KeySet::Union = key_set {
        for (key, right_value) in right {
            if combined.contains_key(key) {
                continue;
            }
            combined.insert(key.clone(), right_value.clone());
        }
    }
    Some(combined)
}

fn combine_structs(
    left_fields: Fields,
    left_module: Option<Box<Ty>>,
    right_fields: Fields,
    right_module: Option<Box<Ty>>,
) -> Ty {
    match (left_module, right_module) {
        (None, None) => match combine_keyed(&left_fields, &right_fields, KeySet::Union) {
            Some(fields) => Ty::Struct(fields, None, None),
            None => Ty::None,
        },
        (Some(module), None) => {
            match combine_keyed(&left_fields, &right_fields, KeySet::Left) {
                Some(fields) => Ty::Struct(fields, Some(module), None),
                None => Ty::None,
            }
        }
        // Delegate to the reverse so the typed side drives the key set.
        (None, Some(module)) => {
            combine_structs(right_fields, Some(module), left_fields, None)
        }
        (Some(left_module), Some(right_module)) if left_module == right_module => {
            match combine_keyed(&left_fields, &right_fields, KeySet::Left) {
                Some(fields) => Ty::Struct(fields, Some(left_module), None),
                None => Ty::None,
            }
        }
        _ => Ty::None,
    }
}

/// Struct against map: a typed struct's declared keys bound the result; the
/// map only narrows values. An untyped struct unions keys like map-on-map.
fn combine_struct_map(struct_fields: Fields, module: Option<Box<Ty>>, map_fields: &Fields) -> Ty {
    let key_set = if module.is_some() { KeySet::Left } else { KeySet::Union };
    match combine_keyed(&struct_fields, map_fields, key_set) {
        Some(fields) => Ty::Struct(fields, module, None),
        None => Ty::None,
    }
}

fn combine_tuples(left_elements: Vec<Ty>, right_elements: Vec<Ty>) -> Ty {
    let mut combined = Vec::with_capacity(left_elements.len());
    for (left_element, right_element) in left_elements.into_iter().zip(right_elements) {
        let met = combine(left_element, right_element);
        if met == Ty::None {
            return Ty::None;
        }
        combined.push(met);
    }
    Ty::Tuple(combined)
}
