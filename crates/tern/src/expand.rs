//! The expansion driver.
//!
//! [`expand`] turns a symbolic binding expression into the most precise type
//! the environment can prove. Dispatch is by lattice constructor; recursive
//! positions funnel back through [`Expander::expand`], which guards against
//! cycles with a visitation stack and bounds depth defensively. The engine
//! is pure: no mutation outside the expander's own stack, no I/O, nothing
//! raised; impossibility and ignorance are the values `None` and `Unknown`.

use std::str::FromStr;

use smallvec::SmallVec;

use crate::{
    atom::{Atom, KERNEL, MAP_MODULE, SPECIAL_FORMS, STRUCT_FIELD},
    builtins::MapBuiltin,
    combine::combine,
    env::Env,
    ty::{Fields, Ty, normalize_union, overlay},
};

/// Defensive bound on expansion depth.
///
/// The visitation stack already breaks expression and named-type cycles, and
/// every other recursion walks strictly smaller subterms; the cap only
/// guards the process stack against adversarial inputs.
pub(crate) const MAX_EXPANSION_DEPTH: usize = 256;

/// Expands a binding expression against an environment.
///
/// The result contains no `Variable`, `Attribute`, `Call`, `LocalCall`,
/// `TupleNth` or `Intersection` constructors; what the environment cannot
/// resolve comes back as [`Ty::Unknown`], what it can refute as
/// [`Ty::None`].
#[must_use]
pub fn expand(env: &Env, expr: &Ty) -> Ty {
    Expander::new(env).expand(expr)
}

/// Result of one call/type resolution attempt.
///
/// `NoSpec` is the internal "function exists but carries no spec" sentinel;
/// it never escapes: the expander flattens it to [`Ty::Unknown`] at its
/// boundary, and the local-call scan uses it to stop probing further
/// candidate modules.
pub(crate) enum Lookup {
    Found(Ty),
    NoSpec,
    Missing,
}

/// One entry of the visitation stack.
pub(crate) enum Visit {
    /// A binding expression currently being expanded.
    Expr(Ty),
    /// A named type currently being resolved, keyed by module, name, arity.
    NamedType(Atom, Atom, usize),
}

pub(crate) struct Expander<'e, 'a> {
    pub(crate) env: &'e Env<'a>,
    pub(crate) stack: Vec<Visit>,
}

impl<'e, 'a> Expander<'e, 'a> {
    pub(crate) fn new(env: &'e Env<'a>) -> Self {
        Self {
            env,
            stack: Vec::new(),
        }
    }

    pub(crate) fn expand(&mut self, expr: &Ty) -> Ty {
        match expr {
            Ty::Atom(_) | Ty::Integer(_) | Ty::None | Ty::Unknown => expr.clone(),
            _ => {
                if self.stack.len() >= MAX_EXPANSION_DEPTH || self.visited_expr(expr) {
                    return Ty::Unknown;
                }
                self.stack.push(Visit::Expr(expr.clone()));
                let expanded = self.dispatch(expr);
                self.stack.pop();
                expanded
            }
        }
    }

    fn visited_expr(&self, expr: &Ty) -> bool {
        self.stack
            .iter()
            .any(|visit| matches!(visit, Visit::Expr(seen) if seen == expr))
    }

    pub(crate) fn visited_type(&self, module: &Atom, name: &Atom, arity: usize) -> bool {
        self.stack.iter().any(|visit| {
            matches!(visit, Visit::NamedType(m, n, a) if m == module && n == name && *a == arity)
        })
    }

    fn dispatch(&mut self, expr: &Ty) -> Ty {
        match expr {
            Ty::Variable(name) => self.expand_variable(name),
            Ty::Attribute(name) => self.expand_attribute(name),
            Ty::Map(fields, updated) => self.expand_map(fields, updated.as_deref()),
            Ty::Struct(fields, module, updated) => {
                self.expand_struct(fields, module.as_deref(), updated.as_deref())
            }
            Ty::Tuple(elements) => self.expand_tuple(elements),
            Ty::TupleNth(tuple, index) => self.expand_tuple_nth(tuple, *index),
            Ty::Union(variants) => self.expand_union(variants),
            Ty::Intersection(variants) => self.expand_intersection(variants),
            Ty::Call(target, fun, args) => self.expand_remote_call(target, fun, args),
            Ty::LocalCall(fun, args) => self.expand_local_call(fun, args),
            _ => Ty::Unknown,
        }
    }

    /// Variables resolve to their first observed record. Underscored names
    /// are deliberately ignored bindings; an unrecorded name is
    /// re-interpreted as a zero-argument local call (`foo` and `foo()` are
    /// the same source form).
    fn expand_variable(&mut self, name: &Atom) -> Ty {
        if name.is_underscored() {
            return Ty::None;
        }
        let env = self.env;
        match env.variables.iter().find(|variable| &variable.name == name) {
            Some(variable) => self.expand(&variable.ty),
            None => self.expand(&Ty::LocalCall(name.clone(), Vec::new())),
        }
    }

    fn expand_attribute(&mut self, name: &Atom) -> Ty {
        let env = self.env;
        match env
            .attributes
            .iter()
            .find(|attribute| &attribute.name == name)
        {
            Some(attribute) => self.expand(&attribute.ty),
            None => Ty::None,
        }
    }

    /// Literal fields stay unexpanded (they are expanded on access); only
    /// the update base is resolved here. A base that expands to something
    /// that is not map-shaped refutes the whole expression.
    fn expand_map(&mut self, fields: &Fields, updated: Option<&Ty>) -> Ty {
        let Some(updated) = updated else {
            return Ty::Map(fields.clone(), None);
        };
        match self.expand(updated) {
            Ty::Map(base, _) => Ty::Map(overlay(base, fields), None),
            Ty::Struct(base, module, _) => Ty::Struct(overlay(base, fields), module, None),
            Ty::Unknown => Ty::Map(fields.clone(), None),
            _ => Ty::None,
        }
    }

    fn expand_struct(
        &mut self,
        fields: &Fields,
        module: Option<&Ty>,
        updated: Option<&Ty>,
    ) -> Ty {
        // A struct that already carries its own tag is this expander's
        // output from an earlier round; it round-trips unchanged.
        if updated.is_none()
            && let Some(Ty::Atom(module_atom)) = module
            && fields
                .get(STRUCT_FIELD)
                .is_some_and(|tag| matches!(tag, Ty::Atom(tagged) if tagged == module_atom))
        {
            return Ty::Struct(
                fields.clone(),
                Some(Box::new(Ty::Atom(module_atom.clone()))),
                None,
            );
        }

        // The module slot admits a literal atom, an attribute reference, or
        // nothing; any other expression refutes the struct.
        let module_atom = match module {
            None => None,
            Some(Ty::Atom(atom)) => Some(atom.clone()),
            Some(attribute @ Ty::Attribute(_)) => match self.expand(attribute) {
                Ty::Atom(atom) => Some(atom),
                Ty::Unknown => None,
                _ => return Ty::None,
            },
            Some(_) => return Ty::None,
        };

        let base = match updated {
            None => Fields::new(),
            Some(updated) => match self.expand(updated) {
                Ty::Map(base, _) | Ty::Struct(base, _, _) => base,
                Ty::Unknown => Fields::new(),
                _ => return Ty::None,
            },
        };
        let merged = overlay(base, fields);

        let Some(module_atom) = module_atom else {
            return Ty::Struct(merged, None, None);
        };

        let declared = if self.env.structs.is_struct(&module_atom) {
            self.env.structs.fields(&module_atom)
        } else {
            None
        };
        let tag = Ty::Atom(module_atom);
        match declared {
            Some(declared_keys) => {
                // Project onto the declared field set: unknown keys drop,
                // unsupplied ones fill in as unknown, the tag is ours unless
                // the user supplied their own.
                let mut projected = Fields::new();
                projected.insert(Atom::from(STRUCT_FIELD), tag.clone());
                for key in declared_keys {
                    if key.as_str() == STRUCT_FIELD {
                        continue;
                    }
                    let value = merged.get(&key).cloned().unwrap_or(Ty::Unknown);
                    projected.insert(key, value);
                }
                if let Some(user_tag) = merged.get(STRUCT_FIELD) {
                    projected.insert(Atom::from(STRUCT_FIELD), user_tag.clone());
                }
                Ty::Struct(projected, Some(Box::new(tag)), None)
            }
            None => {
                let mut with_tag = Fields::new();
                with_tag.insert(Atom::from(STRUCT_FIELD), tag.clone());
                Ty::Struct(overlay(with_tag, &merged), Some(Box::new(tag)), None)
            }
        }
    }

    fn expand_tuple(&mut self, elements: &[Ty]) -> Ty {
        let mut expanded = Vec::with_capacity(elements.len());
        for element in elements {
            let element = self.expand(element);
            if element == Ty::None {
                return Ty::None;
            }
            expanded.push(element);
        }
        Ty::Tuple(expanded)
    }

    fn expand_tuple_nth(&mut self, tuple: &Ty, index: usize) -> Ty {
        match self.expand(tuple) {
            Ty::Tuple(elements) => elements.into_iter().nth(index).unwrap_or(Ty::None),
            Ty::Unknown => Ty::Unknown,
            _ => Ty::None,
        }
    }

    fn expand_union(&mut self, variants: &[Ty]) -> Ty {
        let expanded = variants
            .iter()
            .map(|variant| self.expand(variant))
            .collect();
        normalize_union(expanded)
    }

    fn expand_intersection(&mut self, variants: &[Ty]) -> Ty {
        let mut met = Ty::Unknown;
        for variant in variants {
            if met == Ty::None {
                return Ty::None;
            }
            let expanded = self.expand(variant);
            met = combine(met, expanded);
        }
        met
    }

    fn expand_remote_call(&mut self, target: &Ty, fun: &Atom, args: &[Ty]) -> Ty {
        // Arguments are expanded up front: one that proves impossible
        // refutes the whole call, literal or not.
        let args: Vec<Ty> = args.iter().map(|arg| self.expand(arg)).collect();
        if args.contains(&Ty::None) {
            return Ty::None;
        }
        let target = self.expand(target);
        match self.resolve_call(&target, fun, &args, false) {
            Lookup::Found(ty) => ty,
            Lookup::NoSpec | Lookup::Missing => Ty::Unknown,
        }
    }

    /// Unqualified calls scan the current module, then imports, then the
    /// built-in modules. Only the current module is probed with private
    /// access. A candidate that knows nothing (or only that a spec is
    /// missing in a way indistinguishable from ignorance) passes the turn;
    /// a definite answer (a type, a refutation, or an unspecced
    /// definition) ends the scan.
    fn expand_local_call(&mut self, fun: &Atom, args: &[Ty]) -> Ty {
        let args: Vec<Ty> = args.iter().map(|arg| self.expand(arg)).collect();
        if args.contains(&Ty::None) {
            return Ty::None;
        }
        let mut candidates: SmallVec<[Atom; 8]> = SmallVec::new();
        if let Some(current) = &self.env.current_module {
            candidates.push(current.clone());
        }
        candidates.extend(self.env.imports.iter().cloned());
        candidates.push(Atom::from(KERNEL));
        candidates.push(Atom::from(SPECIAL_FORMS));
        for candidate in candidates {
            let include_private = self.env.current_module.as_ref() == Some(&candidate);
            let target = Ty::Atom(candidate);
            match self.resolve_call(&target, fun, &args, include_private) {
                Lookup::Found(Ty::Unknown) | Lookup::Missing => {}
                Lookup::Found(ty) => return ty,
                Lookup::NoSpec => return Ty::Unknown,
            }
        }
        Ty::Unknown
    }

    /// The call resolver. Map-shaped targets only support zero-argument
    /// field access; atom targets resolve through built-ins, then declared
    /// metadata, then host introspection.
    pub(crate) fn resolve_call(
        &mut self,
        target: &Ty,
        fun: &Atom,
        args: &[Ty],
        include_private: bool,
    ) -> Lookup {
        match target {
            Ty::Unknown => Lookup::Found(Ty::Unknown),
            Ty::None => Lookup::Found(Ty::None),
            Ty::Map(fields, _) | Ty::Struct(fields, _, _) => {
                if args.is_empty() {
                    Lookup::Found(match fields.get(fun).cloned() {
                        Some(value) => self.expand(&value),
                        None => Ty::Unknown,
                    })
                } else {
                    Lookup::Found(Ty::None)
                }
            }
            Ty::Atom(module) => self.resolve_module_call(module, fun, args, include_private),
            _ => Lookup::Found(Ty::None),
        }
    }

    fn resolve_module_call(
        &mut self,
        module: &Atom,
        fun: &Atom,
        args: &[Ty],
        include_private: bool,
    ) -> Lookup {
        if module.as_str() == KERNEL && fun.as_str() == "elem" && args.len() == 2 {
            return Lookup::Found(self.kernel_elem(&args[0], &args[1]));
        }
        if module.as_str() == MAP_MODULE
            && let Ok(builtin) = MapBuiltin::from_str(fun.as_str())
            && builtin.accepts_arity(args.len())
        {
            return Lookup::Found(self.map_builtin(builtin, args));
        }
        if module.is_reserved_literal() || fun.is_reserved_literal() {
            return Lookup::Found(Ty::None);
        }
        // Declared metadata shadows the compiled module; a miss, or a spec
        // that refutes outright, falls through to introspection. The
        // refutation stands unless introspection produces something better.
        match self.metadata_call(module, fun, args.len(), include_private) {
            Lookup::Missing => self.introspection_call(module, fun, args.len(), include_private),
            Lookup::Found(Ty::None) => {
                match self.introspection_call(module, fun, args.len(), include_private) {
                    found @ Lookup::Found(_) => found,
                    Lookup::NoSpec | Lookup::Missing => Lookup::Found(Ty::None),
                }
            }
            resolved => resolved,
        }
    }
}
