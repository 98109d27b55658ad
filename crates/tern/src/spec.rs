//! Spec consumption: quoted trees to lattice values, and named-type
//! resolution.
//!
//! Two symmetric knowledge sources feed this module. Declared metadata
//! stores specs as text and is parsed on demand; host introspection hands
//! over already-quoted trees. Either way the tree is split into head,
//! result and bindings, parameters are substituted, and the result side is
//! lowered onto the lattice. User-declared metadata always shadows the
//! compiled module of the same name.

use crate::{
    ast::{
        Ast, FORM_MAP, FORM_STRUCT, FORM_TUPLE, OP_ANNOTATION, OP_UNION, OP_WHEN, split_spec,
    },
    atom::Atom,
    env::TypeKind,
    expand::{Expander, Lookup, MAX_EXPANSION_DEPTH, Visit},
    parse::parse_spec,
    ty::{Fields, Ty, normalize_union},
};

impl Expander<'_, '_> {
    /// Resolves a call through declared metadata: definition kind and
    /// visibility first, then arity against declared heads (tolerating
    /// default parameters), then the spec variants for the resolved arity.
    pub(crate) fn metadata_call(
        &mut self,
        module: &Atom,
        fun: &Atom,
        called: usize,
        include_private: bool,
    ) -> Lookup {
        let env = self.env;
        let Some(info) = env.mods_funs.get(&(module.clone(), fun.clone())) else {
            return Lookup::Missing;
        };
        if !include_private && !info.kind.is_public() {
            return Lookup::Missing;
        }
        let Some(arity) = info.resolve_arity(called) else {
            return Lookup::Missing;
        };
        let Some(spec_info) = env.specs.get(&(module.clone(), fun.clone(), arity)) else {
            return Lookup::NoSpec;
        };
        let variants: Vec<Ty> = spec_info
            .specs
            .iter()
            .map(|source| self.spec_source_result(module, source, include_private))
            .collect();
        let joined = normalize_union(variants);
        Lookup::Found(self.expand(&joined))
    }

    /// Resolves a call through the host's compiled modules. Docs carry the
    /// default counts needed for arity tolerance; without docs, only an
    /// exact exported arity is accepted.
    pub(crate) fn introspection_call(
        &mut self,
        module: &Atom,
        fun: &Atom,
        called: usize,
        include_private: bool,
    ) -> Lookup {
        let introspection = self.env.introspection;
        let arity = match introspection.docs(module) {
            Some(entries) => entries
                .iter()
                .find(|entry| &entry.fun == fun && entry.accepts(called))
                .map(|entry| entry.arity),
            None => introspection
                .function_exported(module, fun, called)
                .then_some(called),
        };
        let Some(arity) = arity else {
            return Lookup::Missing;
        };
        let Some(variants) = introspection.spec(module, fun, arity) else {
            return Lookup::NoSpec;
        };
        let parsed: Vec<Ty> = variants
            .iter()
            .map(|ast| self.spec_ast_result(module, ast, include_private))
            .collect();
        let joined = normalize_union(parsed);
        Lookup::Found(self.expand(&joined))
    }

    fn spec_source_result(&mut self, module: &Atom, source: &str, include_private: bool) -> Ty {
        let Ok(ast) = parse_spec(source) else {
            return Ty::Unknown;
        };
        self.spec_ast_result(module, &ast, include_private)
    }

    /// The result type of one quoted spec variant, `when` bindings applied.
    fn spec_ast_result(&mut self, module: &Atom, ast: &Ast, include_private: bool) -> Ty {
        let Some(parts) = split_spec(ast) else {
            return Ty::Unknown;
        };
        let result = parts.result.substitute(&parts.bindings);
        self.type_from_ast(module, &result, include_private)
    }

    /// Lowers a quoted type onto the lattice.
    ///
    /// `module` is the module the quotation came from: local type references
    /// resolve against it, and only against it does private access carry
    /// over. Constructs outside the recognized grammar lower to the unknown
    /// type: a spec can never make expansion fail, only fail to sharpen it.
    pub(crate) fn type_from_ast(
        &mut self,
        module: &Atom,
        ast: &Ast,
        include_private: bool,
    ) -> Ty {
        match ast {
            Ast::Atom(atom) => Ty::Atom(atom.clone()),
            // A bare alias is the module atom itself.
            Ast::Alias(alias) => Ty::Atom(alias.clone()),
            Ast::Integer(value) => Ty::Integer(*value),
            Ast::Pair(first, second) => Ty::Tuple(vec![
                self.type_from_ast(module, first, include_private),
                self.type_from_ast(module, second, include_private),
            ]),
            Ast::Local(name, args) => self.form_from_ast(module, name, args, include_private),
            // Private access never crosses a remote boundary.
            Ast::Remote(target, name, args) => match target.module_atom() {
                Some(remote) => self.expand_named_type(&remote, name, args, false),
                None => Ty::Unknown,
            },
            // A variable that survived substitution is a zero-argument
            // local type reference (`t` and `t()` quote differently but
            // name the same thing).
            Ast::Var(name) => self.expand_named_type(module, name, &[], include_private),
            Ast::List(_) => Ty::Unknown,
        }
    }

    fn form_from_ast(
        &mut self,
        module: &Atom,
        name: &Atom,
        args: &[Ast],
        include_private: bool,
    ) -> Ty {
        match (name.as_str(), args) {
            (OP_UNION, [left, right]) => {
                let mut members = vec![self.type_from_ast(module, left, include_private)];
                let mut rest = right;
                // Unions quote right-nested; flatten them into one level.
                loop {
                    match rest {
                        Ast::Local(op, pair) if op.as_str() == OP_UNION && pair.len() == 2 => {
                            members.push(self.type_from_ast(module, &pair[0], include_private));
                            rest = &pair[1];
                        }
                        last => {
                            members.push(self.type_from_ast(module, last, include_private));
                            break;
                        }
                    }
                }
                Ty::Union(members)
            }
            // `name :: type` annotations only label; the type stands.
            (OP_ANNOTATION, [_, annotated]) => {
                self.type_from_ast(module, annotated, include_private)
            }
            (FORM_MAP, entries) => {
                Ty::Map(self.fields_from_entries(module, entries, include_private), None)
            }
            (FORM_STRUCT, [module_ast, Ast::Local(map_form, entries)])
                if map_form.as_str() == FORM_MAP =>
            {
                match module_ast.module_atom() {
                    Some(struct_module) => Ty::Struct(
                        self.fields_from_entries(module, entries, include_private),
                        Some(Box::new(Ty::Atom(struct_module))),
                        None,
                    ),
                    None => Ty::Unknown,
                }
            }
            (FORM_TUPLE, elements) => Ty::Tuple(
                elements
                    .iter()
                    .map(|element| self.type_from_ast(module, element, include_private))
                    .collect(),
            ),
            ("no_return" | "none", _) => Ty::None,
            ("map", []) => Ty::Map(Fields::new(), None),
            (OP_WHEN | "->", _) => Ty::Unknown,
            _ => self.expand_named_type(module, name, args, include_private),
        }
    }

    /// Keeps the atom-keyed entries of a map or struct quotation, stripping
    /// `optional`/`required` wrappers.
    fn fields_from_entries(
        &mut self,
        module: &Atom,
        entries: &[Ast],
        include_private: bool,
    ) -> Fields {
        let mut fields = Fields::new();
        for entry in entries {
            let Ast::Pair(key, value) = entry else {
                continue;
            };
            let Some(key) = field_key(key) else {
                continue;
            };
            let value = self.type_from_ast(module, value, include_private);
            fields.insert(key, value);
        }
        fields
    }

    /// Resolves a named user type, metadata first, introspection second.
    ///
    /// A private or opaque metadata entry seen without private access is
    /// final: it shadows any compiled type of the same name, it just has
    /// nothing to show. The visitation stack keys named types by
    /// `(module, name, arity)` so recursive definitions settle at unknown.
    pub(crate) fn expand_named_type(
        &mut self,
        module: &Atom,
        name: &Atom,
        args: &[Ast],
        include_private: bool,
    ) -> Ty {
        let arity = args.len();
        if self.stack.len() >= MAX_EXPANSION_DEPTH || self.visited_type(module, name, arity) {
            return Ty::Unknown;
        }
        self.stack
            .push(Visit::NamedType(module.clone(), name.clone(), arity));
        let resolved = self.named_type_inner(module, name, args, include_private);
        self.stack.pop();
        resolved
    }

    fn named_type_inner(
        &mut self,
        module: &Atom,
        name: &Atom,
        args: &[Ast],
        include_private: bool,
    ) -> Ty {
        let env = self.env;
        if let Some(info) = env.types.get(&(module.clone(), name.clone(), args.len())) {
            if info.kind != TypeKind::Type && !include_private {
                return Ty::Unknown;
            }
            let Ok(definition) = parse_spec(&info.spec) else {
                return Ty::Unknown;
            };
            return self.apply_type_definition(module, &definition, args, include_private);
        }
        let Some((kind, definition)) = env.introspection.type_spec(module, name, args.len())
        else {
            return Ty::Unknown;
        };
        if kind != TypeKind::Type && !include_private {
            return Ty::Unknown;
        }
        self.apply_type_definition(module, &definition, args, include_private)
    }

    /// Binds use-site arguments over the definition head's parameters and
    /// lowers the body.
    fn apply_type_definition(
        &mut self,
        module: &Atom,
        definition: &Ast,
        args: &[Ast],
        include_private: bool,
    ) -> Ty {
        let Some(parts) = split_spec(definition) else {
            return Ty::Unknown;
        };
        let mut bindings = parts.bindings;
        for (param, argument) in parts.params.iter().zip(args) {
            bindings.insert(param.clone(), argument.clone());
        }
        let body = parts.result.substitute(&bindings);
        self.type_from_ast(module, &body, include_private)
    }
}

fn field_key(key: &Ast) -> Option<Atom> {
    match key {
        Ast::Atom(atom) => Some(atom.clone()),
        Ast::Local(wrapper, args)
            if matches!(wrapper.as_str(), "optional" | "required") && args.len() == 1 =>
        {
            field_key(&args[0])
        }
        _ => None,
    }
}
