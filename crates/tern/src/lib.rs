#![doc = include_str!("../../../README.md")]

mod ast;
mod atom;
mod builtins;
mod combine;
mod env;
mod expand;
mod parse;
mod providers;
mod spec;
mod ty;

pub use crate::{
    ast::Ast,
    atom::Atom,
    combine::combine,
    env::{
        AttributeInfo, Env, FunArity, FunKind, ModFunInfo, SpecInfo, TypeInfo, TypeKind, VarInfo,
    },
    expand::expand,
    parse::{ParseError, parse_spec},
    providers::{DocEntry, Introspection, NoIntrospection, NoStructs, StructRegistry},
    ty::{Fields, Ty},
};
