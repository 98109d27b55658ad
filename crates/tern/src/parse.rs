//! Parser from stored spec text to quoted [`Ast`] trees.
//!
//! Metadata providers store specs in surface syntax (`name(params) :: result
//! when bindings`); this module turns that text back into the quoted form the
//! spec parser consumes. The grammar is the typespec subset the engine can
//! use: atoms, integers, aliases, local and remote type calls, `|` unions,
//! `::` annotations, `when` binding lists, tuples, maps, structs and lists.
//! Constructs outside the subset (ranges, binaries, fun types outside
//! parentheses) fail the parse; per the engine's error model the caller
//! degrades a failed parse to the unknown type rather than surfacing it.

use std::fmt;

use crate::{
    ast::{Ast, FORM_MAP, FORM_STRUCT, FORM_TUPLE, OP_ANNOTATION, OP_UNION, OP_WHEN},
    atom::Atom,
};

/// Maximum nesting depth for spec trees.
///
/// Stored specs are machine-extracted and shallow in practice; the cap only
/// exists so a pathological input cannot overflow the stack.
pub(crate) const MAX_NESTING_DEPTH: u16 = 100;

/// Error raised when spec text falls outside the supported grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A character with no role in the grammar.
    UnexpectedChar { found: char, offset: usize },
    /// A well-formed token in a position the grammar does not allow.
    UnexpectedToken { found: String, offset: usize },
    /// Input ended mid-construct.
    UnexpectedEnd,
    /// An integer literal outside the representable range.
    IntegerOverflow { offset: usize },
    /// Nesting beyond [`MAX_NESTING_DEPTH`].
    TooDeep,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedChar { found, offset } => {
                write!(f, "unexpected character {found:?} at offset {offset}")
            }
            Self::UnexpectedToken { found, offset } => {
                write!(f, "unexpected token `{found}` at offset {offset}")
            }
            Self::UnexpectedEnd => f.write_str("unexpected end of spec"),
            Self::IntegerOverflow { offset } => {
                write!(f, "integer literal out of range at offset {offset}")
            }
            Self::TooDeep => write!(f, "spec nested deeper than {MAX_NESTING_DEPTH} levels"),
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    AtomLit(String),
    Ident(String),
    AliasSegment(String),
    Integer(i64),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Percent,
    Comma,
    Dot,
    Pipe,
    Colon,
    ColonColon,
    FatArrow,
    Arrow,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::AtomLit(name) => format!(":{name}"),
            Self::Ident(name) | Self::AliasSegment(name) => name.clone(),
            Self::Integer(value) => value.to_string(),
            Self::LParen => "(".to_owned(),
            Self::RParen => ")".to_owned(),
            Self::LBrace => "{".to_owned(),
            Self::RBrace => "}".to_owned(),
            Self::LBracket => "[".to_owned(),
            Self::RBracket => "]".to_owned(),
            Self::Percent => "%".to_owned(),
            Self::Comma => ",".to_owned(),
            Self::Dot => ".".to_owned(),
            Self::Pipe => "|".to_owned(),
            Self::Colon => ":".to_owned(),
            Self::ColonColon => "::".to_owned(),
            Self::FatArrow => "=>".to_owned(),
            Self::Arrow => "->".to_owned(),
        }
    }
}

/// Parses one stored spec or type source into its quoted tree.
pub fn parse_spec(source: &str) -> Result<Ast, ParseError> {
    let tokens = lex(source)?;
    let mut parser = Parser {
        tokens,
        position: 0,
        depth: 0,
    };
    let ast = parser.parse_when()?;
    parser.expect_end()?;
    Ok(ast)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_lowercase() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn lex(source: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();
    while let Some(&(offset, c)) = chars.peek() {
        match c {
            _ if c.is_whitespace() => {
                chars.next();
            }
            '(' | ')' | '{' | '}' | '[' | ']' | '%' | ',' | '.' | '|' => {
                chars.next();
                tokens.push((
                    match c {
                        '(' => Token::LParen,
                        ')' => Token::RParen,
                        '{' => Token::LBrace,
                        '}' => Token::RBrace,
                        '[' => Token::LBracket,
                        ']' => Token::RBracket,
                        '%' => Token::Percent,
                        ',' => Token::Comma,
                        '.' => Token::Dot,
                        _ => Token::Pipe,
                    },
                    offset,
                ));
            }
            ':' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, ':')) => {
                        chars.next();
                        tokens.push((Token::ColonColon, offset));
                    }
                    Some(&(_, next)) if is_ident_start(next) || next.is_ascii_uppercase() => {
                        let name = lex_name(&mut chars);
                        tokens.push((Token::AtomLit(name), offset));
                    }
                    _ => tokens.push((Token::Colon, offset)),
                }
            }
            '=' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, '>')) => {
                        chars.next();
                        tokens.push((Token::FatArrow, offset));
                    }
                    _ => return Err(ParseError::UnexpectedChar { found: c, offset }),
                }
            }
            '-' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, '>')) => {
                        chars.next();
                        tokens.push((Token::Arrow, offset));
                    }
                    Some(&(_, next)) if next.is_ascii_digit() => {
                        let digits = lex_digits(&mut chars);
                        let value: i64 = format!("-{digits}")
                            .parse()
                            .map_err(|_| ParseError::IntegerOverflow { offset })?;
                        tokens.push((Token::Integer(value), offset));
                    }
                    _ => return Err(ParseError::UnexpectedChar { found: c, offset }),
                }
            }
            _ if c.is_ascii_digit() => {
                let digits = lex_digits(&mut chars);
                let value: i64 = digits
                    .parse()
                    .map_err(|_| ParseError::IntegerOverflow { offset })?;
                tokens.push((Token::Integer(value), offset));
            }
            _ if is_ident_start(c) => {
                let name = lex_name(&mut chars);
                tokens.push((Token::Ident(name), offset));
            }
            _ if c.is_ascii_uppercase() => {
                let name = lex_name(&mut chars);
                tokens.push((Token::AliasSegment(name), offset));
            }
            _ => return Err(ParseError::UnexpectedChar { found: c, offset }),
        }
    }
    Ok(tokens)
}

/// Lexes an identifier, alias segment, or atom body; `?`/`!` may close it.
fn lex_name(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>) -> String {
    let mut name = String::new();
    while let Some(&(_, c)) = chars.peek() {
        if is_ident_continue(c) {
            name.push(c);
            chars.next();
        } else if (c == '?' || c == '!') && !name.is_empty() {
            name.push(c);
            chars.next();
            break;
        } else {
            break;
        }
    }
    name
}

fn lex_digits(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>) -> String {
    let mut digits = String::new();
    while let Some(&(_, c)) = chars.peek() {
        if c.is_ascii_digit() || c == '_' {
            if c != '_' {
                digits.push(c);
            }
            chars.next();
        } else {
            break;
        }
    }
    digits
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    position: usize,
    depth: u16,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|(token, _)| token)
    }

    fn peek_second(&self) -> Option<&Token> {
        self.tokens.get(self.position + 1).map(|(token, _)| token)
    }

    fn next(&mut self) -> Result<(Token, usize), ParseError> {
        let entry = self
            .tokens
            .get(self.position)
            .cloned()
            .ok_or(ParseError::UnexpectedEnd)?;
        self.position += 1;
        Ok(entry)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ParseError> {
        let (token, offset) = self.next()?;
        if token == *expected {
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken {
                found: token.describe(),
                offset,
            })
        }
    }

    fn expect_end(&mut self) -> Result<(), ParseError> {
        match self.tokens.get(self.position) {
            None => Ok(()),
            Some((token, offset)) => Err(ParseError::UnexpectedToken {
                found: token.describe(),
                offset: *offset,
            }),
        }
    }

    /// `annotation ('when' binding, binding, ...)?`
    fn parse_when(&mut self) -> Result<Ast, ParseError> {
        let left = self.parse_annotation()?;
        if self.eat(&Token::Ident(OP_WHEN.to_owned())) {
            let bindings = self.parse_binding_list()?;
            return Ok(Ast::local(OP_WHEN, vec![left, Ast::List(bindings)]));
        }
        Ok(left)
    }

    /// `union ('::' annotation)?`, right associative.
    fn parse_annotation(&mut self) -> Result<Ast, ParseError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::TooDeep);
        }
        self.depth += 1;
        let result = self.parse_annotation_inner();
        self.depth -= 1;
        result
    }

    fn parse_annotation_inner(&mut self) -> Result<Ast, ParseError> {
        let left = self.parse_union()?;
        if self.eat(&Token::ColonColon) {
            let right = self.parse_annotation()?;
            return Ok(Ast::local(OP_ANNOTATION, vec![left, right]));
        }
        Ok(left)
    }

    /// `primary ('|' union)?`, right associative, mirroring quoted form.
    fn parse_union(&mut self) -> Result<Ast, ParseError> {
        let left = self.parse_primary()?;
        if self.eat(&Token::Pipe) {
            let right = self.parse_union()?;
            return Ok(Ast::local(OP_UNION, vec![left, right]));
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Ast, ParseError> {
        let (token, offset) = self.next()?;
        match token {
            Token::Integer(value) => Ok(Ast::Integer(value)),
            Token::AtomLit(name) => {
                let atom = Ast::Atom(Atom::from(name));
                self.parse_remote_suffix(atom)
            }
            Token::Ident(name) => {
                if self.eat(&Token::LParen) {
                    let args = self.parse_call_args()?;
                    Ok(Ast::Local(Atom::from(name), args))
                } else if matches!(name.as_str(), "true" | "false" | "nil") {
                    Ok(Ast::Atom(Atom::from(name)))
                } else {
                    Ok(Ast::Var(Atom::from(name)))
                }
            }
            Token::AliasSegment(first) => {
                let alias = self.parse_alias_chain(first)?;
                self.parse_remote_suffix(alias)
            }
            Token::LBrace => {
                let mut elements = Vec::new();
                if !self.eat(&Token::RBrace) {
                    loop {
                        elements.push(self.parse_annotation()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(&Token::RBrace)?;
                }
                if elements.len() == 2 {
                    let second = elements.pop().unwrap_or(Ast::List(Vec::new()));
                    let first = elements.pop().unwrap_or(Ast::List(Vec::new()));
                    Ok(Ast::Pair(Box::new(first), Box::new(second)))
                } else {
                    Ok(Ast::local(FORM_TUPLE, elements))
                }
            }
            Token::Percent => self.parse_map_or_struct(),
            Token::LBracket => {
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.parse_entry()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(&Token::RBracket)?;
                }
                Ok(Ast::List(items))
            }
            Token::LParen => self.parse_group(),
            other => Err(ParseError::UnexpectedToken {
                found: other.describe(),
                offset,
            }),
        }
    }

    /// Continues `Mod.Sub` alias chains after the first segment.
    fn parse_alias_chain(&mut self, first: String) -> Result<Ast, ParseError> {
        let mut joined = first;
        while self.peek() == Some(&Token::Dot)
            && matches!(self.peek_second(), Some(Token::AliasSegment(_)))
        {
            self.position += 1;
            let (token, _) = self.next()?;
            if let Token::AliasSegment(segment) = token {
                joined.push('.');
                joined.push_str(&segment);
            }
        }
        Ok(Ast::Alias(Atom::from(joined)))
    }

    /// Turns `target.name` / `target.name(args)` into a remote call.
    fn parse_remote_suffix(&mut self, target: Ast) -> Result<Ast, ParseError> {
        if self.peek() != Some(&Token::Dot) {
            return Ok(target);
        }
        match self.peek_second() {
            Some(Token::Ident(_)) => {}
            _ => return Ok(target),
        }
        self.position += 1;
        let (token, _) = self.next()?;
        let Token::Ident(fun) = token else {
            return Ok(target);
        };
        let args = if self.eat(&Token::LParen) {
            self.parse_call_args()?
        } else {
            Vec::new()
        };
        Ok(Ast::Remote(Box::new(target), Atom::from(fun), args))
    }

    fn parse_call_args(&mut self) -> Result<Vec<Ast>, ParseError> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_annotation()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Ok(args)
    }

    /// `%{entries}` or `%Alias{entries}` / `%:atom{entries}`.
    fn parse_map_or_struct(&mut self) -> Result<Ast, ParseError> {
        if self.eat(&Token::LBrace) {
            let entries = self.parse_map_entries()?;
            return Ok(Ast::local(FORM_MAP, entries));
        }
        let (token, offset) = self.next()?;
        let module = match token {
            Token::AliasSegment(first) => self.parse_alias_chain(first)?,
            Token::AtomLit(name) => Ast::Atom(Atom::from(name)),
            other => {
                return Err(ParseError::UnexpectedToken {
                    found: other.describe(),
                    offset,
                });
            }
        };
        self.expect(&Token::LBrace)?;
        let entries = self.parse_map_entries()?;
        Ok(Ast::local(
            FORM_STRUCT,
            vec![module, Ast::local(FORM_MAP, entries)],
        ))
    }

    fn parse_map_entries(&mut self) -> Result<Vec<Ast>, ParseError> {
        let mut entries = Vec::new();
        if self.eat(&Token::RBrace) {
            return Ok(entries);
        }
        loop {
            entries.push(self.parse_entry()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RBrace)?;
        Ok(entries)
    }

    /// One map or list entry: `key: type` keyword sugar or `left => right`.
    fn parse_entry(&mut self) -> Result<Ast, ParseError> {
        if let (Some(Token::Ident(_)), Some(Token::Colon)) = (self.peek(), self.peek_second()) {
            let (token, _) = self.next()?;
            self.position += 1;
            let Token::Ident(key) = token else {
                return Err(ParseError::UnexpectedEnd);
            };
            let value = self.parse_annotation()?;
            return Ok(Ast::Pair(
                Box::new(Ast::Atom(Atom::from(key))),
                Box::new(value),
            ));
        }
        let left = self.parse_annotation()?;
        if self.eat(&Token::FatArrow) {
            let right = self.parse_annotation()?;
            return Ok(Ast::Pair(Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    /// Parenthesized group, or a fun type `(args -> result)`.
    fn parse_group(&mut self) -> Result<Ast, ParseError> {
        let mut elements = Vec::new();
        let mut saw_arrow = self.eat(&Token::Arrow);
        if !saw_arrow {
            loop {
                elements.push(self.parse_annotation()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            saw_arrow = self.eat(&Token::Arrow);
        }
        if !saw_arrow {
            if elements.len() == 1 {
                self.expect(&Token::RParen)?;
                return Ok(elements.pop().unwrap_or(Ast::List(Vec::new())));
            }
            return Err(self.unexpected_here());
        }
        let result = self.parse_annotation()?;
        self.expect(&Token::RParen)?;
        Ok(Ast::local("->", vec![Ast::List(elements), result]))
    }

    fn unexpected_here(&self) -> ParseError {
        match self.tokens.get(self.position) {
            Some((token, offset)) => ParseError::UnexpectedToken {
                found: token.describe(),
                offset: *offset,
            },
            None => ParseError::UnexpectedEnd,
        }
    }

    /// `name: type, name: type, ...` after `when`.
    fn parse_binding_list(&mut self) -> Result<Vec<Ast>, ParseError> {
        let mut bindings = Vec::new();
        loop {
            let (token, offset) = self.next()?;
            let Token::Ident(name) = token else {
                return Err(ParseError::UnexpectedToken {
                    found: token.describe(),
                    offset,
                });
            };
            self.expect(&Token::Colon)?;
            let value = self.parse_annotation()?;
            bindings.push(Ast::Pair(
                Box::new(Ast::Atom(Atom::from(name))),
                Box::new(value),
            ));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(bindings)
    }
}
