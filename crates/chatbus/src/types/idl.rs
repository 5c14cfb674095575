// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Parser for the IDL subset used by topic type definitions.
//!
//! Supported: `//` and `/* */` comments, preprocessor lines (`#include`,
//! `#pragma`, ...), nested `module`s, `struct` declarations whose members are
//! primitives, `string`/`string<N>`, `sequence<T>`/`sequence<T, N>` or scoped
//! names. Annotations (`@key`, `@topic`, `@appendable`, ...) are skipped.
//! Anything else is a parse error.

use super::{FieldKind, MemberDescriptor, TypeDescriptor};
use std::fmt;

/// IDL parse failure with the 1-based line where it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdlError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for IdlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for IdlError {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Number(u32),
    Symbol(char),
    Scope,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "'{}'", s),
            Token::Number(n) => write!(f, "'{}'", n),
            Token::Symbol(c) => write!(f, "'{}'", c),
            Token::Scope => write!(f, "'::'"),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, IdlError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;
    let mut line = 1;
    let mut at_line_start = true;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                line += 1;
                at_line_start = true;
                i += 1;
                continue;
            }
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '#' if at_line_start => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let start_line = line;
                i += 2;
                loop {
                    match chars.get(i) {
                        None => {
                            return Err(IdlError {
                                line: start_line,
                                message: "unterminated comment".into(),
                            })
                        }
                        Some('*') if chars.get(i + 1) == Some(&'/') => {
                            i += 2;
                            break;
                        }
                        Some('\n') => {
                            line += 1;
                            i += 1;
                        }
                        Some(_) => i += 1,
                    }
                }
                continue;
            }
            _ => {}
        }

        at_line_start = false;

        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push((Token::Ident(chars[start..i].iter().collect()), line));
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let value = text.parse::<u32>().map_err(|_| IdlError {
                line,
                message: format!("number out of range: {}", text),
            })?;
            tokens.push((Token::Number(value), line));
        } else if c == ':' && chars.get(i + 1) == Some(&':') {
            tokens.push((Token::Scope, line));
            i += 2;
        } else if "{};<>,@()=\"".contains(c) {
            tokens.push((Token::Symbol(c), line));
            i += 1;
        } else {
            return Err(IdlError {
                line,
                message: format!("unexpected character '{}'", c),
            });
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    scope: Vec<String>,
    types: Vec<TypeDescriptor>,
}

impl Parser {
    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, line)| *line)
            .unwrap_or(1)
    }

    fn error(&self, message: impl Into<String>) -> IdlError {
        IdlError {
            line: self.line(),
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Result<Token, IdlError> {
        let token = self
            .tokens
            .get(self.pos)
            .map(|(t, _)| t.clone())
            .ok_or_else(|| self.error("unexpected end of input"))?;
        self.pos += 1;
        Ok(token)
    }

    fn expect_symbol(&mut self, symbol: char) -> Result<(), IdlError> {
        match self.next()? {
            Token::Symbol(c) if c == symbol => Ok(()),
            other => {
                self.pos -= 1;
                Err(self.error(format!("expected '{}', found {}", symbol, other)))
            }
        }
    }

    fn expect_ident(&mut self) -> Result<String, IdlError> {
        match self.next()? {
            Token::Ident(name) => Ok(name),
            other => {
                self.pos -= 1;
                Err(self.error(format!("expected identifier, found {}", other)))
            }
        }
    }

    fn eat_ident(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(name)) if name == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_symbol(&mut self, symbol: char) -> bool {
        if self.peek() == Some(&Token::Symbol(symbol)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// `@name` or `@name(...)`; arguments are skipped with paren balancing.
    fn skip_annotations(&mut self) -> Result<(), IdlError> {
        while self.eat_symbol('@') {
            self.expect_ident()?;
            if self.eat_symbol('(') {
                let mut depth = 1;
                while depth > 0 {
                    match self.next()? {
                        Token::Symbol('(') => depth += 1,
                        Token::Symbol(')') => depth -= 1,
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    fn parse_definitions(&mut self, until_close: bool) -> Result<(), IdlError> {
        loop {
            self.skip_annotations()?;
            match self.peek() {
                None if until_close => return Err(self.error("missing '}'")),
                None => return Ok(()),
                Some(Token::Symbol('}')) if until_close => return Ok(()),
                Some(Token::Ident(kw)) if kw == "module" => {
                    self.pos += 1;
                    self.parse_module()?;
                }
                Some(Token::Ident(kw)) if kw == "struct" => {
                    self.pos += 1;
                    self.parse_struct()?;
                }
                Some(other) => {
                    let message = format!("unsupported definition starting with {}", other);
                    return Err(self.error(message));
                }
            }
        }
    }

    fn parse_module(&mut self) -> Result<(), IdlError> {
        let name = self.expect_ident()?;
        self.expect_symbol('{')?;
        self.scope.push(name);
        self.parse_definitions(true)?;
        self.scope.pop();
        self.expect_symbol('}')?;
        self.expect_symbol(';')
    }

    fn parse_struct(&mut self) -> Result<(), IdlError> {
        let name = self.expect_ident()?;

        // Forward declaration.
        if self.eat_symbol(';') {
            return Ok(());
        }

        self.expect_symbol('{')?;
        let mut members = Vec::new();
        loop {
            self.skip_annotations()?;
            if self.eat_symbol('}') {
                break;
            }
            let kind = self.parse_type()?;
            loop {
                let member = self.expect_ident()?;
                if members.iter().any(|m: &MemberDescriptor| m.name == member) {
                    return Err(self.error(format!("duplicate member '{}'", member)));
                }
                members.push(MemberDescriptor::new(member, kind.clone()));
                if !self.eat_symbol(',') {
                    break;
                }
            }
            self.expect_symbol(';')?;
        }
        self.expect_symbol(';')?;

        let mut path = self.scope.clone();
        path.push(name);
        let type_name = path.join("::");
        if self.types.iter().any(|t| t.type_name == type_name) {
            return Err(self.error(format!("duplicate struct '{}'", type_name)));
        }
        self.types.push(TypeDescriptor::new(type_name, members));
        Ok(())
    }

    fn parse_bound(&mut self) -> Result<Option<u32>, IdlError> {
        if !self.eat_symbol('<') {
            return Ok(None);
        }
        let bound = match self.next()? {
            Token::Number(n) => n,
            other => return Err(self.error(format!("expected bound, found {}", other))),
        };
        self.expect_symbol('>')?;
        Ok(Some(bound))
    }

    fn parse_type(&mut self) -> Result<FieldKind, IdlError> {
        let first = match self.next()? {
            Token::Ident(name) => name,
            Token::Scope => {
                // Absolute scoped name.
                let mut name = self.expect_ident()?;
                while self.peek() == Some(&Token::Scope) {
                    self.pos += 1;
                    name.push_str("::");
                    name.push_str(&self.expect_ident()?);
                }
                return Ok(FieldKind::Named(name));
            }
            other => return Err(self.error(format!("expected type, found {}", other))),
        };

        let kind = match first.as_str() {
            "boolean" => FieldKind::Bool,
            "octet" | "uint8" | "int8" => FieldKind::Octet,
            "char" | "wchar" => FieldKind::Char,
            "short" | "int16" => FieldKind::Short,
            "long" if self.eat_ident("long") => FieldKind::LongLong,
            "long" | "int32" => FieldKind::Long,
            "int64" => FieldKind::LongLong,
            "uint16" => FieldKind::UShort,
            "uint32" => FieldKind::ULong,
            "uint64" => FieldKind::ULongLong,
            "unsigned" => {
                if self.eat_ident("short") {
                    FieldKind::UShort
                } else if self.eat_ident("long") {
                    if self.eat_ident("long") {
                        FieldKind::ULongLong
                    } else {
                        FieldKind::ULong
                    }
                } else {
                    return Err(self.error("expected 'short' or 'long' after 'unsigned'"));
                }
            }
            "float" => FieldKind::Float,
            "double" => FieldKind::Double,
            "string" | "wstring" => FieldKind::String {
                bound: self.parse_bound()?,
            },
            "sequence" => {
                self.expect_symbol('<')?;
                let element = self.parse_type()?;
                let bound = if self.eat_symbol(',') {
                    match self.next()? {
                        Token::Number(n) => Some(n),
                        other => {
                            return Err(self.error(format!("expected bound, found {}", other)))
                        }
                    }
                } else {
                    None
                };
                self.expect_symbol('>')?;
                FieldKind::Sequence {
                    element: Box::new(element),
                    bound,
                }
            }
            _ => {
                let mut name = first;
                while self.peek() == Some(&Token::Scope) {
                    self.pos += 1;
                    name.push_str("::");
                    name.push_str(&self.expect_ident()?);
                }
                FieldKind::Named(name)
            }
        };
        Ok(kind)
    }
}

/// Parse IDL source into the struct types it declares, in declaration order.
pub(super) fn parse(source: &str) -> Result<Vec<TypeDescriptor>, IdlError> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        pos: 0,
        scope: Vec::new(),
        types: Vec::new(),
    };
    parser.parse_definitions(false)?;
    Ok(parser.types)
}
