//! Type-description expressions
//!
//! A host describes a native type either with an atomic tag (`int32`) or
//! with the compound form `struct(e1, e2, ...)`. Expressions are plain data
//! so they can key the descriptor cache by structural equality.

use core::fmt;
use core::str::FromStr;

use crate::error::FfiError;

/// Unresolved type-description expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    Tag(String),
    Struct(Vec<TypeExpr>),
}

impl TypeExpr {
    #[inline]
    pub fn tag(tag: impl Into<String>) -> Self {
        Self::Tag(tag.into())
    }

    #[inline]
    pub fn structure(elements: impl IntoIterator<Item = TypeExpr>) -> Self {
        Self::Struct(elements.into_iter().collect())
    }

    fn resolution_error(text: &str) -> FfiError {
        FfiError::DescriptorResolution {
            expr: text.trim().to_string(),
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(tag) => f.write_str(tag),
            Self::Struct(elements) => {
                f.write_str("struct(")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl From<&str> for TypeExpr {
    /// Wraps the text as a single tag without parsing
    fn from(tag: &str) -> Self {
        Self::Tag(tag.to_string())
    }
}

impl FromStr for TypeExpr {
    type Err = FfiError;

    /// Parse `tag` or `struct(expr, ...)`; whitespace is insignificant
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser { src: text, pos: 0 };
        let expr = parser.expr().ok_or_else(|| Self::resolution_error(text))?;
        parser.skip_ws();
        if parser.pos != text.len() {
            return Err(Self::resolution_error(text));
        }
        Ok(expr)
    }
}

/// Recursive-descent parser over the textual form
struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn skip_ws(&mut self) {
        let rest = &self.src[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.src[self.pos..].starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Option<&'a str> {
        self.skip_ws();
        let rest = &self.src[self.pos..];
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if len == 0 {
            return None;
        }
        self.pos += len;
        Some(&rest[..len])
    }

    fn expr(&mut self) -> Option<TypeExpr> {
        let name = self.ident()?;
        if name != "struct" || !self.eat('(') {
            return Some(TypeExpr::Tag(name.to_string()));
        }

        let mut elements = Vec::new();
        if self.eat(')') {
            return Some(TypeExpr::Struct(elements));
        }
        loop {
            elements.push(self.expr()?);
            if self.eat(')') {
                return Some(TypeExpr::Struct(elements));
            }
            if !self.eat(',') {
                return None;
            }
        }
    }
}
