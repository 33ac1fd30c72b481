//! Search filter construction (RFC 4515) and the evaluator used by [`InMemoryDirectory`].
//!
//! [`InMemoryDirectory`]: crate::InMemoryDirectory

use crate::client::LdapEntry;
use crate::Result;
use adduser_core::Error;

/// Escapes a value for use inside a search filter.
#[must_use]
pub fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '*' => escaped.push_str("\\2a"),
            '(' => escaped.push_str("\\28"),
            ')' => escaped.push_str("\\29"),
            '\\' => escaped.push_str("\\5c"),
            '\0' => escaped.push_str("\\00"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Parsed search filter.
///
/// Only presence, equality and the boolean combinators are understood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `(&...)`
    And(Vec<Filter>),
    /// `(|...)`
    Or(Vec<Filter>),
    /// `(!...)`
    Not(Box<Filter>),
    /// `(attr=*)`
    Present(String),
    /// `(attr=value)`
    Equal(String, String),
}

impl Filter {
    /// Parses a filter string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DirectoryError`] for malformed or unsupported filters.
    pub fn parse(input: &str) -> Result<Self> {
        let mut parser = Parser {
            input: input.trim(),
            pos: 0,
        };
        let filter = parser.filter()?;
        if parser.pos != parser.input.len() {
            return Err(parser.error());
        }
        Ok(filter)
    }

    /// Evaluates the filter against an entry.
    ///
    /// Attribute names and values compare case-insensitively.
    #[must_use]
    pub fn matches(&self, entry: &LdapEntry) -> bool {
        match self {
            Self::And(filters) => filters.iter().all(|filter| filter.matches(entry)),
            Self::Or(filters) => filters.iter().any(|filter| filter.matches(entry)),
            Self::Not(filter) => !filter.matches(entry),
            Self::Present(attribute) => entry
                .values(attribute)
                .is_some_and(|values| !values.is_empty()),
            Self::Equal(attribute, expected) => entry.values(attribute).is_some_and(|values| {
                values
                    .iter()
                    .any(|value| value.trim().eq_ignore_ascii_case(expected))
            }),
        }
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self) -> Error {
        Error::directory(format!("bad search filter `{}`", self.input))
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn filter(&mut self) -> Result<Filter> {
        self.expect('(')?;
        let filter = match self.peek() {
            Some('&') => {
                self.pos += 1;
                Filter::And(self.list()?)
            }
            Some('|') => {
                self.pos += 1;
                Filter::Or(self.list()?)
            }
            Some('!') => {
                self.pos += 1;
                Filter::Not(Box::new(self.filter()?))
            }
            _ => self.item()?,
        };
        self.expect(')')?;
        Ok(filter)
    }

    fn list(&mut self) -> Result<Vec<Filter>> {
        let mut filters = Vec::new();
        while self.peek() == Some('(') {
            filters.push(self.filter()?);
        }
        Ok(filters)
    }

    fn item(&mut self) -> Result<Filter> {
        let rest = &self.input[self.pos..];
        let end = rest.find(')').ok_or_else(|| self.error())?;
        let (attribute, value) = rest[..end].split_once('=').ok_or_else(|| self.error())?;
        self.pos += end;

        if attribute.is_empty() || attribute.ends_with(['~', '<', '>', ':']) {
            return Err(self.error());
        }
        if value == "*" {
            return Ok(Filter::Present(attribute.to_string()));
        }
        if value.contains('*') {
            return Err(self.error());
        }
        let value = unescape_filter_value(value).ok_or_else(|| self.error())?;
        Ok(Filter::Equal(attribute.to_string(), value))
    }
}

fn unescape_filter_value(value: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(value.len());
    let mut rest = value.as_bytes();
    while let Some((&byte, tail)) = rest.split_first() {
        if byte == b'\\' {
            let hex = tail.get(..2)?;
            let hex = std::str::from_utf8(hex).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
            rest = &tail[2..];
        } else {
            bytes.push(byte);
            rest = tail;
        }
    }
    String::from_utf8(bytes).ok()
}
