//! Distinguished names (RFC 4514) for account entries.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use adduser_core::Error as CoreError;

/// Errors that can occur when parsing a distinguished name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DistinguishedNameError {
    /// The distinguished name was empty.
    #[error("distinguished name cannot be empty")]
    Empty,
    /// A component had no `=` or an empty side.
    #[error("invalid distinguished name component: {0}")]
    InvalidComponent(String),
    /// A component used `+` to combine several attribute/value pairs.
    #[error("multi-valued RDN not supported: {0}")]
    MultiValued(String),
    /// An escape sequence was cut short or did not decode to UTF-8.
    #[error("invalid escape sequence in {0}")]
    InvalidEscape(String),
}

impl From<DistinguishedNameError> for CoreError {
    fn from(err: DistinguishedNameError) -> Self {
        CoreError::ConfigError(err.to_string())
    }
}

/// Single attribute/value pair of a distinguished name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativeDistinguishedName {
    attribute: String,
    value: String,
}

impl RelativeDistinguishedName {
    /// Create a new relative distinguished name.
    #[must_use]
    pub fn new(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Attribute portion (e.g. `uid`).
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Unescaped value portion.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    fn same_as(&self, other: &Self) -> bool {
        self.attribute.eq_ignore_ascii_case(&other.attribute)
            && self.value.eq_ignore_ascii_case(&other.value)
    }
}

impl fmt::Display for RelativeDistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.attribute, escape_value(&self.value))
    }
}

/// Parsed distinguished name, most specific component first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinguishedName {
    raw: String,
    rdns: Vec<RelativeDistinguishedName>,
}

impl DistinguishedName {
    /// Parses a distinguished name.
    ///
    /// # Errors
    ///
    /// Returns [`DistinguishedNameError`] for empty input, components without an
    /// attribute/value pair, multi-valued RDNs and broken escapes.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, DistinguishedNameError> {
        let input = trim_unescaped(input.as_ref());
        if input.is_empty() {
            return Err(DistinguishedNameError::Empty);
        }

        let rdns = split_unescaped(input, ',')
            .into_iter()
            .map(parse_component)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_rdns(rdns))
    }

    fn from_rdns(rdns: Vec<RelativeDistinguishedName>) -> Self {
        let raw = rdns
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        Self { raw, rdns }
    }

    /// Borrows the canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Components in order, leftmost first.
    #[must_use]
    pub fn rdns(&self) -> &[RelativeDistinguishedName] {
        &self.rdns
    }

    /// The leftmost component.
    #[must_use]
    pub fn rdn(&self) -> Option<&RelativeDistinguishedName> {
        self.rdns.first()
    }

    /// Name of a direct child entry under this one.
    #[must_use]
    pub fn child(&self, rdn: RelativeDistinguishedName) -> Self {
        let mut rdns = Vec::with_capacity(self.rdns.len() + 1);
        rdns.push(rdn);
        rdns.extend(self.rdns.iter().cloned());
        Self::from_rdns(rdns)
    }

    /// Returns true if `self` equals `base` or lies below it.
    ///
    /// Attribute names and values compare case-insensitively.
    #[must_use]
    pub fn is_within(&self, base: &DistinguishedName) -> bool {
        let Some(offset) = self.rdns.len().checked_sub(base.rdns.len()) else {
            return false;
        };
        self.rdns[offset..]
            .iter()
            .zip(&base.rdns)
            .all(|(ours, theirs)| ours.same_as(theirs))
    }

    /// Number of components.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.rdns.len()
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for DistinguishedName {
    type Err = DistinguishedNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Splits on `delimiter` wherever it is not preceded by a backslash. Escapes are kept.
fn split_unescaped(input: &str, delimiter: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;

    for (idx, ch) in input.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == delimiter {
            parts.push(&input[start..idx]);
            start = idx + ch.len_utf8();
        }
    }
    parts.push(&input[start..]);
    parts
}

fn parse_component(component: &str) -> Result<RelativeDistinguishedName, DistinguishedNameError> {
    let component = trim_unescaped(component);
    if split_unescaped(component, '+').len() > 1 {
        return Err(DistinguishedNameError::MultiValued(component.to_string()));
    }

    let (attribute, value) = split_unescaped(component, '=')
        .split_first()
        .filter(|(_, rest)| !rest.is_empty())
        .map(|(attribute, _)| {
            let value = &component[attribute.len() + 1..];
            (attribute.trim(), trim_unescaped(value))
        })
        .ok_or_else(|| DistinguishedNameError::InvalidComponent(component.to_string()))?;

    if attribute.is_empty() || value.is_empty() {
        return Err(DistinguishedNameError::InvalidComponent(
            component.to_string(),
        ));
    }

    Ok(RelativeDistinguishedName::new(
        attribute,
        unescape_value(value)?,
    ))
}

// Trailing whitespace survives when it is escaped.
fn trim_unescaped(input: &str) -> &str {
    let start = input.trim_start();
    let trimmed = start.trim_end();
    let backslashes = trimmed.chars().rev().take_while(|&ch| ch == '\\').count();
    if trimmed.len() == start.len() || backslashes % 2 == 0 {
        return trimmed;
    }
    let escaped = start[trimmed.len()..]
        .chars()
        .next()
        .map_or(0, char::len_utf8);
    &start[..trimmed.len() + escaped]
}

fn unescape_value(value: &str) -> Result<String, DistinguishedNameError> {
    let invalid = || DistinguishedNameError::InvalidEscape(value.to_string());
    let mut bytes = Vec::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            continue;
        }

        let next = chars.next().ok_or_else(invalid)?;
        match (next.to_digit(16), chars.peek().and_then(|c| c.to_digit(16))) {
            (Some(high), Some(low)) => {
                chars.next();
                // Two hex digits always fit in a byte.
                bytes.push(u8::try_from(high * 16 + low).map_err(|_| invalid())?);
            }
            _ => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(next.encode_utf8(&mut buf).as_bytes());
            }
        }
    }

    String::from_utf8(bytes).map_err(|_| invalid())
}

/// Escapes an attribute value for use inside a DN string.
#[must_use]
pub fn escape_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut escaped = String::with_capacity(value.len());

    for (idx, ch) in value.chars().enumerate() {
        match ch {
            '\0' => escaped.push_str("\\00"),
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            ' ' | '#' if idx == 0 => {
                escaped.push('\\');
                escaped.push(ch);
            }
            ' ' if idx == last => escaped.push_str("\\ "),
            _ => escaped.push(ch),
        }
    }

    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_base_dn() {
        let dn = DistinguishedName::parse("ou=People, dc=example,dc=com").unwrap();
        assert_eq!(dn.depth(), 3);
        assert_eq!(dn.rdn().unwrap().attribute(), "ou");
        assert_eq!(dn.as_str(), "ou=People,dc=example,dc=com");
    }

    #[test]
    fn decodes_escapes() {
        let dn = DistinguishedName::parse(r"cn=Smith\, John,dc=example").unwrap();
        assert_eq!(dn.rdn().unwrap().value(), "Smith, John");
        assert_eq!(dn.to_string(), r"cn=Smith\, John,dc=example");

        let hex = DistinguishedName::parse(r"cn=Smith\2C John,dc=example").unwrap();
        assert_eq!(hex.rdn().unwrap().value(), "Smith, John");
    }

    #[test]
    fn rejects_malformed_names() {
        assert_eq!(
            DistinguishedName::parse("  ").unwrap_err(),
            DistinguishedNameError::Empty
        );
        assert!(matches!(
            DistinguishedName::parse("cn=John,").unwrap_err(),
            DistinguishedNameError::InvalidComponent(_)
        ));
        assert!(matches!(
            DistinguishedName::parse("People,dc=example").unwrap_err(),
            DistinguishedNameError::InvalidComponent(_)
        ));
        assert!(matches!(
            DistinguishedName::parse("cn=a+uid=b,dc=example").unwrap_err(),
            DistinguishedNameError::MultiValued(_)
        ));
        assert!(matches!(
            DistinguishedName::parse(r"cn=broken\").unwrap_err(),
            DistinguishedNameError::InvalidEscape(_)
        ));
    }

    #[test]
    fn child_prefixes_and_escapes() {
        let base = DistinguishedName::parse("ou=People,dc=example,dc=com").unwrap();
        let user = base.child(RelativeDistinguishedName::new("uid", "test_user"));
        assert_eq!(user.as_str(), "uid=test_user,ou=People,dc=example,dc=com");

        let odd = base.child(RelativeDistinguishedName::new("cn", " Doe, J"));
        assert_eq!(odd.as_str(), r"cn=\ Doe\, J,ou=People,dc=example,dc=com");
        assert_eq!(DistinguishedName::parse(odd.as_str()).unwrap(), odd);

        let trailing = base.child(RelativeDistinguishedName::new("cn", "Doe "));
        let reparsed = DistinguishedName::parse(trailing.as_str()).unwrap();
        assert_eq!(reparsed.rdn().unwrap().value(), "Doe ");
    }

    #[test]
    fn escaped_trailing_whitespace_of_any_width() {
        let dn = DistinguishedName::parse("ou=People\\\u{3000},dc=example,dc=com").unwrap();
        assert_eq!(dn.depth(), 3);
        assert_eq!(dn.rdn().unwrap().value(), "People\u{3000}");

        let tab = DistinguishedName::parse("cn=Doe\\\t ,dc=example").unwrap();
        assert_eq!(tab.rdn().unwrap().value(), "Doe\t");
    }

    #[test]
    fn escaped_backslash_does_not_keep_whitespace() {
        let dn = DistinguishedName::parse("cn=Doe\\\\ ,dc=example").unwrap();
        assert_eq!(dn.rdn().unwrap().value(), "Doe\\");
    }

    #[test]
    fn within_base() {
        let base = DistinguishedName::parse("ou=People,dc=example,dc=com").unwrap();
        let user = DistinguishedName::parse("uid=jdoe,OU=people,dc=example,dc=com").unwrap();
        let other = DistinguishedName::parse("uid=jdoe,ou=Groups,dc=example,dc=com").unwrap();

        assert!(user.is_within(&base));
        assert!(base.is_within(&base));
        assert!(!other.is_within(&base));
        assert!(!base.is_within(&user));
    }
}
