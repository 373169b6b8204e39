//! Case-insensitive identifiers.

use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// A database object name.
///
/// Identifiers compare, hash and order without regard to ASCII case, so
/// `"Users"` and `"users"` denote the same table. The original spelling is
/// kept for rendering.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ident(Cow<'static, str>);

impl Ident {
    /// Creates an identifier from a static string, usable in `const` items.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Creates an identifier from any string.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Returns the identifier as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the lowercase form used for keyed lookups.
    #[must_use]
    pub fn normalized(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    /// Returns true if both spellings are byte-identical.
    #[must_use]
    pub fn same_spelling(&self, other: &Self) -> bool {
        self.0 == other.0
    }

    /// Renders the identifier double-quoted, escaping embedded quotes.
    #[must_use]
    pub fn quoted(&self) -> String {
        quote(self.as_str())
    }
}

/// Double-quotes a raw identifier.
#[must_use]
pub fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl PartialEq for Ident {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Ident {}

impl Hash for Ident {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.0.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
        state.write_u8(0xff);
    }
}

impl PartialOrd for Ident {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ident {
    fn cmp(&self, other: &Self) -> Ordering {
        let left = self.0.bytes().map(|b| b.to_ascii_lowercase());
        let right = other.0.bytes().map(|b| b.to_ascii_lowercase());
        left.cmp(right)
    }
}

impl fmt::Debug for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Ident {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Ident {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl From<&String> for Ident {
    fn from(name: &String) -> Self {
        Self::new(name.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_ident_case_insensitive_eq() {
        assert_eq!(Ident::from("Users"), Ident::from("users"));
        assert_ne!(Ident::from("users"), Ident::from("user"));
    }

    #[test]
    fn test_ident_hash_matches_eq() {
        let mut set = HashSet::new();
        set.insert(Ident::from("Orders"));
        assert!(set.contains(&Ident::from("ORDERS")));
    }

    #[test]
    fn test_ident_keeps_spelling() {
        let ident = Ident::from("CamelCase");
        assert_eq!(ident.to_string(), "CamelCase");
        assert!(!ident.same_spelling(&Ident::from("camelcase")));
    }

    #[test]
    fn test_ident_quoting() {
        assert_eq!(Ident::from("order").quoted(), "\"order\"");
        assert_eq!(quote("we\"ird"), "\"we\"\"ird\"");
    }
}
