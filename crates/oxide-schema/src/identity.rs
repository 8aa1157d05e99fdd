//! Quoted SQL identifiers.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A SQL name in raw and quoted form.
///
/// Equality, ordering and hashing only consider the raw name
/// (case-sensitive). The quoted form is always double-quoted with embedded
/// quotes doubled, so any name is safe to splice into SQL.
#[derive(Debug, Clone)]
pub struct Identity {
    raw: String,
    quoted: String,
}

impl Identity {
    /// Creates an identity for `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let raw = name.into();
        let quoted = quote(&raw);
        Self { raw, quoted }
    }

    /// The name as declared.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The name as it appears in SQL.
    #[must_use]
    pub fn quoted(&self) -> &str {
        &self.quoted
    }
}

pub(crate) fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl PartialOrd for Identity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Identity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.quoted)
    }
}

impl From<&str> for Identity {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Identity {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_quoted_form() {
        let id = Identity::new("ArtistName");
        assert_eq!(id.raw(), "ArtistName");
        assert_eq!(id.quoted(), "\"ArtistName\"");
        assert_eq!(id.to_string(), "\"ArtistName\"");
    }

    #[test]
    fn test_embedded_quotes_are_doubled() {
        assert_eq!(Identity::new("my \"col\"").quoted(), "\"my \"\"col\"\"\"");
    }

    #[test]
    fn test_equality_is_case_sensitive() {
        assert_eq!(Identity::new("_id"), Identity::from("_id"));
        assert_ne!(Identity::new("Name"), Identity::new("name"));
    }

    #[test]
    fn test_hash_follows_raw_name() {
        let set: HashSet<Identity> = ["a", "b", "a"].into_iter().map(Identity::from).collect();
        assert_eq!(set.len(), 2);
    }
}
