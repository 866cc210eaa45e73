//! Row addressing
//!
//! Fields of a repeatable section carry their position in their name:
//! `<prefix>-<index>-<name>`, e.g. `form-3-authority`. Everything that
//! needs the logical name or the row index goes through [`RowAddress`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier parse failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// No `<prefix>-<index>-<name>` split exists
    #[error("field name `{0}` is not of the form <prefix>-<index>-<name>")]
    Malformed(String),
    /// Parsed, but under another section
    #[error("field name `{raw}` belongs to section `{found}`, expected `{expected}`")]
    PrefixMismatch {
        /// Raw field name
        raw: String,
        /// Section prefix required
        expected: String,
        /// Section prefix parsed
        found: String,
    },
    /// Parsed, but for another row
    #[error("field name `{raw}` has row index {found}, expected {expected}")]
    IndexMismatch {
        /// Raw field name
        raw: String,
        /// Row index required
        expected: usize,
        /// Row index parsed
        found: usize,
    },
    /// No row can follow `index`
    #[error("section `{prefix}` has no row index after {index}")]
    IndexOverflow {
        /// Section prefix
        prefix: String,
        /// Highest row index
        index: usize,
    },
}

/// Structured `<prefix>-<index>-<name>` identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowAddress {
    /// Section prefix, may contain dashes
    pub prefix: String,
    /// Zero-based row index
    pub index: usize,
    /// Logical field name, may contain dashes
    pub name: String,
}

impl RowAddress {
    /// Address from its parts
    pub fn new(prefix: impl Into<String>, index: usize, name: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            index,
            name: name.into(),
        }
    }

    /// Parse a raw field name.
    ///
    /// The index is the first all-digit `-` separated segment that has both a
    /// non-empty prefix before it and a non-empty name after it, so prefixes
    /// and names may themselves contain dashes.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let segments: Vec<&str> = raw.split('-').collect();
        if segments.len() < 3 {
            return Err(AddressError::Malformed(raw.to_string()));
        }

        for pos in 1..segments.len() - 1 {
            let segment = segments[pos];
            if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            let prefix = segments[..pos].join("-");
            let name = segments[pos + 1..].join("-");
            if prefix.is_empty() || name.is_empty() {
                continue;
            }
            let index = segment
                .parse::<usize>()
                .map_err(|_| AddressError::Malformed(raw.to_string()))?;
            return Ok(Self { prefix, index, name });
        }

        Err(AddressError::Malformed(raw.to_string()))
    }

    /// Parse and check the address belongs to `prefix` at row `index`
    pub fn parse_in(raw: &str, prefix: &str, index: usize) -> Result<Self, AddressError> {
        let address = Self::parse(raw)?;
        if address.prefix != prefix {
            return Err(AddressError::PrefixMismatch {
                raw: raw.to_string(),
                expected: prefix.to_string(),
                found: address.prefix,
            });
        }
        if address.index != index {
            return Err(AddressError::IndexMismatch {
                raw: raw.to_string(),
                expected: index,
                found: address.index,
            });
        }
        Ok(address)
    }

    /// Same field, another row
    pub fn with_index(&self, index: usize) -> Self {
        Self {
            prefix: self.prefix.clone(),
            index,
            name: self.name.clone(),
        }
    }
}

impl fmt::Display for RowAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.prefix, self.index, self.name)
    }
}

impl FromStr for RowAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Logical name of a raw field name: the positional prefix stripped.
///
/// Names outside any repeatable section are already logical.
pub fn logical_name(raw: &str) -> &str {
    match RowAddress::parse(raw) {
        Ok(address) => {
            let offset = raw.len() - address.name.len();
            &raw[offset..]
        }
        Err(_) => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let address = RowAddress::parse("form-3-authority").unwrap();
        assert_eq!(address, RowAddress::new("form", 3, "authority"));
        assert_eq!(address.to_string(), "form-3-authority");
    }

    #[test]
    fn test_parse_dashed_parts() {
        let address = RowAddress::parse("assign-form-12-question__section").unwrap();
        assert_eq!(address.prefix, "assign-form");
        assert_eq!(address.index, 12);
        assert_eq!(address.name, "question__section");

        let address = RowAddress::parse("form-0-private-notes").unwrap();
        assert_eq!(address.name, "private-notes");
    }

    #[test]
    fn test_parse_rejects_unindexed() {
        assert!(matches!(
            RowAddress::parse("authority"),
            Err(AddressError::Malformed(_))
        ));
        assert!(RowAddress::parse("form-TOTAL_FORMS").is_err());
        assert!(RowAddress::parse("form-x-name").is_err());
        assert!(RowAddress::parse("-3-name").is_err());
        assert!(RowAddress::parse("form-3-").is_err());
    }

    #[test]
    fn test_parse_in_checks_row() {
        assert!(RowAddress::parse_in("form-2-user", "form", 2).is_ok());
        assert!(matches!(
            RowAddress::parse_in("form-2-user", "form", 1),
            Err(AddressError::IndexMismatch { expected: 1, found: 2, .. })
        ));
        assert!(matches!(
            RowAddress::parse_in("other-2-user", "form", 2),
            Err(AddressError::PrefixMismatch { .. })
        ));
    }

    #[test]
    fn test_logical_name() {
        assert_eq!(logical_name("form-0-value"), "value");
        assert_eq!(logical_name("form-10-private_notes"), "private_notes");
        assert_eq!(logical_name("question"), "question");
        assert_eq!(logical_name("csrfmiddlewaretoken"), "csrfmiddlewaretoken");
    }

    #[test]
    fn test_with_index() {
        let address = RowAddress::new("form", 4, "rt");
        assert_eq!(address.with_index(5).to_string(), "form-5-rt");
        assert_eq!(address.index, 4);
    }
}
