//! IRI minting for entities and appellations.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use uuid::Uuid;

use crate::core::error::{ConversionError, ConversionResult};

/// Everything except unreserved characters and `/` is escaped.
pub const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// Column names become a single IRI segment, so `/` is escaped as well.
pub const NAME_SEGMENT: &AsciiSet = &PATH_SEGMENT.add(b'/');

/// Source of fresh identifiers for rows without an id column and for appellations.
pub trait IdSource {
    fn next_id(&mut self) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UuidSource;

impl IdSource for UuidSource {
    fn next_id(&mut self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic ids (`id-1`, `id-2`, ...), for tests and reproducible output.
#[derive(Debug, Clone)]
pub struct SequentialIds {
    prefix: String,
    next: u64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), next: 1 }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new("id-")
    }
}

impl IdSource for SequentialIds {
    fn next_id(&mut self) -> String {
        let id = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

/// `"Object Type"` -> `"objectType"`. Empty (or all-whitespace) names are rejected.
pub fn camel_case(name: &str) -> ConversionResult<String> {
    let joined: String = name
        .split_whitespace()
        .map(capitalize)
        .collect();

    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => Ok(first.to_lowercase().chain(chars).collect()),
        None => Err(ConversionError::InvalidColumnName(name.to_string())),
    }
}

fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

pub fn percent_encode_segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

/// Camel-cased and escaped for use as one IRI path segment.
pub fn name_segment(name: &str) -> ConversionResult<String> {
    Ok(utf8_percent_encode(&camel_case(name)?, NAME_SEGMENT).to_string())
}

/// Mints IRIs under one namespace for one label column.
#[derive(Debug, Clone)]
pub struct IriMinter {
    base: String,
}

impl IriMinter {
    pub fn new(namespace: &str, label_column: &str) -> ConversionResult<Self> {
        Ok(Self {
            base: format!("{}{}", namespace, name_segment(label_column)?),
        })
    }

    /// `NS + camel(label) + "/" + row id`, or a fresh id when the row has none.
    pub fn entity(&self, row_id: Option<&str>, ids: &mut dyn IdSource) -> String {
        let id = match row_id {
            Some(value) => percent_encode_segment(value),
            None => ids.next_id(),
        };
        format!("{}/{}", self.base, id)
    }

    /// `NS + camel(label) + "/" + camel(column) + "/" + fresh id`.
    pub fn appellation(&self, column: &str, ids: &mut dyn IdSource) -> ConversionResult<String> {
        Ok(format!("{}/{}/{}", self.base, name_segment(column)?, ids.next_id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("Term").unwrap(), "term");
        assert_eq!(camel_case("Object Type").unwrap(), "objectType");
        assert_eq!(camel_case("  museum   NUMBER ").unwrap(), "museumNumber");
        assert_eq!(camel_case("ID").unwrap(), "id");
    }

    #[test]
    fn test_camel_case_rejects_empty() {
        assert!(matches!(camel_case(""), Err(ConversionError::InvalidColumnName(_))));
        assert!(matches!(camel_case("   "), Err(ConversionError::InvalidColumnName(_))));
    }

    #[test]
    fn test_entity_iri() {
        let minter = IriMinter::new("http://example.org/", "Term").unwrap();
        let mut ids = SequentialIds::default();

        assert_eq!(minter.entity(Some("1"), &mut ids), "http://example.org/term/1");
        assert_eq!(minter.entity(None, &mut ids), "http://example.org/term/id-1");
        assert_eq!(
            minter.entity(Some("A 12/b"), &mut ids),
            "http://example.org/term/A%2012/b"
        );
    }

    #[test]
    fn test_appellation_iri() {
        let minter = IriMinter::new("http://example.org/", "Preferred Term").unwrap();
        let mut ids = SequentialIds::new("x");

        assert_eq!(
            minter.appellation("Object Category", &mut ids).unwrap(),
            "http://example.org/preferredTerm/objectCategory/x1"
        );
    }

    #[test]
    fn test_column_names_are_escaped() {
        let minter = IriMinter::new("http://example.org/", "Name <short>").unwrap();
        let mut ids = SequentialIds::new("x");

        assert_eq!(
            minter.entity(Some("1"), &mut ids),
            "http://example.org/name%3Cshort%3E/1"
        );
        assert_eq!(
            minter.appellation("Height {cm}|w/h", &mut ids).unwrap(),
            "http://example.org/name%3Cshort%3E/height%7Bcm%7D%7Cw%2Fh/x1"
        );
    }

    #[test]
    fn test_uuid_source_is_unique() {
        let mut ids = UuidSource;
        assert_ne!(ids.next_id(), ids.next_id());
    }
}
