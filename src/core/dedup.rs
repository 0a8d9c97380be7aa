use std::collections::HashMap;

/// Per-run mapping of (column, raw value) to the appellation IRI minted for it.
///
/// A cache lives exactly as long as one conversion; it is created by the
/// converter and threaded through the compiler, never stored on the converter.
#[derive(Debug, Default)]
pub struct DistinctValueCache {
    columns: HashMap<String, HashMap<String, String>>,
    hits: usize,
}

impl DistinctValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&mut self, column: &str, value: &str) -> Option<&str> {
        let found = self
            .columns
            .get(column)
            .and_then(|values| values.get(value))
            .map(String::as_str);
        if found.is_some() {
            self.hits += 1;
        }
        found
    }

    pub fn insert(&mut self, column: &str, value: &str, iri: String) {
        self.columns
            .entry(column.to_string())
            .or_default()
            .insert(value.to_string(), iri);
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Number of distinct (column, value) pairs seen.
    pub fn len(&self) -> usize {
        self.columns.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
