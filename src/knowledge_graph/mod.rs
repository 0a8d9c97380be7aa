use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RdfObject {
    Iri(String),
    Literal(String),
}

impl RdfObject {
    pub fn as_str(&self) -> &str {
        match self {
            RdfObject::Iri(value) | RdfObject::Literal(value) => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RdfTriple {
    pub subject: String,
    pub predicate: String,
    pub object: RdfObject,
}

impl RdfTriple {
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: RdfObject) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object,
        }
    }
}

/// Triples accumulated by one conversion run, kept in emission order.
///
/// The graph only grows while rows are compiled; the serializer borrows it
/// immutably afterwards and the whole thing is dropped once the bytes exist.
#[derive(Debug, Default, Clone)]
pub struct KnowledgeGraph {
    triples: Vec<RdfTriple>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, triple: RdfTriple) {
        self.triples.push(triple);
    }

    pub fn add_iri(&mut self, subject: &str, predicate: &str, object: &str) {
        self.add(RdfTriple::new(subject, predicate, RdfObject::Iri(object.to_string())));
    }

    pub fn add_literal(&mut self, subject: &str, predicate: &str, literal: &str) {
        self.add(RdfTriple::new(subject, predicate, RdfObject::Literal(literal.to_string())));
    }

    pub fn triples(&self) -> &[RdfTriple] {
        &self.triples
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Subjects in order of first appearance, each with its triples in emission order.
    pub fn grouped_by_subject(&self) -> Vec<(&str, Vec<&RdfTriple>)> {
        let mut order: Vec<(&str, Vec<&RdfTriple>)> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();

        for triple in &self.triples {
            let slot = *index.entry(triple.subject.as_str()).or_insert_with(|| {
                order.push((triple.subject.as_str(), Vec::new()));
                order.len() - 1
            });
            order[slot].1.push(triple);
        }

        order
    }

    pub fn subjects_of_type(&self, rdf_type: &str, type_iri: &str) -> Vec<&str> {
        self.triples
            .iter()
            .filter(|t| t.predicate == rdf_type && t.object.as_str() == type_iri)
            .map(|t| t.subject.as_str())
            .collect()
    }

    pub fn objects(&self, subject: &str, predicate: &str) -> Vec<&RdfObject> {
        self.triples
            .iter()
            .filter(|t| t.subject == subject && t.predicate == predicate)
            .map(|t| &t.object)
            .collect()
    }

    pub fn get_statistics(&self) -> GraphStats {
        let mut unique_subjects = HashSet::new();
        let mut unique_predicates = HashSet::new();
        let mut unique_objects = HashSet::new();

        for triple in &self.triples {
            unique_subjects.insert(&triple.subject);
            unique_predicates.insert(&triple.predicate);
            unique_objects.insert(&triple.object);
        }

        GraphStats {
            total_triples: self.triples.len(),
            unique_subjects: unique_subjects.len(),
            unique_predicates: unique_predicates.len(),
            unique_objects: unique_objects.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_triples: usize,
    pub unique_subjects: usize,
    pub unique_predicates: usize,
    pub unique_objects: usize,
}

impl std::fmt::Display for GraphStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f,
            "Graph Statistics:\n\
             Total Triples: {}\n\
             Unique Subjects: {}\n\
             Unique Predicates: {}\n\
             Unique Objects: {}",
            self.total_triples,
            self.unique_subjects,
            self.unique_predicates,
            self.unique_objects
        )
    }
}
