use rio_api::formatter::TriplesFormatter;
use rio_api::model::{Literal, NamedNode, Term, Triple};
use rio_turtle::TurtleFormatter;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::core::error::{ConversionError, ConversionResult};
use crate::knowledge_graph::{KnowledgeGraph, RdfObject, RdfTriple};

/// Writes a graph as Turtle.
///
/// Triples are grouped by subject in order of first appearance and, within a
/// subject, kept in emission order. `rio_turtle` then collapses consecutive
/// predicates and objects with `;` and `,`. The same graph always yields the
/// same bytes, whether they go to a buffer or a file.
pub struct RdfSerializer;

impl RdfSerializer {
    pub fn new() -> Self {
        Self
    }

    pub fn serialize_to_bytes(&self, graph: &KnowledgeGraph) -> ConversionResult<Vec<u8>> {
        let mut formatter = TurtleFormatter::new(Vec::new());

        for (_, triples) in graph.grouped_by_subject() {
            for triple in triples {
                formatter
                    .format(&to_rio(triple))
                    .map_err(|e| ConversionError::Serialization(e.to_string()))?;
            }
        }

        let output = formatter
            .finish()
            .map_err(|e| ConversionError::Serialization(e.to_string()))?;
        debug!("Serialized {} triples into {} bytes of Turtle", graph.len(), output.len());
        Ok(output)
    }

    /// Creates parent directories, then replaces `path` in a single rename so a
    /// failed run never leaves a truncated file behind.
    pub fn serialize_to_file(&self, graph: &KnowledgeGraph, path: &Path) -> ConversionResult<Vec<u8>> {
        let bytes = self.serialize_to_bytes(graph)?;
        write_atomically(path, &bytes)?;
        Ok(bytes)
    }
}

impl Default for RdfSerializer {
    fn default() -> Self {
        Self::new()
    }
}

fn to_rio(triple: &RdfTriple) -> Triple<'_> {
    let object = match &triple.object {
        RdfObject::Iri(iri) => Term::NamedNode(NamedNode { iri }),
        RdfObject::Literal(value) => Term::Literal(Literal::Simple { value }),
    };

    Triple {
        subject: NamedNode { iri: &triple.subject }.into(),
        predicate: NamedNode { iri: &triple.predicate },
        object,
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> ConversionResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ConversionError::io(parent, e))?;
    }

    let mut staging = path.as_os_str().to_owned();
    staging.push(".partial");
    let staging = Path::new(&staging);

    if let Err(e) = fs::write(staging, bytes) {
        let _ = fs::remove_file(staging);
        return Err(ConversionError::io(staging, e));
    }
    fs::rename(staging, path).map_err(|e| {
        let _ = fs::remove_file(staging);
        ConversionError::io(path, e)
    })
}
