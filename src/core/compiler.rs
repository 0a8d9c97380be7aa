//! Turns one delimited row into CIDOC-CRM triples.
//!
//! Every row becomes an `E1_CRM_Entity` carrying an `rdfs:label`. Each mapped,
//! non-empty cell is split on `;` and every piece becomes (or reuses) an
//! `E41_Appellation` linked from the entity through `P3_has_note`. Two column
//! names are special: `Literature` appellations also point at an external
//! search IRI, and `Pictures` produces a single placeholder representation.

use std::collections::HashSet;
use tracing::debug;

use crate::config::{Configuration, Vocabulary};
use crate::core::dedup::DistinctValueCache;
use crate::core::error::{ConversionError, ConversionResult};
use crate::core::naming::{percent_encode_segment, IdSource, IriMinter};
use crate::handlers::Row;
use crate::knowledge_graph::KnowledgeGraph;

pub const VALUE_SEPARATOR: char = ';';

/// How a mapped column is turned into triples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// `Pictures`: one constant `P138i_has_representation` edge per entity.
    Pictures,
    /// `Literature`: appellations documented in an external search result.
    Literature,
    /// Any other column: plain note appellations.
    Note,
}

impl ColumnRole {
    pub fn of(column: &str) -> Self {
        match column {
            "Pictures" => ColumnRole::Pictures,
            "Literature" => ColumnRole::Literature,
            _ => ColumnRole::Note,
        }
    }
}

/// Caller's choice of columns for one conversion.
#[derive(Debug, Clone, Default)]
pub struct ColumnSelection {
    pub unique_id_column: Option<String>,
    pub label_column: String,
    pub mapped_columns: Vec<String>,
}

struct Terms {
    rdf_type: String,
    label: String,
    crm_entity: String,
    appellation: String,
    has_note: String,
    has_type: String,
    has_symbolic_content: String,
    is_documented_in: String,
    has_representation: String,
}

impl From<&Vocabulary> for Terms {
    fn from(vocabulary: &Vocabulary) -> Self {
        Self {
            rdf_type: vocabulary.rdf_type(),
            label: vocabulary.label(),
            crm_entity: vocabulary.crm_entity(),
            appellation: vocabulary.appellation(),
            has_note: vocabulary.has_note(),
            has_type: vocabulary.has_type(),
            has_symbolic_content: vocabulary.has_symbolic_content(),
            is_documented_in: vocabulary.is_documented_in(),
            has_representation: vocabulary.has_representation(),
        }
    }
}

/// Mutable state of one conversion run: the graph being built, the
/// distinct-value cache and the identifier source.
pub struct ConversionContext<'ids> {
    pub graph: KnowledgeGraph,
    pub cache: DistinctValueCache,
    ids: &'ids mut dyn IdSource,
    entities: usize,
    appellations: usize,
}

impl<'ids> ConversionContext<'ids> {
    pub fn new(ids: &'ids mut dyn IdSource) -> Self {
        Self {
            graph: KnowledgeGraph::new(),
            cache: DistinctValueCache::new(),
            ids,
            entities: 0,
            appellations: 0,
        }
    }

    pub fn entities(&self) -> usize {
        self.entities
    }

    pub fn appellations(&self) -> usize {
        self.appellations
    }
}

pub struct RowCompiler {
    terms: Terms,
    minter: IriMinter,
    selection: ColumnSelection,
    mapped: HashSet<String>,
    literature_search_prefix: String,
    picture_placeholder: String,
}

impl RowCompiler {
    pub fn new(config: &Configuration, selection: ColumnSelection) -> ConversionResult<Self> {
        if selection.label_column.is_empty() {
            return Err(ConversionError::InvalidRequest(
                "a unique-id label column is required".to_string(),
            ));
        }

        let minter = IriMinter::new(&config.resource_namespace, &selection.label_column)?;
        let mapped = selection.mapped_columns.iter().cloned().collect();

        Ok(Self {
            terms: Terms::from(&config.vocabulary),
            minter,
            selection,
            mapped,
            literature_search_prefix: config.literature_search_prefix.clone(),
            picture_placeholder: config.picture_placeholder.clone(),
        })
    }

    pub fn selection(&self) -> &ColumnSelection {
        &self.selection
    }

    /// Emits every triple for `row` into the context and returns the entity IRI.
    pub fn compile_row(&self, ctx: &mut ConversionContext<'_>, row: &Row<'_>) -> ConversionResult<String> {
        let label = row
            .get(&self.selection.label_column)
            .ok_or_else(|| self.missing(row, &self.selection.label_column))?;

        let row_id = match &self.selection.unique_id_column {
            Some(column) => match row.get(column) {
                Some(value) if !value.is_empty() => Some(value),
                _ => return Err(self.missing(row, column)),
            },
            None => None,
        };

        let entity = self.minter.entity(row_id, &mut *ctx.ids);
        debug!("Row {}: entity {}", row.line(), entity);

        ctx.graph.add_iri(&entity, &self.terms.rdf_type, &self.terms.crm_entity);
        ctx.graph.add_literal(&entity, &self.terms.label, label);
        ctx.entities += 1;

        for (column, value) in row.cells() {
            if !self.is_converted(column) || value.is_empty() {
                continue;
            }

            match ColumnRole::of(column) {
                ColumnRole::Pictures => {
                    ctx.graph.add_iri(&entity, &self.terms.has_representation, &self.picture_placeholder);
                }
                ColumnRole::Literature => {
                    for piece in value.split(VALUE_SEPARATOR) {
                        self.attach_literature(ctx, &entity, column, piece)?;
                    }
                }
                ColumnRole::Note => {
                    for piece in value.split(VALUE_SEPARATOR) {
                        self.attach_note(ctx, &entity, column, piece)?;
                    }
                }
            }
        }

        Ok(entity)
    }

    fn is_converted(&self, column: &str) -> bool {
        column != self.selection.label_column
            && self.selection.unique_id_column.as_deref() != Some(column)
            && self.mapped.contains(column)
    }

    fn attach_note(
        &self,
        ctx: &mut ConversionContext<'_>,
        entity: &str,
        column: &str,
        value: &str,
    ) -> ConversionResult<()> {
        if let Some(existing) = ctx.cache.lookup(column, value) {
            debug!("Reusing {} appellation for {:?}", column, value);
            let existing = existing.to_string();
            ctx.graph.add_iri(entity, &self.terms.has_note, &existing);
            return Ok(());
        }

        let appellation = self.new_appellation(ctx, entity, column, value)?;
        ctx.cache.insert(column, value, appellation);
        Ok(())
    }

    fn attach_literature(
        &self,
        ctx: &mut ConversionContext<'_>,
        entity: &str,
        column: &str,
        value: &str,
    ) -> ConversionResult<()> {
        if let Some(existing) = ctx.cache.lookup(column, value) {
            debug!("Reusing literature appellation for {:?}", value);
            let existing = existing.to_string();
            ctx.graph.add_iri(entity, &self.terms.has_note, &existing);
            return Ok(());
        }

        let search = self.literature_search_iri(value);
        let appellation = self.new_appellation(ctx, entity, column, value)?;
        ctx.graph.add_iri(&appellation, &self.terms.is_documented_in, &search);
        ctx.cache.insert(column, value, appellation);
        Ok(())
    }

    fn new_appellation(
        &self,
        ctx: &mut ConversionContext<'_>,
        entity: &str,
        column: &str,
        value: &str,
    ) -> ConversionResult<String> {
        let appellation = self.minter.appellation(column, &mut *ctx.ids)?;
        debug!("New {} appellation {} for {:?}", column, appellation, value);

        ctx.graph.add_iri(entity, &self.terms.has_note, &appellation);
        ctx.graph.add_iri(&appellation, &self.terms.rdf_type, &self.terms.appellation);
        ctx.graph.add_literal(&appellation, &self.terms.has_type, column);
        ctx.graph.add_literal(&appellation, &self.terms.has_symbolic_content, value);
        ctx.appellations += 1;

        Ok(appellation)
    }

    pub fn literature_search_iri(&self, value: &str) -> String {
        format!("{}{}", self.literature_search_prefix, percent_encode_segment(value))
    }

    fn missing(&self, row: &Row<'_>, column: &str) -> ConversionError {
        ConversionError::MissingField {
            row: row.line(),
            column: column.to_string(),
        }
    }
}
