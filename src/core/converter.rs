use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Configuration;
use crate::core::compiler::{ColumnSelection, ConversionContext, RowCompiler};
use crate::core::error::{ConversionError, ConversionResult};
use crate::core::naming::{IdSource, UuidSource};
use crate::handlers::{DelimitedFile, ReadOptions};
use crate::knowledge_graph::GraphStats;
use crate::utils::RdfSerializer;

/// Parameters of one conversion, as received from the HTTP form or the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionRequest {
    #[serde(rename = "dataFileName", alias = "Delimited_File_Name")]
    pub data_file_name: String,
    #[serde(rename = "uniqueIdColumn", alias = "Unique_Id_Column", default)]
    pub unique_id_column: Option<String>,
    #[serde(rename = "uniqueIdLabelColumn", alias = "Unique_Id_Label_Column")]
    pub unique_id_label_column: String,
    #[serde(rename = "mappedColumns", alias = "Mapped_Columns_Array", default)]
    pub mapped_columns: Vec<String>,
}

impl ConversionRequest {
    fn selection(&self) -> ColumnSelection {
        ColumnSelection {
            unique_id_column: self
                .unique_id_column
                .clone()
                .filter(|column| !column.is_empty()),
            label_column: self.unique_id_label_column.clone(),
            mapped_columns: self.mapped_columns.clone(),
        }
    }
}

/// Shared flag a caller can flip to abandon a running conversion.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionReport {
    pub id: String,
    pub source_file: PathBuf,
    pub output_file: PathBuf,
    pub rows: usize,
    pub triples: usize,
    pub entities: usize,
    pub appellations: usize,
    pub distinct_values: usize,
    pub cache_hits: usize,
    pub converted_at: DateTime<Utc>,
    pub processing_time_seconds: f64,
    pub stats: GraphStats,
}

#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// Turtle text, byte-identical to the persisted file.
    pub turtle: Vec<u8>,
    pub output_path: PathBuf,
    pub report: ConversionReport,
}

pub struct RdfConverter {
    config: Configuration,
}

impl RdfConverter {
    pub fn new(config: Configuration) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Resolves a bare file name against the delimited data root.
    pub fn input_path(&self, data_file_name: &str) -> ConversionResult<PathBuf> {
        let mut components = Path::new(data_file_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.config.delimited_data_dir.join(data_file_name)),
            _ => Err(ConversionError::InvalidRequest(format!(
                "data file name must be a plain file name: {:?}",
                data_file_name
            ))),
        }
    }

    /// `<rdf root>/<input stem>.ttl`
    pub fn output_path(&self, data_file_name: &str) -> ConversionResult<PathBuf> {
        let stem = Path::new(data_file_name)
            .file_stem()
            .ok_or_else(|| ConversionError::InvalidRequest(format!(
                "cannot derive an output name from {:?}",
                data_file_name
            )))?;

        let mut name = stem.to_os_string();
        name.push(".ttl");
        Ok(self.config.rdf_data_dir.join(name))
    }

    pub fn file_columns(&self, data_file_name: &str) -> ConversionResult<Vec<String>> {
        let path = self.input_path(data_file_name)?;
        let columns = DelimitedFile::open(&path, ReadOptions::from(&self.config))?.headers()?;
        debug!("{} has {} columns", path.display(), columns.len());
        Ok(columns)
    }

    pub fn create_rdf_file(&self, request: &ConversionRequest) -> ConversionResult<ConversionOutput> {
        self.create_rdf_file_with(request, &mut UuidSource, &CancellationFlag::new())
    }

    /// Converts one file start to finish. Nothing is written unless every row
    /// compiles and the whole graph serializes.
    pub fn create_rdf_file_with(
        &self,
        request: &ConversionRequest,
        ids: &mut dyn IdSource,
        cancel: &CancellationFlag,
    ) -> ConversionResult<ConversionOutput> {
        let started = Instant::now();
        let timeout = self.config.timeout();
        let input = self.input_path(&request.data_file_name)?;
        let output_path = self.output_path(&request.data_file_name)?;
        let compiler = RowCompiler::new(&self.config, request.selection())?;

        info!("Converting {} to {}", input.display(), output_path.display());

        let file = DelimitedFile::open(&input, ReadOptions::from(&self.config))?;
        let mut rows = file.rows()?;

        for column in &compiler.selection().mapped_columns {
            if !rows.headers().contains(column) {
                warn!("Mapped column '{}' is not present in {}", column, input.display());
            }
        }

        let mut ctx = ConversionContext::new(ids);
        let mut row_count = 0;

        while let Some(row) = rows.next_row() {
            check_limits(started, timeout, cancel)?;
            compiler.compile_row(&mut ctx, &row?)?;
            row_count += 1;
        }
        check_limits(started, timeout, cancel)?;

        let turtle = RdfSerializer::new().serialize_to_file(&ctx.graph, &output_path)?;

        let stats = ctx.graph.get_statistics();
        let report = ConversionReport {
            id: Uuid::new_v4().to_string(),
            source_file: input,
            output_file: output_path.clone(),
            rows: row_count,
            triples: ctx.graph.len(),
            entities: ctx.entities(),
            appellations: ctx.appellations(),
            distinct_values: ctx.cache.len(),
            cache_hits: ctx.cache.hits(),
            converted_at: Utc::now(),
            processing_time_seconds: started.elapsed().as_secs_f64(),
            stats,
        };

        info!(
            "Converted {} rows into {} triples ({} entities, {} appellations, {} cache hits)",
            report.rows, report.triples, report.entities, report.appellations, report.cache_hits
        );

        Ok(ConversionOutput {
            turtle,
            output_path,
            report,
        })
    }
}

fn check_limits(started: Instant, timeout: Option<Duration>, cancel: &CancellationFlag) -> ConversionResult<()> {
    if cancel.is_cancelled() {
        return Err(ConversionError::Cancelled);
    }
    match timeout {
        Some(limit) if started.elapsed() >= limit => Err(ConversionError::TimedOut(limit)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;
    use crate::core::naming::SequentialIds;
    use rio_api::parser::TriplesParser;
    use rio_turtle::{TurtleError, TurtleParser};
    use std::fs;

    struct Fixture {
        _dir: tempfile::TempDir,
        converter: RdfConverter,
    }

    impl Fixture {
        fn new(files: &[(&str, &str)]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let delimited = dir.path().join("delimited");
            fs::create_dir_all(&delimited).unwrap();
            for (name, content) in files {
                fs::write(delimited.join(name), content).unwrap();
            }

            let config = Configuration {
                delimited_data_dir: delimited,
                rdf_data_dir: dir.path().join("rdf").join("out"),
                ..Default::default()
            };
            Self { _dir: dir, converter: RdfConverter::new(config) }
        }

        fn convert(&self, request: &ConversionRequest) -> ConversionResult<ConversionOutput> {
            self.converter
                .create_rdf_file_with(request, &mut SequentialIds::default(), &CancellationFlag::new())
        }
    }

    fn request(file: &str, id: Option<&str>, label: &str, mapped: &[&str]) -> ConversionRequest {
        ConversionRequest {
            data_file_name: file.to_string(),
            unique_id_column: id.map(str::to_string),
            unique_id_label_column: label.to_string(),
            mapped_columns: mapped.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn parse(bytes: &[u8]) -> Vec<(String, String, String)> {
        let mut parsed = Vec::new();
        TurtleParser::new(bytes, None)
            .parse_all(&mut |t| -> Result<(), TurtleError> {
                parsed.push((t.subject.to_string(), t.predicate.to_string(), t.object.to_string()));
                Ok(())
            })
            .unwrap();
        parsed
    }

    #[test]
    fn test_end_to_end() {
        let fixture = Fixture::new(&[("objects.csv", "ID|Term|Category\n1|Vase|Pottery\n")]);
        let output = fixture
            .convert(&request("objects.csv", Some("ID"), "Term", &["Category"]))
            .unwrap();

        assert!(output.output_path.ends_with("rdf/out/objects.ttl"));
        assert_eq!(fs::read(&output.output_path).unwrap(), output.turtle);

        let triples = parse(&output.turtle);
        let entity = "<https://www.researchspace.org/resource/term/1>";
        assert!(triples.iter().any(|(s, p, o)| s == entity
            && p == "<http://www.w3.org/2000/01/rdf-schema#label>"
            && o == "\"Vase\""));
        assert!(triples.iter().any(|(_, p, o)| p
            == "<http://www.cidoc-crm.org/cidoc-crm/P190_has_symbolic_content>"
            && o == "\"Pottery\""));

        assert_eq!(output.report.rows, 1);
        assert_eq!(output.report.entities, 1);
        assert_eq!(output.report.appellations, 1);
        assert_eq!(output.report.triples, triples.len());
    }

    #[test]
    fn test_headers_with_iri_delimiters_stay_valid_turtle() {
        let fixture = Fixture::new(&[(
            "measures.csv",
            "ID|Term|Height <cm>|Notes {raw}^`\\\n1|Vase|12|a^b\n",
        )]);
        let output = fixture
            .convert(&request("measures.csv", Some("ID"), "Term", &["Height <cm>", "Notes {raw}^`\\"]))
            .unwrap();

        let triples = parse(&output.turtle);
        assert_eq!(triples.len(), 2 + 4 * 2);
        assert!(triples.iter().any(|(s, _, o)| s
            .starts_with("<https://www.researchspace.org/resource/term/height%3Ccm%3E/")
            && o == "\"12\""));
        assert!(triples.iter().any(|(_, _, o)| o == "\"Height <cm>\""));
    }

    #[test]
    fn test_deterministic_with_injected_ids() {
        let fixture = Fixture::new(&[(
            "objects.csv",
            "Term|Category|Literature\nVase|Pottery;Greek|Foo Bar\nBowl|Pottery|\n",
        )]);
        let request = request("objects.csv", None, "Term", &["Category", "Literature"]);

        let first = fixture.convert(&request).unwrap();
        let second = fixture.convert(&request).unwrap();
        assert_eq!(first.turtle, second.turtle);
        assert_eq!(first.report.cache_hits, 1);
        assert_eq!(first.report.distinct_values, 3);
    }

    #[test]
    fn test_file_columns() {
        let fixture = Fixture::new(&[("objects.csv", "ID|Term|Category\n1|Vase|Pottery\n")]);
        assert_eq!(
            fixture.converter.file_columns("objects.csv").unwrap(),
            vec!["ID", "Term", "Category"]
        );

        let missing = fixture.converter.file_columns("absent.csv").unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_rejects_paths_outside_data_root() {
        let fixture = Fixture::new(&[]);
        for name in ["../secret.csv", "/etc/passwd", "", "nested/objects.csv"] {
            let result = fixture.converter.file_columns(name);
            assert!(matches!(result, Err(ConversionError::InvalidRequest(_))), "{}", name);
        }
    }

    #[test]
    fn test_malformed_row_writes_nothing() {
        let fixture = Fixture::new(&[("broken.csv", "ID|Term|Category\n1|Vase|Pottery\n2|Bowl\n")]);
        let result = fixture.convert(&request("broken.csv", Some("ID"), "Term", &["Category"]));

        assert!(matches!(result, Err(ConversionError::MalformedRow { row: 3, .. })));
        assert!(!fixture.converter.output_path("broken.csv").unwrap().exists());
    }

    #[test]
    fn test_missing_label_writes_nothing() {
        let fixture = Fixture::new(&[("objects.csv", "ID|Name\n1|Vase\n")]);
        let result = fixture.convert(&request("objects.csv", Some("ID"), "Term", &[]));

        let err = result.unwrap_err();
        assert!(matches!(err, ConversionError::MissingField { .. }));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!fixture.converter.output_path("objects.csv").unwrap().exists());
    }

    #[test]
    fn test_cancelled_before_first_row() {
        let fixture = Fixture::new(&[("objects.csv", "ID|Term\n1|Vase\n")]);
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let result = fixture.converter.create_rdf_file_with(
            &request("objects.csv", Some("ID"), "Term", &[]),
            &mut SequentialIds::default(),
            &cancel,
        );
        assert!(matches!(result, Err(ConversionError::Cancelled)));
        assert!(!fixture.converter.output_path("objects.csv").unwrap().exists());
    }

    #[test]
    fn test_zero_timeout() {
        let mut fixture = Fixture::new(&[("objects.csv", "ID|Term\n1|Vase\n")]);
        fixture.converter.config.timeout_secs = Some(0);

        let result = fixture.convert(&request("objects.csv", Some("ID"), "Term", &[]));
        assert!(matches!(result, Err(ConversionError::TimedOut(_))));
    }

    #[test]
    fn test_request_accepts_upload_form_names() {
        let request: ConversionRequest = serde_json::from_str(
            r#"{
                "Delimited_File_Name": "objects.csv",
                "Unique_Id_Column": "ID",
                "Unique_Id_Label_Column": "Term",
                "Mapped_Columns_Array": ["Category"]
            }"#,
        )
        .unwrap();
        assert_eq!(request.data_file_name, "objects.csv");
        assert_eq!(request.unique_id_column.as_deref(), Some("ID"));
        assert_eq!(request.mapped_columns, vec!["Category"]);

        let request: ConversionRequest = serde_json::from_str(
            r#"{"dataFileName": "objects.csv", "uniqueIdLabelColumn": "Term"}"#,
        )
        .unwrap();
        assert!(request.unique_id_column.is_none());
        assert!(request.mapped_columns.is_empty());
    }
}
