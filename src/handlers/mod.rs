use csv::{ReaderBuilder, StringRecord};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::Configuration;
use crate::core::error::{ConversionError, ConversionResult};

#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    pub delimiter: u8,
    pub quote: u8,
    pub max_bytes: u64,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: b'|',
            quote: b'"',
            max_bytes: 64 * 1024 * 1024,
        }
    }
}

impl From<&Configuration> for ReadOptions {
    fn from(config: &Configuration) -> Self {
        // validate() guarantees ASCII; anything else falls back to the defaults
        let defaults = ReadOptions::default();
        Self {
            delimiter: u8::try_from(config.delimiter).unwrap_or(defaults.delimiter),
            quote: u8::try_from(config.quote).unwrap_or(defaults.quote),
            max_bytes: config.max_input_bytes,
        }
    }
}

/// A delimited file decoded into memory, ready for header inspection or row streaming.
pub struct DelimitedFile {
    path: PathBuf,
    text: String,
    options: ReadOptions,
}

impl DelimitedFile {
    pub fn open(path: impl AsRef<Path>, options: ReadOptions) -> ConversionResult<Self> {
        let path = path.as_ref().to_path_buf();
        let text = read_utf8(&path, options.max_bytes)?;
        Ok(Self { path, text, options })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Column names from the first line, in file order.
    pub fn headers(&self) -> ConversionResult<Vec<String>> {
        Ok(self.rows()?.headers().to_vec())
    }

    pub fn rows(&self) -> ConversionResult<Rows<'_>> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.options.delimiter)
            .quote(self.options.quote)
            .has_headers(true)
            .flexible(false)
            .from_reader(self.text.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| self.map_csv_error(e))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut seen = HashSet::new();
        if let Some(repeated) = headers.iter().find(|h| !seen.insert(h.as_str())) {
            return Err(ConversionError::MalformedRow {
                row: 1,
                reason: format!("column '{}' appears more than once in the header", repeated),
            });
        }

        Ok(Rows {
            file: self,
            reader,
            headers,
            record: StringRecord::new(),
        })
    }

    fn map_csv_error(&self, error: csv::Error) -> ConversionError {
        let row = error.position().map(|p| p.line()).unwrap_or(0);
        match error.kind() {
            csv::ErrorKind::Utf8 { err, .. } => ConversionError::Decode {
                path: self.path.clone(),
                reason: err.to_string(),
            },
            csv::ErrorKind::UnequalLengths { expected_len, len, .. } => ConversionError::MalformedRow {
                row,
                reason: format!("expected {} fields, found {}", expected_len, len),
            },
            _ => ConversionError::MalformedRow { row, reason: error.to_string() },
        }
    }
}

/// Streams data rows; each [`Row`] borrows the reader until the next call.
pub struct Rows<'a> {
    file: &'a DelimitedFile,
    reader: csv::Reader<&'a [u8]>,
    headers: Vec<String>,
    record: StringRecord,
}

impl<'a> Rows<'a> {
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn next_row(&mut self) -> Option<ConversionResult<Row<'_>>> {
        match self.reader.read_record(&mut self.record) {
            Ok(true) => {
                let line = self.record.position().map(|p| p.line()).unwrap_or(0);
                Some(Ok(Row {
                    line,
                    headers: &self.headers,
                    record: &self.record,
                }))
            }
            Ok(false) => None,
            Err(e) => Some(Err(self.file.map_csv_error(e))),
        }
    }
}

/// One data line, addressed by column name.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    line: u64,
    headers: &'a [String],
    record: &'a StringRecord,
}

impl<'a> Row<'a> {
    /// 1-based line number in the source file.
    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn get(&self, column: &str) -> Option<&'a str> {
        let index = self.headers.iter().position(|h| h == column)?;
        self.record.get(index)
    }

    pub fn cells(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.headers.iter().map(String::as_str).zip(self.record.iter())
    }
}

/// Header inspection without a conversion.
pub fn read_headers(path: impl AsRef<Path>, options: ReadOptions) -> ConversionResult<Vec<String>> {
    DelimitedFile::open(path, options)?.headers()
}

fn read_utf8(path: &Path, max_bytes: u64) -> ConversionResult<String> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        IoErrorKind::NotFound => ConversionError::NotFound { path: path.to_path_buf() },
        _ => ConversionError::io(path, e),
    })?;

    if !metadata.is_file() {
        return Err(ConversionError::NotFound { path: path.to_path_buf() });
    }

    if metadata.len() > max_bytes {
        return Err(ConversionError::InputTooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            limit: max_bytes,
        });
    }

    let bytes = fs::read(path).map_err(|e| ConversionError::io(path, e))?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());

    let body = match encoding_rs::Encoding::for_bom(&bytes) {
        Some((encoding, bom_len)) if encoding == encoding_rs::UTF_8 => &bytes[bom_len..],
        Some((encoding, _)) => {
            warn!("Rejecting {} encoded file: {}", encoding.name(), path.display());
            return Err(ConversionError::Decode {
                path: path.to_path_buf(),
                reason: format!("unsupported encoding {}", encoding.name()),
            });
        }
        None => &bytes[..],
    };

    encoding_rs::UTF_8
        .decode_without_bom_handling_and_without_replacement(body)
        .map(|text| text.into_owned())
        .ok_or_else(|| ConversionError::Decode {
            path: path.to_path_buf(),
            reason: "invalid UTF-8 byte sequence".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "objects.csv", b"ID|Term|Category\n1|Vase|Pottery\n");

        let headers = read_headers(&path, ReadOptions::default()).unwrap();
        assert_eq!(headers, vec!["ID", "Term", "Category"]);
    }

    #[test]
    fn test_read_headers_strips_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "bom.csv", b"\xEF\xBB\xBFID|Term\n1|Vase\n");

        assert_eq!(read_headers(&path, ReadOptions::default()).unwrap(), vec!["ID", "Term"]);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_headers(dir.path().join("absent.csv"), ReadOptions::default());
        assert!(matches!(result, Err(ConversionError::NotFound { .. })));
    }

    #[test]
    fn test_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "latin1.csv", b"ID|Term\n1|Caf\xE9\n");

        let result = read_headers(&path, ReadOptions::default());
        assert!(matches!(result, Err(ConversionError::Decode { .. })));
    }

    #[test]
    fn test_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "big.csv", b"ID|Term\n1|Vase\n");
        let options = ReadOptions { max_bytes: 4, ..Default::default() };

        let result = DelimitedFile::open(&path, options);
        assert!(matches!(result, Err(ConversionError::InputTooLarge { limit: 4, .. })));
    }

    #[test]
    fn test_rows_with_quoting() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "quoted.csv", b"ID|Term\n1|\"Vase | jar\"\n2|Bowl\n");
        let file = DelimitedFile::open(&path, ReadOptions::default()).unwrap();
        let mut rows = file.rows().unwrap();

        let first = rows.next_row().unwrap().unwrap();
        assert_eq!(first.get("Term"), Some("Vase | jar"));
        assert_eq!(first.line(), 2);
        assert_eq!(first.get("Missing"), None);

        let second = rows.next_row().unwrap().unwrap();
        let cells: Vec<_> = second.cells().collect();
        assert_eq!(cells, vec![("ID", "2"), ("Term", "Bowl")]);

        assert!(rows.next_row().is_none());
    }

    #[test]
    fn test_repeated_header_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "repeated.csv", b"ID|Term|Category|Category\n1|Vase|Pottery|Clay\n");
        let file = DelimitedFile::open(&path, ReadOptions::default()).unwrap();

        match file.rows() {
            Err(ConversionError::MalformedRow { row, reason }) => {
                assert_eq!(row, 1);
                assert!(reason.contains("'Category'"));
            }
            Err(other) => panic!("expected MalformedRow, got {:?}", other),
            Ok(_) => panic!("expected MalformedRow for a repeated column"),
        }
        assert!(read_headers(&path, ReadOptions::default()).is_err());
    }

    #[test]
    fn test_wrong_column_count_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "short.csv", b"ID|Term|Category\n1|Vase|Pottery\n2|Bowl\n");
        let file = DelimitedFile::open(&path, ReadOptions::default()).unwrap();
        let mut rows = file.rows().unwrap();

        assert!(rows.next_row().unwrap().is_ok());
        match rows.next_row().unwrap() {
            Err(ConversionError::MalformedRow { row, reason }) => {
                assert_eq!(row, 3);
                assert!(reason.contains("expected 3 fields"));
            }
            other => panic!("expected MalformedRow, got {:?}", other.map(|r| r.line())),
        }
    }
}
