// 📥 Record Reader - tolerant delimited input
// Two header lines (types, then names) fix the schema; data rows never abort the stream

use crate::errors::LedgerError;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

/// Calendar-date format shared by ledger files, query arguments and saved tables
pub const DEFAULT_DATE_FORMAT: &str = "%m/%d/%Y";

/// Name reported for sources that have no path (stdin, in-memory buffers)
pub const PIPE_NAME: &str = "pipe";

// ============================================================================
// OPTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvOptions {
    /// Byte that fields are delimited by
    pub separator: u8,

    /// chrono format used for TIMESTAMP columns
    pub date_format: String,
}

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions {
            separator: b',',
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

// ============================================================================
// CSV INPUT
// ============================================================================

/// Delimited source with a declared schema.
///
/// Rows are normalized against the schema width `L` taken from the type line:
/// short rows are padded with empty fields, long rows pass through untouched,
/// and rows the tokenizer rejects come back as `L` empty fields.
pub struct CsvInput<R> {
    options: CsvOptions,
    reader: csv::Reader<R>,
    name: String,
    types: Vec<String>,
    columns: Vec<String>,
    record: StringRecord,
}

impl CsvInput<File> {
    /// Open a file; its base name becomes the source name
    pub fn open(path: &Path, options: CsvOptions) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(PIPE_NAME)
            .to_string();

        Self::with_name(file, name, options)
    }
}

impl<R: Read> CsvInput<R> {
    /// Wrap any reader. The source is reported as `"pipe"`.
    pub fn from_reader(reader: R, options: CsvOptions) -> Result<Self> {
        Self::with_name(reader, PIPE_NAME.to_string(), options)
    }

    fn with_name(reader: R, name: String, options: CsvOptions) -> Result<Self> {
        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(options.separator)
            .from_reader(reader);

        let mut input = CsvInput {
            options,
            reader,
            name,
            types: Vec::new(),
            columns: Vec::new(),
            record: StringRecord::new(),
        };
        input.read_header()?;

        Ok(input)
    }

    fn read_header(&mut self) -> Result<()> {
        let has_types = self
            .reader
            .read_record(&mut self.record)
            .with_context(|| format!("Failed to read type header of {}", self.name))?;

        if !has_types {
            return Err(LedgerError::EmptySource {
                name: self.name.clone(),
            }
            .into());
        }
        self.types = self.record.iter().map(String::from).collect();

        let width = self.types.len();
        self.columns = match self.reader.read_record(&mut self.record) {
            Ok(true) => self.record.iter().map(String::from).collect(),
            Ok(false) => synthesize_columns(width),
            Err(err) => {
                log::warn!("⚠️  Unreadable column names in {}: {}", self.name, err);
                synthesize_columns(width)
            }
        };

        if self.columns.len() != width {
            return Err(LedgerError::SchemaMismatch {
                types: width,
                names: self.columns.len(),
            }
            .into());
        }

        Ok(())
    }

    /// Next data row, or `None` at end of stream.
    ///
    /// Never shorter than the schema. A row the tokenizer rejects is logged and
    /// replaced by empty fields so that one bad line cannot stop ingestion.
    pub fn read_row(&mut self) -> Option<Vec<String>> {
        let width = self.types.len();

        match self.reader.read_record(&mut self.record) {
            Ok(false) => None,
            Ok(true) => {
                let mut row: Vec<String> = self.record.iter().map(String::from).collect();
                if row.len() < width {
                    row.resize(width, String::new());
                }
                Some(row)
            }
            Err(err) if matches!(err.kind(), csv::ErrorKind::Io(_)) => {
                log::error!("❌ Read error in {}, stopping: {}", self.name, err);
                None
            }
            Err(err) => {
                log::warn!("⚠️  Bad row in {}: {}", self.name, err);
                Some(vec![String::new(); width])
            }
        }
    }

    /// Human identifier of the source: file base name or `"pipe"`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column names, synthesized as `c0..c{n-1}` when the name line is missing
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Declared type tag per column, verbatim
    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn options(&self) -> &CsvOptions {
        &self.options
    }
}

impl<R: Read> Iterator for CsvInput<R> {
    type Item = Vec<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_row()
    }
}

fn synthesize_columns(width: usize) -> Vec<String> {
    (0..width).map(|i| format!("c{}", i)).collect()
}

/// Table name for a source root: a directory's base name, or a file's stem
pub fn table_name(path: &Path) -> String {
    // "./" and ".." have no base name of their own
    let resolved;
    let path = if path.file_name().is_none() {
        resolved = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        resolved.as_path()
    } else {
        path
    };

    let base = if path.is_dir() {
        path.file_name()
    } else {
        path.file_stem()
    };

    base.and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(PIPE_NAME)
        .to_string()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SIMPLE: &str = "TEXT,TEXT,TEXT\nt1,t2,t3\na,b,c\n1,2,3\n4,5,6";

    const RAGGED: &str = "TEXT,TEXT,TEXT
t1,t2,t3
a,b,c
1,2,
4,5,6
7,8


9,,10
11,12,13,14
\"foo,bar\",\",\",x
\"test
\",multi-line
";

    fn input_from(text: &str) -> CsvInput<&[u8]> {
        CsvInput::from_reader(text.as_bytes(), CsvOptions::default()).unwrap()
    }

    fn row(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_reads_header() {
        let input = input_from(SIMPLE);

        assert_eq!(input.types(), row(&["TEXT", "TEXT", "TEXT"]).as_slice());
        assert_eq!(input.columns(), row(&["t1", "t2", "t3"]).as_slice());
    }

    #[test]
    fn test_reads_simple_rows() {
        let mut input = input_from(SIMPLE);

        assert_eq!(input.read_row(), Some(row(&["a", "b", "c"])));
        assert_eq!(input.read_row(), Some(row(&["1", "2", "3"])));
        assert_eq!(input.read_row(), Some(row(&["4", "5", "6"])));
        assert_eq!(input.read_row(), None);
    }

    #[test]
    fn test_normalizes_ragged_rows() {
        let rows: Vec<Vec<String>> = input_from(RAGGED).collect();

        let expected = vec![
            row(&["a", "b", "c"]),
            row(&["1", "2", ""]),
            row(&["4", "5", "6"]),
            row(&["7", "8", ""]),
            row(&["9", "", "10"]),
            row(&["11", "12", "13", "14"]),
            row(&["foo,bar", ",", "x"]),
            row(&["test\n", "multi-line", ""]),
        ];

        assert_eq!(rows, expected);
        assert!(rows.iter().all(|r| r.len() >= 3));
    }

    #[test]
    fn test_synthesizes_missing_column_names() {
        let mut input = input_from("TEXT,REAL,TIMESTAMP,TEXT\n");

        assert_eq!(input.columns(), row(&["c0", "c1", "c2", "c3"]).as_slice());
        assert_eq!(input.read_row(), None);
    }

    #[test]
    fn test_unreadable_name_line_is_synthesized() {
        let bytes: &[u8] = b"TEXT,TEXT\n\xff\xfe,b\n1,2\n";
        let mut input = CsvInput::from_reader(bytes, CsvOptions::default()).unwrap();

        assert_eq!(input.columns(), row(&["c0", "c1"]).as_slice());
        assert_eq!(input.read_row(), Some(row(&["1", "2"])));
    }

    #[test]
    fn test_bad_row_becomes_blank_row() {
        let bytes: &[u8] = b"TEXT,TEXT,TEXT\na,b,c\n1,\xff,3\n4,5,6\n";
        let mut input = CsvInput::from_reader(bytes, CsvOptions::default()).unwrap();

        assert_eq!(input.read_row(), Some(row(&["", "", ""])));
        assert_eq!(input.read_row(), Some(row(&["4", "5", "6"])));
        assert_eq!(input.read_row(), None);
    }

    #[test]
    fn test_mismatched_header_is_rejected() {
        let err = CsvInput::from_reader("TEXT,TEXT\na,b,c\n".as_bytes(), CsvOptions::default())
            .err()
            .unwrap();

        match err.downcast_ref::<LedgerError>() {
            Some(LedgerError::SchemaMismatch { types, names }) => {
                assert_eq!(*types, 2);
                assert_eq!(*names, 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_empty_source_is_rejected() {
        let err = CsvInput::from_reader("".as_bytes(), CsvOptions::default())
            .err()
            .unwrap();

        assert!(matches!(
            err.downcast_ref::<LedgerError>(),
            Some(LedgerError::EmptySource { .. })
        ));
    }

    #[test]
    fn test_custom_separator() {
        let options = CsvOptions {
            separator: b'|',
            ..CsvOptions::default()
        };
        let mut input = CsvInput::from_reader("TEXT|TEXT\na|b\nx,y|z\n".as_bytes(), options).unwrap();

        assert_eq!(input.columns(), row(&["a", "b"]).as_slice());
        assert_eq!(input.read_row(), Some(row(&["x,y", "z"])));
    }

    #[test]
    fn test_source_names() {
        assert_eq!(input_from(SIMPLE).name(), PIPE_NAME);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let mut file = File::create(&path).unwrap();
        file.write_all(SIMPLE.as_bytes()).unwrap();

        let input = CsvInput::open(&path, CsvOptions::default()).unwrap();
        assert_eq!(input.name(), "data.csv");
    }

    #[test]
    fn test_table_name_for_file_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        let history = dir.path().join("history");
        std::fs::create_dir(&history).unwrap();

        assert_eq!(table_name(&history), "history");
        assert_eq!(table_name(&history.join("2023.csv")), "2023");
        assert_eq!(table_name(Path::new("classifier.csv")), "classifier");
    }

    #[test]
    fn test_table_name_for_relative_directory() {
        let dir = tempfile::tempdir().unwrap();
        let history = dir.path().join("history");
        let nested = history.join("2023");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(table_name(&nested.join("..")), "history");
        assert_eq!(table_name(&history.join(".")), "history");

        let cwd = std::env::current_dir().unwrap();
        let expected = cwd.file_name().unwrap().to_str().unwrap();
        assert_eq!(table_name(Path::new("./")), expected);
    }
}
