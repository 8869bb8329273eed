// 📤 Delimited Output - two header lines (types, names) followed by rows

use crate::input::CsvOptions;
use anyhow::{anyhow, Context, Result};
use csv::{Writer, WriterBuilder};
use std::ffi::OsString;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Hidden sibling of `path` that a rewrite is staged in before it is
/// renamed over the real file
pub(crate) fn staging_path(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| anyhow!("No file name in {}", path.display()))?;

    let mut staged = OsString::from(".");
    staged.push(name);
    staged.push(".partial");
    Ok(path.with_file_name(staged))
}

pub struct CsvOutput<W: Write> {
    options: CsvOptions,
    writer: Writer<W>,
}

impl CsvOutput<File> {
    /// Create (or truncate) a file sink
    pub fn create(path: &Path, options: CsvOptions) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create file: {}", path.display()))?;
        Ok(Self::new(file, options))
    }
}

impl<W: Write> CsvOutput<W> {
    pub fn new(sink: W, options: CsvOptions) -> Self {
        let writer = WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(options.separator)
            .from_writer(sink);

        CsvOutput { options, writer }
    }

    pub fn write_header(&mut self, types: &[String], columns: &[String]) -> Result<()> {
        self.writer.write_record(types)?;
        self.writer.write_record(columns)?;
        Ok(())
    }

    pub fn write_row(&mut self, values: &[String]) -> Result<()> {
        self.writer.write_record(values)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush delimited output")
    }

    pub fn options(&self) -> &CsvOptions {
        &self.options
    }

    /// Flush and hand back the sink
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush delimited output: {}", e.error()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_writes_header_and_rows() {
        let mut output = CsvOutput::new(Vec::new(), CsvOptions::default());

        output
            .write_header(&strings(&["TEXT", "TEXT"]), &strings(&["mechant", "category"]))
            .unwrap();
        output.write_row(&strings(&["apple", "computer"])).unwrap();
        output.write_row(&strings(&["a,b", ""])).unwrap();

        let text = String::from_utf8(output.into_inner().unwrap()).unwrap();
        assert_eq!(
            text,
            "TEXT,TEXT\nmechant,category\napple,computer\n\"a,b\",\n"
        );
    }

    #[test]
    fn test_honors_separator() {
        let options = CsvOptions {
            separator: b';',
            ..CsvOptions::default()
        };
        let mut output = CsvOutput::new(Vec::new(), options);
        output.write_row(&strings(&["x", "y"])).unwrap();

        let text = String::from_utf8(output.into_inner().unwrap()).unwrap();
        assert_eq!(text, "x;y\n");
    }
}
