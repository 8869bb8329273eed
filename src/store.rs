// 🗄️ Relational Store - typed tables over an embedded SQLite database
// Tables are created from a reader's schema, bulk loaded in one transaction,
// and can be written back out as delimited text or hot-copied to a file.

use crate::errors::LedgerError;
use crate::input::CsvInput;
use crate::output::{staging_path, CsvOutput};
use crate::values::{ColumnType, FieldValue};
use anyhow::{anyhow, bail, Context, Result};
use rusqlite::backup::{Backup, StepResult};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Params, Row};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

/// Outcome of one bulk load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// Owns the database connection. Every operation runs to completion before
/// the next one starts; nothing here is shared across threads.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Process-local in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Ok(Store { conn })
    }

    /// File-backed database (e.g. a previous snapshot)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Ok(Store { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // ========================================================================
    // SCHEMA
    // ========================================================================

    /// `CREATE TABLE IF NOT EXISTS` with each type tag used verbatim as the
    /// column's declared type
    pub fn create_table(&self, table: &str, columns: &[String], types: &[String]) -> Result<()> {
        if columns.len() != types.len() {
            return Err(LedgerError::SchemaMismatch {
                types: types.len(),
                names: columns.len(),
            }
            .into());
        }
        if columns.is_empty() {
            bail!("Nothing to build table {} with", table);
        }

        let definitions: Vec<String> = columns
            .iter()
            .zip(types)
            .map(|(name, tag)| format!("{} {}", quote_ident(name), tag))
            .collect();

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(table),
            definitions.join(", ")
        );
        self.conn
            .execute(&sql, [])
            .with_context(|| format!("Failed to create table {}", table))?;

        Ok(())
    }

    /// Live column names and declared types, in table order
    pub fn table_schema(&self, table: &str) -> Result<Vec<(String, String)>> {
        self.query(
            &format!("PRAGMA table_info({})", quote_ident(table)),
            [],
            |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)),
        )
    }

    // ========================================================================
    // BULK LOAD
    // ========================================================================

    /// Load every row of `input` into `table`.
    ///
    /// One transaction, one prepared insert reused for all rows. A row that
    /// fails conversion or insertion is logged and skipped; the rest of the
    /// batch still commits. Fields beyond the schema width are not stored.
    pub fn load<R: Read>(&mut self, table: &str, input: &mut CsvInput<R>) -> Result<LoadReport> {
        let columns = input.columns().to_vec();
        let tags = input.types().to_vec();
        self.create_table(table, &columns, &tags)?;

        let types: Vec<ColumnType> = tags.iter().map(|tag| ColumnType::from_tag(tag)).collect();
        let date_format = input.options().date_format.clone();
        let width = types.len();
        let mut report = LoadReport::default();

        let tx = self
            .conn
            .transaction()
            .with_context(|| format!("Failed to begin load of {}", table))?;
        {
            let mut stmt = tx
                .prepare(&insert_sql(table, width))
                .with_context(|| format!("Could not create load statement for {}", table))?;

            while let Some(row) = input.read_row() {
                let fields = &row[..width];
                let values = match convert_row(fields, &types, &date_format) {
                    Ok(values) => values,
                    Err(err) => {
                        log::warn!("⚠️  Bad row in {}: {:#} ({:?})", table, err, row);
                        report.skipped += 1;
                        continue;
                    }
                };

                match stmt.execute(params_from_iter(values.iter())) {
                    Ok(_) => report.inserted += 1,
                    Err(err) => {
                        log::warn!("⚠️  Insert failed in {}: {} ({:?})", table, err, row);
                        report.skipped += 1;
                    }
                }
            }
        }
        tx.commit()
            .with_context(|| format!("Failed to commit load of {}", table))?;

        log::info!(
            "✓ Loaded {} rows into {} from {} ({} skipped)",
            report.inserted,
            table,
            input.name(),
            report.skipped
        );

        Ok(report)
    }

    // ========================================================================
    // PASSTHROUGH
    // ========================================================================

    /// Run a query and map every row
    pub fn query<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self
            .conn
            .prepare(sql)
            .with_context(|| format!("Failed to prepare query: {}", sql))?;

        let rows = stmt
            .query_map(params, f)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("Failed to read rows of: {}", sql))?;

        Ok(rows)
    }

    /// First row of a query, `None` when it returns nothing
    pub fn query_row<T, P, F>(&self, sql: &str, params: P, f: F) -> Result<Option<T>>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.conn
            .query_row(sql, params, f)
            .optional()
            .with_context(|| format!("Failed to query: {}", sql))
    }

    /// Execute a statement, returning the number of rows changed
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        self.conn
            .execute(sql, params)
            .with_context(|| format!("Failed to execute: {}", sql))
    }

    // ========================================================================
    // SERIALIZATION
    // ========================================================================

    /// Write `table` as delimited text: types line, names line, then rows
    pub fn save<W: Write>(&self, table: &str, output: &mut CsvOutput<W>) -> Result<usize> {
        let schema = self.table_schema(table)?;
        if schema.is_empty() {
            bail!("Table {} does not exist", table);
        }

        let (columns, tags): (Vec<String>, Vec<String>) = schema.into_iter().unzip();
        let types: Vec<ColumnType> = tags.iter().map(|tag| ColumnType::from_tag(tag)).collect();
        let date_format = output.options().date_format.clone();

        output.write_header(&tags, &columns)?;

        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {}", quote_ident(table)))?;
        let mut rows = stmt.query([])?;
        let mut written = 0;

        while let Some(row) = rows.next()? {
            let values = types
                .iter()
                .enumerate()
                .map(|(i, ty)| ty.format_value(row.get_ref(i)?, &date_format))
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("Failed to save row {} of {}", written + 1, table))?;

            output.write_row(&values)?;
            written += 1;
        }
        output.flush()?;

        log::debug!("Saved {} rows of {}", written, table);
        Ok(written)
    }

    // ========================================================================
    // SNAPSHOT
    // ========================================================================

    /// Hot-copy the live database to `path` and verify the copy.
    ///
    /// The copy is built in a hidden sibling file and only renamed over
    /// `path` once its integrity check passes, so a failure leaves whatever
    /// was at `path` untouched.
    pub fn snapshot_to(&self, path: &Path) -> Result<()> {
        match self.stage_snapshot(path) {
            Ok(()) => {
                log::info!("💾 Snapshot written to {}", path.display());
                Ok(())
            }
            Err(err) => Err(LedgerError::SnapshotFailed {
                path: path.to_path_buf(),
                reason: format!("{:#}", err),
            }
            .into()),
        }
    }

    fn stage_snapshot(&self, path: &Path) -> Result<()> {
        let staged = staging_path(path)?;
        // Leftover from an interrupted run
        let _ = fs::remove_file(&staged);

        let result = self.copy_to(&staged).and_then(|()| {
            fs::rename(&staged, path)
                .with_context(|| format!("Failed to move snapshot into {}", path.display()))
        });
        if result.is_err() {
            let _ = fs::remove_file(&staged);
        }

        result
    }

    fn copy_to(&self, path: &Path) -> Result<()> {
        let mut target = Connection::open(path).context("Failed to open snapshot target")?;

        {
            let backup = Backup::new(&self.conn, &mut target).context("Failed to start backup")?;
            loop {
                match backup.step(-1).context("Backup step failed")? {
                    StepResult::Done => break,
                    StepResult::More => continue,
                    other => bail!("Backup step did not complete: {:?}", other),
                }
            }
        }

        let status: String = target
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))
            .context("Failed to run integrity check")?;
        if status != "ok" {
            bail!("Integrity check reported: {}", status);
        }

        target
            .close()
            .map_err(|(_, err)| anyhow!("Failed to close snapshot target: {}", err))?;

        Ok(())
    }
}

fn convert_row(fields: &[String], types: &[ColumnType], date_format: &str) -> Result<Vec<FieldValue>> {
    fields
        .iter()
        .zip(types)
        .map(|(raw, ty)| ty.parse_field(raw, date_format))
        .collect()
}

fn insert_sql(table: &str, width: usize) -> String {
    let placeholders: Vec<String> = (1..=width).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT INTO {} VALUES ({})",
        quote_ident(table),
        placeholders.join(", ")
    )
}

/// Quote an identifier for SQL text
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// ============================================================================
// TESTS
// ============================================================================
