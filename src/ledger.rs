// 💼 Ledger - loads sources, classifies merchants, answers range queries
//
// Data flows one way: reader → store → range query → aggregation.

use crate::aggregate::{self, CategoryShare};
use crate::classify::{CategoryResolver, ClassifyReport, MerchantState};
use crate::config::{Config, LedgerColumns};
use crate::errors::LedgerError;
use crate::input::{self, CsvInput, CsvOptions};
use crate::output::{staging_path, CsvOutput};
use crate::record::{parse_date, Record, TimeUnit};
use crate::store::{quote_ident, LoadReport, Store};
use anyhow::{bail, Context, Result};
use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::params;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Category wildcard for range queries
pub const ALL_CATEGORIES: &str = "*";

/// Extension of files picked up when a source root is a directory
pub const DATA_EXTENSION: &str = "csv";

pub struct Ledger {
    store: Store,
    options: CsvOptions,
    columns: LedgerColumns,
    history: String,
    classifier: String,
    classifier_path: PathBuf,
    merchants: BTreeMap<String, MerchantState>,
}

impl Ledger {
    /// Load the ledger (file or directory) and the classifier file into a
    /// fresh in-memory store
    pub fn open(
        history_path: &Path,
        classifier_path: &Path,
        options: CsvOptions,
        columns: LedgerColumns,
    ) -> Result<Self> {
        if !classifier_path.is_file() {
            return Err(LedgerError::ClassifierNotAFile {
                path: classifier_path.to_path_buf(),
            }
            .into());
        }

        // The classifier may sit inside the ledger directory
        let classifier_file = fs::canonicalize(classifier_path)
            .with_context(|| format!("Failed to resolve {}", classifier_path.display()))?;

        let mut store = Store::open_in_memory()?;
        let history = load_source(&mut store, history_path, &options, Some(&classifier_file))?;
        let classifier = load_source(&mut store, classifier_path, &options, None)?;

        Ok(Ledger {
            store,
            options,
            columns,
            history,
            classifier,
            classifier_path: classifier_path.to_path_buf(),
            merchants: BTreeMap::new(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ledger::open(
            &config.history_path,
            &config.classifier_path,
            config.csv_options()?,
            config.columns.clone(),
        )
    }

    pub fn options(&self) -> &CsvOptions {
        &self.options
    }

    pub fn history_table(&self) -> &str {
        &self.history
    }

    pub fn classifier_table(&self) -> &str {
        &self.classifier
    }

    pub fn merchant_state(&self, merchant: &str) -> MerchantState {
        self.merchants
            .get(merchant)
            .cloned()
            .unwrap_or(MerchantState::Unclassified)
    }

    // ========================================================================
    // CLASSIFICATION
    // ========================================================================

    /// Make sure every merchant in the ledger has a category.
    ///
    /// Unknown merchants are sent to `resolver`; each answer is inserted into
    /// the classifier table and the classifier file is rewritten right away.
    /// A resolver failure leaves that merchant unclassified and moves on.
    pub fn classify<R>(&mut self, resolver: &mut R) -> Result<ClassifyReport>
    where
        R: CategoryResolver + ?Sized,
    {
        let merchant = quote_ident(&self.columns.merchant);
        let sql = format!(
            "SELECT DISTINCT {m} FROM {h} WHERE {m} IS NOT NULL ORDER BY {m}",
            m = merchant,
            h = quote_ident(&self.history),
        );
        let merchants: Vec<String> = self.store.query(&sql, [], |row| row.get(0))?;

        let mut report = ClassifyReport::default();

        for name in merchants {
            if self.merchant_state(&name).is_classified() {
                report.known += 1;
                continue;
            }

            if let Some(category) = self.lookup_category(&name)? {
                log::debug!("Classify {} as {}", name, category);
                self.merchants.insert(name, MerchantState::Classified(category));
                report.known += 1;
                continue;
            }

            self.merchants.insert(name.clone(), MerchantState::Resolving);
            match resolver.resolve(&name) {
                Ok(category) => {
                    if let Err(err) = self.add_category(&name, &category) {
                        self.merchants.insert(name, MerchantState::Unclassified);
                        return Err(err);
                    }
                    log::info!("🏷️  Classified {} as {}", name, category);
                    self.merchants
                        .insert(name.clone(), MerchantState::Classified(category.clone()));
                    report.resolved.push((name, category));
                }
                Err(err) => {
                    log::error!("❌ Could not classify {}: {:#}", name, err);
                    self.merchants.insert(name.clone(), MerchantState::Unclassified);
                    report.unresolved.push(name);
                }
            }
        }

        Ok(report)
    }

    /// Category on file for a merchant. A row with a NULL category still counts.
    fn lookup_category(&self, merchant: &str) -> Result<Option<String>> {
        let sql = format!(
            "SELECT {c} FROM {t} WHERE {m} = ?1 LIMIT 1",
            c = quote_ident(&self.columns.category),
            t = quote_ident(&self.classifier),
            m = quote_ident(&self.columns.merchant),
        );

        let found: Option<Option<String>> = self
            .store
            .query_row(&sql, [merchant], |row| row.get(0))
            .context("Classifier table lookup failed")?;

        Ok(found.map(Option::unwrap_or_default))
    }

    fn add_category(&self, merchant: &str, category: &str) -> Result<()> {
        let sql = format!(
            "INSERT INTO {t} ({m}, {c}) VALUES (?1, ?2)",
            t = quote_ident(&self.classifier),
            m = quote_ident(&self.columns.merchant),
            c = quote_ident(&self.columns.category),
        );
        self.store
            .execute(&sql, params![merchant, category])
            .context("Failed to insert category information")?;
        let rowid = self.store.connection().last_insert_rowid();

        // Table and file must agree: undo the insert if the file was not written
        if let Err(err) = self.save_classifier() {
            let undo = format!("DELETE FROM {} WHERE rowid = ?1", quote_ident(&self.classifier));
            self.store.execute(&undo, [rowid])?;
            return Err(err);
        }

        Ok(())
    }

    /// Rewrite the classifier file from the live table.
    ///
    /// Rows go to a hidden sibling first, which then replaces the file, so a
    /// failed save never leaves a truncated classifier behind.
    pub fn save_classifier(&self) -> Result<()> {
        let staged = staging_path(&self.classifier_path)?;

        let rows = match self.write_classifier(&staged) {
            Ok(rows) => rows,
            Err(err) => {
                let _ = fs::remove_file(&staged);
                return Err(err)
                    .with_context(|| format!("Failed to save {}", self.classifier_path.display()));
            }
        };
        fs::rename(&staged, &self.classifier_path)
            .with_context(|| format!("Failed to replace {}", self.classifier_path.display()))?;

        log::debug!("Saved {} classifier rows to {}", rows, self.classifier_path.display());
        Ok(())
    }

    fn write_classifier(&self, path: &Path) -> Result<usize> {
        let mut output = CsvOutput::create(path, self.options.clone())?;
        let rows = self.store.save(&self.classifier, &mut output)?;
        output.into_inner()?;
        Ok(rows)
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Classified records dated within `[start, end]`, ascending by date.
    /// `category` filters the result unless it is `"*"`.
    pub fn retrieve(&self, category: &str, start: &str, end: &str) -> Result<Vec<Record>> {
        let (start, end) = self.parse_range(start, end)?;
        self.retrieve_range(category, start, end)
    }

    fn retrieve_range(&self, category: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Record>> {
        let cols = &self.columns;
        let sql = format!(
            "SELECT h.{date}, h.{merchant}, CAST(IFNULL(h.{amount}, 0) AS REAL), c.{category}
             FROM {history} AS h
             INNER JOIN {classifier} AS c ON h.{merchant} = c.{merchant}
             WHERE h.{date} >= ?1 AND h.{date} < ?2
             ORDER BY h.{date} ASC, h.rowid ASC",
            date = quote_ident(&cols.date),
            merchant = quote_ident(&cols.merchant),
            amount = quote_ident(&cols.amount),
            category = quote_ident(&cols.category),
            history = quote_ident(&self.history),
            classifier = quote_ident(&self.classifier),
        );

        let from = start.and_time(NaiveTime::MIN);
        let until = end
            .checked_add_days(Days::new(1))
            .unwrap_or(end)
            .and_time(NaiveTime::MIN);

        let records = self.store.query(&sql, params![from, until], |row| {
            let date: NaiveDateTime = row.get(0)?;
            Ok(Record {
                date: date.date(),
                merchant: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                amount: row.get(2)?,
                category: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            })
        })?;

        log::debug!("Retrieved {} records between {} and {}", records.len(), start, end);

        Ok(records
            .into_iter()
            .filter(|r| category == ALL_CATEGORIES || r.category == category)
            .collect())
    }

    /// Spending per category over `[start, end]` with its share of the total
    pub fn percentage_by_category(&self, start: &str, end: &str) -> Result<Vec<CategoryShare>> {
        let records = self.retrieve(ALL_CATEGORIES, start, end)?;
        Ok(aggregate::percentage_by_category(&records))
    }

    /// Gapless series per category, bucketed by `unit`, covering `[start, end]`.
    /// A named category with no activity still gets an all-zero series.
    pub fn history(
        &self,
        category: &str,
        start: &str,
        end: &str,
        unit: TimeUnit,
    ) -> Result<BTreeMap<String, Vec<Record>>> {
        let (start, end) = self.parse_range(start, end)?;
        let records = self.retrieve_range(category, start, end)?;

        let mut groups = aggregate::group_by_category(&records);
        if category != ALL_CATEGORIES {
            groups.entry(category.to_string()).or_default();
        }

        let mut series = BTreeMap::new();
        for (name, records) in groups {
            let merged = aggregate::merge_by_period(&records, unit)?;
            let filled = aggregate::gap_fill(&name, &merged, unit, start, end);
            series.insert(name, filled);
        }

        Ok(series)
    }

    /// Standalone, integrity-checked copy of the live database
    pub fn snapshot_to(&self, path: &Path) -> Result<()> {
        self.store.snapshot_to(path)
    }

    fn parse_range(&self, start: &str, end: &str) -> Result<(NaiveDate, NaiveDate)> {
        let start = parse_date(start, &self.options.date_format)?;
        let end = parse_date(end, &self.options.date_format)?;
        Ok((start, end))
    }
}

// ============================================================================
// SOURCE LOADING
// ============================================================================

/// Load a file, or every data file below a directory, into one table named
/// after the root. `skip` is a canonical path left out of a directory walk.
/// Returns the table name.
pub fn load_source(
    store: &mut Store,
    root: &Path,
    options: &CsvOptions,
    skip: Option<&Path>,
) -> Result<String> {
    let metadata = fs::metadata(root)
        .with_context(|| format!("Failed to get the status of {}", root.display()))?;
    let table = input::table_name(root);

    let files = if metadata.is_dir() {
        let mut files = Vec::new();
        collect_data_files(root, skip, &mut files)?;
        files.sort();
        files
    } else {
        vec![root.to_path_buf()]
    };

    if files.is_empty() {
        bail!("No .{} files found under {}", DATA_EXTENSION, root.display());
    }

    let mut total = LoadReport::default();
    for file in &files {
        log::info!("📂 Loading {}", file.display());
        let mut source = CsvInput::open(file, options.clone())?;
        let report = store
            .load(&table, &mut source)
            .with_context(|| format!("Could not load {} into table {}", file.display(), table))?;
        total.inserted += report.inserted;
        total.skipped += report.skipped;
    }

    log::info!(
        "✓ Table {}: {} rows from {} file(s), {} skipped",
        table,
        total.inserted,
        files.len(),
        total.skipped
    );

    Ok(table)
}

fn collect_data_files(dir: &Path, skip: Option<&Path>, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_data_files(&path, skip, files)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some(DATA_EXTENSION) {
            if skip.is_some() && fs::canonicalize(&path).ok().as_deref() == skip {
                log::debug!("Skipping {} while loading the ledger", path.display());
                continue;
            }
            files.push(path);
        }
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
