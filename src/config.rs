// ⚙️ Configuration - JSON file with environment overrides

use crate::errors::LedgerError;
use crate::input::{CsvOptions, DEFAULT_DATE_FORMAT};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const HISTORY_ENV: &str = "SPEND_LEDGER_HISTORY";
pub const CLASSIFIER_ENV: &str = "SPEND_LEDGER_CLASSIFIER";
pub const RUST_LOG_ENV: &str = "RUST_LOG";

/// Column names the classification and retrieval queries rely on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerColumns {
    /// TIMESTAMP column of the ledger table
    pub date: String,

    /// Join key shared by the ledger and classifier tables
    pub merchant: String,

    /// Amount column of the ledger table
    pub amount: String,

    /// Category column of the classifier table
    pub category: String,
}

impl Default for LedgerColumns {
    fn default() -> Self {
        LedgerColumns {
            date: "date".to_string(),
            merchant: "mechant".to_string(),
            amount: "credit".to_string(),
            category: "category".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ledger file, or directory of `.csv` files loaded as one table
    pub history_path: PathBuf,

    /// Classifier file, rewritten whenever a new category is answered
    pub classifier_path: PathBuf,

    pub separator: char,
    pub date_format: String,
    pub columns: LedgerColumns,

    /// Default target of the `save` command
    pub snapshot_path: Option<PathBuf>,

    /// Default log filter when RUST_LOG is unset
    pub rust_log: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            history_path: PathBuf::from("./"),
            classifier_path: PathBuf::from("./classifier.csv"),
            separator: ',',
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            columns: LedgerColumns::default(),
            snapshot_path: None,
            rust_log: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file. Missing fields keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        Ok(config)
    }

    /// Override paths and log filter from the process environment
    pub fn apply_env(self) -> Self {
        self.apply_overrides(|key| env::var(key).ok())
    }

    fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(HISTORY_ENV) {
            self.history_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(CLASSIFIER_ENV) {
            self.classifier_path = PathBuf::from(path);
        }
        if let Some(filter) = lookup(RUST_LOG_ENV) {
            self.rust_log = filter;
        }
        self
    }

    /// Reader/writer options; the separator must fit in one byte
    pub fn csv_options(&self) -> Result<CsvOptions> {
        if !self.separator.is_ascii() {
            return Err(LedgerError::InvalidSeparator {
                separator: self.separator,
            }
            .into());
        }

        Ok(CsvOptions {
            separator: self.separator as u8,
            date_format: self.date_format.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.columns.merchant, "mechant");
        assert_eq!(config.csv_options().unwrap(), CsvOptions::default());
    }

    #[test]
    fn test_from_file_keeps_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "history_path": "/data/history", "separator": ";", "columns": { "merchant": "merchant" } }"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();

        assert_eq!(config.history_path, PathBuf::from("/data/history"));
        assert_eq!(config.classifier_path, PathBuf::from("./classifier.csv"));
        assert_eq!(config.columns.merchant, "merchant");
        assert_eq!(config.columns.amount, "credit");
        assert_eq!(config.csv_options().unwrap().separator, b';');
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (HISTORY_ENV, "/tmp/history.csv"),
            (RUST_LOG_ENV, "debug"),
        ]
        .into_iter()
        .collect();

        let config = Config::default().apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.history_path, PathBuf::from("/tmp/history.csv"));
        assert_eq!(config.classifier_path, PathBuf::from("./classifier.csv"));
        assert_eq!(config.rust_log, "debug");
    }

    #[test]
    fn test_non_ascii_separator_is_rejected() {
        let config = Config {
            separator: '§',
            ..Config::default()
        };

        assert!(matches!(
            config.csv_options().unwrap_err().downcast_ref::<LedgerError>(),
            Some(LedgerError::InvalidSeparator { .. })
        ));
    }
}
