// Spend Ledger - Core Library
// CSV reader, SQLite store and aggregation engine behind the CLI

pub mod errors;
pub mod values;
pub mod input;
pub mod output;
pub mod store;
pub mod record;
pub mod aggregate;
pub mod classify;
pub mod config;
pub mod ledger;

// Re-export commonly used types
pub use errors::LedgerError;
pub use values::{ColumnType, FieldValue, parse_timestamp};
pub use input::{CsvInput, CsvOptions, table_name, DEFAULT_DATE_FORMAT, PIPE_NAME};
pub use output::CsvOutput;
pub use store::{LoadReport, Store};
pub use record::{parse_date, Record, TimeUnit};
pub use aggregate::{
    CategoryShare,
    gap_fill, group_by_category, merge_by_period, percentage_by_category,
};
pub use classify::{CategoryResolver, ClassifyReport, ConsoleResolver, MerchantState};
pub use config::{Config, LedgerColumns};
pub use ledger::{load_source, Ledger, ALL_CATEGORIES, DATA_EXTENSION};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
