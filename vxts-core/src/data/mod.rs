//! Statistics ingestion: MET `.stat` text, CSV tables, directory loading.

pub mod csv_table;
pub mod loader;
pub mod stat_file;

pub use csv_table::parse_csv_table;
pub use loader::{load_stat_dir, DateWindow, LoadedStats, StatQuery};
pub use stat_file::{parse_stat_text, ParsedStats};

use thiserror::Error;

/// Errors from reading statistics files.
///
/// Individual bad rows are not errors; they are counted in
/// [`ParsedStats::rejected_rows`].
#[derive(Debug, Error)]
pub enum DataError {
    #[error("{path}: malformed header: {reason}")]
    MalformedHeader { path: String, reason: String },

    #[error("{path}: I/O error: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: CSV error: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("stat directory does not exist: {0}")]
    MissingDirectory(String),
}
