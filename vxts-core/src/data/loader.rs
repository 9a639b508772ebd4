//! Directory loading with query pushdown.
//!
//! Walks a tree of MET output, parses every `.stat` and `.csv` file for one
//! line type, and keeps the rows that match a [`StatQuery`]. Files are
//! visited in sorted path order so the record order is reproducible.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::csv_table::parse_csv_table;
use super::stat_file::parse_stat_text;
use super::DataError;
use crate::domain::{DateType, LeadSelection, LineType, StatRecord};

/// Inclusive date window on the query's date type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateWindow {
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        t >= self.start && t <= self.end
    }
}

/// Row selection applied while loading. Empty lists mean "any".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatQuery {
    pub line_type: LineType,
    pub models: Vec<String>,
    pub fcst_var_names: Vec<String>,
    pub vx_mask: Option<String>,
    pub interp_mthd: Option<String>,
    pub date_type: DateType,
    pub window: Option<DateWindow>,
    pub date_hours: Vec<u32>,
    pub leads: LeadSelection,
}

impl StatQuery {
    /// A query that keeps every row of `line_type`.
    pub fn new(line_type: LineType, date_type: DateType) -> Self {
        Self {
            line_type,
            models: Vec::new(),
            fcst_var_names: Vec::new(),
            vx_mask: None,
            interp_mthd: None,
            date_type,
            window: None,
            date_hours: Vec::new(),
            leads: LeadSelection::All,
        }
    }

    pub fn matches(&self, rec: &StatRecord) -> bool {
        if !self.models.is_empty() && !self.models.iter().any(|m| m == &rec.model) {
            return false;
        }
        if !self.fcst_var_names.is_empty()
            && !self
                .fcst_var_names
                .iter()
                .any(|v| v.eq_ignore_ascii_case(&rec.fcst_var))
        {
            return false;
        }
        if let Some(mask) = &self.vx_mask {
            if !mask.eq_ignore_ascii_case(&rec.vx_mask) {
                return false;
            }
        }
        if let Some(method) = &self.interp_mthd {
            if !method.eq_ignore_ascii_case(&rec.interp_mthd) {
                return false;
            }
        }
        let date = rec.date(self.date_type);
        if let Some(window) = &self.window {
            if !window.contains(date) {
                return false;
            }
        }
        if !self.date_hours.is_empty() && !self.date_hours.contains(&date.hour()) {
            return false;
        }
        self.leads.contains(rec.lead_hours)
    }
}

/// Records that survived the query, with bookkeeping for the run log.
#[derive(Debug, Default)]
pub struct LoadedStats {
    pub records: Vec<StatRecord>,
    pub files_read: usize,
    pub rows_rejected: usize,
}

impl LoadedStats {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Load every statistics file under `dir` and keep rows matching `query`.
///
/// An existing directory with no usable files yields an empty result, not
/// an error; a missing directory is an error.
pub fn load_stat_dir(dir: &Path, query: &StatQuery) -> Result<LoadedStats, DataError> {
    if !dir.is_dir() {
        return Err(DataError::MissingDirectory(dir.display().to_string()));
    }

    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();

    let mut loaded = LoadedStats::default();
    for path in &files {
        let source = path.display().to_string();
        let parsed = match extension(path).as_deref() {
            Some("stat") => {
                let text = fs::read_to_string(path).map_err(|e| DataError::Io {
                    path: source.clone(),
                    source: e,
                })?;
                parse_stat_text(&text, query.line_type, &source)?
            }
            Some("csv") => {
                let file = fs::File::open(path).map_err(|e| DataError::Io {
                    path: source.clone(),
                    source: e,
                })?;
                parse_csv_table(file, query.line_type, &source)?
            }
            _ => continue,
        };

        loaded.files_read += 1;
        loaded.rows_rejected += parsed.rejected_rows;
        let before = loaded.records.len();
        loaded
            .records
            .extend(parsed.records.into_iter().filter(|r| query.matches(r)));
        debug!(
            "{source}: kept {} {} rows",
            loaded.records.len() - before,
            query.line_type
        );
    }

    info!(
        "Loaded {} {} rows from {} files under {} ({} rejected)",
        loaded.records.len(),
        query.line_type,
        loaded.files_read,
        dir.display(),
        loaded.rows_rejected
    );
    Ok(loaded)
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), DataError> {
    let entries = fs::read_dir(dir).map_err(|e| DataError::Io {
        path: dir.display().to_string(),
        source: e,
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| DataError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}
