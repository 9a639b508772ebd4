//! Parser for MET `.stat` text files.
//!
//! A `.stat` file is whitespace-delimited. Its first line names the header
//! columns up to `LINE_TYPE` (the names after it belong to whichever line
//! type happened to be written first and are ignored). Every data row
//! carries the same header columns followed by its line type's columns in
//! the fixed order given by [`LineType::columns`].

use std::collections::HashMap;

use super::DataError;
use crate::domain::{LineType, StatRecord};

/// Header layout of MET 8.0 and later, used when a file has no header line.
const DEFAULT_HEADER: [&str; 24] = [
    "VERSION",
    "MODEL",
    "DESC",
    "FCST_LEAD",
    "FCST_VALID_BEG",
    "FCST_VALID_END",
    "OBS_LEAD",
    "OBS_VALID_BEG",
    "OBS_VALID_END",
    "FCST_VAR",
    "FCST_UNITS",
    "FCST_LEV",
    "OBS_VAR",
    "OBS_UNITS",
    "OBS_LEV",
    "OBTYPE",
    "VX_MASK",
    "INTERP_MTHD",
    "INTERP_PNTS",
    "FCST_THRESH",
    "OBS_THRESH",
    "COV_THRESH",
    "ALPHA",
    "LINE_TYPE",
];

/// Outcome of parsing one file.
#[derive(Debug, Default)]
pub struct ParsedStats {
    pub records: Vec<StatRecord>,
    /// Rows of the requested line type that could not be parsed.
    pub rejected_rows: usize,
}

/// Parse `.stat` text, keeping rows of `line_type`.
///
/// Malformed rows of the requested line type are counted and logged, not
/// fatal; a header without `LINE_TYPE` is.
pub fn parse_stat_text(
    text: &str,
    line_type: LineType,
    source: &str,
) -> Result<ParsedStats, DataError> {
    let mut lines = text.lines().enumerate().peekable();

    let has_header = matches!(
        lines.peek(),
        Some((_, first)) if first.trim_start().starts_with("VERSION")
    );
    let header: Vec<String> = if has_header {
        lines
            .next()
            .map(|(_, first)| first.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    } else {
        DEFAULT_HEADER.iter().map(|s| s.to_string()).collect()
    };

    let lt_index = header
        .iter()
        .position(|h| h == "LINE_TYPE")
        .ok_or_else(|| DataError::MalformedHeader {
            path: source.to_string(),
            reason: "no LINE_TYPE column".into(),
        })?;
    let header = &header[..=lt_index];
    let lt_columns = line_type.columns();

    let mut parsed = ParsedStats::default();
    let mut row: HashMap<&str, &str> = HashMap::with_capacity(header.len() + lt_columns.len());

    for (line_no, line) in lines {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() <= lt_index {
            continue;
        }
        if !fields[lt_index].eq_ignore_ascii_case(line_type.as_str()) {
            continue;
        }

        row.clear();
        for (name, value) in header.iter().zip(fields.iter()) {
            row.insert(name.as_str(), *value);
        }
        for (name, value) in lt_columns.iter().zip(fields[lt_index + 1..].iter()) {
            row.insert(*name, *value);
        }

        match StatRecord::from_columns(line_type, |k| row.get(k).copied()) {
            Ok(rec) => parsed.records.push(rec),
            Err(e) => {
                tracing::debug!("{source}:{}: skipping row: {e}", line_no + 1);
                parsed.rejected_rows += 1;
            }
        }
    }

    Ok(parsed)
}
