//! Comma-separated statistics tables.
//!
//! Exported or pruned tables name every column in their header row, both the
//! MET header columns and the line-type columns, so rows are read by name.

use std::collections::HashMap;
use std::io::Read;

use super::stat_file::ParsedStats;
use super::DataError;
use crate::domain::{LineType, StatRecord};

/// Parse a CSV table, keeping rows of `line_type`.
pub fn parse_csv_table<R: Read>(
    reader: R,
    line_type: LineType,
    source: &str,
) -> Result<ParsedStats, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().map_err(|e| DataError::Csv {
        path: source.to_string(),
        source: e,
    })?;
    let index: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.to_ascii_uppercase(), i))
        .collect();
    let lt_col = *index
        .get("LINE_TYPE")
        .ok_or_else(|| DataError::MalformedHeader {
            path: source.to_string(),
            reason: "no LINE_TYPE column".into(),
        })?;

    let mut parsed = ParsedStats::default();
    for (row_no, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| DataError::Csv {
            path: source.to_string(),
            source: e,
        })?;
        match record.get(lt_col) {
            Some(lt) if lt.eq_ignore_ascii_case(line_type.as_str()) => {}
            _ => continue,
        }

        let get = |name: &str| index.get(name).and_then(|&i| record.get(i));
        match StatRecord::from_columns(line_type, get) {
            Ok(rec) => parsed.records.push(rec),
            Err(e) => {
                tracing::debug!("{source}: row {}: skipping: {e}", row_no + 2);
                parsed.rejected_rows += 1;
            }
        }
    }

    Ok(parsed)
}
