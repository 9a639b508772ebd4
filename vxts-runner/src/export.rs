//! Table export: the pivot tables behind a plot as CSV, plus a JSON
//! manifest tying them to the image and the configuration that produced it.
//!
//! Files land next to the PNG and share its stem:
//! - `<stem>.<metric>.csv` for each plotted metric
//! - `<stem>.<metric>_ci_lo.csv` / `_ci_hi.csv` when intervals were computed
//! - `<stem>.counts.csv` with the aggregated sample counts
//! - `<stem>.manifest.json`

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::PlotConfig;
use crate::pivot::PivotTable;
use crate::timeseries::{PlotRequest, PreparedPlot};

/// Current manifest schema version.
pub const SCHEMA_VERSION: u32 = 1;

// ─── CSV export ─────────────────────────────────────────────────────

/// Export a pivot table as CSV: a `date` column followed by one column per
/// model. Missing values are empty cells.
pub fn pivot_csv(table: &PivotTable) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["date".to_string()];
    header.extend(table.models().iter().cloned());
    wtr.write_record(&header)?;

    for (row, date) in table.dates().iter().enumerate() {
        let mut record = vec![date.format("%Y-%m-%d %H:%M:%S").to_string()];
        for col in 0..table.models().len() {
            let v = table.get(row, col);
            record.push(if v.is_finite() {
                format!("{v:.6}")
            } else {
                String::new()
            });
        }
        wtr.write_record(&record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Manifest ───────────────────────────────────────────────────────

/// Describes one exported plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotManifest {
    pub schema_version: u32,
    pub image: String,
    /// BLAKE3 hex digest of the serialized configuration.
    pub config_hash: String,
    pub metric1: String,
    pub metric2: Option<String>,
    pub models: Vec<String>,
    pub variable: String,
    pub level: String,
    pub domain: String,
    pub date_type: String,
    pub start: String,
    pub end: String,
    pub equalized: bool,
    pub units: String,
    pub tables: Vec<String>,
}

/// Deterministic hash of a configuration.
pub fn config_hash(config: &PlotConfig) -> Result<String> {
    let json = serde_json::to_string(config).context("failed to serialize PlotConfig")?;
    Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
}

/// Parse a manifest, rejecting unknown schema versions.
pub fn import_manifest(json: &str) -> Result<PlotManifest> {
    let manifest: PlotManifest =
        serde_json::from_str(json).context("failed to deserialize PlotManifest")?;
    if manifest.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            manifest.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(manifest)
}

// ─── Artifact bundle ────────────────────────────────────────────────

fn stem_of(png: &Path) -> Result<(PathBuf, String)> {
    let dir = png
        .parent()
        .context("image path has no parent directory")?
        .to_path_buf();
    let stem = png
        .file_stem()
        .and_then(|s| s.to_str())
        .context("image path has no UTF-8 file stem")?
        .to_string();
    Ok((dir, stem))
}

/// Every table to export, keyed by file-name suffix.
fn named_tables(prepared: &PreparedPlot) -> Vec<(String, &PivotTable)> {
    let tables = &prepared.tables;
    let mut out = Vec::new();
    let m1 = prepared.metric1.name().to_lowercase();
    out.push((m1.clone(), &tables.metric1));
    if let Some((lo, hi)) = &tables.ci1 {
        out.push((format!("{m1}_ci_lo"), lo));
        out.push((format!("{m1}_ci_hi"), hi));
    }
    if let (Some(m2), Some(t2)) = (prepared.metric2, &tables.metric2) {
        let m2 = m2.name().to_lowercase();
        out.push((m2.clone(), t2));
        if let Some((lo, hi)) = &tables.ci2 {
            out.push((format!("{m2}_ci_lo"), lo));
            out.push((format!("{m2}_ci_hi"), hi));
        }
    }
    out.push(("counts".to_string(), &tables.counts));
    out
}

/// Write the tables of a saved plot and its manifest next to `png`.
///
/// Returns the manifest path.
pub fn export_tables(
    prepared: &PreparedPlot,
    request: &PlotRequest,
    config: &PlotConfig,
    png: &Path,
) -> Result<PathBuf> {
    let (dir, stem) = stem_of(png)?;

    let mut written = Vec::new();
    for (suffix, table) in named_tables(prepared) {
        let name = format!("{stem}.{suffix}.csv");
        let csv = pivot_csv(table).with_context(|| format!("failed to export {suffix} table"))?;
        std::fs::write(dir.join(&name), csv).with_context(|| format!("failed to write {name}"))?;
        written.push(name);
    }

    let manifest = PlotManifest {
        schema_version: SCHEMA_VERSION,
        image: png
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        config_hash: config_hash(config)?,
        metric1: prepared.metric1.name().to_string(),
        metric2: prepared.metric2.map(|m| m.name().to_string()),
        models: prepared.models.clone(),
        variable: request.variable.name.clone(),
        level: request.fcst_level.clone(),
        domain: request.vx_mask.clone(),
        date_type: request.date_type.as_str().to_string(),
        start: request.start.format("%Y%m%d").to_string(),
        end: request.end.format("%Y%m%d").to_string(),
        equalized: prepared.equalized,
        units: prepared.units.clone(),
        tables: written,
    };
    let json =
        serde_json::to_string_pretty(&manifest).context("failed to serialize PlotManifest")?;
    let path = dir.join(format!("{stem}.manifest.json"));
    std::fs::write(&path, json)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ts;

    fn table() -> PivotTable {
        let models = vec!["GFS".to_string(), "ECMWF".to_string()];
        PivotTable::from_triples(
            &models,
            [
                (ts("20240101_000000"), "GFS", 1.5),
                (ts("20240101_000000"), "ECMWF", 2.0),
                (ts("20240102_000000"), "GFS", -0.25),
            ],
        )
    }

    #[test]
    fn csv_has_header_and_blank_missing_cells() {
        let csv = pivot_csv(&table()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "date,GFS,ECMWF");
        assert_eq!(lines[1], "2024-01-01 00:00:00,1.500000,2.000000");
        assert_eq!(lines[2], "2024-01-02 00:00:00,-0.250000,");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn manifest_rejects_future_schema() {
        let manifest = PlotManifest {
            schema_version: SCHEMA_VERSION + 1,
            image: "x.png".into(),
            config_hash: String::new(),
            metric1: "ME".into(),
            metric2: None,
            models: vec![],
            variable: "HGT".into(),
            level: "P500".into(),
            domain: "G004/NHX".into(),
            date_type: "VALID".into(),
            start: "20240101".into(),
            end: "20240102".into(),
            equalized: true,
            units: "gpm".into(),
            tables: vec![],
        };
        let json = serde_json::to_string(&manifest).unwrap();
        assert!(import_manifest(&json).is_err());

        let current = PlotManifest {
            schema_version: SCHEMA_VERSION,
            ..manifest
        };
        let json = serde_json::to_string(&current).unwrap();
        assert_eq!(import_manifest(&json).unwrap(), current);
    }

    #[test]
    fn stem_and_dir_split() {
        let (dir, stem) = stem_of(Path::new("/out/sfc/test/me.hgt.png")).unwrap();
        assert_eq!(dir, Path::new("/out/sfc/test"));
        assert_eq!(stem, "me.hgt");
    }
}
