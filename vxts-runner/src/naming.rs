//! Output file names and directories.
//!
//! Layout: `save_dir/<plot_group>/<period>/<name>.png`, where `<name>` is
//!
//! ```text
//! [header.]m1[_m2][_thresh][_width].var[_level].period.timeseries_<datetype><hours>[_lead].domain
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use thiserror::Error;

use vxts_core::domain::DateType;

use crate::metrics::Metric;

#[derive(Debug, Error)]
pub enum NamingError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Period token: `YYYYMMDD-YYYYMMDD` for `TEST`, else the period name.
pub fn period_token(eval_period: &str, start: NaiveDate, end: NaiveDate) -> String {
    if eval_period.eq_ignore_ascii_case("TEST") {
        format!("{}-{}", start.format("%Y%m%d"), end.format("%Y%m%d"))
    } else {
        eval_period.to_lowercase()
    }
}

/// Hours token: `00z_12z` for up to eight hours, else `first-last`.
pub fn date_hours_token(hours: &[u32]) -> String {
    let fmt = |h: &u32| format!("{h:02}z");
    match hours {
        [] => String::new(),
        [first, .., last] if hours.len() > 8 => format!("{}-{}", fmt(first), fmt(last)),
        _ => hours.iter().map(fmt).collect::<Vec<_>>().join("_"),
    }
}

/// Inputs for a plot's file name.
#[derive(Debug, Clone)]
pub struct SaveNameParts<'a> {
    pub header: &'a str,
    pub metric1: Metric,
    pub metric2: Option<Metric>,
    /// Threshold token, e.g. `ge2p54ge25p4`.
    pub thresh: Option<&'a str>,
    /// Width token, e.g. `width3`.
    pub width: &'a str,
    pub var: &'a str,
    pub level: &'a str,
    pub eval_period: &'a str,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub date_type: DateType,
    pub date_hours: &'a [u32],
    /// Lead token, e.g. `f024`.
    pub lead: &'a str,
    pub domain: &'a str,
}

impl SaveNameParts<'_> {
    pub fn period(&self) -> String {
        period_token(self.eval_period, self.start, self.end)
    }

    /// File stem without extension.
    pub fn stem(&self) -> String {
        let mut name = self.metric1.name().to_string();
        if let Some(m2) = self.metric2 {
            name.push('_');
            name.push_str(m2.name());
        }
        for token in [self.thresh.unwrap_or(""), self.width] {
            if !token.is_empty() {
                name.push('_');
                name.push_str(token);
            }
        }
        name.push('.');
        name.push_str(self.var);
        if !self.level.is_empty() {
            name.push('_');
            name.push_str(self.level);
        }

        let plot_info: Vec<String> = [
            "timeseries".to_string(),
            format!("{}{}", self.date_type.as_str(), date_hours_token(self.date_hours)),
            self.lead.to_string(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();

        let name = format!(
            "{name}.{}.{}.{}",
            self.period(),
            plot_info.join("_"),
            self.domain
        )
        .to_lowercase();
        if self.header.is_empty() {
            name
        } else {
            format!("{}.{name}", self.header)
        }
    }
}

/// Where one plot is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTarget {
    /// `<plot_group>/<period>`, relative to the save root.
    pub relative_dir: PathBuf,
    pub file_name: String,
}

impl SaveTarget {
    pub fn new(plot_group: &str, parts: &SaveNameParts<'_>) -> Self {
        Self {
            relative_dir: Path::new(&plot_group.to_lowercase()).join(parts.period()),
            file_name: format!("{}.png", parts.stem()),
        }
    }

    /// Full path under `root`.
    pub fn path_under(&self, root: &Path) -> PathBuf {
        root.join(&self.relative_dir).join(&self.file_name)
    }

    /// Create the target directory under `root` and return the file path.
    pub fn prepare(&self, root: &Path) -> Result<PathBuf, NamingError> {
        let dir = root.join(&self.relative_dir);
        fs::create_dir_all(&dir).map_err(|source| NamingError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(dir.join(&self.file_name))
    }

    /// Copy a saved plot to the same relative location under `restart_dir`.
    pub fn copy_to_restart(&self, saved: &Path, restart_dir: &Path) -> Result<PathBuf, NamingError> {
        let dest = self.prepare(restart_dir)?;
        fs::copy(saved, &dest).map_err(|source| NamingError::Copy {
            from: saved.to_path_buf(),
            to: dest.clone(),
            source,
        })?;
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts<'a>() -> SaveNameParts<'a> {
        SaveNameParts {
            header: "",
            metric1: Metric::Bcrmse,
            metric2: Some(Metric::Me),
            thresh: None,
            width: "",
            var: "HGT",
            level: "500mb",
            eval_period: "TEST",
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            date_type: DateType::Valid,
            date_hours: &[0, 12],
            lead: "f024",
            domain: "g004_nhx",
        }
    }

    #[test]
    fn hours_tokens() {
        assert_eq!(date_hours_token(&[0, 12]), "00z_12z");
        assert_eq!(date_hours_token(&[0, 3, 6, 9, 12, 15, 18, 21, 22]), "00z-22z");
        assert_eq!(date_hours_token(&[]), "");
    }

    #[test]
    fn period_tokens() {
        let p = parts();
        assert_eq!(p.period(), "20240101-20240131");
        assert_eq!(period_token("LAST31DAYS", p.start, p.end), "last31days");
    }

    #[test]
    fn full_stem() {
        assert_eq!(
            parts().stem(),
            "bcrmse_me.hgt_500mb.20240101-20240131.timeseries_valid00z_12z_f024.g004_nhx"
        );
    }

    #[test]
    fn optional_tokens() {
        let mut p = parts();
        p.header = "EVS";
        p.metric2 = None;
        p.thresh = Some("ge2p54");
        p.width = "width3";
        p.level = "";
        p.lead = "";
        assert_eq!(
            p.stem(),
            "EVS.bcrmse_ge2p54_width3.hgt.20240101-20240131.timeseries_valid00z_12z.g004_nhx"
        );
    }

    #[test]
    fn target_layout() {
        let t = SaveTarget::new("SFC_Upper", &parts());
        assert_eq!(t.relative_dir, Path::new("sfc_upper").join("20240101-20240131"));
        assert!(t.file_name.ends_with(".g004_nhx.png"));
        let p = t.path_under(Path::new("/out"));
        assert!(p.starts_with("/out/sfc_upper"));
    }

    #[test]
    fn restart_copy_mirrors_relative_path() {
        let save = tempfile::tempdir().unwrap();
        let restart = tempfile::tempdir().unwrap();
        let t = SaveTarget::new("sfc_upper", &parts());

        let saved = t.prepare(save.path()).unwrap();
        fs::write(&saved, b"png").unwrap();
        let copied = t.copy_to_restart(&saved, &restart.path().join("missing")).unwrap();

        assert_eq!(copied, t.path_under(&restart.path().join("missing")));
        assert_eq!(fs::read(copied).unwrap(), b"png");
    }
}
