//! Date × model tables with NaN for missing values.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use crate::aggregate::DateBin;

/// Values indexed by date (rows) and model (columns).
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    dates: Vec<NaiveDateTime>,
    models: Vec<String>,
    /// `values[row][col]`, NaN where missing.
    values: Vec<Vec<f64>>,
}

impl PivotTable {
    /// Build from `(date, model, value)` triples. Columns follow `models`;
    /// triples of other models are ignored and later duplicates win.
    pub fn from_triples<'a, I>(models: &[String], triples: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDateTime, &'a str, f64)>,
    {
        let triples: Vec<(NaiveDateTime, &str, f64)> = triples.into_iter().collect();
        let dates: Vec<NaiveDateTime> = triples
            .iter()
            .map(|(d, _, _)| *d)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut values = vec![vec![f64::NAN; models.len()]; dates.len()];
        for (date, model, value) in triples {
            let Some(col) = models.iter().position(|m| m == model) else {
                continue;
            };
            if let Ok(row) = dates.binary_search(&date) {
                values[row][col] = value;
            }
        }
        Self {
            dates,
            models: models.to_vec(),
            values,
        }
    }

    pub fn dates(&self) -> &[NaiveDateTime] {
        &self.dates
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .unwrap_or(f64::NAN)
    }

    /// Values of one model in date order; `None` for unknown models.
    pub fn column(&self, model: &str) -> Option<Vec<f64>> {
        let col = self.models.iter().position(|m| m == model)?;
        Some(self.values.iter().map(|r| r[col]).collect())
    }

    /// NaN-skipping mean of every row (NaN when a row has no value).
    pub fn row_means(&self) -> Vec<f64> {
        self.values.iter().map(|r| nan_mean(r)).collect()
    }

    pub fn is_all_nan(&self) -> bool {
        self.values.iter().flatten().all(|v| v.is_nan())
    }

    /// Lay the table onto `axis`; dates not in the table become NaN rows and
    /// table dates not on the axis are dropped.
    pub fn reindex(&self, axis: &[NaiveDateTime]) -> Self {
        let values = axis
            .iter()
            .map(|d| match self.dates.binary_search(d) {
                Ok(row) => self.values[row].clone(),
                Err(_) => vec![f64::NAN; self.models.len()],
            })
            .collect();
        Self {
            dates: axis.to_vec(),
            models: self.models.clone(),
            values,
        }
    }

    /// Keep only rows whose date is in `keep`.
    pub fn retain_dates(&mut self, keep: &BTreeSet<NaiveDateTime>) {
        let mut dates = Vec::with_capacity(self.dates.len());
        let mut values = Vec::with_capacity(self.values.len());
        for (d, row) in self.dates.drain(..).zip(self.values.drain(..)) {
            if keep.contains(&d) {
                dates.push(d);
                values.push(row);
            }
        }
        self.dates = dates;
        self.values = values;
    }

    /// Dates with at least one finite value.
    pub fn populated_dates(&self) -> BTreeSet<NaiveDateTime> {
        self.dates
            .iter()
            .zip(&self.values)
            .filter(|(_, r)| r.iter().any(|v| v.is_finite()))
            .map(|(d, _)| *d)
            .collect()
    }

    /// Trailing running mean over `window` points per column; a point needs
    /// at least one finite value in its window.
    pub fn running_mean(&self, window: usize) -> Self {
        if window <= 1 {
            return self.clone();
        }
        let mut values = vec![vec![f64::NAN; self.models.len()]; self.dates.len()];
        for col in 0..self.models.len() {
            for row in 0..self.dates.len() {
                let start = (row + 1).saturating_sub(window);
                let slice: Vec<f64> = (start..=row).map(|r| self.values[r][col]).collect();
                values[row][col] = nan_mean(&slice);
            }
        }
        Self {
            dates: self.dates.clone(),
            models: self.models.clone(),
            values,
        }
    }
}

/// Mean of the finite values; NaN when there are none.
pub fn nan_mean(values: &[f64]) -> f64 {
    let (sum, n) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Dates common to every set.
pub fn intersect_dates<'a, I>(sets: I) -> BTreeSet<NaiveDateTime>
where
    I: IntoIterator<Item = &'a BTreeSet<NaiveDateTime>>,
{
    let mut iter = sets.into_iter();
    let Some(first) = iter.next() else {
        return BTreeSet::new();
    };
    iter.fold(first.clone(), |acc, s| acc.intersection(s).copied().collect())
}

/// Every plotted date between `start` and `end` (inclusive days).
///
/// Without binning: each day at each of `hours` (all 24 when empty). With
/// binning: the start of every day, month, or year bin in the range.
pub fn full_date_axis(start: NaiveDate, end: NaiveDate, hours: &[u32], bin: DateBin) -> Vec<NaiveDateTime> {
    let mut out = Vec::new();
    if end < start {
        return out;
    }
    let midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0);
    match bin {
        DateBin::None => {
            let mut hours: Vec<u32> = if hours.is_empty() {
                (0..24).collect()
            } else {
                hours.iter().copied().filter(|h| *h < 24).collect()
            };
            hours.sort_unstable();
            hours.dedup();
            let mut day = start;
            while day <= end {
                out.extend(hours.iter().filter_map(|h| day.and_hms_opt(*h, 0, 0)));
                day += Duration::days(1);
            }
        }
        DateBin::Day => {
            let mut day = start;
            while day <= end {
                out.extend(midnight(day));
                day += Duration::days(1);
            }
        }
        DateBin::Month => {
            let (mut y, mut m) = (start.year(), start.month());
            while (y, m) <= (end.year(), end.month()) {
                out.extend(NaiveDate::from_ymd_opt(y, m, 1).and_then(midnight));
                if m == 12 {
                    y += 1;
                    m = 1;
                } else {
                    m += 1;
                }
            }
        }
        DateBin::Year => {
            for y in start.year()..=end.year() {
                out.extend(NaiveDate::from_ymd_opt(y, 1, 1).and_then(midnight));
            }
        }
    }
    out
}
