//! Forecast lead selection and lead-time parsing.

use serde::{Deserialize, Serialize};

/// Which forecast leads contribute to a plot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadSelection {
    All,
    Hours(Vec<u32>),
}

impl LeadSelection {
    /// Build a selection from a configured list; an empty list means all leads.
    pub fn from_hours(hours: &[u32]) -> Self {
        if hours.is_empty() {
            LeadSelection::All
        } else {
            LeadSelection::Hours(hours.to_vec())
        }
    }

    pub fn contains(&self, lead_hours: u32) -> bool {
        match self {
            LeadSelection::All => true,
            LeadSelection::Hours(h) => h.contains(&lead_hours),
        }
    }

    /// Human-readable lead phrase for the third title line.
    pub fn display_string(&self) -> String {
        match self {
            LeadSelection::All => "All Forecast Hours".to_string(),
            LeadSelection::Hours(h) => match h.as_slice() {
                [] => "All Forecast Hours".to_string(),
                [single] => format!("Forecast Hour {single}"),
                many if many.len() <= 8 => {
                    let joined: Vec<String> = many.iter().map(|l| l.to_string()).collect();
                    format!("Forecast Hours {}", joined.join(", "))
                }
                many => format!(
                    "Forecast Hours {}\u{2013}{}",
                    many[0],
                    many[many.len() - 1]
                ),
            },
        }
    }

    /// Token used in output file names (empty for all leads).
    pub fn save_string(&self) -> String {
        match self {
            LeadSelection::All => String::new(),
            LeadSelection::Hours(h) => match h.as_slice() {
                [] => String::new(),
                many if many.len() <= 8 => many
                    .iter()
                    .map(|l| format!("f{l:03}"))
                    .collect::<Vec<_>>()
                    .join("_"),
                many => format!("f{:03}-f{:03}", many[0], many[many.len() - 1]),
            },
        }
    }
}

/// Parse a MET lead string (`HHMMSS` with any number of hour digits) to hours.
///
/// Minutes and seconds are discarded. Returns `None` for non-numeric input.
pub fn parse_lead_hours(s: &str) -> Option<u32> {
    let t = s.trim();
    if t.is_empty() || !t.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if t.len() <= 4 {
        return Some(0);
    }
    t[..t.len() - 4].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_strings() {
        assert_eq!(parse_lead_hours("240000"), Some(24));
        assert_eq!(parse_lead_hours("1200000"), Some(120));
        assert_eq!(parse_lead_hours("000000"), Some(0));
        assert_eq!(parse_lead_hours("3000"), Some(0));
        assert_eq!(parse_lead_hours("NA"), None);
    }

    #[test]
    fn single_and_short_lists() {
        let one = LeadSelection::from_hours(&[24]);
        assert_eq!(one.display_string(), "Forecast Hour 24");
        assert_eq!(one.save_string(), "f024");

        let two = LeadSelection::from_hours(&[24, 48]);
        assert_eq!(two.display_string(), "Forecast Hours 24, 48");
        assert_eq!(two.save_string(), "f024_f048");
    }

    #[test]
    fn long_lists_collapse_to_a_range() {
        let hours: Vec<u32> = (0..=10).map(|i| i * 24).collect();
        let sel = LeadSelection::from_hours(&hours);
        assert_eq!(sel.display_string(), "Forecast Hours 0\u{2013}240");
        assert_eq!(sel.save_string(), "f000-f240");
    }

    #[test]
    fn empty_means_all() {
        let sel = LeadSelection::from_hours(&[]);
        assert_eq!(sel, LeadSelection::All);
        assert!(sel.contains(999));
        assert_eq!(sel.save_string(), "");
    }
}
