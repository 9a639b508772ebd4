//! Domain types: statistics records, line types, thresholds, leads, levels.

pub mod date_type;
pub mod lead;
pub mod level;
pub mod line_type;
pub mod record;
pub mod threshold;

pub use date_type::{DateType, InvalidDateType};
pub use lead::{parse_lead_hours, LeadSelection};
pub use level::{level_info, LevelInfo};
pub use line_type::{LineType, UnknownLineType};
pub use record::{
    parse_met_timestamp, CtcCounts, NbrcntSums, PartialSums, RecordError, ScalarSums, StatRecord,
    VectorSums,
};
pub use threshold::{format_thresh, Threshold, ThresholdError, ThresholdOp};
