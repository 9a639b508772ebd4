//! vxts core: domain types and statistics loading for verification time series.
//!
//! This crate holds everything that is independent of plotting:
//! - Statistics records with their MET line-type partial sums
//! - Thresholds, lead selections, level and date-type descriptions
//! - Parsers for `.stat` text and CSV tables, and a directory loader
//! - Deterministic bootstrap seeding

pub mod data;
pub mod domain;
pub mod rng;

pub use data::{load_stat_dir, DataError, DateWindow, LoadedStats, StatQuery};
pub use domain::{DateType, LeadSelection, LineType, PartialSums, StatRecord, Threshold};
pub use rng::BootstrapSeeds;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared with the parallel aggregation
    /// workers are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<StatRecord>();
        require_sync::<StatRecord>();
        require_send::<PartialSums>();
        require_sync::<PartialSums>();
        require_send::<Threshold>();
        require_sync::<Threshold>();
        require_send::<StatQuery>();
        require_sync::<StatQuery>();
        require_send::<BootstrapSeeds>();
        require_sync::<BootstrapSeeds>();
        require_send::<DataError>();
        require_sync::<DataError>();
    }
}
