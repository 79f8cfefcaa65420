pub mod aggregate;
pub mod classify;
pub mod normalize;
pub mod tiers;
pub mod types;

pub use aggregate::Aggregator;
pub use tiers::TierTable;
pub use types::{CacheEntry, Snapshot};

pub const RAM_MB_PER_GB: f64 = 1024.0;
pub const RAM_GB_PER_TB: f64 = 1024.0;
pub const DISK_GB_PER_TB: f64 = 1000.0;

/// Inputs to aggregation that are configuration rather than feed data
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatsSettings {
    /// Owner address whose deployments are reported separately
    pub target_owner: String,
    pub tiers: TierTable,
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `part / whole * 100` rounded to two decimals, zero when `whole` is zero
pub(crate) fn percentage(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        round2(part / whole * 100.0)
    } else {
        0.0
    }
}
