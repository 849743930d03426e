mod int_histogram;
mod string_histogram;
mod table_stats;

pub use int_histogram::IntHistogram;
pub use string_histogram::StringHistogram;
pub use table_stats::{compute_statistics, StatsMap, TableStats};

/// Buckets per column histogram. Estimates assume at least 100.
pub const NUM_HIST_BINS: usize = 100;

/// Cost unit charged per page read by the scan cost model.
pub const IO_COST_PER_PAGE: u64 = 1000;
