pub mod aggregator;
pub mod progress;
pub mod report;

pub use aggregator::{RoundStats, StatsAggregator, TerminationCounts};
pub use progress::{ProgressSnapshot, RunProgress};
pub use report::{ConsoleReporter, JsonReporter, ReportSink, RoundReport};
