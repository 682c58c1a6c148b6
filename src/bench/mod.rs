//! Round orchestration
//!
//! A [`Benchmarker`] owns the connection pool for one run and walks it
//! through ramp-up, dispatch and aggregation once per round. Connections are
//! always closed at the end, whether the run finished or failed.

mod error;
mod orchestrator;
mod types;

pub use error::{BenchError, BenchResult};
pub use orchestrator::Benchmarker;
pub use types::RunPhase;
