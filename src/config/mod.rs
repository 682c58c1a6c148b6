pub mod cli;
pub mod error;
pub mod types;

pub use cli::{Cli, OutputFormat};
pub use error::{ConfigError, ConfigResult};
pub use types::{BenchConfig, TransportKind, DATAGRAM_MAX_REQUESTS, STAGNATION_WINDOW};
