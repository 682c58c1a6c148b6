use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Connect(#[from] crate::pool::ConnectError),

    #[error("Benchmark already ran")]
    AlreadyRan,
}

pub type BenchResult<T> = Result<T, BenchError>;
