use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("Success ratio threshold must be within (0, 1], got {0}")]
    RatioOutOfRange(f64),

    #[error("Datagram frames carry a single-digit tag: at most {max} requests per connection, got {requested}")]
    TagOutOfRange { max: usize, requested: usize },

    #[error("Target address is empty")]
    EmptyTarget,
}

pub type ConfigResult<T> = Result<T, ConfigError>;
