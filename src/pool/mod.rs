mod error;
mod pool;
mod types;

pub use error::ConnectError;
pub use pool::ConnectionPool;
pub use types::RoundData;
