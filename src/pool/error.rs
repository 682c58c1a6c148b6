use crate::channel::ChannelError;
use thiserror::Error;

/// A new connection could not be opened; fatal to the run
#[derive(Error, Debug)]
#[error("Connection {connection_id} failed to open: {source}")]
pub struct ConnectError {
    pub connection_id: usize,
    #[source]
    pub source: ChannelError,
}
