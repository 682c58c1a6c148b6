use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Channel closed: {0}")]
    Closed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Tag {0} cannot be encoded in this wire format")]
    TagUnencodable(usize),

    #[error("Certificate error: {0}")]
    CertificateError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<quinn::ConnectionError> for ChannelError {
    fn from(err: quinn::ConnectionError) -> Self {
        ChannelError::ConnectFailed(err.to_string())
    }
}

impl From<quinn::SendDatagramError> for ChannelError {
    fn from(err: quinn::SendDatagramError) -> Self {
        ChannelError::SendFailed(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ChannelError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ChannelError::SendFailed(err.to_string())
    }
}

pub type ChannelResult<T> = Result<T, ChannelError>;
