use thiserror::Error;

/// Failures surfaced by server setup and the event loop.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid listen address: {0}")]
    Addr(#[from] std::net::AddrParseError),

    #[error("configuration error: {0}")]
    Config(#[from] serde_yaml::Error),
}

/// Domain error raised by a route handler. Converted to a 500 response at
/// the dispatch boundary; the text is logged, never written to the client.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Source(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    pub fn msg(message: impl Into<String>) -> Self {
        HandlerError::Message(message.into())
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        HandlerError::Message(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        HandlerError::Message(message.to_string())
    }
}

/// Malformed or oversized inbound bytes. Fatal to the connection only.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing request line")]
    MissingRequestLine,

    #[error("malformed request line")]
    InvalidRequestLine,

    #[error("invalid chunk size")]
    InvalidChunkSize,

    #[error("request exceeds the {0} byte limit")]
    TooLarge(usize),
}
