use std::error;
use std::fmt;
use std::io;

/// Crate-wide error taxonomy (see design notes for the policy each variant implies).
#[derive(Debug)]
pub enum PipelineError {
    /// Transient failure talking to a durable medium (disk, socket). Retryable.
    Io(String),
    /// A single record couldn't be parsed; the caller skips it and continues.
    Parse(String),
    /// An address wasn't a valid IPv4 address where one was required.
    InvalidAddress(String),
    /// The component has already been shut down; further calls are a programming error.
    Closed,
    /// The upstream feed sent something that violates the expected protocol.
    UpstreamProtocol(String),
    /// Unrecoverable at startup; the only variant the supervisor treats as fatal.
    Config(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use PipelineError::*;
        match self {
            Io(reason) => write!(f, "I/O error: {}", reason),
            Parse(reason) => write!(f, "Parse error: {}", reason),
            InvalidAddress(reason) => write!(f, "Invalid address: {}", reason),
            Closed => write!(f, "Store is closed"),
            UpstreamProtocol(reason) => write!(f, "Upstream protocol error: {}", reason),
            Config(reason) => write!(f, "Config error: {}", reason),
        }
    }
}

impl error::Error for PipelineError {}

impl From<io::Error> for PipelineError {
    fn from(error: io::Error) -> Self {
        PipelineError::Io(error.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(error: serde_json::Error) -> Self {
        PipelineError::Parse(error.to_string())
    }
}

impl From<sled::Error> for PipelineError {
    fn from(error: sled::Error) -> Self {
        PipelineError::Io(error.to_string())
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(error: toml::de::Error) -> Self {
        PipelineError::Config(error.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for PipelineError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        PipelineError::UpstreamProtocol(error.to_string())
    }
}

impl From<maxminddb::MaxMindDBError> for PipelineError {
    fn from(error: maxminddb::MaxMindDBError) -> Self {
        PipelineError::Config(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
