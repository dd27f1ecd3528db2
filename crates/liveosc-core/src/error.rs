//! Error types for liveosc

use thiserror::Error;

/// Result type alias for liveosc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to Live or loading configuration
#[derive(Debug, Error)]
pub enum Error {
    /// Socket bind/send/receive failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// OSC packet could not be encoded
    #[error("OSC codec error: {0}")]
    Osc(#[from] rosc::OscError),

    /// An operation that needs the receive loop was called outside `Listening`
    #[error("Transport is not listening")]
    NotListening,

    /// `start()` was called on a transport that has already been stopped
    #[error("Transport was stopped and cannot be restarted; create a new one")]
    Restart,

    /// The transport shut down while a query was waiting for its reply
    #[error("Transport stopped while waiting for a reply to {0}")]
    Interrupted(String),

    /// A batch of one-way sends failed part way through
    #[error("Batch to {path} failed after {sent} of {total} messages: {source}")]
    Batch {
        path: String,
        sent: usize,
        total: usize,
        #[source]
        source: Box<Error>,
    },

    /// Invalid parameter supplied by a caller
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}
