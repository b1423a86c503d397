//! Protocol errors

use thiserror::Error;

/// Result alias used throughout the protocol module
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors that can occur during protocol communication
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The transport could not be opened
    #[error("Failed to open port {port}: {source}")]
    ConnectionFailed {
        /// Port that failed to open
        port: String,
        /// Underlying serial error
        #[source]
        source: serialport::Error,
    },

    /// A command was issued while disconnected
    #[error("Not connected to device")]
    NotConnected,

    /// `connect` was called while connected
    #[error("Already connected")]
    AlreadyConnected,

    /// Write, read or line-status failure during an exchange
    #[error("I/O error while exchanging {command:?}: {source}")]
    Io {
        /// Framed command being exchanged
        command: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A reply did not have the exact length its decoder requires
    #[error("Unexpected response length: expected {expected}, got {actual}")]
    UnexpectedLength {
        /// Required length
        expected: usize,
        /// Length received
        actual: usize,
    },

    /// A non-empty reply was shorter than the integer width
    #[error("Truncated response: need at least {needed} bytes, got {actual}")]
    TruncatedResponse {
        /// Integer width in bytes
        needed: usize,
        /// Length received
        actual: usize,
    },

    /// The clock bytes do not name a valid local time
    #[error("Invalid date/time from device: {0:02x?}")]
    InvalidDateTime(Vec<u8>),

    /// A configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProtocolError {
    /// Whether this error came from the structure of a reply rather than the link
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            ProtocolError::UnexpectedLength { .. }
                | ProtocolError::TruncatedResponse { .. }
                | ProtocolError::InvalidDateTime(_)
        )
    }
}
