//! Serial Protocol Communication
//!
//! Implements the GMC-300E ASCII command protocol.
//!
//! Commands are sent as `<KEYWORD>>` and answered with raw bytes whose shape
//! depends on the command (text, big-endian integers or a 7-byte clock).

pub mod commands;
mod connection;
pub mod decode;
mod error;
pub mod exchange;
pub mod serial;

pub use commands::{frame, Command, ResponseShape};
pub use connection::{
    ConnectionState, Connector, DataBits, Parity, SessionConfig, StopBits,
};
pub use decode::Reading;
pub use error::{ProtocolError, Result};
pub use exchange::exchange;
pub use serial::{list_ports, open_port, LineStatus, PortInfo, SerialTransport, Transport};

/// Default port path of the reference deployment
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Default baud rate for GMC-300E communication
pub const DEFAULT_BAUD_RATE: u32 = 57600;

/// Default read/write timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Default wait between sending a command and reading its reply, in milliseconds.
/// The firmware needs this quiet interval before the reply is ready.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 500;

/// Capacity of the single bounded read performed per exchange
pub const READ_BUFFER_SIZE: usize = 1024;
