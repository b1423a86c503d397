//! Connection management
//!
//! Handles the session lifecycle and the named commands of the device.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use super::{
    commands::frame,
    decode::{self, Reading},
    exchange::exchange,
    serial::{list_ports, open_port, PortInfo, SerialTransport},
    Command, ProtocolError, Result, Transport, DEFAULT_BAUD_RATE, DEFAULT_PORT,
    DEFAULT_SETTLE_DELAY_MS, DEFAULT_TIMEOUT_MS,
};

/// Number of data bits per character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    /// 5 data bits
    Five,
    /// 6 data bits
    Six,
    /// 7 data bits
    Seven,
    /// 8 data bits
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = String;

    fn try_from(bits: u8) -> std::result::Result<Self, Self::Error> {
        match bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(format!("unsupported data bits: {}", other)),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Parity checking mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    /// No parity bit
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StopBits {
    /// One stop bit
    One,
    /// Two stop bits
    Two,
}

impl TryFrom<u8> for StopBits {
    type Error = String;

    fn try_from(bits: u8) -> std::result::Result<Self, Self::Error> {
        match bits {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            other => Err(format!("unsupported stop bits: {}", other)),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No port held
    Disconnected,
    /// Port open and ready for commands
    Connected,
}

/// Session configuration, fixed for the lifetime of a [`Connector`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Serial port name
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits per character
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Stop bits
    pub stop_bits: StopBits,
    /// Read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Write timeout in milliseconds
    pub write_timeout_ms: u64,
    /// Wait between writing a command and reading its reply, in milliseconds
    pub settle_delay_ms: u64,
    /// Query the line status bits before each read (diagnostic only)
    pub query_line_status: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout_ms: DEFAULT_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_TIMEOUT_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            query_line_status: true,
        }
    }
}

impl SessionConfig {
    /// Default configuration for the given port
    pub fn for_port(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ProtocolError::Config(e.to_string()))
    }

    /// Load a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ProtocolError::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| ProtocolError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Read timeout as a `Duration`
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Write timeout as a `Duration`
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Settle delay as a `Duration`
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

enum Session<T> {
    Disconnected,
    Connected(T),
}

/// Device connection.
///
/// Owns the transport while connected; the transport is released on
/// [`Connector::disconnect`] or when the connector is dropped.
pub struct Connector<T: Transport = SerialTransport> {
    /// Connection configuration
    config: SessionConfig,
    /// Current session, holding the transport when connected
    session: Session<T>,
}

impl Connector<SerialTransport> {
    /// Open the configured serial port
    pub fn connect(&mut self) -> Result<()> {
        self.connect_with(open_port)
    }

    /// List available serial ports
    pub fn list_ports() -> Vec<PortInfo> {
        list_ports()
    }
}

impl<T: Transport> Connector<T> {
    /// Create a new connector (not yet connected)
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            session: Session::Disconnected,
        }
    }

    /// Get the session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        match self.session {
            Session::Disconnected => ConnectionState::Disconnected,
            Session::Connected(_) => ConnectionState::Connected,
        }
    }

    /// Whether a transport is currently held
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Connect using a caller-supplied opener for the transport.
    ///
    /// On failure the connector stays disconnected and the opener's error is returned as is.
    pub fn connect_with<F>(&mut self, open: F) -> Result<()>
    where
        F: FnOnce(&SessionConfig) -> Result<T>,
    {
        if self.is_connected() {
            return Err(ProtocolError::AlreadyConnected);
        }

        let transport = open(&self.config)?;
        self.session = Session::Connected(transport);
        info!(
            "Connected to {} at {} baud",
            self.config.port, self.config.baud_rate
        );
        Ok(())
    }

    /// Release the transport. Safe to call when already disconnected.
    pub fn disconnect(&mut self) {
        if let Session::Connected(_) = std::mem::replace(&mut self.session, Session::Disconnected)
        {
            info!("Disconnected from {}", self.config.port);
        }
    }

    /// Exchange an already framed command and return the raw reply
    pub fn exchange(&mut self, wire: &str) -> Result<Vec<u8>> {
        let settle = self.config.settle_delay();
        let query_line_status = self.config.query_line_status;
        let transport = match &mut self.session {
            Session::Connected(transport) => transport,
            Session::Disconnected => return Err(ProtocolError::NotConnected),
        };
        exchange(transport, wire, settle, query_line_status)
    }

    /// Frame a bare keyword, send it and return the raw reply
    pub fn send_command(&mut self, keyword: &str) -> Result<Vec<u8>> {
        self.exchange(&frame(keyword))
    }

    /// Run a command and decode its reply in the shape paired with it
    pub fn query(&mut self, command: Command) -> Result<Reading> {
        let raw = self.send_command(command.keyword())?;
        let reading = decode::decode(command.response_shape(), &raw)?;
        debug!("{} -> {}", command, reading);
        Ok(reading)
    }

    fn request<V>(&mut self, command: Command, decoder: fn(&[u8]) -> Result<V>) -> Result<V> {
        let raw = self.send_command(command.keyword())?;
        decoder(&raw)
    }

    /// Firmware version string
    pub fn get_ver(&mut self) -> Result<String> {
        self.request(Command::GetVer, |raw| Ok(decode::decode_text(raw)))
    }

    /// Counts per minute
    pub fn get_cpm(&mut self) -> Result<u16> {
        self.request(Command::GetCpm, decode::decode_u16)
    }

    /// Counts per minute, low half
    pub fn get_cpml(&mut self) -> Result<u16> {
        self.request(Command::GetCpml, decode::decode_u16)
    }

    /// Counts per minute, high half
    pub fn get_cpmh(&mut self) -> Result<u16> {
        self.request(Command::GetCpmh, decode::decode_u16)
    }

    /// Counts per second
    pub fn get_cps(&mut self) -> Result<u16> {
        self.request(Command::GetCps, decode::decode_u16)
    }

    /// Counts per second, low half
    pub fn get_cpsl(&mut self) -> Result<u16> {
        self.request(Command::GetCpsl, decode::decode_u16)
    }

    /// Counts per second, high half
    pub fn get_cpsh(&mut self) -> Result<u16> {
        self.request(Command::GetCpsh, decode::decode_u16)
    }

    /// Configuration blob, as text
    pub fn get_cfg(&mut self) -> Result<String> {
        self.request(Command::GetCfg, |raw| Ok(decode::decode_text(raw)))
    }

    /// Device clock
    pub fn get_date_time(&mut self) -> Result<DateTime<Local>> {
        self.request(Command::GetDateTime, decode::decode_timestamp)
    }
}

impl<T: Transport> Drop for Connector<T> {
    fn drop(&mut self) {
        self.disconnect();
    }
}
