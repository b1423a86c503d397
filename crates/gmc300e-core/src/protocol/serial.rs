//! Serial port handling
//!
//! Provides the byte channel the exchange runs over, plus port discovery.

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::io;

use super::{ProtocolError, Result, SessionConfig};

/// Byte channel to the device.
///
/// `write` and `read` follow `std::io` semantics: a write may accept fewer
/// bytes than offered and a read may return zero bytes.
pub trait Transport {
    /// Write some prefix of `buf`, returning how many bytes were accepted
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Read up to `buf.len()` bytes in one call
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Query the modem/line status bits
    fn line_status(&mut self) -> io::Result<LineStatus>;
}

/// Transport backed by an open `serialport` handle
pub type SerialTransport = Box<dyn SerialPort>;

impl Transport for Box<dyn SerialPort> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut **self, buf)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut **self, buf)
    }

    fn line_status(&mut self) -> io::Result<LineStatus> {
        Ok(LineStatus {
            cts: self.read_clear_to_send()?,
            dsr: self.read_data_set_ready()?,
            ri: self.read_ring_indicator()?,
            dcd: self.read_carrier_detect()?,
        })
    }
}

/// Modem status lines as reported by the port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineStatus {
    /// Clear To Send
    pub cts: bool,
    /// Data Set Ready
    pub dsr: bool,
    /// Ring Indicator
    pub ri: bool,
    /// Data Carrier Detect
    pub dcd: bool,
}

/// Open the port named in `config` with its line settings.
///
/// `serialport` keeps a single timeout for reads and writes, so the longer of
/// the two configured timeouts is applied.
pub fn open_port(config: &SessionConfig) -> Result<SerialTransport> {
    serialport::new(config.port.as_str(), config.baud_rate)
        .data_bits(config.data_bits.into())
        .parity(config.parity.into())
        .stop_bits(config.stop_bits.into())
        .flow_control(serialport::FlowControl::None)
        .timeout(config.read_timeout().max(config.write_timeout()))
        .open()
        .map_err(|source| ProtocolError::ConnectionFailed {
            port: config.port.clone(),
            source,
        })
}

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Manufacturer name (if available)
    pub manufacturer: Option<String>,

    /// Product name (if available)
    pub product: Option<String>,

    /// Serial number (if available)
    pub serial_number: Option<String>,
}

impl PortInfo {
    fn bare(name: String) -> Self {
        Self {
            name,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
            serial_number: None,
        }
    }

    /// Whether the port was reported as USB-attached
    pub fn is_usb(&self) -> bool {
        self.vid.is_some()
    }

    /// USB id as `VVVV:PPPP`, if USB-attached
    pub fn usb_id(&self) -> Option<String> {
        match (self.vid, self.pid) {
            (Some(vid), Some(pid)) => Some(format!("{:04x}:{:04x}", vid, pid)),
            _ => None,
        }
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb_info) => Self {
                name: info.port_name,
                vid: Some(usb_info.vid),
                pid: Some(usb_info.pid),
                manufacturer: usb_info.manufacturer,
                product: usb_info.product,
                serial_number: usb_info.serial_number,
            },
            _ => Self::bare(info.port_name),
        }
    }
}

/// Sort key placing ttyUSB* first (numeric suffix order), then ttyACM*, then the rest by name
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    if let Some(rest) = basename.strip_prefix("ttyUSB") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (0, num, basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyACM") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (1, num, basename.to_string());
    }
    (2, 0, basename.to_string())
}

/// List all available serial ports, with /dev fallbacks and deterministic ordering
pub fn list_ports() -> Vec<PortInfo> {
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    match serialport::available_ports() {
        Ok(ports) => {
            for info in ports {
                let p = PortInfo::from(info);
                map.entry(p.name.clone()).or_insert(p);
            }
        }
        Err(e) => tracing::warn!("Port enumeration failed: {}", e),
    }

    // USB serial adapters sometimes don't show up through the API on Linux
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyUSB") || fname.starts_with("ttyACM") {
                    let full = format!("/dev/{}", fname);
                    map.entry(full.clone())
                        .or_insert_with(|| PortInfo::bare(full));
                }
            }
        }
    }

    let mut v: Vec<PortInfo> = map.into_values().collect();
    v.sort_by_key(|p| port_sort_key(&p.name));
    tracing::debug!("Enumerated {} serial ports", v.len());
    v
}
