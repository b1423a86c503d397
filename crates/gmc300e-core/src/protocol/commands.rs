//! Protocol commands
//!
//! Defines the commands supported by the GMC-300E and how they are framed.

use serde::{Deserialize, Serialize};

/// Opening delimiter of a framed command
pub const FRAME_START: &str = "<";

/// Closing delimiter of a framed command.
/// The firmware expects the closing character twice.
pub const FRAME_END: &str = ">>";

/// Wrap a bare keyword into the device's on-wire command syntax.
///
/// No escaping or validation is applied: `frame("GETCPM") == "<GETCPM>>"`.
pub fn frame(keyword: &str) -> String {
    let mut wire = String::with_capacity(FRAME_START.len() + keyword.len() + FRAME_END.len());
    wire.push_str(FRAME_START);
    wire.push_str(keyword);
    wire.push_str(FRAME_END);
    wire
}

/// Shape of the reply a command produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseShape {
    /// Bytes interpreted verbatim as text
    Text,
    /// First byte as an unsigned integer
    UInt8,
    /// First 2 bytes, big-endian
    UInt16,
    /// First 4 bytes, big-endian
    UInt32,
    /// First 8 bytes, big-endian
    UInt64,
    /// Exactly 7 bytes: YY MM DD hh mm ss + one unused byte
    Timestamp,
}

/// Protocol commands for device communication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Firmware version string ('GETVER')
    GetVer,

    /// Counts per minute ('GETCPM')
    GetCpm,

    /// Counts per minute, low half ('GETCPML')
    GetCpml,

    /// Counts per minute, high half ('GETCPMH')
    GetCpmh,

    /// Counts per second ('GETCPS')
    GetCps,

    /// Counts per second, low half ('GETCPSL')
    GetCpsl,

    /// Counts per second, high half ('GETCPSH')
    GetCpsh,

    /// Configuration blob ('GETCFG')
    GetCfg,

    /// Device clock ('GETDATETIME')
    GetDateTime,
}

impl Command {
    /// Every supported command, in the order the reader runs them
    pub const ALL: [Command; 9] = [
        Command::GetVer,
        Command::GetCpm,
        Command::GetCpml,
        Command::GetCpmh,
        Command::GetCps,
        Command::GetCpsl,
        Command::GetCpsh,
        Command::GetCfg,
        Command::GetDateTime,
    ];

    /// Get the bare keyword sent inside the frame
    pub fn keyword(&self) -> &'static str {
        match self {
            Command::GetVer => "GETVER",
            Command::GetCpm => "GETCPM",
            Command::GetCpml => "GETCPML",
            Command::GetCpmh => "GETCPMH",
            Command::GetCps => "GETCPS",
            Command::GetCpsl => "GETCPSL",
            Command::GetCpsh => "GETCPSH",
            Command::GetCfg => "GETCFG",
            Command::GetDateTime => "GETDATETIME",
        }
    }

    /// Get the framed command as written to the port
    pub fn wire(&self) -> String {
        frame(self.keyword())
    }

    /// Get the shape of the reply this command produces
    pub fn response_shape(&self) -> ResponseShape {
        match self {
            Command::GetVer | Command::GetCfg => ResponseShape::Text,
            Command::GetCpm
            | Command::GetCpml
            | Command::GetCpmh
            | Command::GetCps
            | Command::GetCpsl
            | Command::GetCpsh => ResponseShape::UInt16,
            Command::GetDateTime => ResponseShape::Timestamp,
        }
    }

    /// Look up a command by its keyword (case-insensitive)
    pub fn from_keyword(keyword: &str) -> Option<Command> {
        Command::ALL
            .into_iter()
            .find(|cmd| cmd.keyword().eq_ignore_ascii_case(keyword))
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}
