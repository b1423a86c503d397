//! Response decoders
//!
//! Pure functions turning the raw bytes of one reply into typed values.
//!
//! An empty reply means "no data" and decodes to the zero value of the text and
//! integer shapes without an error. Integer decoders read the leading bytes
//! big-endian and ignore anything after them; a non-empty reply shorter than
//! the width is a [`ProtocolError::TruncatedResponse`]. The clock decoder
//! accepts exactly [`TIMESTAMP_LEN`] bytes.

use byteorder::{BigEndian, ByteOrder};
use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;

use super::{ProtocolError, ResponseShape, Result};

/// Length of a GETDATETIME reply
pub const TIMESTAMP_LEN: usize = 7;

/// Year the device's one-byte year counts from
pub const TIMESTAMP_BASE_YEAR: i32 = 2000;

/// A decoded reply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Reading {
    /// Text reply (version string, configuration blob)
    Text(String),
    /// Single-byte reply
    UInt8(u8),
    /// 16-bit reply (CPM/CPS family)
    UInt16(u16),
    /// 32-bit reply
    UInt32(u32),
    /// 64-bit reply
    UInt64(u64),
    /// Device clock, in the local timezone
    Timestamp(DateTime<Local>),
}

impl Reading {
    /// Get the reading as an unsigned integer, if it is one
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Reading::UInt8(v) => Some(*v as u64),
            Reading::UInt16(v) => Some(*v as u64),
            Reading::UInt32(v) => Some(*v as u64),
            Reading::UInt64(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the reading as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Reading::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Reading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reading::Text(s) => write!(f, "{:?}", s),
            Reading::UInt8(v) => write!(f, "{}", v),
            Reading::UInt16(v) => write!(f, "{}", v),
            Reading::UInt32(v) => write!(f, "{}", v),
            Reading::UInt64(v) => write!(f, "{}", v),
            Reading::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S %:z")),
        }
    }
}

/// Decode a reply according to the shape of the command that produced it
pub fn decode(shape: ResponseShape, raw: &[u8]) -> Result<Reading> {
    Ok(match shape {
        ResponseShape::Text => Reading::Text(decode_text(raw)),
        ResponseShape::UInt8 => Reading::UInt8(decode_u8(raw)?),
        ResponseShape::UInt16 => Reading::UInt16(decode_u16(raw)?),
        ResponseShape::UInt32 => Reading::UInt32(decode_u32(raw)?),
        ResponseShape::UInt64 => Reading::UInt64(decode_u64(raw)?),
        ResponseShape::Timestamp => Reading::Timestamp(decode_timestamp(raw)?),
    })
}

/// Interpret the bytes as text
pub fn decode_text(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// Fetch the leading `width` bytes, or `None` for an empty reply
fn leading(raw: &[u8], width: usize) -> Result<Option<&[u8]>> {
    if raw.is_empty() {
        return Ok(None);
    }
    if raw.len() < width {
        return Err(ProtocolError::TruncatedResponse {
            needed: width,
            actual: raw.len(),
        });
    }
    Ok(Some(&raw[..width]))
}

/// First byte as an unsigned integer
pub fn decode_u8(raw: &[u8]) -> Result<u8> {
    Ok(leading(raw, 1)?.map(|b| b[0]).unwrap_or(0))
}

/// First 2 bytes as a big-endian unsigned integer
pub fn decode_u16(raw: &[u8]) -> Result<u16> {
    Ok(leading(raw, 2)?.map(BigEndian::read_u16).unwrap_or(0))
}

/// First 4 bytes as a big-endian unsigned integer
pub fn decode_u32(raw: &[u8]) -> Result<u32> {
    Ok(leading(raw, 4)?.map(BigEndian::read_u32).unwrap_or(0))
}

/// First 8 bytes as a big-endian unsigned integer
pub fn decode_u64(raw: &[u8]) -> Result<u64> {
    Ok(leading(raw, 8)?.map(BigEndian::read_u64).unwrap_or(0))
}

/// Decode the 7-byte device clock into a local timestamp.
///
/// Layout: year-2000, month, day, hour, minute, second, unused.
/// A local time that occurs twice (DST fall-back) resolves to the earlier one.
pub fn decode_timestamp(raw: &[u8]) -> Result<DateTime<Local>> {
    if raw.len() != TIMESTAMP_LEN {
        return Err(ProtocolError::UnexpectedLength {
            expected: TIMESTAMP_LEN,
            actual: raw.len(),
        });
    }

    let year = TIMESTAMP_BASE_YEAR + raw[0] as i32;
    Local
        .with_ymd_and_hms(
            year,
            raw[1] as u32,
            raw[2] as u32,
            raw[3] as u32,
            raw[4] as u32,
            raw[5] as u32,
        )
        .earliest()
        .ok_or_else(|| ProtocolError::InvalidDateTime(raw.to_vec()))
}
