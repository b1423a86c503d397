//! # GMC-300E Core Library
//!
//! Client-side driver for GQ GMC-300E radiation monitors.

#![warn(missing_docs)]

//!
//! This library provides:
//! - Command framing for the device's `<KEYWORD>>` syntax
//! - A write, settle, read exchange over a single serial channel
//! - Decoders for text, big-endian integer and date-time replies
//! - A `Connector` facade with one getter per supported command
//!
//! ## Example
//!
//! ```rust,ignore
//! use gmc300e_core::protocol::{Connector, SessionConfig};
//!
//! let mut conn = Connector::new(SessionConfig::default());
//! conn.connect()?;
//!
//! println!("Version: {}", conn.get_ver()?);
//! println!("CPM: {}", conn.get_cpm()?);
//! println!("Clock: {}", conn.get_date_time()?);
//!
//! conn.disconnect();
//! ```

pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::protocol::{
        Command, ConnectionState, Connector, ProtocolError, Reading, SessionConfig, Transport,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
