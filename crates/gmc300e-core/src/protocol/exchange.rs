//! Exchange engine
//!
//! One command exchange is: write the whole framed command, wait the fixed
//! settle delay, optionally query the line status, then perform exactly one
//! bounded read. Whatever that single read returns is the reply.

use std::io;
use std::time::Duration;

use tracing::debug;

use super::{ProtocolError, Result, Transport, READ_BUFFER_SIZE};

/// Write the full buffer, continuing after short writes
fn write_all<T: Transport + ?Sized>(transport: &mut T, data: &[u8]) -> io::Result<()> {
    let mut written = 0;
    while written < data.len() {
        match transport.write(&data[written..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "port accepted no bytes",
                ))
            }
            Ok(n) => {
                written += n;
                if written < data.len() {
                    debug!("short write: {} of {} bytes sent", written, data.len());
                }
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Run one write/settle/read exchange and return the bytes read.
///
/// A zero-byte read is not an error; it yields an empty reply. Any failure
/// of the write, the line-status query or the read aborts the exchange.
pub fn exchange<T: Transport + ?Sized>(
    transport: &mut T,
    wire: &str,
    settle: Duration,
    query_line_status: bool,
) -> Result<Vec<u8>> {
    let io_err = |source: io::Error| ProtocolError::Io {
        command: wire.to_string(),
        source,
    };

    debug!("Sending command {}", wire);
    write_all(transport, wire.as_bytes()).map_err(io_err)?;

    debug!(
        "Waiting {}ms before reading the {} response",
        settle.as_millis(),
        wire
    );
    std::thread::sleep(settle);

    if query_line_status {
        let status = transport.line_status().map_err(io_err)?;
        debug!("Serial line status: {:?}", status);
    }

    let mut buffer = [0u8; READ_BUFFER_SIZE];
    let n = transport.read(&mut buffer).map_err(io_err)?;
    debug!("{} bytes read from port", n);
    if n == 0 {
        debug!("End of stream detected");
    }

    let response = buffer[..n].to_vec();
    debug!(
        "Got {} bytes as response to {}: {:02x?}",
        response.len(),
        wire,
        response
    );
    Ok(response)
}
