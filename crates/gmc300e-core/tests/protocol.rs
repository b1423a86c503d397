use gmc300e_core::protocol::{
    exchange, Command, ConnectionState, Connector, LineStatus, ProtocolError, Reading,
    SessionConfig, Transport,
};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const SETTLE_MS: u64 = 30;

/// What the mock port observed, shared with the test after the connector takes ownership
#[derive(Default)]
struct Wire {
    written: Vec<u8>,
    write_calls: usize,
    last_write_at: Option<Instant>,
    read_at: Option<Instant>,
    reads: usize,
    status_queries: usize,
    closed: usize,
}

/// Mock serial port for testing
struct MockSerial {
    wire: Arc<Mutex<Wire>>,
    recv_buffer: Vec<u8>,
    recv_idx: usize,
    max_chunk: Option<usize>,
    fail_on_send: bool,
    interrupt_on_send: bool,
    fail_on_status: bool,
    fail_on_read: bool,
}

impl MockSerial {
    fn with_response(response: &[u8]) -> (Self, Arc<Mutex<Wire>>) {
        let wire = Arc::new(Mutex::new(Wire::default()));
        let mock = Self {
            wire: Arc::clone(&wire),
            recv_buffer: response.to_vec(),
            recv_idx: 0,
            max_chunk: None,
            fail_on_send: false,
            interrupt_on_send: false,
            fail_on_status: false,
            fail_on_read: false,
        };
        (mock, wire)
    }
}

impl Transport for MockSerial {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut wire = self.wire.lock().unwrap();
        wire.write_calls += 1;
        if self.fail_on_send {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "Serial write failed"));
        }
        if self.interrupt_on_send {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "signal during write"));
        }
        let n = self.max_chunk.map_or(buf.len(), |max| max.min(buf.len()));
        wire.written.extend_from_slice(&buf[..n]);
        wire.last_write_at = Some(Instant::now());
        Ok(n)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut wire = self.wire.lock().unwrap();
        wire.reads += 1;
        wire.read_at = Some(Instant::now());
        if self.fail_on_read {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "Operation timed out"));
        }
        let remaining = &self.recv_buffer[self.recv_idx..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.recv_idx += n;
        Ok(n)
    }

    fn line_status(&mut self) -> io::Result<LineStatus> {
        self.wire.lock().unwrap().status_queries += 1;
        if self.fail_on_status {
            return Err(io::Error::new(io::ErrorKind::Other, "ioctl failed"));
        }
        Ok(LineStatus {
            cts: true,
            dsr: true,
            ..LineStatus::default()
        })
    }
}

impl Drop for MockSerial {
    fn drop(&mut self) {
        self.wire.lock().unwrap().closed += 1;
    }
}

/// Route the exchange's debug logging into the test output
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn test_config() -> SessionConfig {
    SessionConfig {
        settle_delay_ms: SETTLE_MS,
        ..SessionConfig::default()
    }
}

fn connected(mock: MockSerial) -> Connector<MockSerial> {
    init_tracing();
    let mut conn = Connector::new(test_config());
    conn.connect_with(|_| Ok(mock)).unwrap();
    conn
}

#[test]
fn test_exchange_returns_exactly_the_bytes_read() {
    let reply = [0xDE, 0xAD, 0xBE, 0xEF, 0x01];
    let (mut mock, wire) = MockSerial::with_response(&reply);

    let raw = exchange(
        &mut mock,
        "<GETCPM>>",
        Duration::from_millis(SETTLE_MS),
        true,
    )
    .unwrap();

    assert_eq!(raw, reply.to_vec());
    let wire = wire.lock().unwrap();
    assert_eq!(wire.written, b"<GETCPM>>".to_vec());
    assert_eq!(wire.reads, 1);
    assert_eq!(wire.status_queries, 1);
}

#[test]
fn test_read_happens_after_settle_delay() {
    let (mock, wire) = MockSerial::with_response(&[0x00, 0x01]);
    let mut conn = connected(mock);

    conn.get_cps().unwrap();

    let wire = wire.lock().unwrap();
    let gap = wire
        .read_at
        .unwrap()
        .duration_since(wire.last_write_at.unwrap());
    assert!(
        gap >= Duration::from_millis(SETTLE_MS),
        "read issued {:?} after write",
        gap
    );
}

#[test]
fn test_single_bounded_read() {
    let reply = vec![b'x'; 2000];
    let (mock, wire) = MockSerial::with_response(&reply);
    let mut conn = connected(mock);

    let raw = conn.send_command("GETCFG").unwrap();

    assert_eq!(raw.len(), 1024);
    assert_eq!(wire.lock().unwrap().reads, 1);
}

#[test]
fn test_short_writes_are_continued() {
    let (mut mock, wire) = MockSerial::with_response(&[0x00, 0x0F]);
    mock.max_chunk = Some(4);
    let mut conn = connected(mock);

    assert_eq!(conn.get_cpm().unwrap(), 15);

    let wire = wire.lock().unwrap();
    assert_eq!(wire.written, b"<GETCPM>>".to_vec());
    assert_eq!(wire.write_calls, 3);
    let gap = wire
        .read_at
        .unwrap()
        .duration_since(wire.last_write_at.unwrap());
    assert!(gap >= Duration::from_millis(SETTLE_MS));
}

#[test]
fn test_write_failure_aborts_exchange() {
    let (mut mock, wire) = MockSerial::with_response(&[0x00, 0x0F]);
    mock.fail_on_send = true;
    let mut conn = connected(mock);

    match conn.get_cpm() {
        Err(ProtocolError::Io { command, source }) => {
            assert_eq!(command, "<GETCPM>>");
            assert_eq!(source.kind(), io::ErrorKind::BrokenPipe);
        }
        other => panic!("expected Io error, got {:?}", other),
    }
    let wire = wire.lock().unwrap();
    assert_eq!(wire.reads, 0);
    assert_eq!(wire.status_queries, 0);
}

#[test]
fn test_interrupted_write_aborts_exchange() {
    let (mut mock, wire) = MockSerial::with_response(&[0x00, 0x0F]);
    mock.interrupt_on_send = true;
    let mut conn = connected(mock);

    match conn.get_cpm() {
        Err(ProtocolError::Io { command, source }) => {
            assert_eq!(command, "<GETCPM>>");
            assert_eq!(source.kind(), io::ErrorKind::Interrupted);
        }
        other => panic!("expected Io error, got {:?}", other),
    }
    let wire = wire.lock().unwrap();
    assert_eq!(wire.write_calls, 1);
    assert_eq!(wire.reads, 0);
}

#[test]
fn test_line_status_failure_aborts_exchange() {
    let (mut mock, wire) = MockSerial::with_response(b"GMC-300Re 4.20");
    mock.fail_on_status = true;
    let mut conn = connected(mock);

    let err = conn.get_ver().unwrap_err();
    assert!(matches!(err, ProtocolError::Io { .. }));
    assert_eq!(wire.lock().unwrap().reads, 0);
}

#[test]
fn test_line_status_query_can_be_disabled() {
    let (mock, wire) = MockSerial::with_response(b"GMC-300Re 4.20");
    let mut conn = Connector::new(SessionConfig {
        query_line_status: false,
        ..test_config()
    });
    conn.connect_with(|_| Ok(mock)).unwrap();

    assert_eq!(conn.get_ver().unwrap(), "GMC-300Re 4.20");
    assert_eq!(wire.lock().unwrap().status_queries, 0);
}

#[test]
fn test_read_failure_is_io_error() {
    let (mut mock, _wire) = MockSerial::with_response(&[]);
    mock.fail_on_read = true;
    let mut conn = connected(mock);

    match conn.get_cfg() {
        Err(ProtocolError::Io { source, .. }) => {
            assert_eq!(source.kind(), io::ErrorKind::TimedOut)
        }
        other => panic!("expected Io error, got {:?}", other),
    }
}

#[test]
fn test_zero_byte_read_is_not_an_error() {
    let (mock, _wire) = MockSerial::with_response(&[]);
    let mut conn = connected(mock);

    assert_eq!(conn.send_command("GETVER").unwrap(), Vec::<u8>::new());
    assert_eq!(conn.get_ver().unwrap(), "");
    assert_eq!(conn.get_cpm().unwrap(), 0);
    assert_eq!(conn.get_cfg().unwrap(), "");
    assert_eq!(conn.query(Command::GetCpsh).unwrap(), Reading::UInt16(0));
}

#[test]
fn test_empty_clock_reply_is_length_error() {
    let (mock, _wire) = MockSerial::with_response(&[]);
    let mut conn = connected(mock);

    match conn.get_date_time() {
        Err(ProtocolError::UnexpectedLength { expected, actual }) => {
            assert_eq!(expected, 7);
            assert_eq!(actual, 0);
        }
        other => panic!("expected UnexpectedLength, got {:?}", other),
    }
}

#[test]
fn test_get_date_time() {
    let (mock, wire) = MockSerial::with_response(&[25, 3, 15, 10, 30, 45, 0]);
    let mut conn = connected(mock);

    let ts = conn.get_date_time().unwrap();

    assert_eq!(
        ts.naive_local(),
        NaiveDate::from_ymd_opt(2025, 3, 15)
            .unwrap()
            .and_hms_opt(10, 30, 45)
            .unwrap()
    );
    assert_eq!(wire.lock().unwrap().written, b"<GETDATETIME>>".to_vec());
}

#[test]
fn test_truncated_count_reply() {
    let (mock, _wire) = MockSerial::with_response(&[0x07]);
    let mut conn = connected(mock);

    let err = conn.get_cpmh().unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::TruncatedResponse {
            needed: 2,
            actual: 1
        }
    ));
}

#[test]
fn test_every_command_sends_its_framed_keyword() {
    for cmd in Command::ALL {
        let (mock, wire) = MockSerial::with_response(&[25, 1, 1, 0, 0, 0, 0]);
        let mut conn = connected(mock);

        conn.query(cmd).unwrap();

        let expected = format!("<{}>>", cmd.keyword());
        assert_eq!(wire.lock().unwrap().written, expected.into_bytes());
    }
}

#[test]
fn test_getter_while_disconnected_does_not_touch_transport() {
    let (mock, wire) = MockSerial::with_response(&[0x00, 0x01]);
    let mut conn = connected(mock);
    conn.disconnect();

    assert!(matches!(conn.get_cpm(), Err(ProtocolError::NotConnected)));
    assert!(matches!(
        conn.send_command("GETVER"),
        Err(ProtocolError::NotConnected)
    ));

    let wire = wire.lock().unwrap();
    assert_eq!(wire.write_calls, 0);
    assert_eq!(wire.reads, 0);
}

#[test]
fn test_failed_connect_stays_disconnected() {
    let mut conn: Connector<MockSerial> = Connector::new(test_config());

    let err = conn
        .connect_with(|cfg| Err(ProtocolError::Config(format!("cannot open {}", cfg.port))))
        .unwrap_err();

    assert_eq!(err.to_string(), "Configuration error: cannot open /dev/ttyUSB0");
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}

#[test]
fn test_connect_twice_is_rejected() {
    let (mock, _wire) = MockSerial::with_response(&[]);
    let mut conn = connected(mock);
    let (second, second_wire) = MockSerial::with_response(&[]);

    assert!(matches!(
        conn.connect_with(|_| Ok(second)),
        Err(ProtocolError::AlreadyConnected)
    ));
    assert_eq!(conn.state(), ConnectionState::Connected);
    // The unused transport was dropped without being installed
    assert_eq!(second_wire.lock().unwrap().closed, 1);
}

#[test]
fn test_disconnect_releases_transport_once() {
    let (mock, wire) = MockSerial::with_response(&[]);
    let mut conn = connected(mock);

    conn.disconnect();
    conn.disconnect();
    drop(conn);

    assert_eq!(wire.lock().unwrap().closed, 1);
}

#[test]
fn test_drop_releases_transport_on_error_path() {
    let (mut mock, wire) = MockSerial::with_response(&[]);
    mock.fail_on_send = true;

    let result = (|| -> Result<u16, ProtocolError> {
        let mut conn = connected(mock);
        let cpm = conn.get_cpm()?;
        Ok(cpm)
    })();

    assert!(result.is_err());
    assert_eq!(wire.lock().unwrap().closed, 1);
}

#[test]
fn test_config_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gmc300e.json");
    std::fs::write(&path, r#"{ "port": "/dev/ttyUSB1", "baud_rate": 115200 }"#).unwrap();

    let cfg = SessionConfig::from_json_file(&path).unwrap();

    assert_eq!(cfg.port, "/dev/ttyUSB1");
    assert_eq!(cfg.baud_rate, 115200);
    assert_eq!(cfg.settle_delay_ms, 500);
}

#[test]
fn test_config_from_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.json");
    match SessionConfig::from_json_file(&path) {
        Err(ProtocolError::Config(msg)) => assert!(msg.starts_with(&path.display().to_string())),
        other => panic!("expected Config error, got {:?}", other),
    }
}

#[test]
fn test_protocol_error_display() {
    let err = ProtocolError::UnexpectedLength {
        expected: 7,
        actual: 3,
    };
    assert_eq!(
        err.to_string(),
        "Unexpected response length: expected 7, got 3"
    );
    assert!(err.is_protocol_violation());
    assert!(!ProtocolError::NotConnected.is_protocol_violation());
}
