mod common;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use common::{invoice_0007, studio, ScriptedBackend, UsbScript};
use studio_printer::{
    Capabilities, ErrorKind, PrintError, PrintResult, PrintService, PrinterConfig,
    PrinterSession, SessionState, Transport, TransportConfig, TransportKind,
};

#[derive(Debug, Default)]
struct Calls {
    opens: usize,
    writes: usize,
    closes: usize,
}

/// Transport that fails or panics on demand
struct Flaky {
    calls: Arc<Mutex<Calls>>,
    fail_open: bool,
    fail_write_at: Option<usize>,
    panic_write_at: Option<usize>,
    fail_close: bool,
    chunk_size: Option<usize>,
}

impl Flaky {
    fn new() -> (Self, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let flaky = Self {
            calls: Arc::clone(&calls),
            fail_open: false,
            fail_write_at: None,
            panic_write_at: None,
            fail_close: false,
            chunk_size: Some(4),
        };
        (flaky, calls)
    }
}

impl Transport for Flaky {
    fn kind(&self) -> TransportKind {
        TransportKind::Network
    }

    fn describe(&self) -> String {
        "Flaky".into()
    }

    fn chunk_size(&self) -> Option<usize> {
        self.chunk_size
    }

    fn open(&mut self) -> PrintResult<()> {
        self.calls.lock().unwrap().opens += 1;
        if self.fail_open {
            return Err(PrintError::ConnectionRefused("flaky".into()));
        }
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> PrintResult<usize> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.writes += 1;
            calls.writes - 1
        };
        if self.panic_write_at == Some(index) {
            panic!("transport fault");
        }
        if self.fail_write_at == Some(index) {
            return Err(PrintError::Protocol("broken pipe".into()));
        }
        Ok(data.len())
    }

    fn close(&mut self) -> PrintResult<()> {
        self.calls.lock().unwrap().closes += 1;
        if self.fail_close {
            return Err(PrintError::Protocol("close failed".into()));
        }
        Ok(())
    }
}

#[test]
fn test_success_closes_once() {
    let (flaky, calls) = Flaky::new();
    let mut session = PrinterSession::new(Box::new(flaky));

    session.open().unwrap();
    session.send(b"0123456789").unwrap();
    session.close().unwrap();
    drop(session);

    let calls = calls.lock().unwrap();
    assert_eq!(calls.writes, 3);
    assert_eq!(calls.closes, 1);
}

#[test]
fn test_failed_open_never_writes() {
    let (mut flaky, calls) = Flaky::new();
    flaky.fail_open = true;
    let mut session = PrinterSession::new(Box::new(flaky));

    assert_eq!(session.open().unwrap_err().kind(), ErrorKind::ConnectionRefused);
    assert_eq!(session.state(), SessionState::Failed);
    assert!(session.send(b"data").is_err());
    drop(session);

    let calls = calls.lock().unwrap();
    assert_eq!(calls.writes, 0);
    assert_eq!(calls.closes, 0);
}

#[test]
fn test_mid_stream_failure_closes_and_reports_progress() {
    let (mut flaky, calls) = Flaky::new();
    flaky.fail_write_at = Some(1);
    let mut session = PrinterSession::new(Box::new(flaky));

    session.open().unwrap();
    let err = session.send(b"0123456789").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolError);
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(session.bytes_sent(), 4);
    drop(session);

    let calls = calls.lock().unwrap();
    assert_eq!(calls.writes, 2);
    assert_eq!(calls.closes, 1);
}

#[test]
fn test_panic_closes_via_drop() {
    let (mut flaky, calls) = Flaky::new();
    flaky.panic_write_at = Some(0);

    let result = catch_unwind(AssertUnwindSafe(|| {
        let mut session = PrinterSession::new(Box::new(flaky));
        session.open().unwrap();
        let _ = session.send(b"abc");
    }));

    assert!(result.is_err());
    assert_eq!(calls.lock().unwrap().closes, 1);
}

#[test]
fn test_drop_while_connected_closes() {
    let (flaky, calls) = Flaky::new();
    {
        let mut session = PrinterSession::new(Box::new(flaky));
        session.open().unwrap();
    }
    assert_eq!(calls.lock().unwrap().closes, 1);
}

#[test]
fn test_close_error_does_not_reopen() {
    let (mut flaky, calls) = Flaky::new();
    flaky.fail_close = true;
    let mut session = PrinterSession::new(Box::new(flaky));

    session.open().unwrap();
    assert!(session.close().is_err());
    assert_eq!(session.state(), SessionState::Closed);
    drop(session);

    assert_eq!(calls.lock().unwrap().closes, 1);
}

#[test]
fn test_service_survives_transport_panic() {
    let (backend, log) = ScriptedBackend::new(UsbScript {
        panic_on_write: Some(0),
        ..UsbScript::default()
    });
    let service = PrintService::new(PrinterConfig::default().without_delays(), Capabilities::all())
        .with_usb_backend(backend);

    let outcome = service.print(&invoice_0007(), &studio(), &TransportConfig::usb(0x09c5, 0x588e));

    assert!(!outcome.ok);
    assert_eq!(outcome.error, Some(ErrorKind::ProtocolError));
    assert!(outcome.message.contains("scripted device fault"));
    // Unwinding dropped the session, which released the interface
    assert!(log.lock().unwrap().called("release:0"));
}
