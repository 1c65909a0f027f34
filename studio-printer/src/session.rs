//! Printer session
//!
//! One connection attempt to one printer. The session owns its transport
//! and guarantees it is closed however the attempt ends: normal return,
//! error, or a panic unwinding through the owner.
//!
//! ```text
//! Idle -> Opening -> Connected <-> Writing
//!            \           \            \
//!             \           +------------+--> Closed
//!              +-----------+------------+--> Failed
//! ```
//!
//! A completed [`PrinterSession::send`] returns to `Connected` so a stream
//! can go out in several sends; `close()` then moves to `Closed`.

use serde::Serialize;
use tracing::{debug, info, info_span, warn, Span};

use crate::error::{PrintError, PrintResult};
use crate::transport::{Transport, TransportKind};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Opening,
    Connected,
    Writing,
    Closed,
    Failed,
}

impl SessionState {
    /// Transport is open and must be closed
    pub fn holds_connection(self) -> bool {
        matches!(self, SessionState::Connected | SessionState::Writing)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

/// A single open/write/close cycle over one transport
pub struct PrinterSession {
    transport: Box<dyn Transport>,
    state: SessionState,
    bytes_sent: usize,
    span: Span,
}

impl PrinterSession {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        let span = info_span!(
            "printer_session",
            kind = %transport.kind(),
            target = %transport.describe()
        );
        Self::with_span(transport, span)
    }

    /// Create a session whose span is a child of `parent`
    pub fn with_parent_span(transport: Box<dyn Transport>, parent: &Span) -> Self {
        let span = info_span!(
            parent: parent,
            "printer_session",
            kind = %transport.kind(),
            target = %transport.describe()
        );
        Self::with_span(transport, span)
    }

    fn with_span(transport: Box<dyn Transport>, span: Span) -> Self {
        Self {
            transport,
            state: SessionState::Idle,
            bytes_sent: 0,
            span,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Bytes accepted by the device so far
    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }

    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub fn describe(&self) -> String {
        self.transport.describe()
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "Session state change");
        self.state = next;
    }

    /// Open the transport
    pub fn open(&mut self) -> PrintResult<()> {
        let span = self.span.clone();
        let _enter = span.enter();

        if self.state != SessionState::Idle {
            return Err(PrintError::Protocol(format!(
                "cannot open a session in state {:?}",
                self.state
            )));
        }

        self.transition(SessionState::Opening);
        match self.transport.open() {
            Ok(()) => {
                self.transition(SessionState::Connected);
                info!("Printer connected");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Printer connect failed");
                self.transition(SessionState::Failed);
                Err(e)
            }
        }
    }

    /// Write `data`, split into the transport's preferred chunk size
    ///
    /// On failure the transport is closed and the session is `Failed`;
    /// [`Self::bytes_sent`] reports how much reached the device.
    pub fn send(&mut self, data: &[u8]) -> PrintResult<usize> {
        let span = self.span.clone();
        let _enter = span.enter();

        if self.state != SessionState::Connected {
            return Err(PrintError::Protocol(format!(
                "cannot write in state {:?}",
                self.state
            )));
        }

        self.transition(SessionState::Writing);
        let chunk_size = self.transport.chunk_size().unwrap_or(data.len()).max(1);
        let total_chunks = data.len().div_ceil(chunk_size);

        for (index, chunk) in data.chunks(chunk_size).enumerate() {
            match self.transport.write(chunk) {
                Ok(n) => {
                    self.bytes_sent += n;
                    debug!(chunk = index + 1, total_chunks, bytes = n, "Chunk written");
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        chunk = index + 1,
                        total_chunks,
                        bytes_sent = self.bytes_sent,
                        "Write failed, skipping remaining chunks"
                    );
                    self.fail();
                    return Err(e);
                }
            }
        }

        self.transition(SessionState::Connected);
        info!(bytes = data.len(), "Data sent");
        Ok(data.len())
    }

    /// Close the transport; idempotent
    ///
    /// Close errors are logged and reported, the session ends `Closed` either
    /// way.
    pub fn close(&mut self) -> PrintResult<()> {
        let span = self.span.clone();
        let _enter = span.enter();

        let result = if self.state.holds_connection() {
            self.transport.close()
        } else {
            Ok(())
        };

        if !self.state.is_terminal() {
            self.transition(SessionState::Closed);
        }
        if let Err(e) = &result {
            warn!(error = %e, "Close failed");
        }
        result
    }

    /// Abort after an error, closing whatever is open
    fn fail(&mut self) {
        if self.state.holds_connection()
            && let Err(e) = self.transport.close()
        {
            warn!(error = %e, "Cleanup after failure also failed");
        }
        self.transition(SessionState::Failed);
    }
}

impl Drop for PrinterSession {
    fn drop(&mut self) {
        if self.state.holds_connection() {
            let _enter = self.span.enter();
            if std::thread::panicking() {
                warn!(state = ?self.state, "Session dropped during panic, closing transport");
            } else {
                debug!(state = ?self.state, "Session dropped while open, closing transport");
            }
            if let Err(e) = self.transport.close() {
                warn!(error = %e, "Close on drop failed");
            }
            self.state = SessionState::Closed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::DummyTransport;

    #[test]
    fn test_happy_path_states() {
        let mut session = PrinterSession::new(Box::new(DummyTransport::new()));
        assert_eq!(session.state(), SessionState::Idle);

        session.open().unwrap();
        assert_eq!(session.state(), SessionState::Connected);

        assert_eq!(session.send(b"hello").unwrap(), 5);
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.bytes_sent(), 5);

        session.close().unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        session.close().unwrap();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_sends_share_one_connection() {
        let mut session = PrinterSession::new(Box::new(DummyTransport::new()));
        session.open().unwrap();

        session.send(b"head").unwrap();
        assert_eq!(session.state(), SessionState::Connected);
        session.send(b"tail").unwrap();
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.bytes_sent(), 8);

        session.close().unwrap();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_send_before_open_rejected() {
        let mut session = PrinterSession::new(Box::new(DummyTransport::new()));
        assert!(session.send(b"x").is_err());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_open_twice_rejected() {
        let mut session = PrinterSession::new(Box::new(DummyTransport::new()));
        session.open().unwrap();
        assert!(session.open().is_err());
    }

    #[test]
    fn test_parent_span() {
        let parent = tracing::info_span!("job", invoice = "INV-1");
        let mut session =
            PrinterSession::with_parent_span(Box::new(DummyTransport::new()), &parent);
        session.open().unwrap();
        session.close().unwrap();
    }

    #[test]
    fn test_state_predicates() {
        assert!(SessionState::Writing.holds_connection());
        assert!(!SessionState::Opening.holds_connection());
        assert!(SessionState::Failed.is_terminal());
        assert!(!SessionState::Idle.is_terminal());
    }
}
