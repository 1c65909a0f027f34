//! Dummy transport for test mode

use super::{Transport, TransportKind};
use crate::error::{PrintError, PrintResult};

/// Accepts and discards every byte
#[derive(Debug, Default)]
pub struct DummyTransport {
    open: bool,
    bytes_discarded: usize,
}

impl DummyTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes_discarded(&self) -> usize {
        self.bytes_discarded
    }
}

impl Transport for DummyTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Dummy
    }

    fn describe(&self) -> String {
        "Test mode".to_string()
    }

    fn open(&mut self) -> PrintResult<()> {
        self.open = true;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> PrintResult<usize> {
        if !self.open {
            return Err(PrintError::Protocol("dummy transport is not open".into()));
        }
        self.bytes_discarded += data.len();
        tracing::debug!(bytes = data.len(), "Discarded test-mode output");
        Ok(data.len())
    }

    fn close(&mut self) -> PrintResult<()> {
        self.open = false;
        Ok(())
    }
}
