//! Network printer (TCP port 9100)
//!
//! Most thermal printers support raw TCP printing on port 9100.

use std::io::Write;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{info, instrument, warn};

use super::{Transport, TransportKind};
use crate::error::{PrintError, PrintResult};

/// Raw TCP printer connection
#[derive(Debug)]
pub struct NetworkTransport {
    host: String,
    port: u16,
    timeout: Duration,
    stream: Option<TcpStream>,
}

impl NetworkTransport {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.trim().to_string(),
            port,
            timeout: Duration::from_secs(60),
            stream: None,
        }
    }

    /// Set connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `host:port` as configured
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn resolve(&self) -> PrintResult<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| PrintError::DeviceNotFound(format!("{}: {}", self.addr(), e)))?
            .collect();
        if addrs.is_empty() {
            return Err(PrintError::DeviceNotFound(format!(
                "{}: no addresses resolved",
                self.addr()
            )));
        }
        Ok(addrs)
    }
}

impl Transport for NetworkTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Network
    }

    fn describe(&self) -> String {
        format!("Network ({})", self.addr())
    }

    #[instrument(skip(self), fields(addr = %self.addr(), timeout_ms = self.timeout.as_millis() as u64))]
    fn open(&mut self) -> PrintResult<()> {
        info!("Connecting to printer");

        let mut last_err = None;
        for addr in self.resolve()? {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    if let Err(e) = stream.set_write_timeout(Some(self.timeout)) {
                        warn!(error = %e, "Failed to set write timeout");
                    }
                    info!(%addr, "Connected");
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(e) => {
                    warn!(%addr, error = %e, "Connect attempt failed");
                    last_err = Some(e);
                }
            }
        }

        let target = self.addr();
        Err(match last_err {
            Some(e) => PrintError::from_connect_io(&target, e),
            None => PrintError::DeviceNotFound(target),
        })
    }

    #[instrument(skip(self, data), fields(addr = %self.addr(), data_len = data.len()))]
    fn write(&mut self, data: &[u8]) -> PrintResult<usize> {
        let target = self.addr();
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| PrintError::Protocol(format!("{} is not connected", target)))?;

        stream
            .write_all(data)
            .map_err(|e| PrintError::from_write_io(&target, e))?;
        stream
            .flush()
            .map_err(|e| PrintError::from_write_io(&target, e))?;

        Ok(data.len())
    }

    fn close(&mut self) -> PrintResult<()> {
        if let Some(stream) = self.stream.take()
            && let Err(e) = stream.shutdown(std::net::Shutdown::Both)
        {
            // Peer may already have dropped the socket
            warn!(addr = %self.addr(), error = %e, "Socket shutdown failed");
        }
        Ok(())
    }
}
