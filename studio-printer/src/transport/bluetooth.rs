//! Bluetooth printer transport (RFCOMM / serial port profile)
//!
//! BlueZ is only reachable through the async `bluer` API, so each transport
//! drives its own current-thread tokio runtime and exposes a blocking
//! interface like the other transports. Must not be called from inside an
//! async task; go through [`crate::worker`] instead.

use std::time::Duration;

use tracing::{info, instrument};

use super::{parse_bt_address, Transport, TransportKind};
use crate::error::{PrintError, PrintResult};

/// Bytes per RFCOMM write
pub const BLUETOOTH_CHUNK_SIZE: usize = 4096;

/// RFCOMM printer connection
pub struct BluetoothTransport {
    address: String,
    octets: [u8; 6],
    channel: u8,
    timeout: Duration,
    connection: Option<imp::Connection>,
}

impl BluetoothTransport {
    pub fn new(address: &str, channel: u8) -> PrintResult<Self> {
        Ok(Self {
            address: address.trim().to_ascii_uppercase(),
            octets: parse_bt_address(address)?,
            channel,
            timeout: Duration::from_secs(30),
            connection: None,
        })
    }

    /// Set connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl Transport for BluetoothTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Bluetooth
    }

    fn describe(&self) -> String {
        format!("Bluetooth ({})", self.address)
    }

    fn chunk_size(&self) -> Option<usize> {
        Some(BLUETOOTH_CHUNK_SIZE)
    }

    #[instrument(skip(self), fields(address = %self.address, channel = self.channel))]
    fn open(&mut self) -> PrintResult<()> {
        info!("Connecting to Bluetooth printer");
        let connection = imp::Connection::connect(self.octets, self.channel, self.timeout)
            .map_err(|e| match e {
                PrintError::ConnectTimeout(_) => PrintError::ConnectTimeout(format!(
                    "{}: no answer within {:?}",
                    self.address, self.timeout
                )),
                other => other,
            })?;
        info!("Connected");
        self.connection = Some(connection);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> PrintResult<usize> {
        let connection = self.connection.as_mut().ok_or_else(|| {
            PrintError::Protocol(format!("Bluetooth {} is not connected", self.address))
        })?;
        connection.write(data, self.timeout)?;
        Ok(data.len())
    }

    fn close(&mut self) -> PrintResult<()> {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
        Ok(())
    }
}

/// Private runtime for driving BlueZ from blocking code
#[cfg(all(feature = "bluetooth", target_os = "linux"))]
pub(crate) fn runtime() -> PrintResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| PrintError::Protocol(format!("Bluetooth runtime: {}", e)))
}

#[cfg(all(feature = "bluetooth", target_os = "linux"))]
mod imp {
    use std::time::Duration;

    use bluer::rfcomm::{SocketAddr, Stream};
    use tokio::io::AsyncWriteExt;
    use tokio::runtime::Runtime;
    use tracing::debug;

    use crate::error::{PrintError, PrintResult};

    pub struct Connection {
        runtime: Runtime,
        stream: Stream,
    }

    impl Connection {
        pub fn connect(octets: [u8; 6], channel: u8, timeout: Duration) -> PrintResult<Self> {
            let runtime = super::runtime()?;
            let address = bluer::Address::new(octets);
            let label = address.to_string();

            let stream = runtime
                .block_on(async {
                    let target = SocketAddr::new(address, channel);
                    tokio::time::timeout(timeout, Stream::connect(target)).await
                })
                .map_err(|_| PrintError::ConnectTimeout(label.clone()))?
                .map_err(|e| PrintError::from_bluetooth_connect_io(&label, e))?;

            Ok(Self { runtime, stream })
        }

        pub fn write(&mut self, data: &[u8], timeout: Duration) -> PrintResult<()> {
            let stream = &mut self.stream;
            self.runtime
                .block_on(async {
                    tokio::time::timeout(timeout, async {
                        stream.write_all(data).await?;
                        stream.flush().await
                    })
                    .await
                })
                .map_err(|_| PrintError::WriteTimeout("Bluetooth write timed out".into()))?
                .map_err(|e| PrintError::from_write_io("Bluetooth", e))
        }

        pub fn close(self) {
            let Connection { runtime, mut stream } = self;
            if let Err(e) = runtime.block_on(stream.shutdown()) {
                debug!(error = %e, "RFCOMM shutdown failed");
            }
        }
    }
}

#[cfg(not(all(feature = "bluetooth", target_os = "linux")))]
mod imp {
    use std::time::Duration;

    use crate::error::{PrintError, PrintResult};

    pub enum Connection {}

    impl Connection {
        pub fn connect(_octets: [u8; 6], _channel: u8, _timeout: Duration) -> PrintResult<Self> {
            Err(PrintError::TransportUnavailable(
                "Bluetooth printing needs Linux with BlueZ".into(),
            ))
        }

        pub fn write(&mut self, _data: &[u8], _timeout: Duration) -> PrintResult<()> {
            match *self {}
        }

        pub fn close(self) {
            match self {}
        }
    }
}
