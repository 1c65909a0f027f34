//! USB printer transport
//!
//! Receipt printers enumerate as vendor-specific or printer-class devices
//! with a single bulk (sometimes interrupt) OUT endpoint on interface 0.
//! Getting there takes a fixed sequence of setup steps. Several of them
//! fail routinely on healthy devices (no kernel driver bound, reset not
//! supported, configuration already active), so each step is either
//! *advisory* (failure is logged and skipped) or *critical* (failure aborts
//! the connect).
//!
//! libusb access goes through [`UsbBackend`] / [`UsbDevice`] so the
//! protocol can run against scripted devices.

#[cfg(feature = "usb")]
mod rusb_backend;

#[cfg(feature = "usb")]
pub use rusb_backend::RusbBackend;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::{Transport, TransportKind};
use crate::config::PrinterConfig;
use crate::error::{PrintError, PrintResult};

/// Interface that carries the print endpoint
pub const PRINTER_INTERFACE: u8 = 0;

/// Printers seen in the field, for discovery labels
pub const KNOWN_PRINTERS: &[(u16, u16, &str)] = &[
    (0x09c5, 0x588e, "Generic 58mm thermal"),
    (0x04b8, 0x0202, "Epson TM series"),
    (0x04b8, 0x0005, "Epson TM-T88"),
    (0x154f, 0x154f, "Generic thermal"),
    (0x0483, 0x5740, "STM virtual COM printer"),
];

/// Model name for a known vendor/product pair
pub fn known_model(vendor_id: u16, product_id: u16) -> Option<&'static str> {
    KNOWN_PRINTERS
        .iter()
        .find(|(v, p, _)| *v == vendor_id && *p == product_id)
        .map(|(_, _, name)| *name)
}

/// Low-level USB failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsbError {
    #[error("entity not found")]
    NotFound,
    #[error("no such device (it may have been disconnected)")]
    NoDevice,
    #[error("access denied (insufficient permissions)")]
    Access,
    #[error("resource busy")]
    Busy,
    #[error("operation timed out")]
    Timeout,
    #[error("operation not supported")]
    NotSupported,
    #[error("{0}")]
    Other(String),
}

impl UsbError {
    /// Classify, prefixing `context` to the message
    pub fn into_print_error(self, context: &str) -> PrintError {
        let message = format!("{}: {}", context, self);
        match self {
            UsbError::NotFound | UsbError::NoDevice => PrintError::DeviceNotFound(message),
            UsbError::Access => PrintError::PermissionDenied(message),
            UsbError::Timeout => PrintError::WriteTimeout(message),
            UsbError::Busy | UsbError::NotSupported | UsbError::Other(_) => {
                PrintError::Protocol(message)
            }
        }
    }
}

/// Transfer type of the OUT endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointTransfer {
    Bulk,
    Interrupt,
}

/// Endpoint the print stream is written to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutEndpoint {
    pub address: u8,
    pub transfer: EndpointTransfer,
}

/// Vendor/product pair of an attached device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsbDeviceInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub bus: u8,
    pub address: u8,
}

/// Entry point into a USB stack
pub trait UsbBackend: Send + Sync {
    /// Every device currently attached
    fn list_devices(&self) -> PrintResult<Vec<UsbDeviceInfo>>;

    /// Open the first device whose IDs match exactly
    fn open(&self, vendor_id: u16, product_id: u16) -> PrintResult<Box<dyn UsbDevice>>;
}

/// An opened USB device
pub trait UsbDevice: Send {
    /// Interface count of the active configuration
    fn active_interface_count(&self) -> Result<u8, UsbError>;

    /// Interface count from the first configuration descriptor
    fn descriptor_interface_count(&self) -> Option<u8>;

    fn kernel_driver_active(&self, interface: u8) -> Result<bool, UsbError>;
    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), UsbError>;
    fn attach_kernel_driver(&mut self, interface: u8) -> Result<(), UsbError>;

    fn reset(&mut self) -> Result<(), UsbError>;

    /// Activate the device's first configuration
    fn set_configuration(&mut self) -> Result<(), UsbError>;

    /// First OUT endpoint of interface 0, alternate setting 0, as the
    /// device reports it now
    fn out_endpoint(&self) -> Result<Option<OutEndpoint>, UsbError>;

    fn claim_interface(&mut self, interface: u8) -> Result<(), UsbError>;
    fn release_interface(&mut self, interface: u8) -> Result<(), UsbError>;

    /// Single transfer; returns bytes accepted
    fn write(
        &mut self,
        endpoint: &OutEndpoint,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbError>;
}

/// libusb-backed backend, or `TransportUnavailable` when built without it
#[cfg(feature = "usb")]
pub fn system_backend() -> PrintResult<Arc<dyn UsbBackend>> {
    Ok(Arc::new(RusbBackend::new()?))
}

#[cfg(not(feature = "usb"))]
pub fn system_backend() -> PrintResult<Arc<dyn UsbBackend>> {
    Err(PrintError::TransportUnavailable(
        "built without USB support".into(),
    ))
}

/// Setup step whose failure does not abort the connect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvisoryStep {
    DetachKernelDriver(u8),
    Reset,
    SetConfiguration,
    ClaimInterface(u8),
}

impl fmt::Display for AdvisoryStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvisoryStep::DetachKernelDriver(i) => write!(f, "detach kernel driver (interface {})", i),
            AdvisoryStep::Reset => f.write_str("reset device"),
            AdvisoryStep::SetConfiguration => f.write_str("set configuration"),
            AdvisoryStep::ClaimInterface(i) => write!(f, "claim interface {}", i),
        }
    }
}

/// State of an established USB connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbConnection {
    pub endpoint: OutEndpoint,
    /// Advisory steps that failed and were skipped
    pub skipped: Vec<AdvisoryStep>,
    detached: Vec<u8>,
    claimed: bool,
}

/// Run an advisory step, logging failure
fn advisory(step: AdvisoryStep, result: Result<(), UsbError>, skipped: &mut Vec<AdvisoryStep>) -> bool {
    match result {
        Ok(()) => {
            debug!(%step, "USB setup step ok");
            true
        }
        Err(e) => {
            warn!(%step, error = %e, "USB setup step failed, continuing");
            skipped.push(step);
            false
        }
    }
}

/// Bring an opened device to a writable state
///
/// Critical failures: no interface with an OUT endpoint. Everything else is
/// advisory.
pub fn connect_device(
    device: &mut dyn UsbDevice,
    settle_delay: Duration,
) -> PrintResult<UsbConnection> {
    let mut skipped = Vec::new();

    let interfaces = device
        .active_interface_count()
        .ok()
        .or_else(|| device.descriptor_interface_count())
        .unwrap_or(1);
    debug!(interfaces, "USB interface count");

    let mut detached = Vec::new();
    for interface in 0..interfaces {
        // Unknown driver state counts as "not attached"
        if device.kernel_driver_active(interface).unwrap_or(false) {
            let step = AdvisoryStep::DetachKernelDriver(interface);
            if advisory(step, device.detach_kernel_driver(interface), &mut skipped) {
                detached.push(interface);
            }
        }
    }

    if advisory(AdvisoryStep::Reset, device.reset(), &mut skipped) && !settle_delay.is_zero() {
        std::thread::sleep(settle_delay);
    }

    advisory(
        AdvisoryStep::SetConfiguration,
        device.set_configuration(),
        &mut skipped,
    );

    let endpoint = match device.out_endpoint() {
        Ok(Some(endpoint)) => endpoint,
        Ok(None) => {
            reattach_kernel_drivers(device, &detached);
            return Err(PrintError::EndpointNotFound(format!(
                "interface {} has no OUT endpoint",
                PRINTER_INTERFACE
            )));
        }
        Err(e) => {
            reattach_kernel_drivers(device, &detached);
            return Err(e.into_print_error("Reading configuration"));
        }
    };

    let claimed = advisory(
        AdvisoryStep::ClaimInterface(PRINTER_INTERFACE),
        device.claim_interface(PRINTER_INTERFACE),
        &mut skipped,
    );

    Ok(UsbConnection {
        endpoint,
        skipped,
        detached,
        claimed,
    })
}

/// Undo what [`connect_device`] did, best-effort
pub fn disconnect_device(device: &mut dyn UsbDevice, connection: &UsbConnection) {
    if connection.claimed
        && let Err(e) = device.release_interface(PRINTER_INTERFACE)
    {
        debug!(error = %e, "Release interface failed");
    }
    reattach_kernel_drivers(device, &connection.detached);
}

/// Hand interfaces back to the kernel driver, best-effort
fn reattach_kernel_drivers(device: &mut dyn UsbDevice, interfaces: &[u8]) {
    for &interface in interfaces {
        if let Err(e) = device.attach_kernel_driver(interface) {
            debug!(interface, error = %e, "Reattach kernel driver failed");
        }
    }
}

/// USB printer transport
pub struct UsbTransport {
    backend: Arc<dyn UsbBackend>,
    vendor_id: u16,
    product_id: u16,
    chunk_size: usize,
    chunk_timeout: Duration,
    settle_delay: Duration,
    device: Option<Box<dyn UsbDevice>>,
    connection: Option<UsbConnection>,
}

impl UsbTransport {
    pub fn new(
        backend: Arc<dyn UsbBackend>,
        vendor_id: u16,
        product_id: u16,
        settings: &PrinterConfig,
    ) -> Self {
        Self {
            backend,
            vendor_id,
            product_id,
            chunk_size: settings.usb_chunk_size.max(1),
            chunk_timeout: settings.usb_chunk_timeout,
            settle_delay: settings.usb_settle_delay,
            device: None,
            connection: None,
        }
    }

    pub fn ids(&self) -> String {
        format!("0x{:04x}:0x{:04x}", self.vendor_id, self.product_id)
    }

    /// Connection details once open
    pub fn connection(&self) -> Option<&UsbConnection> {
        self.connection.as_ref()
    }
}

impl Transport for UsbTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Usb
    }

    fn describe(&self) -> String {
        format!("USB ({})", self.ids())
    }

    fn chunk_size(&self) -> Option<usize> {
        Some(self.chunk_size)
    }

    #[instrument(skip(self), fields(device = %self.ids()))]
    fn open(&mut self) -> PrintResult<()> {
        let mut device = self.backend.open(self.vendor_id, self.product_id)?;
        let connection = connect_device(device.as_mut(), self.settle_delay)?;

        info!(
            endpoint = %format!("0x{:02x}", connection.endpoint.address),
            transfer = ?connection.endpoint.transfer,
            skipped = connection.skipped.len(),
            "USB printer connected"
        );

        self.device = Some(device);
        self.connection = Some(connection);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> PrintResult<usize> {
        let ids = self.ids();
        let (Some(device), Some(connection)) = (self.device.as_mut(), self.connection.as_ref())
        else {
            return Err(PrintError::Protocol(format!("USB {} is not connected", ids)));
        };

        let mut written = 0;
        for chunk in data.chunks(self.chunk_size) {
            let mut offset = 0;
            while offset < chunk.len() {
                let n = device
                    .write(&connection.endpoint, &chunk[offset..], self.chunk_timeout)
                    .map_err(|e| match e {
                        UsbError::Timeout => PrintError::WriteTimeout(
                            "USB write timeout - printer may be busy".into(),
                        ),
                        other => other.into_print_error("USB write"),
                    })?;
                if n == 0 {
                    return Err(PrintError::Protocol(format!(
                        "USB {} accepted 0 bytes",
                        ids
                    )));
                }
                offset += n;
            }
            written += chunk.len();
        }
        Ok(written)
    }

    fn close(&mut self) -> PrintResult<()> {
        if let (Some(device), Some(connection)) = (self.device.as_mut(), self.connection.as_ref()) {
            disconnect_device(device.as_mut(), connection);
        }
        self.connection = None;
        self.device = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_model() {
        assert_eq!(known_model(0x04b8, 0x0202), Some("Epson TM series"));
        assert_eq!(known_model(0x1234, 0x5678), None);
    }

    #[test]
    fn test_usb_error_mapping() {
        use crate::error::ErrorKind;

        assert_eq!(
            UsbError::NoDevice.into_print_error("open").kind(),
            ErrorKind::DeviceNotFound
        );
        assert_eq!(
            UsbError::Access.into_print_error("open").kind(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            UsbError::Timeout.into_print_error("write").kind(),
            ErrorKind::WriteTimeout
        );
        assert_eq!(
            UsbError::Busy.into_print_error("claim").kind(),
            ErrorKind::ProtocolError
        );
    }

    #[test]
    fn test_advisory_step_display() {
        assert_eq!(
            AdvisoryStep::DetachKernelDriver(0).to_string(),
            "detach kernel driver (interface 0)"
        );
        assert_eq!(AdvisoryStep::ClaimInterface(0).to_string(), "claim interface 0");
    }
}
