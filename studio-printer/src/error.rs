//! Error types for the printer library

use serde::Serialize;
use thiserror::Error;

/// Printer error types
#[derive(Debug, Error)]
pub enum PrintError {
    /// No device matches the configured identity
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// USB device has no OUT endpoint on interface (0, 0)
    #[error("No OUT endpoint: {0}")]
    EndpointNotFound(String),

    /// OS refused access to the device
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A chunk write did not complete in time
    #[error("Write timeout: {0}")]
    WriteTimeout(String),

    /// Remote end refused the connection
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// Connection attempt did not complete in time
    #[error("Connect timeout: {0}")]
    ConnectTimeout(String),

    /// Required library, driver or adapter is absent
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Malformed transport configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Device scan failed
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// Lower-level failure not otherwise classified
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;

/// Copyable classification of a [`PrintError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DeviceNotFound,
    EndpointNotFound,
    PermissionDenied,
    WriteTimeout,
    ConnectionRefused,
    ConnectTimeout,
    TransportUnavailable,
    ConfigurationError,
    DiscoveryFailed,
    ProtocolError,
}

impl PrintError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PrintError::DeviceNotFound(_) => ErrorKind::DeviceNotFound,
            PrintError::EndpointNotFound(_) => ErrorKind::EndpointNotFound,
            PrintError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            PrintError::WriteTimeout(_) => ErrorKind::WriteTimeout,
            PrintError::ConnectionRefused(_) => ErrorKind::ConnectionRefused,
            PrintError::ConnectTimeout(_) => ErrorKind::ConnectTimeout,
            PrintError::TransportUnavailable(_) => ErrorKind::TransportUnavailable,
            PrintError::InvalidConfig(_) => ErrorKind::ConfigurationError,
            PrintError::Discovery(_) => ErrorKind::DiscoveryFailed,
            PrintError::Protocol(_) => ErrorKind::ProtocolError,
        }
    }

    /// Operator-facing advice for this failure
    pub fn hint(&self) -> &'static str {
        match self.kind() {
            ErrorKind::DeviceNotFound => {
                "Check that the printer is connected, powered on and the device IDs or address are correct."
            }
            ErrorKind::EndpointNotFound => {
                "The device does not expose a writable endpoint; it may not be a receipt printer."
            }
            ErrorKind::PermissionDenied => {
                "Add a udev rule for the printer or run with elevated permissions."
            }
            ErrorKind::WriteTimeout => "The printer may be busy, out of paper or offline.",
            ErrorKind::ConnectionRefused => {
                "Check the printer IP address and that raw printing on the port is enabled."
            }
            ErrorKind::ConnectTimeout => "The printer did not answer; check network or pairing.",
            ErrorKind::TransportUnavailable => {
                "Install libusb / BlueZ or rebuild with the matching feature enabled."
            }
            ErrorKind::ConfigurationError => "Fix the printer settings and try again.",
            ErrorKind::DiscoveryFailed => "Device scan failed; check the adapter and try again.",
            ErrorKind::ProtocolError => "Unexpected printer error.",
        }
    }

    /// Map a socket error from connect, keeping the target in the message
    pub(crate) fn from_connect_io(target: &str, e: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;

        match e.kind() {
            Io::ConnectionRefused => PrintError::ConnectionRefused(format!("{}: {}", target, e)),
            Io::TimedOut | Io::WouldBlock => {
                PrintError::ConnectTimeout(format!("{}: {}", target, e))
            }
            Io::PermissionDenied => PrintError::PermissionDenied(format!("{}: {}", target, e)),
            Io::NotFound | Io::HostUnreachable | Io::NetworkUnreachable | Io::AddrNotAvailable => {
                PrintError::DeviceNotFound(format!("{}: {}", target, e))
            }
            _ => PrintError::Protocol(format!("{}: {}", target, e)),
        }
    }

    /// Map an RFCOMM connect error
    ///
    /// BlueZ reports a powered-off or out-of-range device as EHOSTDOWN or
    /// EHOSTUNREACH, which std leaves uncategorized.
    #[cfg_attr(
        not(all(feature = "bluetooth", target_os = "linux")),
        allow(dead_code)
    )]
    pub(crate) fn from_bluetooth_connect_io(target: &str, e: std::io::Error) -> Self {
        if is_host_down(&e) {
            return PrintError::DeviceNotFound(format!("{}: {}", target, e));
        }
        Self::from_connect_io(target, e)
    }

    /// Map a socket error from write
    pub(crate) fn from_write_io(target: &str, e: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;

        match e.kind() {
            Io::TimedOut | Io::WouldBlock => {
                PrintError::WriteTimeout(format!("{}: {}", target, e))
            }
            _ => PrintError::Protocol(format!("Write failed on {}: {}", target, e)),
        }
    }
}

#[cfg(target_os = "linux")]
#[cfg_attr(not(feature = "bluetooth"), allow(dead_code))]
fn is_host_down(e: &std::io::Error) -> bool {
    matches!(e.raw_os_error(), Some(libc::EHOSTDOWN | libc::EHOSTUNREACH))
}

#[cfg(not(target_os = "linux"))]
#[allow(dead_code)]
fn is_host_down(_e: &std::io::Error) -> bool {
    false
}
