//! Printer transports
//!
//! Every way of reaching a printer implements [`Transport`]:
//! - USB (bulk/interrupt OUT endpoint via libusb)
//! - Network printers (raw TCP, port 9100)
//! - Bluetooth printers (RFCOMM, channel 1)
//! - Dummy sink for previews
//!
//! The session picks one transport from a [`TransportConfig`] and only talks
//! to it through the trait afterwards.

pub mod bluetooth;
pub mod dummy;
pub mod network;
pub mod usb;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::capability::Capabilities;
use crate::config::PrinterConfig;
use crate::error::{PrintError, PrintResult};

pub use bluetooth::BluetoothTransport;
pub use dummy::DummyTransport;
pub use network::NetworkTransport;
pub use usb::{UsbBackend, UsbTransport};

/// Raw printing port
pub const DEFAULT_NETWORK_PORT: u16 = 9100;

/// RFCOMM channel used by serial-profile printers
pub const DEFAULT_RFCOMM_CHANNEL: u8 = 1;

/// Byte-level connection to a printer
///
/// Callers must `open` before `write` and always `close` afterwards;
/// [`crate::session::PrinterSession`] enforces both.
pub trait Transport: Send {
    /// Which family this transport belongs to
    fn kind(&self) -> TransportKind;

    /// Human-readable target, e.g. `USB (0x09c5:0x588e)`
    fn describe(&self) -> String;

    /// Largest write the device should receive at once (`None` = unbounded)
    fn chunk_size(&self) -> Option<usize> {
        None
    }

    /// Establish the connection
    fn open(&mut self) -> PrintResult<()>;

    /// Send bytes, returning how many were accepted
    fn write(&mut self, data: &[u8]) -> PrintResult<usize>;

    /// Tear down the connection
    fn close(&mut self) -> PrintResult<()>;
}

/// Transport family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Usb,
    Network,
    Bluetooth,
    Dummy,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportKind::Usb => "usb",
            TransportKind::Network => "network",
            TransportKind::Bluetooth => "bluetooth",
            TransportKind::Dummy => "dummy",
        };
        f.write_str(name)
    }
}

impl FromStr for TransportKind {
    type Err = PrintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "usb" => Ok(TransportKind::Usb),
            "network" | "tcp" | "ip" => Ok(TransportKind::Network),
            "bluetooth" | "bt" => Ok(TransportKind::Bluetooth),
            "dummy" | "test" => Ok(TransportKind::Dummy),
            other => Err(PrintError::InvalidConfig(format!(
                "Unknown printer type: {}",
                other
            ))),
        }
    }
}

/// Why a connection is being made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectPurpose {
    /// Full print job
    Print,
    /// Open/close diagnostics
    Test,
}

/// Which printer to talk to, and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    Usb {
        vendor_id: u16,
        product_id: u16,
    },
    Network {
        address: String,
        #[serde(default = "default_network_port")]
        port: u16,
    },
    Bluetooth {
        address: String,
        #[serde(default = "default_rfcomm_channel")]
        channel: u8,
    },
    Dummy,
}

fn default_network_port() -> u16 {
    DEFAULT_NETWORK_PORT
}

fn default_rfcomm_channel() -> u8 {
    DEFAULT_RFCOMM_CHANNEL
}

impl TransportConfig {
    pub fn usb(vendor_id: u16, product_id: u16) -> Self {
        TransportConfig::Usb {
            vendor_id,
            product_id,
        }
    }

    pub fn network(address: impl Into<String>) -> Self {
        TransportConfig::Network {
            address: address.into(),
            port: DEFAULT_NETWORK_PORT,
        }
    }

    pub fn bluetooth(address: impl Into<String>) -> Self {
        TransportConfig::Bluetooth {
            address: address.into(),
            channel: DEFAULT_RFCOMM_CHANNEL,
        }
    }

    /// Build from loose, form-style fields
    ///
    /// `port` is the TCP port for network printers and the RFCOMM channel
    /// for Bluetooth printers. Fields that do not belong to `kind` are
    /// rejected rather than ignored.
    pub fn from_parts(
        kind: &str,
        vendor_id: Option<&str>,
        product_id: Option<&str>,
        address: Option<&str>,
        port: Option<u16>,
    ) -> PrintResult<Self> {
        let kind: TransportKind = kind.parse()?;
        let address = address.map(str::trim).filter(|a| !a.is_empty());
        let has_ids = vendor_id.is_some() || product_id.is_some();

        let config = match kind {
            TransportKind::Usb => {
                if address.is_some() || port.is_some() {
                    return Err(PrintError::InvalidConfig(
                        "USB printers take vendor/product IDs, not an address or port".into(),
                    ));
                }
                let vendor = vendor_id.ok_or_else(|| {
                    PrintError::InvalidConfig("USB vendor ID is required".into())
                })?;
                let product = product_id.ok_or_else(|| {
                    PrintError::InvalidConfig("USB product ID is required".into())
                })?;
                TransportConfig::usb(parse_usb_id(vendor)?, parse_usb_id(product)?)
            }
            TransportKind::Network => {
                if has_ids {
                    return Err(PrintError::InvalidConfig(
                        "Network printers take an address, not USB IDs".into(),
                    ));
                }
                let address = address.ok_or_else(|| {
                    PrintError::InvalidConfig("Network printer address is required".into())
                })?;
                TransportConfig::Network {
                    address: address.to_string(),
                    port: port.unwrap_or(DEFAULT_NETWORK_PORT),
                }
            }
            TransportKind::Bluetooth => {
                if has_ids {
                    return Err(PrintError::InvalidConfig(
                        "Bluetooth printers take an address, not USB IDs".into(),
                    ));
                }
                let address = address.ok_or_else(|| {
                    PrintError::InvalidConfig("Bluetooth address is required".into())
                })?;
                let channel = match port {
                    Some(p) => u8::try_from(p).map_err(|_| {
                        PrintError::InvalidConfig(format!("Invalid RFCOMM channel: {}", p))
                    })?,
                    None => DEFAULT_RFCOMM_CHANNEL,
                };
                TransportConfig::Bluetooth {
                    address: address.to_string(),
                    channel,
                }
            }
            TransportKind::Dummy => {
                if has_ids || address.is_some() || port.is_some() {
                    return Err(PrintError::InvalidConfig(
                        "Test mode takes no printer settings".into(),
                    ));
                }
                TransportConfig::Dummy
            }
        };

        config.validate_shape()?;
        Ok(config)
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            TransportConfig::Usb { .. } => TransportKind::Usb,
            TransportConfig::Network { .. } => TransportKind::Network,
            TransportConfig::Bluetooth { .. } => TransportKind::Bluetooth,
            TransportConfig::Dummy => TransportKind::Dummy,
        }
    }

    /// Short target description used in messages
    pub fn describe(&self) -> String {
        match self {
            TransportConfig::Usb {
                vendor_id,
                product_id,
            } => format!("USB (0x{:04x}:0x{:04x})", vendor_id, product_id),
            TransportConfig::Network { address, port } => {
                format!("Network ({}:{})", address, port)
            }
            TransportConfig::Bluetooth { address, channel } => {
                format!("Bluetooth ({} ch {})", address, channel)
            }
            TransportConfig::Dummy => "Test mode".to_string(),
        }
    }

    /// Check field values and host capabilities before any I/O
    pub fn validate(&self, capabilities: &Capabilities) -> PrintResult<()> {
        self.validate_shape()?;

        match self.kind() {
            TransportKind::Usb if !capabilities.usb => Err(PrintError::TransportUnavailable(
                "USB support is not available on this host".into(),
            )),
            TransportKind::Bluetooth if !capabilities.bluetooth => {
                Err(PrintError::TransportUnavailable(
                    "Bluetooth support is not available on this host".into(),
                ))
            }
            _ => Ok(()),
        }
    }

    fn validate_shape(&self) -> PrintResult<()> {
        match self {
            TransportConfig::Usb { .. } => Ok(()),
            TransportConfig::Network { address, port } => {
                if address.trim().is_empty() || address.contains(char::is_whitespace) {
                    return Err(PrintError::InvalidConfig(format!(
                        "Invalid network address: {:?}",
                        address
                    )));
                }
                if *port == 0 {
                    return Err(PrintError::InvalidConfig("Port 0 is not valid".into()));
                }
                Ok(())
            }
            TransportConfig::Bluetooth { address, channel } => {
                parse_bt_address(address)?;
                if !(1..=30).contains(channel) {
                    return Err(PrintError::InvalidConfig(format!(
                        "RFCOMM channel must be 1-30, got {}",
                        channel
                    )));
                }
                Ok(())
            }
            TransportConfig::Dummy => Ok(()),
        }
    }
}

/// Parse a USB vendor/product ID written in hex, with or without `0x`
pub fn parse_usb_id(s: &str) -> PrintResult<u16> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    u16::from_str_radix(digits, 16)
        .map_err(|_| PrintError::InvalidConfig(format!("Invalid hex USB ID: {:?}", s)))
}

/// Parse a Bluetooth address `AA:BB:CC:DD:EE:FF`
pub fn parse_bt_address(s: &str) -> PrintResult<[u8; 6]> {
    let invalid = || PrintError::InvalidConfig(format!("Invalid Bluetooth address: {:?}", s));

    let mut bytes = [0u8; 6];
    let mut parts = s.trim().split(':');
    for byte in bytes.iter_mut() {
        let part = parts.next().ok_or_else(invalid)?;
        if part.len() != 2 {
            return Err(invalid());
        }
        *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
    }
    if parts.next().is_some() {
        return Err(invalid());
    }
    Ok(bytes)
}

/// Builds concrete transports from configs
#[derive(Clone)]
pub struct TransportFactory {
    settings: PrinterConfig,
    usb_backend: Option<Arc<dyn UsbBackend>>,
}

impl TransportFactory {
    pub fn new(settings: PrinterConfig) -> Self {
        Self {
            settings,
            usb_backend: None,
        }
    }

    /// Use a specific USB backend instead of the system libusb
    pub fn with_usb_backend(mut self, backend: Arc<dyn UsbBackend>) -> Self {
        self.usb_backend = Some(backend);
        self
    }

    pub fn settings(&self) -> &PrinterConfig {
        &self.settings
    }

    /// USB backend in use, creating the libusb one on first need
    pub fn usb_backend(&self) -> PrintResult<Arc<dyn UsbBackend>> {
        match &self.usb_backend {
            Some(backend) => Ok(Arc::clone(backend)),
            None => usb::system_backend(),
        }
    }

    /// Create an unopened transport for `config`
    pub fn create(
        &self,
        config: &TransportConfig,
        purpose: ConnectPurpose,
    ) -> PrintResult<Box<dyn Transport>> {
        let transport: Box<dyn Transport> = match config {
            TransportConfig::Usb {
                vendor_id,
                product_id,
            } => Box::new(UsbTransport::new(
                self.usb_backend()?,
                *vendor_id,
                *product_id,
                &self.settings,
            )),
            TransportConfig::Network { address, port } => {
                let timeout = match purpose {
                    ConnectPurpose::Print => self.settings.network_timeout,
                    ConnectPurpose::Test => self.settings.network_test_timeout,
                };
                Box::new(NetworkTransport::new(address, *port).with_timeout(timeout))
            }
            TransportConfig::Bluetooth { address, channel } => Box::new(
                BluetoothTransport::new(address, *channel)?
                    .with_timeout(self.settings.bluetooth_timeout),
            ),
            TransportConfig::Dummy => Box::new(DummyTransport::new()),
        };
        Ok(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_usb_id() {
        assert_eq!(parse_usb_id("09c5").unwrap(), 0x09c5);
        assert_eq!(parse_usb_id("0x588E").unwrap(), 0x588e);
        assert_eq!(parse_usb_id(" 0X04b8 ").unwrap(), 0x04b8);
        assert!(parse_usb_id("xyz").is_err());
        assert!(parse_usb_id("12345").is_err());
    }

    #[test]
    fn test_parse_bt_address() {
        assert_eq!(
            parse_bt_address("00:11:22:33:44:55").unwrap(),
            [0x00, 0x11, 0x22, 0x33, 0x44, 0x55]
        );
        assert!(parse_bt_address("00:11:22:33:44").is_err());
        assert!(parse_bt_address("00:11:22:33:44:55:66").is_err());
        assert!(parse_bt_address("0:11:22:33:44:55").is_err());
        assert!(parse_bt_address("GG:11:22:33:44:55").is_err());
    }

    #[test]
    fn test_from_parts_usb() {
        let config = TransportConfig::from_parts("usb", Some("09c5"), Some("588e"), None, None)
            .unwrap();
        assert_eq!(config, TransportConfig::usb(0x09c5, 0x588e));
    }

    #[test]
    fn test_from_parts_network_default_port() {
        let config =
            TransportConfig::from_parts("network", None, None, Some("192.168.1.50"), None)
                .unwrap();
        assert_eq!(
            config,
            TransportConfig::Network {
                address: "192.168.1.50".into(),
                port: 9100
            }
        );
    }

    #[test]
    fn test_from_parts_bluetooth_default_channel() {
        let config = TransportConfig::from_parts(
            "bluetooth",
            None,
            None,
            Some("66:77:88:99:AA:BB"),
            None,
        )
        .unwrap();
        assert_eq!(config, TransportConfig::bluetooth("66:77:88:99:AA:BB"));
    }

    #[test]
    fn test_from_parts_rejects_conflicts() {
        let err = TransportConfig::from_parts(
            "usb",
            Some("09c5"),
            Some("588e"),
            Some("192.168.1.50"),
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);

        let err = TransportConfig::from_parts("network", Some("09c5"), None, Some("10.0.0.1"), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);

        let err =
            TransportConfig::from_parts("dummy", None, None, Some("10.0.0.1"), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    }

    #[test]
    fn test_from_parts_rejects_missing() {
        let err = TransportConfig::from_parts("usb", Some("09c5"), None, None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);

        let err = TransportConfig::from_parts("network", None, None, Some("  "), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);

        let err = TransportConfig::from_parts("serial", None, None, None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    }

    #[test]
    fn test_validate_checks_capabilities() {
        let none = Capabilities::none();

        let err = TransportConfig::usb(0x09c5, 0x588e)
            .validate(&none)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportUnavailable);

        let err = TransportConfig::bluetooth("00:11:22:33:44:55")
            .validate(&none)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportUnavailable);

        assert!(TransportConfig::network("10.0.0.9").validate(&none).is_ok());
        assert!(TransportConfig::Dummy.validate(&none).is_ok());
    }

    #[test]
    fn test_validate_shape_before_capability() {
        let err = TransportConfig::bluetooth("not-an-address")
            .validate(&Capabilities::none())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    }

    #[test]
    fn test_serde_tagged() {
        let config: TransportConfig =
            serde_json::from_str(r#"{"type":"network","address":"10.0.0.9"}"#).unwrap();
        assert_eq!(config, TransportConfig::network("10.0.0.9"));

        let json = serde_json::to_value(TransportConfig::usb(0x09c5, 0x588e)).unwrap();
        assert_eq!(json["type"], "usb");
        assert_eq!(json["vendor_id"], 0x09c5);
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("USB".parse::<TransportKind>().unwrap(), TransportKind::Usb);
        assert_eq!(
            "bluetooth".parse::<TransportKind>().unwrap(),
            TransportKind::Bluetooth
        );
        assert!("fax".parse::<TransportKind>().is_err());
    }
}
