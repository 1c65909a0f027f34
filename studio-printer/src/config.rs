//! Printer configuration
//!
//! # Environment variables
//!
//! Every setting can be overridden from the environment:
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | PRINTER_PAPER_WIDTH | 32 | Characters per line |
//! | PRINTER_CURRENCY | Rs. | Currency prefix on amounts |
//! | PRINTER_USB_CHUNK_SIZE | 64 | Bytes per USB write |
//! | PRINTER_USB_CHUNK_TIMEOUT_MS | 5000 | Timeout per USB chunk |
//! | PRINTER_USB_SETTLE_MS | 1000 | Delay after USB reset |
//! | PRINTER_NETWORK_TIMEOUT_SECS | 60 | TCP connect timeout when printing |
//! | PRINTER_NETWORK_TEST_TIMEOUT_SECS | 10 | TCP connect timeout for connection tests |
//! | PRINTER_BLUETOOTH_TIMEOUT_SECS | 30 | RFCOMM connect timeout |
//! | PRINTER_BLUETOOTH_SCAN_SECS | 8 | Bluetooth discovery scan length |

use std::time::Duration;

/// Tunables for encoding and transports
#[derive(Debug, Clone, PartialEq)]
pub struct PrinterConfig {
    /// Characters per line (58mm paper = 32)
    pub paper_width: usize,
    /// Prefix printed before every amount
    pub currency: String,
    /// Maximum bytes per USB transfer
    pub usb_chunk_size: usize,
    /// Timeout applied to each USB transfer
    pub usb_chunk_timeout: Duration,
    /// Delay after a USB reset before the device is used again
    pub usb_settle_delay: Duration,
    /// TCP connect timeout for print jobs
    pub network_timeout: Duration,
    /// TCP connect timeout for connection tests
    pub network_test_timeout: Duration,
    /// RFCOMM connect timeout
    pub bluetooth_timeout: Duration,
    /// How long a Bluetooth inquiry scan runs
    pub bluetooth_scan: Duration,
}

impl PrinterConfig {
    /// Load from environment, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            paper_width: env_parse("PRINTER_PAPER_WIDTH").unwrap_or(defaults.paper_width),
            currency: std::env::var("PRINTER_CURRENCY").unwrap_or(defaults.currency),
            usb_chunk_size: env_parse::<usize>("PRINTER_USB_CHUNK_SIZE")
                .filter(|size| *size > 0)
                .unwrap_or(defaults.usb_chunk_size),
            usb_chunk_timeout: env_parse("PRINTER_USB_CHUNK_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.usb_chunk_timeout),
            usb_settle_delay: env_parse("PRINTER_USB_SETTLE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.usb_settle_delay),
            network_timeout: env_parse("PRINTER_NETWORK_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.network_timeout),
            network_test_timeout: env_parse("PRINTER_NETWORK_TEST_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.network_test_timeout),
            bluetooth_timeout: env_parse("PRINTER_BLUETOOTH_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.bluetooth_timeout),
            bluetooth_scan: env_parse("PRINTER_BLUETOOTH_SCAN_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.bluetooth_scan),
        }
    }

    /// Shorten every wait, for tests and scripted devices
    pub fn without_delays(mut self) -> Self {
        self.usb_settle_delay = Duration::ZERO;
        self
    }
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            paper_width: 32,
            currency: "Rs.".to_string(),
            usb_chunk_size: 64,
            usb_chunk_timeout: Duration::from_secs(5),
            usb_settle_delay: Duration::from_secs(1),
            network_timeout: Duration::from_secs(60),
            network_test_timeout: Duration::from_secs(10),
            bluetooth_timeout: Duration::from_secs(30),
            bluetooth_scan: Duration::from_secs(8),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
