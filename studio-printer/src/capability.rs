//! Host capability detection
//!
//! USB and Bluetooth support depend on both the build (cargo features) and
//! the host (libusb present, a Bluetooth adapter registered). Detection runs
//! once and the resulting flags are passed to configuration validation and
//! discovery.

use serde::Serialize;

/// Which optional transports this host can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub usb: bool,
    pub bluetooth: bool,
}

impl Capabilities {
    /// Probe the host
    pub fn detect() -> Self {
        let caps = Self {
            usb: detect_usb(),
            bluetooth: detect_bluetooth(),
        };
        tracing::debug!(usb = caps.usb, bluetooth = caps.bluetooth, "Detected printer capabilities");
        caps
    }

    /// Everything available
    pub fn all() -> Self {
        Self {
            usb: true,
            bluetooth: true,
        }
    }

    /// Only network and dummy transports
    pub fn none() -> Self {
        Self {
            usb: false,
            bluetooth: false,
        }
    }
}

#[cfg(feature = "usb")]
fn detect_usb() -> bool {
    match rusb::Context::new() {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "libusb unavailable, USB printing disabled");
            false
        }
    }
}

#[cfg(not(feature = "usb"))]
fn detect_usb() -> bool {
    false
}

#[cfg(all(feature = "bluetooth", target_os = "linux"))]
fn detect_bluetooth() -> bool {
    let adapters = std::fs::read_dir("/sys/class/bluetooth")
        .map(|entries| entries.flatten().count())
        .unwrap_or(0);
    if adapters == 0 {
        tracing::warn!("No Bluetooth adapter found, Bluetooth printing disabled");
    }
    adapters > 0
}

#[cfg(not(all(feature = "bluetooth", target_os = "linux")))]
fn detect_bluetooth() -> bool {
    false
}
