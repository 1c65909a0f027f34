//! Device discovery
//!
//! Lists printers that could be configured. Independent of sessions:
//! nothing here opens a device for printing.

use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::error::{PrintError, PrintResult};
use crate::transport::usb::{known_model, UsbBackend};

/// A device found by a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceDescriptor {
    Usb {
        vendor_id: u16,
        product_id: u16,
        /// Set when the pair is a known receipt printer
        known_model: Option<String>,
    },
    Bluetooth {
        address: String,
        name: Option<String>,
    },
}

impl DeviceDescriptor {
    /// One-line summary for listings
    pub fn summary(&self) -> String {
        match self {
            DeviceDescriptor::Usb {
                vendor_id,
                product_id,
                known_model,
            } => match known_model {
                Some(model) => format!("0x{:04x}:0x{:04x}  {}", vendor_id, product_id, model),
                None => format!("0x{:04x}:0x{:04x}", vendor_id, product_id),
            },
            DeviceDescriptor::Bluetooth { address, name } => {
                format!("{}  {}", address, name.as_deref().unwrap_or("(unknown)"))
            }
        }
    }
}

/// Every attached USB device
pub fn discover_usb(backend: &dyn UsbBackend) -> PrintResult<Vec<DeviceDescriptor>> {
    let devices = backend.list_devices()?;
    let mut found = Vec::with_capacity(devices.len());

    for device in devices {
        let model = known_model(device.vendor_id, device.product_id);
        if let Some(model) = model {
            info!(
                "Found printer: {} (VID={:04x} PID={:04x})",
                model, device.vendor_id, device.product_id
            );
        }
        found.push(DeviceDescriptor::Usb {
            vendor_id: device.vendor_id,
            product_id: device.product_id,
            known_model: model.map(str::to_string),
        });
    }

    info!(count = found.len(), "USB scan complete");
    Ok(found)
}

/// Bluetooth inquiry scan with name lookup, bounded by `scan`
#[cfg(all(feature = "bluetooth", target_os = "linux"))]
pub fn discover_bluetooth(scan: Duration) -> PrintResult<Vec<DeviceDescriptor>> {
    let runtime = crate::transport::bluetooth::runtime()?;
    let found = runtime.block_on(bluez::scan(scan))?;

    info!(count = found.len(), "Bluetooth scan complete");
    Ok(found)
}

#[cfg(not(all(feature = "bluetooth", target_os = "linux")))]
pub fn discover_bluetooth(_scan: Duration) -> PrintResult<Vec<DeviceDescriptor>> {
    Err(PrintError::TransportUnavailable(
        "Bluetooth discovery needs Linux with BlueZ".into(),
    ))
}

/// Discovery only reads adapter state; a powered-off adapter stays off
#[cfg_attr(
    not(all(feature = "bluetooth", target_os = "linux")),
    allow(dead_code)
)]
fn require_powered(adapter: &str, powered: bool) -> PrintResult<()> {
    if powered {
        Ok(())
    } else {
        Err(PrintError::TransportUnavailable(format!(
            "Bluetooth adapter {} is powered off",
            adapter
        )))
    }
}

#[cfg(all(feature = "bluetooth", target_os = "linux"))]
mod bluez {
    use std::time::Duration;

    use bluer::{Address, AdapterEvent};
    use futures::{pin_mut, StreamExt};
    use tracing::debug;

    use super::{require_powered, DeviceDescriptor};
    use crate::error::{PrintError, PrintResult};

    fn scan_failed(e: bluer::Error) -> PrintError {
        PrintError::Discovery(format!("Bluetooth scan failed: {}", e))
    }

    pub async fn scan(duration: Duration) -> PrintResult<Vec<DeviceDescriptor>> {
        let session = bluer::Session::new().await.map_err(scan_failed)?;
        let adapter = session.default_adapter().await.map_err(scan_failed)?;
        require_powered(adapter.name(), adapter.is_powered().await.map_err(scan_failed)?)?;
        debug!(adapter = adapter.name(), "Starting Bluetooth inquiry");

        let mut seen: Vec<Address> = Vec::new();
        {
            let events = adapter.discover_devices().await.map_err(scan_failed)?;
            pin_mut!(events);
            let deadline = tokio::time::sleep(duration);
            tokio::pin!(deadline);

            loop {
                tokio::select! {
                    _ = &mut deadline => break,
                    event = events.next() => match event {
                        Some(AdapterEvent::DeviceAdded(address)) => {
                            if !seen.contains(&address) {
                                seen.push(address);
                            }
                        }
                        Some(_) => {}
                        None => break,
                    },
                }
            }
        }

        let mut found = Vec::with_capacity(seen.len());
        for address in seen {
            let name = match adapter.device(address) {
                Ok(device) => device.name().await.ok().flatten(),
                Err(_) => None,
            };
            found.push(DeviceDescriptor::Bluetooth {
                address: address.to_string(),
                name,
            });
        }
        Ok(found)
    }
}
