//! libusb backend

use std::time::Duration;

use rusb::{Direction, TransferType, UsbContext};
use tracing::warn;

use super::{EndpointTransfer, OutEndpoint, UsbBackend, UsbDevice, UsbDeviceInfo, UsbError};
use crate::error::{PrintError, PrintResult};

impl From<rusb::Error> for UsbError {
    fn from(e: rusb::Error) -> Self {
        match e {
            rusb::Error::NotFound => UsbError::NotFound,
            rusb::Error::NoDevice => UsbError::NoDevice,
            rusb::Error::Access => UsbError::Access,
            rusb::Error::Busy => UsbError::Busy,
            rusb::Error::Timeout => UsbError::Timeout,
            rusb::Error::NotSupported => UsbError::NotSupported,
            other => UsbError::Other(other.to_string()),
        }
    }
}

/// System libusb
pub struct RusbBackend {
    context: rusb::Context,
}

impl RusbBackend {
    pub fn new() -> PrintResult<Self> {
        let context = rusb::Context::new().map_err(|e| {
            PrintError::TransportUnavailable(format!("libusb initialisation failed: {}", e))
        })?;
        Ok(Self { context })
    }

    fn devices(&self) -> PrintResult<rusb::DeviceList<rusb::Context>> {
        self.context
            .devices()
            .map_err(|e| PrintError::Discovery(format!("USB enumeration failed: {}", e)))
    }
}

impl UsbBackend for RusbBackend {
    fn list_devices(&self) -> PrintResult<Vec<UsbDeviceInfo>> {
        let mut found = Vec::new();
        for device in self.devices()?.iter() {
            match device.device_descriptor() {
                Ok(desc) => found.push(UsbDeviceInfo {
                    vendor_id: desc.vendor_id(),
                    product_id: desc.product_id(),
                    bus: device.bus_number(),
                    address: device.address(),
                }),
                Err(e) => {
                    warn!(bus = device.bus_number(), address = device.address(), error = %e, "Unreadable device descriptor");
                }
            }
        }
        Ok(found)
    }

    fn open(&self, vendor_id: u16, product_id: u16) -> PrintResult<Box<dyn UsbDevice>> {
        let target = format!("0x{:04x}:0x{:04x}", vendor_id, product_id);

        let device = self
            .devices()?
            .iter()
            .find(|device| {
                device
                    .device_descriptor()
                    .map(|d| d.vendor_id() == vendor_id && d.product_id() == product_id)
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                PrintError::DeviceNotFound(format!(
                    "USB printer {} not found. Check connection and device IDs.",
                    target
                ))
            })?;

        let handle = device
            .open()
            .map_err(|e| UsbError::from(e).into_print_error(&format!("Opening {}", target)))?;

        Ok(Box::new(RusbDevice { device, handle }))
    }
}

struct RusbDevice {
    device: rusb::Device<rusb::Context>,
    handle: rusb::DeviceHandle<rusb::Context>,
}

impl UsbDevice for RusbDevice {
    fn active_interface_count(&self) -> Result<u8, UsbError> {
        Ok(self.device.active_config_descriptor()?.num_interfaces())
    }

    fn descriptor_interface_count(&self) -> Option<u8> {
        self.device
            .config_descriptor(0)
            .ok()
            .map(|config| config.num_interfaces())
    }

    fn kernel_driver_active(&self, interface: u8) -> Result<bool, UsbError> {
        Ok(self.handle.kernel_driver_active(interface)?)
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), UsbError> {
        Ok(self.handle.detach_kernel_driver(interface)?)
    }

    fn attach_kernel_driver(&mut self, interface: u8) -> Result<(), UsbError> {
        Ok(self.handle.attach_kernel_driver(interface)?)
    }

    fn reset(&mut self) -> Result<(), UsbError> {
        Ok(self.handle.reset()?)
    }

    fn set_configuration(&mut self) -> Result<(), UsbError> {
        let config = self.device.config_descriptor(0)?;
        Ok(self.handle.set_active_configuration(config.number())?)
    }

    fn out_endpoint(&self) -> Result<Option<OutEndpoint>, UsbError> {
        let config = self.device.active_config_descriptor()?;
        for interface in config.interfaces() {
            if interface.number() != super::PRINTER_INTERFACE {
                continue;
            }
            for setting in interface.descriptors() {
                if setting.setting_number() != 0 {
                    continue;
                }
                for endpoint in setting.endpoint_descriptors() {
                    if endpoint.direction() == Direction::Out {
                        let transfer = match endpoint.transfer_type() {
                            TransferType::Interrupt => EndpointTransfer::Interrupt,
                            _ => EndpointTransfer::Bulk,
                        };
                        return Ok(Some(OutEndpoint {
                            address: endpoint.address(),
                            transfer,
                        }));
                    }
                }
            }
        }
        Ok(None)
    }

    fn claim_interface(&mut self, interface: u8) -> Result<(), UsbError> {
        Ok(self.handle.claim_interface(interface)?)
    }

    fn release_interface(&mut self, interface: u8) -> Result<(), UsbError> {
        Ok(self.handle.release_interface(interface)?)
    }

    fn write(
        &mut self,
        endpoint: &OutEndpoint,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, UsbError> {
        let written = match endpoint.transfer {
            EndpointTransfer::Bulk => self.handle.write_bulk(endpoint.address, data, timeout)?,
            EndpointTransfer::Interrupt => {
                self.handle
                    .write_interrupt(endpoint.address, data, timeout)?
            }
        };
        Ok(written)
    }
}
