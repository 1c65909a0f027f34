//! Scripted USB backend and fixtures shared by the integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use shared::{Company, Decimal, Invoice, LineItem};
use studio_printer::transport::usb::{
    EndpointTransfer, OutEndpoint, UsbBackend, UsbDevice, UsbDeviceInfo, UsbError,
};
use studio_printer::{PrintError, PrintResult};

/// How the scripted device behaves
#[derive(Debug, Clone)]
pub struct UsbScript {
    pub devices: Vec<(u16, u16)>,
    pub interfaces: Option<u8>,
    pub kernel_driver_active: bool,
    pub detach_fails: bool,
    pub reset_fails: bool,
    pub set_configuration_fails: bool,
    pub claim_fails: bool,
    pub endpoint: Option<OutEndpoint>,
    /// Zero-based write call that times out
    pub timeout_on_write: Option<usize>,
    /// Zero-based write call that panics
    pub panic_on_write: Option<usize>,
    pub open_error: Option<UsbError>,
}

impl Default for UsbScript {
    fn default() -> Self {
        Self {
            devices: vec![(0x09c5, 0x588e)],
            interfaces: Some(1),
            kernel_driver_active: false,
            detach_fails: false,
            reset_fails: false,
            set_configuration_fails: false,
            claim_fails: false,
            endpoint: Some(OutEndpoint {
                address: 0x01,
                transfer: EndpointTransfer::Bulk,
            }),
            timeout_on_write: None,
            panic_on_write: None,
            open_error: None,
        }
    }
}

/// Everything the device saw
#[derive(Debug, Default)]
pub struct UsbLog {
    pub calls: Vec<String>,
    pub writes: Vec<Vec<u8>>,
    pub write_attempts: usize,
}

impl UsbLog {
    pub fn called(&self, name: &str) -> bool {
        self.calls.iter().any(|c| c == name)
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.iter().filter(|c| *c == name).count()
    }

    pub fn received(&self) -> Vec<u8> {
        self.writes.concat()
    }
}

pub struct ScriptedBackend {
    script: UsbScript,
    log: Arc<Mutex<UsbLog>>,
}

impl ScriptedBackend {
    pub fn new(script: UsbScript) -> (Arc<Self>, Arc<Mutex<UsbLog>>) {
        let log = Arc::new(Mutex::new(UsbLog::default()));
        let backend = Arc::new(Self {
            script,
            log: Arc::clone(&log),
        });
        (backend, log)
    }
}

impl UsbBackend for ScriptedBackend {
    fn list_devices(&self) -> PrintResult<Vec<UsbDeviceInfo>> {
        Ok(self
            .script
            .devices
            .iter()
            .enumerate()
            .map(|(i, (vendor_id, product_id))| UsbDeviceInfo {
                vendor_id: *vendor_id,
                product_id: *product_id,
                bus: 1,
                address: i as u8 + 2,
            })
            .collect())
    }

    fn open(&self, vendor_id: u16, product_id: u16) -> PrintResult<Box<dyn UsbDevice>> {
        if !self.script.devices.contains(&(vendor_id, product_id)) {
            return Err(PrintError::DeviceNotFound(format!(
                "0x{:04x}:0x{:04x}",
                vendor_id, product_id
            )));
        }
        if let Some(e) = self.script.open_error.clone() {
            return Err(e.into_print_error("open"));
        }
        self.log.lock().unwrap().calls.push("open".into());
        Ok(Box::new(ScriptedDevice {
            script: self.script.clone(),
            log: Arc::clone(&self.log),
        }))
    }
}

struct ScriptedDevice {
    script: UsbScript,
    log: Arc<Mutex<UsbLog>>,
}

impl ScriptedDevice {
    fn record(&self, call: impl Into<String>) {
        self.log.lock().unwrap().calls.push(call.into());
    }

    fn step(&self, call: &str, fails: bool) -> Result<(), UsbError> {
        self.record(call);
        if fails {
            Err(UsbError::NotSupported)
        } else {
            Ok(())
        }
    }
}

impl UsbDevice for ScriptedDevice {
    fn active_interface_count(&self) -> Result<u8, UsbError> {
        self.script.interfaces.ok_or(UsbError::NotFound)
    }

    fn descriptor_interface_count(&self) -> Option<u8> {
        None
    }

    fn kernel_driver_active(&self, _interface: u8) -> Result<bool, UsbError> {
        Ok(self.script.kernel_driver_active)
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), UsbError> {
        self.step(&format!("detach:{}", interface), self.script.detach_fails)
    }

    fn attach_kernel_driver(&mut self, interface: u8) -> Result<(), UsbError> {
        self.step(&format!("attach:{}", interface), false)
    }

    fn reset(&mut self) -> Result<(), UsbError> {
        self.step("reset", self.script.reset_fails)
    }

    fn set_configuration(&mut self) -> Result<(), UsbError> {
        self.step("set_configuration", self.script.set_configuration_fails)
    }

    fn out_endpoint(&self) -> Result<Option<OutEndpoint>, UsbError> {
        Ok(self.script.endpoint)
    }

    fn claim_interface(&mut self, interface: u8) -> Result<(), UsbError> {
        self.step(&format!("claim:{}", interface), self.script.claim_fails)
    }

    fn release_interface(&mut self, interface: u8) -> Result<(), UsbError> {
        self.step(&format!("release:{}", interface), false)
    }

    fn write(
        &mut self,
        _endpoint: &OutEndpoint,
        data: &[u8],
        _timeout: Duration,
    ) -> Result<usize, UsbError> {
        let attempt = {
            let mut log = self.log.lock().unwrap();
            log.write_attempts += 1;
            log.write_attempts - 1
        };
        if self.script.panic_on_write == Some(attempt) {
            panic!("scripted device fault");
        }
        if self.script.timeout_on_write == Some(attempt) {
            return Err(UsbError::Timeout);
        }
        self.log.lock().unwrap().writes.push(data.to_vec());
        Ok(data.len())
    }
}

pub fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub fn studio() -> Company {
    Company::new(
        "Anand Digital Studio",
        "45 Gandhi Street\nMadurai 625001",
        "9443012345",
    )
}

/// 2 x 150.00 at 5% tax
pub fn invoice_0007() -> Invoice {
    Invoice::from_items(
        "INV-0007",
        at(3, 14, 30),
        "Priya",
        vec![LineItem::new(
            "Passport photo",
            2,
            Decimal::new(150, 0),
            Decimal::new(5, 0),
        )],
    )
}

pub fn untaxed_invoice() -> Invoice {
    Invoice::from_items(
        "INV-0008",
        at(3, 15, 0),
        "Kumar",
        vec![
            LineItem::new("Photo frame 8x10", 1, Decimal::new(450, 0), Decimal::ZERO),
            LineItem::new("Lamination", 3, Decimal::new(2550, 2), Decimal::ZERO),
        ],
    )
}
