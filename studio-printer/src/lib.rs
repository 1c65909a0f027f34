//! # studio-printer
//!
//! ESC/POS receipt printing for the studio billing application.
//!
//! ## Scope
//!
//! - Receipt and test-page rendering (58mm, fixed-width text)
//! - USB printing through libusb, with kernel-driver arbitration
//! - Network printing (TCP port 9100)
//! - Bluetooth printing (RFCOMM, Linux/BlueZ)
//! - Device discovery and host capability detection
//!
//! Invoices arrive fully computed (see the `shared` crate); nothing here
//! calculates totals or stores state.
//!
//! ## Example
//!
//! ```ignore
//! use studio_printer::{PrintService, TransportConfig};
//!
//! let service = PrintService::from_env();
//! let outcome = service.print(&invoice, &company, &TransportConfig::network("192.168.1.100"));
//! println!("{}", outcome.message);
//! ```

pub mod capability;
pub mod config;
pub mod discovery;
pub mod error;
pub mod escpos;
pub mod receipt;
pub mod service;
pub mod session;
pub mod text;
pub mod transport;
pub mod worker;

// Re-exports
pub use capability::Capabilities;
pub use config::PrinterConfig;
pub use discovery::DeviceDescriptor;
pub use error::{ErrorKind, PrintError, PrintResult};
pub use escpos::{to_plain_text, EscPosBuilder, FULL_CUT, INIT};
pub use receipt::{ReceiptOptions, ReceiptRenderer};
pub use service::{PrintOutcome, PrintService};
pub use session::{PrinterSession, SessionState};
pub use transport::{
    ConnectPurpose, Transport, TransportConfig, TransportFactory, TransportKind,
};
