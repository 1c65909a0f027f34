//! Print service
//!
//! Boundary used by the billing application and the CLI. Every operation
//! returns a [`PrintOutcome`] instead of an error: failures, including
//! panics inside a transport, become `ok = false` with a classified
//! message.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use shared::{Company, Invoice};
use tracing::{error, info, info_span, Span};

use crate::capability::Capabilities;
use crate::config::PrinterConfig;
use crate::discovery::{self, DeviceDescriptor};
use crate::error::{ErrorKind, PrintError, PrintResult};
use crate::receipt::{ReceiptOptions, ReceiptRenderer};
use crate::session::PrinterSession;
use crate::transport::{
    ConnectPurpose, TransportConfig, TransportFactory, TransportKind, UsbBackend,
};

/// Result of a print or connection test
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrintOutcome {
    pub ok: bool,
    pub message: String,
    pub transport: TransportKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    /// Bytes that reached the device (partial on write failure)
    pub bytes_sent: usize,
}

impl PrintOutcome {
    pub fn success(transport: TransportKind, message: impl Into<String>, bytes_sent: usize) -> Self {
        Self {
            ok: true,
            message: message.into(),
            transport,
            error: None,
            bytes_sent,
        }
    }

    /// Failed outcome; the message carries the operator hint
    pub fn failure(transport: TransportKind, action: &str, err: &PrintError, bytes_sent: usize) -> Self {
        Self {
            ok: false,
            message: format!("{} failed: {}. {}", action, err, err.hint()),
            transport,
            error: Some(err.kind()),
            bytes_sent,
        }
    }
}

/// Receipt printing boundary
#[derive(Clone)]
pub struct PrintService {
    factory: TransportFactory,
    capabilities: Capabilities,
    renderer: Arc<ReceiptRenderer>,
}

impl PrintService {
    pub fn new(settings: PrinterConfig, capabilities: Capabilities) -> Self {
        let renderer = Arc::new(ReceiptRenderer::from_config(&settings));
        Self {
            factory: TransportFactory::new(settings),
            capabilities,
            renderer,
        }
    }

    /// Settings from the environment, capabilities probed from the host
    pub fn from_env() -> Self {
        Self::new(PrinterConfig::from_env(), Capabilities::detect())
    }

    /// Route USB through `backend` instead of the system libusb
    pub fn with_usb_backend(mut self, backend: Arc<dyn UsbBackend>) -> Self {
        self.factory = self.factory.with_usb_backend(backend);
        self
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn settings(&self) -> &PrinterConfig {
        self.factory.settings()
    }

    /// Print a receipt, stamped with the current local time
    pub fn print(&self, invoice: &Invoice, company: &Company, config: &TransportConfig) -> PrintOutcome {
        self.print_at(invoice, company, config, now())
    }

    /// Print a receipt stamped `printed_at`
    ///
    /// The Dummy transport renders the preview variant and discards it.
    pub fn print_at(
        &self,
        invoice: &Invoice,
        company: &Company,
        config: &TransportConfig,
        printed_at: NaiveDateTime,
    ) -> PrintOutcome {
        let span = info_span!(
            "print_receipt",
            invoice = %invoice.invoice_no,
            transport = %config.kind()
        );
        let _enter = span.enter();

        let kind = config.kind();
        let options = ReceiptOptions::new(printed_at).test_mode(kind == TransportKind::Dummy);

        guarded(kind, "Print", || {
            let data = self.renderer.render(invoice, company, &options);
            let (result, bytes_sent) = self.deliver(config, ConnectPurpose::Print, Some(&data));
            match result {
                Ok(()) => {
                    info!(bytes_sent, "Receipt printed");
                    PrintOutcome::success(kind, print_success_message(config), bytes_sent)
                }
                Err(e) => PrintOutcome::failure(kind, "Print", &e, bytes_sent),
            }
        })
    }

    /// Open and close the printer without sending anything
    pub fn test_connection(&self, config: &TransportConfig) -> PrintOutcome {
        let span = info_span!("test_connection", transport = %config.kind());
        let _enter = span.enter();

        let kind = config.kind();
        guarded(kind, "Connection test", || {
            if kind == TransportKind::Dummy {
                return PrintOutcome::success(
                    kind,
                    "Test mode connection successful - No actual printer required",
                    0,
                );
            }
            match self.deliver(config, ConnectPurpose::Test, None) {
                (Ok(()), _) => PrintOutcome::success(
                    kind,
                    format!("{} printer connection successful!", config.describe()),
                    0,
                ),
                (Err(e), bytes_sent) => PrintOutcome::failure(kind, "Connection test", &e, bytes_sent),
            }
        })
    }

    /// Print the diagnostic page
    pub fn print_test_page(&self, company: &Company, config: &TransportConfig) -> PrintOutcome {
        self.print_test_page_at(company, config, now())
    }

    pub fn print_test_page_at(
        &self,
        company: &Company,
        config: &TransportConfig,
        printed_at: NaiveDateTime,
    ) -> PrintOutcome {
        let span = info_span!("print_test_page", transport = %config.kind());
        let _enter = span.enter();

        let kind = config.kind();
        guarded(kind, "Test page", || {
            let data = self
                .renderer
                .render_test_page(company, &config.describe(), printed_at);
            match self.deliver(config, ConnectPurpose::Print, Some(&data)) {
                (Ok(()), bytes_sent) => PrintOutcome::success(
                    kind,
                    format!("Test page printed via {}. Check your printer.", config.describe()),
                    bytes_sent,
                ),
                (Err(e), bytes_sent) => PrintOutcome::failure(kind, "Test page", &e, bytes_sent),
            }
        })
    }

    /// Render the test-mode receipt without opening anything
    pub fn preview(&self, invoice: &Invoice, company: &Company) -> Vec<u8> {
        self.preview_at(invoice, company, now())
    }

    pub fn preview_at(&self, invoice: &Invoice, company: &Company, printed_at: NaiveDateTime) -> Vec<u8> {
        let options = ReceiptOptions::new(printed_at).test_mode(true);
        self.renderer.render(invoice, company, &options)
    }

    /// Scan for printers of `kind` (USB or Bluetooth)
    pub fn discover(&self, kind: TransportKind) -> PrintResult<Vec<DeviceDescriptor>> {
        let _enter = info_span!("discover", %kind).entered();

        match kind {
            TransportKind::Usb => {
                if !self.capabilities.usb {
                    return Err(PrintError::TransportUnavailable(
                        "USB support is not available on this host".into(),
                    ));
                }
                let backend = self.factory.usb_backend()?;
                discovery::discover_usb(backend.as_ref())
            }
            TransportKind::Bluetooth => {
                if !self.capabilities.bluetooth {
                    return Err(PrintError::TransportUnavailable(
                        "Bluetooth support is not available on this host".into(),
                    ));
                }
                discovery::discover_bluetooth(self.settings().bluetooth_scan)
            }
            other => Err(PrintError::InvalidConfig(format!(
                "Discovery is not supported for {} printers",
                other
            ))),
        }
    }

    /// Validate, connect, optionally write, always close
    ///
    /// Returns the primary result and the bytes that reached the device.
    /// Close errors are logged by the session and never replace the result.
    fn deliver(
        &self,
        config: &TransportConfig,
        purpose: ConnectPurpose,
        data: Option<&[u8]>,
    ) -> (PrintResult<()>, usize) {
        if let Err(e) = config.validate(&self.capabilities) {
            return (Err(e), 0);
        }
        let transport = match self.factory.create(config, purpose) {
            Ok(t) => t,
            Err(e) => return (Err(e), 0),
        };

        let mut session = PrinterSession::with_parent_span(transport, &Span::current());
        let mut result = session.open();
        if let (Ok(()), Some(data)) = (&result, data) {
            result = session.send(data).map(|_| ());
        }
        let _ = session.close();

        (result, session.bytes_sent())
    }
}

fn print_success_message(config: &TransportConfig) -> String {
    match config {
        TransportConfig::Usb { .. } => "Receipt printed successfully via USB printer".to_string(),
        TransportConfig::Network { address, .. } => {
            format!("Receipt printed successfully via network printer ({})", address)
        }
        TransportConfig::Bluetooth { address, .. } => {
            format!("Receipt printed successfully via Bluetooth printer ({})", address)
        }
        TransportConfig::Dummy => {
            "Test mode: Receipt preview generated successfully! No actual printing performed."
                .to_string()
        }
    }
}

/// Run `f`, converting a panic into a failed outcome
fn guarded<F>(kind: TransportKind, action: &str, f: F) -> PrintOutcome
where
    F: FnOnce() -> PrintOutcome,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            error!(%reason, "{} panicked", action);
            let err = PrintError::Protocol(format!("internal error: {}", reason));
            PrintOutcome::failure(kind, action, &err, 0)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}
