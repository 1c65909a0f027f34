//! Async wrappers around the blocking print service
//!
//! Transports do blocking I/O (libusb transfers, socket writes, the
//! Bluetooth runtime), so async callers hand the call to tokio's blocking
//! pool and bound how long they wait for it. A call that outlives its
//! timeout keeps running on the pool and still closes its transport.

use std::time::Duration;

use shared::{Company, Invoice};
use tracing::warn;

use crate::error::{PrintError, PrintResult};
use crate::service::{PrintOutcome, PrintService};
use crate::transport::{TransportConfig, TransportKind};
use crate::discovery::DeviceDescriptor;

/// Print on the blocking pool, giving up after `timeout`
pub async fn print_with_timeout(
    service: &PrintService,
    invoice: Invoice,
    company: Company,
    config: TransportConfig,
    timeout: Duration,
) -> PrintOutcome {
    let kind = config.kind();
    let service = service.clone();
    run_blocking(kind, "Print", timeout, move || {
        service.print(&invoice, &company, &config)
    })
    .await
}

/// Test the connection on the blocking pool, giving up after `timeout`
pub async fn test_connection_with_timeout(
    service: &PrintService,
    config: TransportConfig,
    timeout: Duration,
) -> PrintOutcome {
    let kind = config.kind();
    let service = service.clone();
    run_blocking(kind, "Connection test", timeout, move || {
        service.test_connection(&config)
    })
    .await
}

/// Print the diagnostic page on the blocking pool
pub async fn test_page_with_timeout(
    service: &PrintService,
    company: Company,
    config: TransportConfig,
    timeout: Duration,
) -> PrintOutcome {
    let kind = config.kind();
    let service = service.clone();
    run_blocking(kind, "Test page", timeout, move || {
        service.print_test_page(&company, &config)
    })
    .await
}

/// Run discovery on the blocking pool
pub async fn discover(service: &PrintService, kind: TransportKind) -> PrintResult<Vec<DeviceDescriptor>> {
    let service = service.clone();
    tokio::task::spawn_blocking(move || service.discover(kind))
        .await
        .map_err(|e| PrintError::Discovery(format!("discovery task failed: {}", e)))?
}

async fn run_blocking<F>(kind: TransportKind, action: &'static str, timeout: Duration, f: F) -> PrintOutcome
where
    F: FnOnce() -> PrintOutcome + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(f);

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            let err = PrintError::Protocol(format!("worker task failed: {}", e));
            PrintOutcome::failure(kind, action, &err, 0)
        }
        Err(_) => {
            warn!(?timeout, "{} still running after timeout, abandoning wait", action);
            let err = PrintError::Protocol(format!("no result within {:?}", timeout));
            PrintOutcome::failure(kind, action, &err, 0)
        }
    }
}
