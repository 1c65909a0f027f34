mod common;

use std::io::Read;
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use common::{at, invoice_0007, studio};
use studio_printer::{
    Capabilities, ErrorKind, PrintService, PrinterConfig, ReceiptOptions, ReceiptRenderer,
    TransportConfig, TransportKind, FULL_CUT, INIT,
};

fn service() -> PrintService {
    PrintService::new(PrinterConfig::default(), Capabilities::none())
}

fn local_printer() -> (u16, thread::JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        let mut received = Vec::new();
        socket.read_to_end(&mut received).unwrap();
        received
    });
    (port, handle)
}

fn unused_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[test]
fn test_dummy_print_reports_preview() {
    let service = service();
    let printed_at = at(3, 14, 35);

    let outcome = service.print_at(&invoice_0007(), &studio(), &TransportConfig::Dummy, printed_at);
    assert!(outcome.ok);
    assert_eq!(outcome.transport, TransportKind::Dummy);
    assert_eq!(
        outcome.message,
        "Test mode: Receipt preview generated successfully! No actual printing performed."
    );

    let preview = service.preview_at(&invoice_0007(), &studio(), printed_at);
    assert_eq!(outcome.bytes_sent, preview.len());
    assert!(String::from_utf8_lossy(&preview).contains("*** TEST MODE ***"));
}

#[test]
fn test_dummy_connection_always_succeeds() {
    for _ in 0..3 {
        assert!(service().test_connection(&TransportConfig::Dummy).ok);
    }
}

#[test]
fn test_network_print_sends_receipt() {
    let (port, printer) = local_printer();
    let printed_at = at(3, 14, 35);
    let config = TransportConfig::Network {
        address: "127.0.0.1".into(),
        port,
    };

    let outcome = service().print_at(&invoice_0007(), &studio(), &config, printed_at);
    assert!(outcome.ok, "{}", outcome.message);
    assert_eq!(
        outcome.message,
        "Receipt printed successfully via network printer (127.0.0.1)"
    );

    let received = printer.join().unwrap();
    let expected = ReceiptRenderer::default().render(
        &invoice_0007(),
        &studio(),
        &ReceiptOptions::new(printed_at),
    );
    assert_eq!(received, expected);
    assert_eq!(outcome.bytes_sent, expected.len());
}

#[test]
fn test_network_refused_is_classified() {
    let config = TransportConfig::Network {
        address: "127.0.0.1".into(),
        port: unused_port(),
    };

    let outcome = service().test_connection(&config);
    assert!(!outcome.ok);
    assert_eq!(outcome.error, Some(ErrorKind::ConnectionRefused));
    assert!(outcome.message.contains("raw printing"));
}

#[test]
fn test_test_page_over_network() {
    let (port, printer) = local_printer();
    let config = TransportConfig::Network {
        address: "127.0.0.1".into(),
        port,
    };

    let outcome = service().print_test_page_at(&studio(), &config, at(4, 9, 0));
    assert!(outcome.ok, "{}", outcome.message);

    let received = printer.join().unwrap();
    assert!(received.starts_with(&INIT));
    assert!(received.ends_with(&FULL_CUT));
    let text = String::from_utf8_lossy(&received);
    assert!(text.contains(&format!("Printer: Network (127.0.0.1:{})", port)));
}

#[test]
fn test_missing_capability_fails_before_io() {
    let outcome = service().print(&invoice_0007(), &studio(), &TransportConfig::usb(0x09c5, 0x588e));
    assert!(!outcome.ok);
    assert_eq!(outcome.error, Some(ErrorKind::TransportUnavailable));
    assert_eq!(outcome.bytes_sent, 0);

    let outcome = service().test_connection(&TransportConfig::bluetooth("00:11:22:33:44:55"));
    assert_eq!(outcome.error, Some(ErrorKind::TransportUnavailable));
}

#[test]
fn test_bad_config_is_configuration_error() {
    let outcome = service().test_connection(&TransportConfig::Network {
        address: "".into(),
        port: 9100,
    });
    assert_eq!(outcome.error, Some(ErrorKind::ConfigurationError));

    let outcome = PrintService::new(PrinterConfig::default(), Capabilities::all())
        .test_connection(&TransportConfig::bluetooth("not-a-mac"));
    assert_eq!(outcome.error, Some(ErrorKind::ConfigurationError));
}

#[test]
fn test_discovery_without_capability() {
    let err = service().discover(TransportKind::Usb).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportUnavailable);

    let err = service().discover(TransportKind::Bluetooth).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportUnavailable);
}

#[tokio::test]
async fn test_worker_print_dummy() {
    let outcome = studio_printer::worker::print_with_timeout(
        &service(),
        invoice_0007(),
        studio(),
        TransportConfig::Dummy,
        Duration::from_secs(5),
    )
    .await;
    assert!(outcome.ok);
}
