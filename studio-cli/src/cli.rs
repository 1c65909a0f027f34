//! Command line definition

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use studio_printer::{PrintResult, TransportConfig, TransportKind};

#[derive(Debug, Parser)]
#[command(
    name = "studio-print",
    version,
    about = "ESC/POS receipt printing for the studio billing app"
)]
pub struct Cli {
    /// Log level when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// JSON log lines instead of pretty output
    #[arg(long, env = "LOG_JSON", global = true)]
    pub log_json: bool,

    /// Also write rotating log files here
    #[arg(long, env = "LOG_DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print a receipt for an invoice JSON file
    Print {
        /// Invoice JSON file
        invoice: PathBuf,
        #[command(flatten)]
        company: CompanyArgs,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Open and close the printer without printing
    Test {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Print the diagnostic page
    TestPage {
        #[command(flatten)]
        company: CompanyArgs,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Render the test-mode receipt without a printer
    Preview {
        /// Invoice JSON file
        invoice: PathBuf,
        #[command(flatten)]
        company: CompanyArgs,
        /// Write the raw ESC/POS bytes here instead of showing text
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// List attached USB devices or nearby Bluetooth devices
    Discover {
        /// usb or bluetooth
        #[arg(default_value = "usb")]
        kind: String,
    },
    /// Show which transports this host supports
    Capabilities,
}

/// Which printer to use
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// usb, network, bluetooth or dummy
    #[arg(long = "type", env = "PRINTER_TRANSPORT", default_value = "dummy")]
    pub kind: String,

    /// USB vendor ID in hex (e.g. 0x09c5)
    #[arg(long, env = "PRINTER_USB_VENDOR")]
    pub vendor: Option<String>,

    /// USB product ID in hex (e.g. 0x588e)
    #[arg(long, env = "PRINTER_USB_PRODUCT")]
    pub product: Option<String>,

    /// IP/host name or Bluetooth MAC address
    #[arg(long, env = "PRINTER_ADDRESS")]
    pub address: Option<String>,

    /// TCP port, or RFCOMM channel for Bluetooth
    #[arg(long, env = "PRINTER_PORT")]
    pub port: Option<u16>,

    /// Give up waiting after this many seconds
    #[arg(long, default_value_t = 120)]
    pub timeout_secs: u64,
}

impl TargetArgs {
    pub fn to_config(&self) -> PrintResult<TransportConfig> {
        TransportConfig::from_parts(
            &self.kind,
            self.vendor.as_deref(),
            self.product.as_deref(),
            self.address.as_deref(),
            self.port,
        )
    }
}

/// Business shown in the receipt header
#[derive(Debug, Clone, Args)]
pub struct CompanyArgs {
    /// Company JSON file; overrides the name/address/phone flags
    #[arg(long)]
    pub company_file: Option<PathBuf>,

    #[arg(long, env = "STUDIO_NAME", default_value = "Anand Digital Studio")]
    pub company_name: String,

    /// Address, lines separated by "\n"
    #[arg(long, env = "STUDIO_ADDRESS", default_value = "")]
    pub company_address: String,

    #[arg(long, env = "STUDIO_PHONE", default_value = "")]
    pub company_phone: String,
}

/// Parse the discovery target
pub fn discovery_kind(kind: &str) -> PrintResult<TransportKind> {
    kind.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_usb_print() {
        let cli = Cli::try_parse_from([
            "studio-print",
            "print",
            "invoice.json",
            "--type",
            "usb",
            "--vendor",
            "0x09c5",
            "--product",
            "0x588e",
        ])
        .unwrap();

        let Command::Print { target, .. } = cli.command else {
            panic!("expected print");
        };
        assert_eq!(
            target.to_config().unwrap(),
            TransportConfig::usb(0x09c5, 0x588e)
        );
    }

    #[test]
    fn test_parse_network_with_port() {
        let cli = Cli::try_parse_from([
            "studio-print",
            "test",
            "--type",
            "network",
            "--address",
            "192.168.1.50",
            "--port",
            "9101",
        ])
        .unwrap();

        let Command::Test { target } = cli.command else {
            panic!("expected test");
        };
        assert_eq!(
            target.to_config().unwrap(),
            TransportConfig::Network {
                address: "192.168.1.50".into(),
                port: 9101
            }
        );
    }

    #[test]
    fn test_discovery_kind() {
        assert_eq!(discovery_kind("bt").unwrap(), TransportKind::Bluetooth);
        assert!(discovery_kind("fax").is_err());
    }
}
