//! studio-print - receipt printer command line

mod cli;
mod input;
mod logger;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use studio_printer::{PrintOutcome, PrintService, to_plain_text, worker};

use crate::cli::{Cli, Command, discovery_kind};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Missing .env is fine; real environment still applies
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    logger::init_logger_with_file(&cli.log_level, cli.log_json, cli.log_dir.as_deref())?;

    let service = PrintService::from_env();
    tracing::debug!(capabilities = ?service.capabilities(), "Print service ready");

    run(cli, &service).await
}

async fn run(cli: Cli, service: &PrintService) -> anyhow::Result<ExitCode> {
    let json = cli.json;

    match cli.command {
        Command::Print {
            invoice,
            company,
            target,
        } => {
            let invoice = input::load_invoice(&invoice)?;
            let company = input::load_company(&company)?;
            let config = target.to_config()?;
            let timeout = Duration::from_secs(target.timeout_secs);

            tracing::info!(invoice = %invoice.invoice_no, printer = %config.describe(), "Printing receipt");
            let outcome =
                worker::print_with_timeout(service, invoice, company, config, timeout).await;
            report(&outcome, json)
        }
        Command::Test { target } => {
            let config = target.to_config()?;
            let timeout = Duration::from_secs(target.timeout_secs);
            let outcome = worker::test_connection_with_timeout(service, config, timeout).await;
            report(&outcome, json)
        }
        Command::TestPage { company, target } => {
            let company = input::load_company(&company)?;
            let config = target.to_config()?;
            let timeout = Duration::from_secs(target.timeout_secs);
            let outcome = worker::test_page_with_timeout(service, company, config, timeout).await;
            report(&outcome, json)
        }
        Command::Preview {
            invoice,
            company,
            output,
        } => {
            let invoice = input::load_invoice(&invoice)?;
            let company = input::load_company(&company)?;
            let data = service.preview(&invoice, &company);

            match output {
                Some(path) => {
                    std::fs::write(&path, &data)?;
                    println!("Wrote {} bytes to {}", data.len(), path.display());
                }
                None => print!("{}", to_plain_text(&data)),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Discover { kind } => {
            let kind = discovery_kind(&kind)?;
            let devices = worker::discover(service, kind).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&devices)?);
            } else if devices.is_empty() {
                println!("No {} devices found", kind);
            } else {
                for device in &devices {
                    println!("{}", device.summary());
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Capabilities => {
            let caps = service.capabilities();
            if json {
                println!("{}", serde_json::to_string_pretty(&caps)?);
            } else {
                println!("usb:       {}", yes_no(caps.usb));
                println!("bluetooth: {}", yes_no(caps.bluetooth));
                println!("network:   yes");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn report(outcome: &PrintOutcome, json: bool) -> anyhow::Result<ExitCode> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else if outcome.ok {
        println!("✅ {}", outcome.message);
    } else {
        eprintln!("❌ {}", outcome.message);
    }

    Ok(if outcome.ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
