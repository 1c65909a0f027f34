//! Invoice and company input files

use std::fs;
use std::path::Path;

use anyhow::Context;
use shared::{Company, Invoice};

use crate::cli::CompanyArgs;

/// Read and validate an invoice JSON file
pub fn load_invoice(path: &Path) -> anyhow::Result<Invoice> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading invoice {}", path.display()))?;
    let invoice: Invoice = serde_json::from_str(&raw)
        .with_context(|| format!("parsing invoice {}", path.display()))?;
    invoice
        .validate()
        .with_context(|| format!("invalid invoice {}", path.display()))?;
    Ok(invoice)
}

/// Company from `--company-file`, or from the individual flags
pub fn load_company(args: &CompanyArgs) -> anyhow::Result<Company> {
    if let Some(path) = &args.company_file {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading company {}", path.display()))?;
        return serde_json::from_str(&raw)
            .with_context(|| format!("parsing company {}", path.display()));
    }

    // Env files cannot hold real newlines
    let address = args.company_address.replace("\\n", "\n");
    Ok(Company::new(
        args.company_name.clone(),
        address,
        args.company_phone.clone(),
    ))
}
