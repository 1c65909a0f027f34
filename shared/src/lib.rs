//! Shared billing types
//!
//! Value types exchanged between the billing application and the receipt
//! printing crates. Totals are computed by billing; printers only read them.

pub mod models;

// Re-exports
pub use models::{round_money, Company, Invoice, InvoiceError, LineItem};
pub use rust_decimal::Decimal;
