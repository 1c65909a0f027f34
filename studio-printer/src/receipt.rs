//! Receipt renderer
//!
//! Renders an [`Invoice`] into ESC/POS bytes for 58mm thermal printers.
//! Output depends only on the inputs: the "printed at" time is passed in.

use chrono::NaiveDateTime;
use shared::{round_money, Company, Decimal, Invoice};

use crate::config::PrinterConfig;
use crate::escpos::EscPosBuilder;
use crate::text::truncate;

/// Longest item description printed
const DESCRIPTION_CHARS: usize = 25;

/// Longest notes text printed
const NOTES_CHARS: usize = 50;

const DATE_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Per-render options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptOptions {
    /// Timestamp printed in the footer
    pub printed_at: NaiveDateTime,
    /// Add the preview banner and logo placeholder
    pub test_mode: bool,
}

impl ReceiptOptions {
    pub fn new(printed_at: NaiveDateTime) -> Self {
        Self {
            printed_at,
            test_mode: false,
        }
    }

    pub fn test_mode(mut self, on: bool) -> Self {
        self.test_mode = on;
        self
    }
}

/// Receipt renderer
pub struct ReceiptRenderer {
    width: usize,
    currency: String,
}

impl ReceiptRenderer {
    /// Create a renderer for `width` characters per line
    pub fn new(width: usize, currency: impl Into<String>) -> Self {
        Self {
            width,
            currency: currency.into(),
        }
    }

    pub fn from_config(config: &PrinterConfig) -> Self {
        Self::new(config.paper_width, config.currency.clone())
    }

    /// Render a customer receipt
    pub fn render(&self, invoice: &Invoice, company: &Company, options: &ReceiptOptions) -> Vec<u8> {
        let mut b = EscPosBuilder::new(self.width);

        self.render_company(&mut b, company, options.test_mode);
        self.render_invoice_info(&mut b, invoice);
        self.render_items(&mut b, invoice);
        self.render_totals(&mut b, invoice);
        self.render_footer(&mut b, invoice, options);

        b.build()
    }

    /// Render the diagnostic page for `target`
    pub fn render_test_page(
        &self,
        company: &Company,
        target: &str,
        printed_at: NaiveDateTime,
    ) -> Vec<u8> {
        let mut b = EscPosBuilder::new(self.width);

        self.render_company(&mut b, company, false);

        b.bold().line("PRINTER TEST").bold_off();
        b.sep_double();

        b.left();
        b.line(&format!("Printer: {}", target));
        b.line(&format!("Date: {}", printed_at.format(DATE_FORMAT)));
        b.sep_double();
        b.line("This is a test print!");
        b.line("If you can read this,");
        b.line("your printer is");
        b.line("working correctly.");
        b.sep_double();

        b.center().line("Test completed!");
        b.blank_lines(2);
        b.feed_cut(0x10);

        b.build()
    }

    /// Company name, address and phone; ends with a double rule
    fn render_company(&self, b: &mut EscPosBuilder, company: &Company, test_mode: bool) {
        b.center().font_b(false).bold().double_width();
        b.line(&company.name);

        if test_mode {
            b.font_b(true).bold_off();
            b.line("[LOGO POSITION - CENTER]");
        }

        b.font_b(true).bold_off().reset_size();
        for line in company.address_lines() {
            b.line(line);
        }
        if !company.phone.trim().is_empty() {
            b.line(&format!("Phone: {}", company.phone.trim()));
        }
        b.sep_double();
    }

    fn render_invoice_info(&self, b: &mut EscPosBuilder, invoice: &Invoice) {
        b.left().font_b(false);
        b.line(&format!("Invoice: #{}", invoice.invoice_no));
        b.line(&format!("Date: {}", invoice.date.format(DATE_FORMAT)));
        b.line(&format!("Customer: {}", invoice.customer_name));
        if let Some(phone) = invoice.customer_phone.as_deref().map(str::trim)
            && !phone.is_empty()
        {
            b.line(&format!("Phone: {}", phone));
        }
        b.sep_double();
    }

    fn render_items(&self, b: &mut EscPosBuilder, invoice: &Invoice) {
        for item in &invoice.items {
            b.line(truncate(&item.description, DESCRIPTION_CHARS));
            b.line(&format!(
                "  {} x {} = {}",
                item.quantity,
                self.money(item.rate),
                self.money(item.line_total())
            ));
            if !item.tax_rate.is_zero() {
                b.line(&format!("  incl. {}% tax", percent(item.tax_rate)));
            }
        }
        b.sep_single();
    }

    fn render_totals(&self, b: &mut EscPosBuilder, invoice: &Invoice) {
        b.right();
        b.line(&format!("Subtotal: {}", self.money(invoice.subtotal)));
        if invoice.tax_amount > Decimal::ZERO {
            b.line(&format!("Tax: {}", self.money(invoice.tax_amount)));
        }

        b.center().bold().double_width();
        b.line(&format!("TOTAL: {}", self.money(invoice.grand_total)));
        b.bold_off().reset_size();
    }

    fn render_footer(&self, b: &mut EscPosBuilder, invoice: &Invoice, options: &ReceiptOptions) {
        b.center().font_b(true);
        b.sep_double();

        if let Some(notes) = invoice.notes.as_deref().map(str::trim)
            && !notes.is_empty()
        {
            b.line(&format!("Notes: {}", truncate(notes, NOTES_CHARS)));
            b.sep_single();
        }

        b.line("Thank you for your business!");
        b.line("Visit us again!");
        b.line(&format!("Printed: {}", options.printed_at.format(DATE_FORMAT)));

        if options.test_mode {
            b.newline();
            b.line("*** TEST MODE ***");
            b.line("No actual printing performed");
            b.line("Receipt preview only");
        }

        b.blank_lines(2);
        b.feed_cut(0x10);
    }

    fn money(&self, amount: Decimal) -> String {
        format!("{}{:.2}", self.currency, round_money(amount))
    }
}

impl Default for ReceiptRenderer {
    fn default() -> Self {
        Self::from_config(&PrinterConfig::default())
    }
}

/// Percentage with one decimal place
fn percent(rate: Decimal) -> String {
    format!("{:.1}", rate.round_dp(1))
}
