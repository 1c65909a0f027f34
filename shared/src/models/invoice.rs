//! Invoice Model

use chrono::NaiveDateTime;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rounding for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Invoice validation errors
#[derive(Debug, Error, PartialEq)]
pub enum InvoiceError {
    #[error("Invoice number is empty")]
    MissingNumber,

    #[error("Customer name is empty")]
    MissingCustomer,

    #[error("Item {index}: quantity must be positive")]
    InvalidQuantity { index: usize },

    #[error("Item {index}: rate must be non-negative, got {rate}")]
    NegativeRate { index: usize, rate: Decimal },

    #[error("Item {index}: tax rate must be non-negative, got {tax_rate}")]
    NegativeTaxRate { index: usize, tax_rate: Decimal },
}

/// Single billed line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: u32,
    pub rate: Decimal,
    /// Tax percentage, e.g. `5` for 5%
    #[serde(default)]
    pub tax_rate: Decimal,
}

impl LineItem {
    pub fn new(
        description: impl Into<String>,
        quantity: u32,
        rate: Decimal,
        tax_rate: Decimal,
    ) -> Self {
        Self {
            description: description.into(),
            quantity,
            rate,
            tax_rate,
        }
    }

    /// Quantity times rate, before tax
    pub fn net_amount(&self) -> Decimal {
        round_money(Decimal::from(self.quantity) * self.rate)
    }

    /// Tax charged on this line
    pub fn tax_amount(&self) -> Decimal {
        let net = Decimal::from(self.quantity) * self.rate;
        round_money(net * self.tax_rate / Decimal::ONE_HUNDRED)
    }

    /// Line total including tax
    pub fn line_total(&self) -> Decimal {
        let net = Decimal::from(self.quantity) * self.rate;
        round_money(net + net * self.tax_rate / Decimal::ONE_HUNDRED)
    }
}

/// Computed invoice, read-only to the printer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_no: String,
    pub date: NaiveDateTime,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub grand_total: Decimal,
}

impl Invoice {
    /// Build an invoice and compute its totals from the items
    ///
    /// Subtotal is the sum of net amounts, tax is the sum of line taxes.
    pub fn from_items(
        invoice_no: impl Into<String>,
        date: NaiveDateTime,
        customer_name: impl Into<String>,
        items: Vec<LineItem>,
    ) -> Self {
        let subtotal: Decimal = items.iter().map(LineItem::net_amount).sum();
        let tax_amount: Decimal = items.iter().map(LineItem::tax_amount).sum();

        Self {
            invoice_no: invoice_no.into(),
            date,
            customer_name: customer_name.into(),
            customer_phone: None,
            notes: None,
            items,
            subtotal,
            tax_amount,
            grand_total: subtotal + tax_amount,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.customer_phone = Some(phone.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Check the shape of an invoice received from outside (e.g. a JSON file)
    pub fn validate(&self) -> Result<(), InvoiceError> {
        if self.invoice_no.trim().is_empty() {
            return Err(InvoiceError::MissingNumber);
        }
        if self.customer_name.trim().is_empty() {
            return Err(InvoiceError::MissingCustomer);
        }
        for (index, item) in self.items.iter().enumerate() {
            if item.quantity == 0 {
                return Err(InvoiceError::InvalidQuantity { index });
            }
            if item.rate.is_sign_negative() && !item.rate.is_zero() {
                return Err(InvoiceError::NegativeRate {
                    index,
                    rate: item.rate,
                });
            }
            if item.tax_rate.is_sign_negative() && !item.tax_rate.is_zero() {
                return Err(InvoiceError::NegativeTaxRate {
                    index,
                    tax_rate: item.tax_rate,
                });
            }
        }
        Ok(())
    }
}
