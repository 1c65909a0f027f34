//! Data models
//!
//! Shared between the billing application and the receipt printer.

pub mod company;
pub mod invoice;

// Re-exports
pub use company::*;
pub use invoice::*;
