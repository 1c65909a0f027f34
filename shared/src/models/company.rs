//! Company Model

use serde::{Deserialize, Serialize};

/// Business printed in the receipt header
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Company {
    #[serde(default)]
    pub name: String,
    /// Multi-line postal address, lines separated by `\n`
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
}

impl Company {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            phone: phone.into(),
        }
    }

    /// Non-blank address lines, trimmed
    pub fn address_lines(&self) -> impl Iterator<Item = &str> {
        self.address
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
    }
}
