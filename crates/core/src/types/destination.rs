//! Checkout destination address.

use serde::{Deserialize, Serialize};

/// Where a cart ships to, as received from checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// ISO 3166-1 alpha-2 code, upper-cased.
    pub country_code: String,
    pub province: String,
    pub province_code: String,
    pub postal_code: String,
    pub address1: String,
}

impl Destination {
    /// Build a destination, normalizing whitespace and case of the codes.
    #[must_use]
    pub fn new(
        country_code: &str,
        province: &str,
        province_code: &str,
        postal_code: &str,
        address1: &str,
    ) -> Self {
        Self {
            country_code: country_code.trim().to_ascii_uppercase(),
            province: province.trim().to_string(),
            province_code: province_code.trim().to_ascii_uppercase(),
            postal_code: postal_code.trim().to_string(),
            address1: address1.trim().to_string(),
        }
    }

    /// Whether the destination carries enough to quote against.
    #[must_use]
    pub fn has_country(&self) -> bool {
        self.country_code.len() == 2 && self.country_code.chars().all(|c| c.is_ascii_alphabetic())
    }

    /// Stable, case-insensitive identity of the address for cache keys.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let postal: String = self
            .postal_code
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();

        format!(
            "{}|{}|{}|{}|{}",
            self.country_code,
            self.province_code,
            self.province.to_lowercase(),
            postal,
            self.address1.to_lowercase()
        )
    }
}
