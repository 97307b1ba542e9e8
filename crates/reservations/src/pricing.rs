//! Batch pricing: quantity × unit price, VAT on top.
//!
//! Amounts are integer minor currency units (öre/cents) so quotes stay exact;
//! `600` minor units at 25% VAT is `750`, i.e. 6.00 → 7.50.

use serde::{Deserialize, Serialize};

use leadstock_core::{DomainError, DomainResult, ValueObject};

/// Static price configuration.
///
/// Validated once at engine construction; a zero unit price or VAT rate is a
/// configuration error, never a silently zero-priced order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSettings {
    /// Price per product in minor currency units.
    pub unit_price_minor: u64,
    /// VAT rate in whole percent, e.g. `25`.
    pub vat_rate_percent: u32,
    /// ISO currency code, e.g. `"SEK"`.
    pub currency: String,
}

impl ValueObject for PriceSettings {}

impl PriceSettings {
    pub fn validate(&self) -> DomainResult<()> {
        if self.unit_price_minor == 0 {
            return Err(DomainError::configuration("unit price must be positive"));
        }
        if self.vat_rate_percent == 0 {
            return Err(DomainError::configuration("VAT rate must be positive"));
        }
        if self.currency.trim().is_empty() {
            return Err(DomainError::configuration("currency cannot be empty"));
        }
        Ok(())
    }

    /// Price a batch of `quantity` products.
    pub fn quote(&self, quantity: u32) -> DomainResult<Quote> {
        self.validate()?;
        let subtotal = u64::from(quantity) * self.unit_price_minor;
        // VAT applied to the batch total, rounded half-up.
        let gross = u128::from(subtotal) * u128::from(100 + self.vat_rate_percent);
        let total = ((gross + 50) / 100) as u64;
        Ok(Quote {
            quantity,
            subtotal_minor: subtotal,
            total_minor: total,
            currency: self.currency.clone(),
        })
    }
}

/// A priced batch: net and gross amounts in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub quantity: u32,
    pub subtotal_minor: u64,
    pub total_minor: u64,
    pub currency: String,
}

impl ValueObject for Quote {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sek(unit_price_minor: u64, vat_rate_percent: u32) -> PriceSettings {
        PriceSettings {
            unit_price_minor,
            vat_rate_percent,
            currency: "SEK".to_string(),
        }
    }

    #[test]
    fn ten_products_at_six_sek_with_25_percent_vat() {
        let quote = sek(600, 25).quote(10).unwrap();
        assert_eq!(quote.subtotal_minor, 6_000); // 60.00
        assert_eq!(quote.total_minor, 7_500); // 75.00
    }

    #[test]
    fn one_product_at_six_sek_with_25_percent_vat() {
        let quote = sek(600, 25).quote(1).unwrap();
        assert_eq!(quote.subtotal_minor, 600); // 6.00
        assert_eq!(quote.total_minor, 750); // 7.50
    }

    #[test]
    fn fractional_vat_amounts_round_half_up() {
        // 0.99 at 25% VAT is 1.2375 → 1.24.
        let quote = sek(99, 25).quote(1).unwrap();
        assert_eq!(quote.total_minor, 124);
    }

    #[test]
    fn zero_quantity_prices_to_zero() {
        let quote = sek(600, 25).quote(0).unwrap();
        assert_eq!(quote.subtotal_minor, 0);
        assert_eq!(quote.total_minor, 0);
    }

    #[test]
    fn invalid_settings_fail_fast() {
        assert!(sek(0, 25).validate().is_err());
        assert!(sek(600, 0).validate().is_err());
        assert!(
            PriceSettings {
                currency: "  ".to_string(),
                ..sek(600, 25)
            }
            .validate()
            .is_err()
        );
        assert!(sek(0, 25).quote(3).is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: the gross total is never below the net subtotal.
            #[test]
            fn total_dominates_subtotal(
                unit in 1u64..1_000_000,
                vat in 1u32..100,
                quantity in 0u32..10_000,
            ) {
                let quote = sek(unit, vat).quote(quantity).unwrap();
                prop_assert!(quote.total_minor >= quote.subtotal_minor);
            }

            /// Property: pricing is linear in quantity up to rounding.
            #[test]
            fn subtotal_is_linear(unit in 1u64..1_000_000, quantity in 0u32..10_000) {
                let quote = sek(unit, 25).quote(quantity).unwrap();
                prop_assert_eq!(quote.subtotal_minor, u64::from(quantity) * unit);
            }
        }
    }
}
