//! Pricing Calculator
//!
//! Pure derivation of a price breakdown from a cart subtotal and an optional
//! discount effect. This runs server-side at order time regardless of what
//! the client displayed; client-sent totals are advisory only.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::AppConfig;

/// Shipping tuning. Orders above the threshold ship free, everything else
/// pays the flat rate.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub free_shipping_threshold: Decimal,
    pub flat_shipping_rate: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            free_shipping_threshold: dec!(100),
            flat_shipping_rate: dec!(10),
        }
    }
}

impl PricingConfig {
    pub fn from_app_config(cfg: &AppConfig) -> Self {
        let defaults = Self::default();
        Self {
            free_shipping_threshold: Decimal::try_from(cfg.free_shipping_threshold)
                .unwrap_or(defaults.free_shipping_threshold),
            flat_shipping_rate: Decimal::try_from(cfg.flat_shipping_rate)
                .unwrap_or(defaults.flat_shipping_rate),
        }
    }
}

/// Resolved effect of a validated discount code on a price breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountEffect {
    None,
    /// Subtract this amount from the subtotal
    AmountOff(Decimal),
    /// Zero the shipping cost; the subtotal is untouched
    FreeShipping,
}

/// Server-authoritative price breakdown.
///
/// Invariant: `total = subtotal - discount_amount + shipping_cost`, never
/// negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PriceBreakdown {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
}

/// Pure pricing functions; no I/O, no side effects.
#[derive(Debug, Clone, Default)]
pub struct PricingService {
    config: PricingConfig,
}

impl PricingService {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    /// Shipping cost before any discount is applied.
    pub fn shipping_cost(&self, subtotal: Decimal) -> Decimal {
        if subtotal > self.config.free_shipping_threshold {
            Decimal::ZERO
        } else {
            self.config.flat_shipping_rate
        }
    }

    /// Derive the breakdown for a cart subtotal and discount effect.
    pub fn quote(&self, subtotal: Decimal, effect: DiscountEffect) -> PriceBreakdown {
        let base_shipping = self.shipping_cost(subtotal);

        let (discount_amount, shipping_cost) = match effect {
            DiscountEffect::None => (Decimal::ZERO, base_shipping),
            // A discount can never exceed what the customer would pay for goods
            DiscountEffect::AmountOff(amount) => (amount.min(subtotal), base_shipping),
            DiscountEffect::FreeShipping => (Decimal::ZERO, Decimal::ZERO),
        };

        let total = (subtotal - discount_amount + shipping_cost).max(Decimal::ZERO);

        PriceBreakdown {
            subtotal,
            discount_amount,
            shipping_cost,
            total,
        }
    }

    /// The monetary value a discount effect saves the customer against this
    /// subtotal; recorded on the redemption row.
    pub fn applied_value(&self, subtotal: Decimal, effect: DiscountEffect) -> Decimal {
        match effect {
            DiscountEffect::None => Decimal::ZERO,
            DiscountEffect::AmountOff(amount) => amount.min(subtotal),
            DiscountEffect::FreeShipping => self.shipping_cost(subtotal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn service() -> PricingService {
        PricingService::new(PricingConfig::default())
    }

    #[rstest]
    // $120 cart, SAVE10 at 10% -> $12 off, free shipping over $100, $108 total
    #[case(dec!(120), DiscountEffect::AmountOff(dec!(12)), dec!(12), dec!(0), dec!(108))]
    // $40 cart, no code -> flat $10 shipping, $50 total
    #[case(dec!(40), DiscountEffect::None, dec!(0), dec!(10), dec!(50))]
    // free shipping code zeroes shipping below the threshold
    #[case(dec!(40), DiscountEffect::FreeShipping, dec!(0), dec!(0), dec!(40))]
    // free shipping code above the threshold changes nothing
    #[case(dec!(150), DiscountEffect::FreeShipping, dec!(0), dec!(0), dec!(150))]
    // exactly at the threshold still pays shipping (strictly greater ships free)
    #[case(dec!(100), DiscountEffect::None, dec!(0), dec!(10), dec!(110))]
    fn quote_scenarios(
        #[case] subtotal: Decimal,
        #[case] effect: DiscountEffect,
        #[case] discount: Decimal,
        #[case] shipping: Decimal,
        #[case] total: Decimal,
    ) {
        let breakdown = service().quote(subtotal, effect);
        assert_eq!(breakdown.discount_amount, discount);
        assert_eq!(breakdown.shipping_cost, shipping);
        assert_eq!(breakdown.total, total);
    }

    #[test]
    fn discount_larger_than_subtotal_is_clamped() {
        let breakdown = service().quote(dec!(30), DiscountEffect::AmountOff(dec!(50)));
        assert_eq!(breakdown.discount_amount, dec!(30));
        // shipping still applies; the goods are free, the courier is not
        assert_eq!(breakdown.total, dec!(10));
    }

    #[test]
    fn free_shipping_value_matches_waived_rate() {
        let svc = service();
        assert_eq!(svc.applied_value(dec!(40), DiscountEffect::FreeShipping), dec!(10));
        assert_eq!(svc.applied_value(dec!(150), DiscountEffect::FreeShipping), dec!(0));
    }

    proptest! {
        #[test]
        fn breakdown_invariant_holds(subtotal_cents in 0i64..5_000_000, discount_cents in 0i64..5_000_000) {
            let subtotal = Decimal::new(subtotal_cents, 2);
            let discount = Decimal::new(discount_cents, 2);
            let breakdown = service().quote(subtotal, DiscountEffect::AmountOff(discount));

            prop_assert!(breakdown.total >= Decimal::ZERO);
            prop_assert_eq!(
                breakdown.total,
                breakdown.subtotal - breakdown.discount_amount + breakdown.shipping_cost
            );
            prop_assert!(breakdown.discount_amount <= breakdown.subtotal);
        }
    }
}
