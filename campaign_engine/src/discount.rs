//! Discount calculation for a matched rule.
//!
//! All arithmetic happens on minor units with `i128` intermediates, so percentages cannot
//! overflow and rounding is a single half-up division at the currency's minor-unit precision.

use cde_common::Money;

use crate::db_types::{DiscountRule, DiscountType};

/// Computes the discount a matched rule yields on `base` (line subtotal) with the line `quantity`.
///
/// Returns `None` when the computed discount is zero or negative; per the evaluation contract
/// that is "no match", not a zero-value commit. The result's currency is the base's currency and
/// the result never exceeds `base` nor the rule's `max_discount_amount`.
pub fn compute_discount(rule: &DiscountRule, base: Money, quantity: i64) -> Option<Money> {
    if base.amount() <= 0 {
        return None;
    }
    let raw: i128 = match rule.discount_type {
        DiscountType::Percentage => {
            div_round_half_up(base.amount() as i128 * rule.discount_value as i128, 100)
        },
        DiscountType::FixedAmount => rule.discount_value as i128,
        DiscountType::FixedAmountPerUnit => rule.discount_value as i128 * quantity as i128,
    };
    if raw <= 0 {
        return None;
    }
    let mut discount = raw.min(base.amount() as i128) as i64;
    if let Some(cap) = rule.max_discount_amount {
        // Rule money is denominated in the campaign currency; the pipeline only evaluates
        // same-currency campaigns, so a mismatch here is a definition bug. Treat it as no match.
        if cap.currency() != base.currency() {
            return None;
        }
        discount = discount.min(cap.amount());
    }
    if discount <= 0 {
        return None;
    }
    Some(Money::new(discount, base.currency()))
}

/// Integer division rounding half away from zero for non-negative numerators.
fn div_round_half_up(numerator: i128, denominator: i128) -> i128 {
    if numerator <= 0 {
        return 0;
    }
    (numerator + denominator / 2) / denominator
}
