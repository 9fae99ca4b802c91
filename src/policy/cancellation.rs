use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// Refund split for a cancellation. refund_amount + penalty_amount always
/// equals the original amount exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefundPolicy {
    pub percentage: Decimal,
    pub refund_amount: Decimal,
    pub penalty_amount: Decimal,
}

/// Tiers by time to check-in: >= 24h full refund, 6-24h half, < 6h none.
/// The refund rounds toward zero at two decimals; the penalty absorbs any
/// remainder so the split is exact even for odd minor units.
pub fn calculate_refund_policy(hours_until_checkin: f64, original_amount: Decimal) -> RefundPolicy {
    let percentage = if hours_until_checkin >= 24.0 {
        Decimal::new(10000, 2)
    } else if hours_until_checkin >= 6.0 {
        Decimal::new(5000, 2)
    } else {
        Decimal::new(0, 2)
    };

    let refund_amount = (original_amount * percentage / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::ToZero);
    let penalty_amount = original_amount - refund_amount;

    RefundPolicy {
        percentage,
        refund_amount,
        penalty_amount,
    }
}
