use deskpay::policy::cancellation::calculate_refund_policy;
use rust_decimal::Decimal;

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

#[test]
fn full_refund_at_24_hours() {
    let policy = calculate_refund_policy(24.0, dec("1000.00"));
    assert_eq!(policy.percentage, dec("100.00"));
    assert_eq!(policy.refund_amount, dec("1000.00"));
    assert_eq!(policy.penalty_amount, dec("0.00"));
}

#[test]
fn half_refund_just_under_24_hours() {
    let policy = calculate_refund_policy(23.99, dec("1000.00"));
    assert_eq!(policy.percentage, dec("50.00"));
    assert_eq!(policy.refund_amount, dec("500.00"));
    assert_eq!(policy.penalty_amount, dec("500.00"));
}

#[test]
fn half_refund_at_6_hours() {
    let policy = calculate_refund_policy(6.0, dec("1000.00"));
    assert_eq!(policy.percentage, dec("50.00"));
    assert_eq!(policy.refund_amount, dec("500.00"));
    assert_eq!(policy.penalty_amount, dec("500.00"));
}

#[test]
fn no_refund_under_6_hours() {
    let policy = calculate_refund_policy(5.99, dec("1000.00"));
    assert_eq!(policy.percentage, dec("0.00"));
    assert_eq!(policy.refund_amount, dec("0.00"));
    assert_eq!(policy.penalty_amount, dec("1000.00"));
}

#[test]
fn no_refund_at_zero_hours() {
    let policy = calculate_refund_policy(0.0, dec("250.00"));
    assert_eq!(policy.refund_amount, dec("0.00"));
    assert_eq!(policy.penalty_amount, dec("250.00"));
}

#[test]
fn split_is_exact_for_odd_minor_units() {
    // 50% of 99.99 is 49.995; the refund rounds down and the penalty
    // absorbs the remainder.
    let policy = calculate_refund_policy(12.0, dec("99.99"));
    assert_eq!(policy.refund_amount, dec("49.99"));
    assert_eq!(policy.penalty_amount, dec("50.00"));
    assert_eq!(policy.refund_amount + policy.penalty_amount, dec("99.99"));
}

#[test]
fn split_always_sums_to_original() {
    for hours in [0.5, 5.99, 6.0, 12.0, 23.99, 24.0, 72.0] {
        for amount in ["0.01", "1.00", "33.33", "99.99", "1234.56", "100000.01"] {
            let original = dec(amount);
            let policy = calculate_refund_policy(hours, original);
            assert_eq!(
                policy.refund_amount + policy.penalty_amount,
                original,
                "split must be exact for hours={hours} amount={amount}"
            );
            assert!(policy.refund_amount >= Decimal::ZERO);
            assert!(policy.penalty_amount >= Decimal::ZERO);
        }
    }
}
