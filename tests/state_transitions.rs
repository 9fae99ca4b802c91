use deskpay::domain::order::OrderStatus;
use deskpay::domain::payment::PaymentStatus;
use deskpay::domain::refund::RefundStatus;
use deskpay::domain::withdrawal::WithdrawalStatus;
use deskpay::transitions::order::{self, OrderEvent};
use deskpay::transitions::payment::{self, PaymentEvent};
use deskpay::transitions::refund::{self, RefundEvent};
use deskpay::transitions::withdrawal::{self, WithdrawalEvent};
use deskpay::transitions::Step;

#[test]
fn order_happy_path() {
    assert_eq!(
        order::apply(OrderStatus::Pending, OrderEvent::PaymentSucceeded).unwrap(),
        Step::Changed(OrderStatus::Paid)
    );
    assert_eq!(
        order::apply(OrderStatus::Paid, OrderEvent::FulfilmentDone).unwrap(),
        Step::Changed(OrderStatus::Completed)
    );
}

#[test]
fn order_payment_replay_is_idempotent() {
    assert_eq!(
        order::apply(OrderStatus::Paid, OrderEvent::PaymentSucceeded).unwrap(),
        Step::AlreadyApplied
    );
    assert_eq!(
        order::apply(OrderStatus::Completed, OrderEvent::PaymentSucceeded).unwrap(),
        Step::AlreadyApplied
    );
}

#[test]
fn order_never_leaves_terminal_states() {
    for terminal in [
        OrderStatus::Completed,
        OrderStatus::Cancelled,
        OrderStatus::Failed,
    ] {
        assert!(order::apply(terminal, OrderEvent::Cancel).is_err() || terminal == OrderStatus::Cancelled);
        assert!(order::apply(terminal, OrderEvent::PaymentsExhausted).is_err() || terminal == OrderStatus::Failed);
    }
    // And a cancelled order can never become paid.
    assert!(order::apply(OrderStatus::Cancelled, OrderEvent::PaymentSucceeded).is_err());
}

#[test]
fn payment_completion_replay_is_noop() {
    assert_eq!(
        payment::apply(PaymentStatus::Pending, PaymentEvent::Complete).unwrap(),
        Step::Changed(PaymentStatus::Completed)
    );
    assert_eq!(
        payment::apply(PaymentStatus::Completed, PaymentEvent::Complete).unwrap(),
        Step::AlreadyApplied
    );
}

#[test]
fn failing_a_completed_payment_is_rejected() {
    let err = payment::apply(PaymentStatus::Completed, PaymentEvent::Fail).unwrap_err();
    assert_eq!(err.entity, "payment");
    assert_eq!(err.from, "completed");
}

#[test]
fn refund_failed_may_reenter_processing() {
    assert_eq!(
        refund::apply(RefundStatus::Failed, RefundEvent::StartProcessing).unwrap(),
        Step::Changed(RefundStatus::Processing)
    );
}

#[test]
fn refund_completion_from_pending_is_rejected() {
    assert!(refund::apply(RefundStatus::Pending, RefundEvent::Complete).is_err());
}

#[test]
fn withdrawal_approve_only_from_pending() {
    assert_eq!(
        withdrawal::apply(WithdrawalStatus::Pending, WithdrawalEvent::Approve).unwrap(),
        Step::Changed(WithdrawalStatus::Approved)
    );
    assert_eq!(
        withdrawal::apply(WithdrawalStatus::Approved, WithdrawalEvent::Approve).unwrap(),
        Step::AlreadyApplied
    );
    for status in [
        WithdrawalStatus::Rejected,
        WithdrawalStatus::Processing,
        WithdrawalStatus::Completed,
        WithdrawalStatus::Failed,
    ] {
        assert!(withdrawal::apply(status, WithdrawalEvent::Approve).is_err());
    }
}

#[test]
fn withdrawal_failed_may_retry_processing() {
    assert_eq!(
        withdrawal::apply(WithdrawalStatus::Failed, WithdrawalEvent::StartProcessing).unwrap(),
        Step::Changed(WithdrawalStatus::Processing)
    );
}

#[test]
fn withdrawal_complete_requires_processing() {
    assert!(withdrawal::apply(WithdrawalStatus::Approved, WithdrawalEvent::Complete).is_err());
    assert_eq!(
        withdrawal::apply(WithdrawalStatus::Processing, WithdrawalEvent::Complete).unwrap(),
        Step::Changed(WithdrawalStatus::Completed)
    );
    assert_eq!(
        withdrawal::apply(WithdrawalStatus::Completed, WithdrawalEvent::Complete).unwrap(),
        Step::AlreadyApplied
    );
}

#[test]
fn invalid_transition_names_the_offending_pair() {
    let err = withdrawal::apply(WithdrawalStatus::Completed, WithdrawalEvent::Reject).unwrap_err();
    assert_eq!(err.entity, "withdrawal");
    assert_eq!(err.from, "completed");
    assert_eq!(err.event, "reject");
    assert!(err.to_string().contains("withdrawal"));
}
