use crate::domain::order::OrderStatus;
use crate::transitions::{InvalidTransition, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEvent {
    PaymentSucceeded,
    FulfilmentDone,
    PaymentsExhausted,
    Cancel,
}

impl OrderEvent {
    fn as_str(&self) -> &'static str {
        match self {
            OrderEvent::PaymentSucceeded => "payment_succeeded",
            OrderEvent::FulfilmentDone => "fulfilment_done",
            OrderEvent::PaymentsExhausted => "payments_exhausted",
            OrderEvent::Cancel => "cancel",
        }
    }
}

/// Order lifecycle: pending -> paid -> completed, pending -> cancelled,
/// pending -> failed. Status never regresses; terminal states are never left.
pub fn apply(current: OrderStatus, event: OrderEvent) -> Result<Step<OrderStatus>, InvalidTransition> {
    use OrderEvent::*;
    use OrderStatus::*;

    let step = match (current, event) {
        (Pending, PaymentSucceeded) => Step::Changed(Paid),
        (Paid | Completed, PaymentSucceeded) => Step::AlreadyApplied,

        (Paid, FulfilmentDone) => Step::Changed(Completed),
        (Completed, FulfilmentDone) => Step::AlreadyApplied,

        (Pending, PaymentsExhausted) => Step::Changed(Failed),
        (Failed, PaymentsExhausted) => Step::AlreadyApplied,

        (Pending, Cancel) => Step::Changed(Cancelled),
        (Cancelled, Cancel) => Step::AlreadyApplied,

        (from, event) => {
            return Err(InvalidTransition {
                entity: "order",
                from: from.as_str(),
                event: event.as_str(),
            })
        }
    };

    Ok(step)
}
