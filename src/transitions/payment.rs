use crate::domain::payment::PaymentStatus;
use crate::transitions::{InvalidTransition, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEvent {
    StartProcessing,
    Complete,
    Fail,
}

impl PaymentEvent {
    fn as_str(&self) -> &'static str {
        match self {
            PaymentEvent::StartProcessing => "start_processing",
            PaymentEvent::Complete => "complete",
            PaymentEvent::Fail => "fail",
        }
    }
}

/// Payment lifecycle: pending -> processing -> completed | failed. A gateway
/// may confirm before we ever observed processing, so completion and failure
/// are reachable straight from pending. Terminal states only replay.
pub fn apply(
    current: PaymentStatus,
    event: PaymentEvent,
) -> Result<Step<PaymentStatus>, InvalidTransition> {
    use PaymentEvent::*;
    use PaymentStatus::*;

    let step = match (current, event) {
        (Pending, StartProcessing) => Step::Changed(Processing),
        (Processing, StartProcessing) => Step::AlreadyApplied,
        (Completed, StartProcessing) => Step::AlreadyApplied,

        (Pending | Processing, Complete) => Step::Changed(Completed),
        (Completed, Complete) => Step::AlreadyApplied,

        (Pending | Processing, Fail) => Step::Changed(Failed),
        (Failed, Fail) => Step::AlreadyApplied,

        (from, event) => {
            return Err(InvalidTransition {
                entity: "payment",
                from: from.as_str(),
                event: event.as_str(),
            })
        }
    };

    Ok(step)
}
