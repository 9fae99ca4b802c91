use crate::domain::refund::RefundStatus;
use crate::transitions::{InvalidTransition, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundEvent {
    StartProcessing,
    Complete,
    Fail,
}

impl RefundEvent {
    fn as_str(&self) -> &'static str {
        match self {
            RefundEvent::StartProcessing => "start_processing",
            RefundEvent::Complete => "complete",
            RefundEvent::Fail => "fail",
        }
    }
}

/// Refund lifecycle: pending -> processing -> completed | failed. A failed
/// refund may re-enter processing; the retry bound lives in the service.
pub fn apply(
    current: RefundStatus,
    event: RefundEvent,
) -> Result<Step<RefundStatus>, InvalidTransition> {
    use RefundEvent::*;
    use RefundStatus::*;

    let step = match (current, event) {
        (Pending | Failed, StartProcessing) => Step::Changed(Processing),
        (Processing, StartProcessing) => Step::AlreadyApplied,
        (Completed, StartProcessing) => Step::AlreadyApplied,

        (Processing, Complete) => Step::Changed(Completed),
        (Completed, Complete) => Step::AlreadyApplied,

        (Processing, Fail) => Step::Changed(Failed),
        (Failed, Fail) => Step::AlreadyApplied,

        (from, event) => {
            return Err(InvalidTransition {
                entity: "refund",
                from: from.as_str(),
                event: event.as_str(),
            })
        }
    };

    Ok(step)
}
