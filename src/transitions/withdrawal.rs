use crate::domain::withdrawal::WithdrawalStatus;
use crate::transitions::{InvalidTransition, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalEvent {
    Approve,
    Reject,
    StartProcessing,
    Complete,
    Fail,
}

impl WithdrawalEvent {
    fn as_str(&self) -> &'static str {
        match self {
            WithdrawalEvent::Approve => "approve",
            WithdrawalEvent::Reject => "reject",
            WithdrawalEvent::StartProcessing => "start_processing",
            WithdrawalEvent::Complete => "complete",
            WithdrawalEvent::Fail => "fail",
        }
    }
}

/// Withdrawal lifecycle: pending -> approved -> processing -> completed,
/// pending -> rejected, processing -> failed -> processing (bounded retry,
/// enforced by the workflow). Approve is only valid from pending.
pub fn apply(
    current: WithdrawalStatus,
    event: WithdrawalEvent,
) -> Result<Step<WithdrawalStatus>, InvalidTransition> {
    use WithdrawalEvent::*;
    use WithdrawalStatus::*;

    let step = match (current, event) {
        (Pending, Approve) => Step::Changed(Approved),
        (Approved, Approve) => Step::AlreadyApplied,

        (Pending, Reject) => Step::Changed(Rejected),
        (Rejected, Reject) => Step::AlreadyApplied,

        (Approved | Failed, StartProcessing) => Step::Changed(Processing),
        (Processing, StartProcessing) => Step::AlreadyApplied,

        (Processing, Complete) => Step::Changed(Completed),
        (Completed, Complete) => Step::AlreadyApplied,

        (Processing, Fail) => Step::Changed(Failed),
        (Failed, Fail) => Step::AlreadyApplied,

        (from, event) => {
            return Err(InvalidTransition {
                entity: "withdrawal",
                from: from.as_str(),
                event: event.as_str(),
            })
        }
    };

    Ok(step)
}
