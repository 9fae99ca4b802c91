pub mod order;
pub mod payment;
pub mod refund;
pub mod withdrawal;

/// Outcome of applying an event to a state machine. `AlreadyApplied` is the
/// idempotent case: the entity is at or past the target state, so replays
/// succeed without re-running effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<S> {
    Changed(S),
    AlreadyApplied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub entity: &'static str,
    pub from: &'static str,
    pub event: &'static str,
}

impl std::fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} cannot apply {} from {}",
            self.entity, self.event, self.from
        )
    }
}

impl std::error::Error for InvalidTransition {}
