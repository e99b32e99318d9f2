use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Phases a quiz session moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Session exists but no question has been presented yet.
    AwaitingStart,
    /// The current question is open and its timer is armed.
    AwaitingAnswer,
    /// The current question is closed; the next one (or the summary) is pending.
    Advancing,
    /// Every question was played; the score is committed.
    Completed,
    /// The player stopped the quiz, or delivery failed for good.
    Cancelled,
}

impl SessionPhase {
    /// Whether the phase ends the session.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionPhase::Completed | SessionPhase::Cancelled)
    }
}

/// Events that can be applied to a session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// First question is presented.
    Start,
    /// A valid option was accepted for the open question.
    AnswerAccepted,
    /// The answer timer fired before any answer.
    TimedOut,
    /// The next question is presented.
    NextQuestion,
    /// No question is left.
    Complete,
    /// The player cancelled, or the session was abandoned.
    Cancel,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: SessionPhase,
    /// The event that cannot be applied from this phase.
    pub event: SessionEvent,
}

/// State machine implementing the per-session quiz flow.
///
/// `version` increments on every applied transition so callers can tell two
/// observations of the same phase apart.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    phase: SessionPhase,
    version: usize,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self {
            phase: SessionPhase::AwaitingStart,
            version: 0,
        }
    }
}

impl SessionStateMachine {
    /// Create a new state machine waiting for the start command.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Number of transitions applied so far.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Apply an event, moving to the next phase when the transition is valid.
    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        self.version += 1;
        Ok(next)
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (SessionPhase::AwaitingStart, SessionEvent::Start) => SessionPhase::AwaitingAnswer,
            (SessionPhase::AwaitingAnswer, SessionEvent::AnswerAccepted) => SessionPhase::Advancing,
            (SessionPhase::AwaitingAnswer, SessionEvent::TimedOut) => SessionPhase::Advancing,
            (SessionPhase::Advancing, SessionEvent::NextQuestion) => SessionPhase::AwaitingAnswer,
            (SessionPhase::Advancing, SessionEvent::Complete) => SessionPhase::Completed,
            (from, SessionEvent::Cancel) if !from.is_terminal() => SessionPhase::Cancelled,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut SessionStateMachine, event: SessionEvent) -> SessionPhase {
        sm.apply(event).unwrap()
    }

    #[test]
    fn initial_state_is_awaiting_start() {
        let sm = SessionStateMachine::new();
        assert_eq!(sm.phase(), SessionPhase::AwaitingStart);
        assert_eq!(sm.version(), 0);
    }

    #[test]
    fn full_happy_path_through_quiz() {
        let mut sm = SessionStateMachine::new();

        assert_eq!(
            apply(&mut sm, SessionEvent::Start),
            SessionPhase::AwaitingAnswer
        );
        assert_eq!(
            apply(&mut sm, SessionEvent::AnswerAccepted),
            SessionPhase::Advancing
        );
        assert_eq!(
            apply(&mut sm, SessionEvent::NextQuestion),
            SessionPhase::AwaitingAnswer
        );
        assert_eq!(
            apply(&mut sm, SessionEvent::TimedOut),
            SessionPhase::Advancing
        );
        assert_eq!(
            apply(&mut sm, SessionEvent::Complete),
            SessionPhase::Completed
        );
        assert_eq!(sm.version(), 5);
    }

    #[test]
    fn cancel_is_accepted_from_every_live_phase() {
        for events in [
            vec![],
            vec![SessionEvent::Start],
            vec![SessionEvent::Start, SessionEvent::AnswerAccepted],
        ] {
            let mut sm = SessionStateMachine::new();
            for event in events {
                apply(&mut sm, event);
            }
            assert_eq!(
                apply(&mut sm, SessionEvent::Cancel),
                SessionPhase::Cancelled
            );
        }
    }

    #[test]
    fn terminal_phases_reject_every_event() {
        let mut sm = SessionStateMachine::new();
        apply(&mut sm, SessionEvent::Start);
        apply(&mut sm, SessionEvent::Cancel);

        let err = sm.apply(SessionEvent::Cancel).unwrap_err();
        assert_eq!(err.from, SessionPhase::Cancelled);
        assert_eq!(err.event, SessionEvent::Cancel);

        let err = sm.apply(SessionEvent::NextQuestion).unwrap_err();
        assert_eq!(err.from, SessionPhase::Cancelled);
    }

    #[test]
    fn answer_while_advancing_is_invalid() {
        let mut sm = SessionStateMachine::new();
        apply(&mut sm, SessionEvent::Start);
        apply(&mut sm, SessionEvent::AnswerAccepted);

        let err = sm.apply(SessionEvent::AnswerAccepted).unwrap_err();
        assert_eq!(err.from, SessionPhase::Advancing);
        assert_eq!(err.event, SessionEvent::AnswerAccepted);
        assert_eq!(sm.phase(), SessionPhase::Advancing);
    }

    #[test]
    fn invalid_transition_does_not_bump_version() {
        let mut sm = SessionStateMachine::new();
        assert!(sm.apply(SessionEvent::TimedOut).is_err());
        assert_eq!(sm.version(), 0);
        assert_eq!(sm.phase(), SessionPhase::AwaitingStart);
    }
}
