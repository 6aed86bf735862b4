use thiserror::Error;

use crate::engine::tier::Tier;
use crate::store::schema::QuestionId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("no {0} questions available")]
    ContentUnavailable(Tier),
    #[error("no question is waiting for an answer")]
    NoQuestionInFlight,
    #[error("question {given} was already answered (current is {current})")]
    StaleTicket { given: u64, current: u64 },
    #[error("choice {index} is out of range ({available} choices)")]
    ChoiceOutOfRange { index: usize, available: usize },
    #[error("the session has ended")]
    SessionOver,
    #[error("the session was already started")]
    AlreadyStarted,
}

/// Non-fatal problems. Logged and reported to the presentation layer, but the
/// quiz keeps going.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Fault {
    /// A store write failed and was queued locally.
    #[error("store write deferred: {0}")]
    StoreWriteDeferred(String),
    /// A main question came back without sub-questions and was skipped.
    #[error("main question {0} has no sub-questions")]
    MalformedQuestion(QuestionId),
    /// The scaffold predictor failed; the previous level was kept.
    #[error("scaffold predictor unavailable: {0}")]
    PredictorUnavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_messages() {
        assert_eq!(
            Fault::StoreWriteDeferred("disk full".to_string()).to_string(),
            "store write deferred: disk full"
        );
        assert_eq!(
            Fault::MalformedQuestion(42).to_string(),
            "main question 42 has no sub-questions"
        );
        assert_eq!(
            Fault::PredictorUnavailable("timeout".to_string()).to_string(),
            "scaffold predictor unavailable: timeout"
        );
    }
}
