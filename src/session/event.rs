use std::fmt;

use crate::engine::tier::{Tier, TierMove};
use crate::session::error::Fault;
use crate::store::schema::{MainQuestion, SubQuestion};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEndReason {
    /// No questions left for the tier, even after clearing exclusions.
    Exhausted,
    /// The tier's attempt cap was hit before its goal.
    AttemptCapReached,
    /// Hard was mastered with support low enough to stay there.
    AllTiersCleared,
}

impl fmt::Display for SessionEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SessionEndReason::Exhausted => "no more questions available",
            SessionEndReason::AttemptCapReached => "attempts limit reached, keep practicing",
            SessionEndReason::AllTiersCleared => "all tiers cleared",
        };
        f.write_str(text)
    }
}

/// Everything the presentation layer needs to react to, in emission order.
#[derive(Clone, Debug, PartialEq)]
pub enum QuizEvent {
    QuestionReady {
        ticket: u64,
        tier: Tier,
        main_question: MainQuestion,
        sub_question: SubQuestion,
    },
    AnswerOutcome {
        correct: bool,
        correct_choice: String,
        timed_out: bool,
    },
    TierTransition {
        from: Tier,
        to: Tier,
        reason: TierMove,
    },
    SessionComplete {
        reason: SessionEndReason,
    },
    Warning(Fault),
}
