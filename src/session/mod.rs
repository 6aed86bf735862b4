pub mod error;
pub mod event;
pub mod question_source;
pub mod quiz;
pub mod recorder;
pub mod state;
pub mod summary;
pub mod timer;

pub use error::{Fault, QuizError};
pub use event::{QuizEvent, SessionEndReason};
pub use quiz::{QuizPhase, QuizSession};
