pub mod bundled;
pub mod json_store;
pub mod memory;
pub mod pending_queue;
pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;

use crate::engine::tier::{ScaffoldLevel, Tier};
use crate::store::schema::{AnswerEvent, MainQuestion, ProgressSnapshot, QuestionId, SubQuestion};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store data could not be encoded: {0}")]
    Json(#[from] serde_json::Error),
    #[error("write denied by store policy: {0}")]
    Denied(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("main question {0} not found")]
    NotFound(QuestionId),
}

/// The remote store the quiz reads content from and appends history to.
pub trait QuizStore {
    /// Main questions for `tier` excluding `exclude_ids`, at most `limit`.
    /// Sub-questions are fetched separately.
    fn main_questions(
        &self,
        tier: Tier,
        exclude_ids: &[QuestionId],
        limit: usize,
    ) -> Result<Vec<MainQuestion>, StoreError>;

    /// Sub-questions of one main question in step order, hints included.
    fn sub_questions(&self, main_question_id: QuestionId) -> Result<Vec<SubQuestion>, StoreError>;

    fn latest_progress(&self, learner_id: &str) -> Result<Option<ProgressSnapshot>, StoreError>;

    /// Low when the learner has no stored level.
    fn scaffold_level(&self, learner_id: &str) -> Result<ScaffoldLevel, StoreError>;

    fn append_answer_event(&mut self, event: &AnswerEvent) -> Result<(), StoreError>;

    fn append_progress_snapshot(&mut self, snapshot: &ProgressSnapshot) -> Result<(), StoreError>;

    fn update_scaffold_level(
        &mut self,
        learner_id: &str,
        level: ScaffoldLevel,
    ) -> Result<(), StoreError>;
}

/// Move a data file that no longer parses out of the way so the next write
/// starts a fresh file instead of overwriting it. Returns the new location.
pub(crate) fn quarantine(path: &Path) -> Result<PathBuf, StoreError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let moved = path.with_file_name(format!(
        "{name}.corrupt-{}",
        Utc::now().format("%Y%m%d%H%M%S%3f")
    ));
    fs::rename(path, &moved)?;
    Ok(moved)
}
