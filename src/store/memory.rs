use std::collections::{BTreeMap, HashSet};

use crate::engine::tier::{ScaffoldLevel, Tier};
use crate::store::schema::{
    AnswerEvent, MainQuestion, ProgressLog, ProgressSnapshot, QuestionBank, QuestionId,
    SubQuestion,
};
use crate::store::{QuizStore, StoreError};

/// Store kept entirely in memory. Writes can be made to fail on demand to
/// exercise the deferred-write path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    bank: QuestionBank,
    answers: Vec<AnswerEvent>,
    progress: ProgressLog,
    scaffold_levels: BTreeMap<String, ScaffoldLevel>,
    broken_sub_questions: HashSet<QuestionId>,
    writes_before_failure: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bank(bank: QuestionBank) -> Self {
        Self {
            bank,
            ..Self::default()
        }
    }

    pub fn bank_mut(&mut self) -> &mut QuestionBank {
        &mut self.bank
    }

    pub fn answers(&self) -> &[AnswerEvent] {
        &self.answers
    }

    pub fn snapshots(&self) -> &[ProgressSnapshot] {
        &self.progress.snapshots
    }

    pub fn set_scaffold_level(&mut self, learner_id: &str, level: ScaffoldLevel) {
        self.scaffold_levels.insert(learner_id.to_string(), level);
    }

    pub fn push_snapshot(&mut self, snapshot: ProgressSnapshot) {
        self.progress.snapshots.push(snapshot);
    }

    /// Make sub-question fetches for `main_question_id` fail.
    pub fn break_sub_questions(&mut self, main_question_id: QuestionId) {
        self.broken_sub_questions.insert(main_question_id);
    }

    /// Deny every write from now on, or accept them all again.
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.writes_before_failure = fail.then_some(0);
    }

    /// Accept `count` more writes, then deny the rest.
    pub fn fail_writes_after(&mut self, count: usize) {
        self.writes_before_failure = Some(count);
    }

    fn check_write(&mut self) -> Result<(), StoreError> {
        match self.writes_before_failure.as_mut() {
            Some(0) => Err(StoreError::Denied(
                "new row violates row-level security policy".to_string(),
            )),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl QuizStore for MemoryStore {
    fn main_questions(
        &self,
        tier: Tier,
        exclude_ids: &[QuestionId],
        limit: usize,
    ) -> Result<Vec<MainQuestion>, StoreError> {
        Ok(self.bank.main_questions(tier, exclude_ids, limit))
    }

    fn sub_questions(&self, main_question_id: QuestionId) -> Result<Vec<SubQuestion>, StoreError> {
        if self.broken_sub_questions.contains(&main_question_id) {
            return Err(StoreError::Unavailable(format!(
                "sub-questions for {main_question_id}"
            )));
        }
        self.bank
            .sub_questions(main_question_id)
            .ok_or(StoreError::NotFound(main_question_id))
    }

    fn latest_progress(&self, learner_id: &str) -> Result<Option<ProgressSnapshot>, StoreError> {
        Ok(self.progress.latest_for(learner_id).cloned())
    }

    fn scaffold_level(&self, learner_id: &str) -> Result<ScaffoldLevel, StoreError> {
        Ok(self
            .scaffold_levels
            .get(learner_id)
            .copied()
            .unwrap_or_default())
    }

    fn append_answer_event(&mut self, event: &AnswerEvent) -> Result<(), StoreError> {
        self.check_write()?;
        self.answers.push(event.clone());
        Ok(())
    }

    fn append_progress_snapshot(&mut self, snapshot: &ProgressSnapshot) -> Result<(), StoreError> {
        self.check_write()?;
        self.progress.snapshots.push(snapshot.clone());
        Ok(())
    }

    fn update_scaffold_level(
        &mut self,
        learner_id: &str,
        level: ScaffoldLevel,
    ) -> Result<(), StoreError> {
        self.check_write()?;
        self.set_scaffold_level(learner_id, level);
        Ok(())
    }
}
