use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;

use crate::engine::tier::Tier;
use crate::session::error::QuizError;
use crate::store::schema::{MainQuestion, QuestionId};
use crate::store::{QuizStore, StoreError};

#[derive(Debug)]
pub enum FetchOutcome {
    Batch(Vec<MainQuestion>),
    /// Nothing left once exclusions are applied.
    NeedReset,
}

/// Fetches shuffled batches of main questions with their sub-questions attached.
pub struct QuestionSource {
    rng: SmallRng,
    batch_limit: usize,
    last_order: Vec<QuestionId>,
}

impl QuestionSource {
    pub fn new(batch_limit: usize) -> Self {
        Self::from_rng(SmallRng::from_entropy(), batch_limit)
    }

    pub fn with_seed(batch_limit: usize, seed: u64) -> Self {
        Self::from_rng(SmallRng::seed_from_u64(seed), batch_limit)
    }

    fn from_rng(rng: SmallRng, batch_limit: usize) -> Self {
        Self {
            rng,
            batch_limit: batch_limit.max(1),
            last_order: Vec::new(),
        }
    }

    /// One fetch for `tier`. A failed sub-question lookup leaves that main
    /// question with no sub-questions instead of failing the batch.
    pub fn fetch_batch<S: QuizStore + ?Sized>(
        &mut self,
        store: &S,
        tier: Tier,
        exclude_ids: &[QuestionId],
    ) -> Result<FetchOutcome, StoreError> {
        let mut mains = store.main_questions(tier, exclude_ids, self.batch_limit)?;
        mains.retain(|q| q.tier() == Some(tier) && !exclude_ids.contains(&q.id));
        log::debug!(
            "Fetched {} {tier} question(s) excluding {}",
            mains.len(),
            exclude_ids.len()
        );
        if mains.is_empty() {
            return Ok(FetchOutcome::NeedReset);
        }

        for main in &mut mains {
            main.sub_questions = match store.sub_questions(main.id) {
                Ok(mut subs) => {
                    subs.sort_by_key(|s| s.step);
                    subs
                }
                Err(e) => {
                    log::warn!("Sub-questions for main question {} unavailable: {e}", main.id);
                    Vec::new()
                }
            };
        }

        self.shuffle(&mut mains);
        Ok(FetchOutcome::Batch(mains))
    }

    /// Fetch a batch, clearing `exclude_ids` and retrying once when the tier
    /// has nothing new. A second empty result or a store failure means the
    /// tier is unavailable.
    pub fn fetch_with_reset<S: QuizStore + ?Sized>(
        &mut self,
        store: &S,
        tier: Tier,
        exclude_ids: &mut Vec<QuestionId>,
    ) -> Result<Vec<MainQuestion>, QuizError> {
        for attempt in 0..2 {
            match self.fetch_batch(store, tier, exclude_ids) {
                Ok(FetchOutcome::Batch(batch)) => return Ok(batch),
                Ok(FetchOutcome::NeedReset) if attempt == 0 => {
                    log::debug!("No new {tier} questions, clearing {} exclusion(s)", exclude_ids.len());
                    exclude_ids.clear();
                }
                Ok(FetchOutcome::NeedReset) => break,
                Err(e) => {
                    log::error!("Fetching {tier} questions failed: {e}");
                    break;
                }
            }
        }
        Err(QuizError::ContentUnavailable(tier))
    }

    fn shuffle(&mut self, mains: &mut [MainQuestion]) {
        mains.shuffle(&mut self.rng);
        let order: Vec<QuestionId> = mains.iter().map(|q| q.id).collect();
        if mains.len() > 1 && order == self.last_order {
            mains.rotate_left(1);
        }
        self.last_order = mains.iter().map(|q| q.id).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::schema::{QuestionBank, SCHEMA_VERSION, SubQuestion};

    fn question(id: QuestionId, difficulty: &str) -> MainQuestion {
        MainQuestion {
            id,
            difficulty: difficulty.to_string(),
            topic: "Arithmetic".to_string(),
            prompt: format!("Question {id}"),
            sub_questions: vec![
                SubQuestion {
                    id: id * 10 + 2,
                    main_question_id: id,
                    step: 2,
                    prompt: "second".to_string(),
                    choices: vec!["a".to_string(), "b".to_string()],
                    correct_choice: "b".to_string(),
                    hints: None,
                },
                SubQuestion {
                    id: id * 10 + 1,
                    main_question_id: id,
                    step: 1,
                    prompt: "first".to_string(),
                    choices: vec!["a".to_string(), "b".to_string()],
                    correct_choice: "a".to_string(),
                    hints: None,
                },
            ],
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::with_bank(QuestionBank {
            schema_version: SCHEMA_VERSION,
            questions: vec![
                question(1, "Easy"),
                question(2, "easy"),
                question(3, "EASY"),
                question(4, "Hard"),
            ],
        })
    }

    #[test]
    fn test_batch_filters_and_orders_steps() {
        let store = store();
        let mut source = QuestionSource::with_seed(100, 1);
        let FetchOutcome::Batch(batch) = source.fetch_batch(&store, Tier::Easy, &[2]).unwrap() else {
            panic!("expected a batch");
        };
        let mut ids: Vec<_> = batch.iter().map(|q| q.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 3]);
        for q in &batch {
            let steps: Vec<_> = q.sub_questions.iter().map(|s| s.step).collect();
            assert_eq!(steps, vec![1, 2]);
        }
    }

    #[test]
    fn test_exhausted_tier_needs_reset() {
        let store = store();
        let mut source = QuestionSource::with_seed(100, 1);
        let outcome = source.fetch_batch(&store, Tier::Easy, &[1, 2, 3]).unwrap();
        assert!(matches!(outcome, FetchOutcome::NeedReset));
    }

    #[test]
    fn test_reset_clears_exclusions_and_retries() {
        let store = store();
        let mut source = QuestionSource::with_seed(100, 1);
        let mut exclude = vec![1, 2, 3];
        let batch = source.fetch_with_reset(&store, Tier::Easy, &mut exclude).unwrap();
        assert_eq!(batch.len(), 3);
        assert!(exclude.is_empty());
    }

    #[test]
    fn test_missing_tier_is_unavailable() {
        let store = store();
        let mut source = QuestionSource::with_seed(100, 1);
        let mut exclude = Vec::new();
        let err = source
            .fetch_with_reset(&store, Tier::Medium, &mut exclude)
            .unwrap_err();
        assert_eq!(err, QuizError::ContentUnavailable(Tier::Medium));
    }

    #[test]
    fn test_sub_question_failure_degrades_single_question() {
        let mut store = store();
        store.break_sub_questions(2);
        let mut source = QuestionSource::with_seed(100, 1);
        let FetchOutcome::Batch(batch) = source.fetch_batch(&store, Tier::Easy, &[]).unwrap() else {
            panic!("expected a batch");
        };
        assert_eq!(batch.len(), 3);
        for q in &batch {
            assert_eq!(q.is_usable(), q.id != 2);
        }
    }

    #[test]
    fn test_consecutive_batches_differ_in_order() {
        let store = store();
        let mut source = QuestionSource::with_seed(100, 42);
        let mut previous: Option<Vec<QuestionId>> = None;
        for _ in 0..20 {
            let FetchOutcome::Batch(batch) = source.fetch_batch(&store, Tier::Easy, &[]).unwrap() else {
                panic!("expected a batch");
            };
            let order: Vec<_> = batch.iter().map(|q| q.id).collect();
            if let Some(prev) = &previous {
                assert_ne!(prev, &order);
            }
            previous = Some(order);
        }
    }
}
