use crate::engine::accumulator::ProgressAccumulator;
use crate::engine::tier::Tier;
use crate::store::schema::QuestionId;

/// In-memory progress through the current tier. Discarded when the session
/// ends; only answer events and snapshots are durable.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionState {
    pub tier: Tier,
    pub main_idx: usize,
    pub sub_idx: usize,
    /// Correctness of each answered sub-question in the current round.
    pub round_results: Vec<bool>,
    /// Fully-correct rounds in this tier.
    pub tier_score: u32,
    pub exclude_ids: Vec<QuestionId>,
    pub accumulator: ProgressAccumulator,
}

impl SessionState {
    pub fn new(tier: Tier) -> Self {
        Self {
            tier,
            main_idx: 0,
            sub_idx: 0,
            round_results: Vec::new(),
            tier_score: 0,
            exclude_ids: Vec::new(),
            accumulator: ProgressAccumulator::new(),
        }
    }

    /// The only way counters change across a tier boundary.
    pub fn reset_for_tier(&mut self, tier: Tier) {
        self.tier = tier;
        self.main_idx = 0;
        self.sub_idx = 0;
        self.round_results.clear();
        self.tier_score = 0;
        self.exclude_ids.clear();
        self.accumulator.reset_for_new_tier();
    }

    pub fn start_round(&mut self, main_idx: usize) {
        self.main_idx = main_idx;
        self.sub_idx = 0;
        self.round_results.clear();
    }

    /// A round counts only when every sub-question in it was answered correctly.
    pub fn round_fully_correct(&self) -> bool {
        !self.round_results.is_empty() && self.round_results.iter().all(|&ok| ok)
    }

    /// Close the round: update counters, consume the main question and return
    /// whether it was fully correct.
    pub fn finish_round(&mut self, main_question_id: QuestionId) -> bool {
        let fully_correct = self.round_fully_correct();
        self.accumulator.record_round(fully_correct);
        if fully_correct {
            self.tier_score += 1;
        }
        self.exclude(main_question_id);
        fully_correct
    }

    pub fn exclude(&mut self, main_question_id: QuestionId) {
        if !self.exclude_ids.contains(&main_question_id) {
            self.exclude_ids.push(main_question_id);
        }
    }
}
