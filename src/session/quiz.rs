use std::time::{Duration, Instant};

use chrono::Utc;

use crate::config::Config;
use crate::engine::bootstrap::recommend_starting_tier;
use crate::engine::mastery::{MasteryPolicy, TierStatus};
use crate::engine::predictor::{PredictorInput, ScaffoldPredictor};
use crate::engine::tier::{ScaffoldLevel, Tier, TierDecision, TierMove, decide_next_tier};
use crate::session::error::{Fault, QuizError};
use crate::session::event::{QuizEvent, SessionEndReason};
use crate::session::question_source::QuestionSource;
use crate::session::recorder::{AttemptRecorder, RecordOutcome};
use crate::session::state::SessionState;
use crate::session::timer::{QuestionClock, TimeoutPolicy};
use crate::store::QuizStore;
use crate::store::pending_queue::{FlushReport, PendingQueue};
use crate::store::schema::{AnswerEvent, MainQuestion, ProgressSnapshot, SubQuestion};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuizPhase {
    NotStarted,
    AwaitingAnswer {
        tier: Tier,
        main_idx: usize,
        sub_idx: usize,
    },
    RoundComplete,
    TierComplete,
    /// Attempt cap hit before the goal. Terminal: the learner goes to the
    /// progress view.
    TierExhaustedRetry,
    SessionComplete(SessionEndReason),
}

impl QuizPhase {
    pub fn is_over(self) -> bool {
        matches!(self, QuizPhase::TierExhaustedRetry | QuizPhase::SessionComplete(_))
    }
}

#[derive(Clone, Copy, Debug)]
struct InFlight {
    ticket: u64,
    clock: QuestionClock,
}

/// One learner's quiz. Every input is handled to completion and returns the
/// events it produced; at most one sub-question is in flight at a time and
/// each one accepts exactly one outcome.
pub struct QuizSession<S: QuizStore, P: ScaffoldPredictor> {
    store: S,
    predictor: P,
    learner_id: String,
    policy: MasteryPolicy,
    timeout: TimeoutPolicy,
    source: QuestionSource,
    recorder: AttemptRecorder,
    state: SessionState,
    scaffold: ScaffoldLevel,
    phase: QuizPhase,
    batch: Vec<MainQuestion>,
    presented_from_batch: bool,
    in_flight: Option<InFlight>,
    next_ticket: u64,
    last_flush: FlushReport,
}

impl<S: QuizStore, P: ScaffoldPredictor> QuizSession<S, P> {
    pub fn new(store: S, predictor: P, config: &Config, learner_id: impl Into<String>) -> Self {
        Self {
            store,
            predictor,
            learner_id: learner_id.into(),
            policy: MasteryPolicy::from_config(config),
            timeout: TimeoutPolicy::from_secs(config.question_time_secs),
            source: QuestionSource::new(config.batch_limit),
            recorder: AttemptRecorder::default(),
            state: SessionState::new(Tier::Easy),
            scaffold: ScaffoldLevel::Low,
            phase: QuizPhase::NotStarted,
            batch: Vec::new(),
            presented_from_batch: false,
            in_flight: None,
            next_ticket: 1,
            last_flush: FlushReport::default(),
        }
    }

    pub fn with_question_source(mut self, source: QuestionSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_pending_queue(mut self, queue: PendingQueue) -> Self {
        self.recorder = AttemptRecorder::new(queue);
        self
    }

    // --- Accessors ---

    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    pub fn is_over(&self) -> bool {
        self.phase.is_over()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn policy(&self) -> MasteryPolicy {
        self.policy
    }

    pub fn scaffold_level(&self) -> ScaffoldLevel {
        self.scaffold
    }

    pub fn pending_writes(&self) -> usize {
        self.recorder.queue().len()
    }

    /// Result of the queue replay done by `start`.
    pub fn last_flush(&self) -> FlushReport {
        self.last_flush
    }

    pub fn current_ticket(&self) -> Option<u64> {
        self.in_flight.map(|f| f.ticket)
    }

    pub fn rendered_at(&self) -> Option<Instant> {
        self.in_flight.map(|f| f.clock.rendered_at)
    }

    pub fn time_remaining(&self, now: Instant) -> Option<Duration> {
        self.in_flight.map(|f| f.clock.remaining(now))
    }

    pub fn current_question(&self) -> Option<(&MainQuestion, &SubQuestion)> {
        self.in_flight?;
        let main = self.batch.get(self.state.main_idx)?;
        let sub = main.sub_questions.get(self.state.sub_idx)?;
        Some((main, sub))
    }

    // --- Inputs ---

    pub fn start(&mut self) -> Result<Vec<QuizEvent>, QuizError> {
        self.start_at(Instant::now())
    }

    /// Replay deferred writes, pick the starting tier and present the first
    /// sub-question.
    pub fn start_at(&mut self, now: Instant) -> Result<Vec<QuizEvent>, QuizError> {
        if self.phase != QuizPhase::NotStarted {
            return Err(QuizError::AlreadyStarted);
        }
        self.last_flush = self.recorder.flush_queued(&mut self.store);

        let (tier, scaffold) = recommend_starting_tier(&self.store, &self.learner_id);
        self.scaffold = scaffold;
        self.state = SessionState::new(tier);
        log::info!("Session for {} starting on {tier}", self.learner_id);

        let mut events = Vec::new();
        self.load_batch(now, &mut events);
        Ok(events)
    }

    pub fn submit_answer(&mut self, ticket: u64, choice_index: usize) -> Result<Vec<QuizEvent>, QuizError> {
        self.submit_answer_at(ticket, choice_index, Instant::now())
    }

    /// A submission that lands after the budget but before the timeout was
    /// processed still counts; its elapsed time is capped at the budget.
    pub fn submit_answer_at(
        &mut self,
        ticket: u64,
        choice_index: usize,
        now: Instant,
    ) -> Result<Vec<QuizEvent>, QuizError> {
        let in_flight = self.check_ticket(ticket)?;
        let (_, sub) = self.current_question().ok_or(QuizError::NoQuestionInFlight)?;
        let correct = sub.is_correct(choice_index).ok_or(QuizError::ChoiceOutOfRange {
            index: choice_index,
            available: sub.choices.len(),
        })?;
        let elapsed = in_flight.clock.elapsed_secs(now, self.timeout);
        self.resolve(correct, elapsed, false, now)
    }

    /// The presentation layer's own timer expired for `ticket`.
    pub fn timeout_fired(&mut self, ticket: u64) -> Result<Vec<QuizEvent>, QuizError> {
        self.check_ticket(ticket)?;
        self.resolve(false, self.timeout.budget_secs(), true, Instant::now())
    }

    /// Expire the in-flight sub-question if its budget has run out.
    pub fn tick(&mut self, now: Instant) -> Vec<QuizEvent> {
        let Some(in_flight) = self.in_flight else {
            return Vec::new();
        };
        if self.phase.is_over() || !in_flight.clock.is_expired(now) {
            return Vec::new();
        }
        log::debug!("Question {} timed out", in_flight.ticket);
        self.resolve(false, self.timeout.budget_secs(), true, now)
            .unwrap_or_default()
    }

    /// Count a hint reveal and return the hint text for the current scaffold
    /// level, if the sub-question has any.
    pub fn request_hint(&mut self) -> Result<Option<String>, QuizError> {
        if self.phase.is_over() {
            return Err(QuizError::SessionOver);
        }
        let hint = {
            let (_, sub) = self.current_question().ok_or(QuizError::NoQuestionInFlight)?;
            sub.hint_for(self.scaffold).map(str::to_string)
        };
        self.state.accumulator.record_hint();
        Ok(hint)
    }

    // --- Transitions ---

    fn check_ticket(&self, ticket: u64) -> Result<InFlight, QuizError> {
        if self.phase.is_over() {
            return Err(QuizError::SessionOver);
        }
        match self.in_flight {
            None => Err(QuizError::NoQuestionInFlight),
            Some(f) if f.ticket != ticket => Err(QuizError::StaleTicket {
                given: ticket,
                current: f.ticket,
            }),
            Some(f) => Ok(f),
        }
    }

    fn resolve(
        &mut self,
        correct: bool,
        elapsed_secs: u32,
        timed_out: bool,
        now: Instant,
    ) -> Result<Vec<QuizEvent>, QuizError> {
        let (main_id, sub_count, event, correct_choice) = {
            let (main, sub) = self.current_question().ok_or(QuizError::NoQuestionInFlight)?;
            let event = AnswerEvent {
                learner_id: self.learner_id.clone(),
                sub_question_id: sub.id,
                main_question_id: main.id,
                correct,
                elapsed_secs,
                tier: self.state.tier,
                created_at: Utc::now(),
            };
            (main.id, main.sub_questions.len(), event, sub.correct_choice.clone())
        };
        // Lock the sub-question before anything else can observe it.
        self.in_flight = None;

        let mut events = Vec::new();
        if let RecordOutcome::Queued { reason } = self.recorder.record(&mut self.store, event) {
            events.push(QuizEvent::Warning(Fault::StoreWriteDeferred(reason)));
        }
        events.push(QuizEvent::AnswerOutcome {
            correct,
            correct_choice,
            timed_out,
        });

        if correct {
            self.state.accumulator.award_point();
        }
        self.state.round_results.push(correct);

        if self.state.round_results.len() >= sub_count {
            self.phase = QuizPhase::RoundComplete;
            self.finish_round(main_id, now, &mut events);
        } else {
            self.state.sub_idx += 1;
            self.present_current(now, &mut events);
        }
        Ok(events)
    }

    fn finish_round(&mut self, main_id: u64, now: Instant, events: &mut Vec<QuizEvent>) {
        let fully_correct = self.state.finish_round(main_id);
        let tier = self.state.tier;
        let acc = &self.state.accumulator;
        log::debug!(
            "Round on {main_id} finished (fully correct: {fully_correct}), {tier} score {}/{}",
            self.state.tier_score,
            self.policy.goal(tier)
        );

        match self.policy.evaluate(tier, self.state.tier_score, acc.attempted()) {
            TierStatus::GoalReached => self.complete_tier(now, events),
            TierStatus::AttemptCapReached => {
                let snapshot = self.snapshot();
                self.persist_snapshot(snapshot, events);
                log::info!(
                    "{} hit the attempt cap on {tier} with {} of {} rounds correct",
                    self.learner_id,
                    self.state.tier_score,
                    self.policy.goal(tier)
                );
                self.in_flight = None;
                self.phase = QuizPhase::TierExhaustedRetry;
                events.push(QuizEvent::SessionComplete {
                    reason: SessionEndReason::AttemptCapReached,
                });
            }
            TierStatus::InProgress => self.present_from(self.state.main_idx + 1, now, events),
        }
    }

    fn complete_tier(&mut self, now: Instant, events: &mut Vec<QuizEvent>) {
        self.phase = QuizPhase::TierComplete;
        let from = self.state.tier;
        let snapshot = self.snapshot();
        let accuracy = snapshot.accuracy;
        let input = PredictorInput::from_snapshot(&snapshot);
        self.persist_snapshot(snapshot, events);

        let decision = match self.predictor.predict(&input) {
            Ok(level) => {
                self.scaffold = level;
                if let Err(e) = self.store.update_scaffold_level(&self.learner_id, level) {
                    log::warn!("Could not save scaffold level for {}: {e}", self.learner_id);
                }
                decide_next_tier(from, level, accuracy)
            }
            Err(e) => {
                log::warn!("Scaffold predictor failed, keeping {:?}: {e}", self.scaffold);
                events.push(QuizEvent::Warning(Fault::PredictorUnavailable(e.to_string())));
                TierDecision {
                    next: from,
                    movement: TierMove::Hold,
                    can_adjust: false,
                }
            }
        };

        log::info!(
            "{} finished {from} ({:.0}% accuracy): {:?} to {}",
            self.learner_id,
            accuracy * 100.0,
            decision.movement,
            decision.next
        );
        events.push(QuizEvent::TierTransition {
            from,
            to: decision.next,
            reason: decision.movement,
        });

        if from == Tier::Hard && decision.can_adjust {
            self.end_session(SessionEndReason::AllTiersCleared, events);
            return;
        }
        self.state.reset_for_tier(decision.next);
        self.load_batch(now, events);
    }

    fn snapshot(&self) -> ProgressSnapshot {
        self.state
            .accumulator
            .snapshot(&self.learner_id, self.state.tier, Utc::now())
    }

    fn persist_snapshot(&mut self, snapshot: ProgressSnapshot, events: &mut Vec<QuizEvent>) {
        if let RecordOutcome::Queued { reason } = self.recorder.record_progress(&mut self.store, snapshot) {
            events.push(QuizEvent::Warning(Fault::StoreWriteDeferred(reason)));
        }
    }

    fn load_batch(&mut self, now: Instant, events: &mut Vec<QuizEvent>) {
        let tier = self.state.tier;
        match self
            .source
            .fetch_with_reset(&self.store, tier, &mut self.state.exclude_ids)
        {
            Ok(batch) => {
                self.batch = batch;
                self.presented_from_batch = false;
                self.present_from(0, now, events);
            }
            Err(e) => {
                log::error!("Ending session for {}: {e}", self.learner_id);
                self.end_session(SessionEndReason::Exhausted, events);
            }
        }
    }

    /// Present the first usable main question at or after `start`. Degraded
    /// questions are skipped without counting as attempts.
    fn present_from(&mut self, start: usize, now: Instant, events: &mut Vec<QuizEvent>) {
        for idx in start..self.batch.len() {
            let main = &self.batch[idx];
            if !main.is_usable() {
                let id = main.id;
                log::warn!("Skipping main question {id}: no sub-questions");
                self.state.exclude(id);
                events.push(QuizEvent::Warning(Fault::MalformedQuestion(id)));
                continue;
            }
            self.presented_from_batch = true;
            self.state.start_round(idx);
            self.present_current(now, events);
            return;
        }

        if self.presented_from_batch {
            self.load_batch(now, events);
        } else {
            log::error!(
                "Every {} question in the batch was malformed, ending session",
                self.state.tier
            );
            self.end_session(SessionEndReason::Exhausted, events);
        }
    }

    fn present_current(&mut self, now: Instant, events: &mut Vec<QuizEvent>) {
        let tier = self.state.tier;
        let (main_idx, sub_idx) = (self.state.main_idx, self.state.sub_idx);
        let Some(main) = self.batch.get(main_idx) else {
            self.present_from(main_idx, now, events);
            return;
        };
        // Past the last step: clamp and close the round.
        let Some(sub) = main.sub_questions.get(sub_idx) else {
            let main_id = main.id;
            self.state.sub_idx = main.sub_questions.len().saturating_sub(1);
            self.phase = QuizPhase::RoundComplete;
            self.finish_round(main_id, now, events);
            return;
        };

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        events.push(QuizEvent::QuestionReady {
            ticket,
            tier,
            main_question: main.clone(),
            sub_question: sub.clone(),
        });
        self.in_flight = Some(InFlight {
            ticket,
            clock: QuestionClock::start(self.timeout, now),
        });
        self.phase = QuizPhase::AwaitingAnswer {
            tier,
            main_idx,
            sub_idx,
        };
    }

    fn end_session(&mut self, reason: SessionEndReason, events: &mut Vec<QuizEvent>) {
        log::info!("Session for {} complete: {reason}", self.learner_id);
        self.in_flight = None;
        self.phase = QuizPhase::SessionComplete(reason);
        events.push(QuizEvent::SessionComplete { reason });
    }
}
