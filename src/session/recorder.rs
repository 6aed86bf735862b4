use crate::store::QuizStore;
use crate::store::pending_queue::{FlushReport, PendingQueue, PendingWrite};
use crate::store::schema::{AnswerEvent, ProgressSnapshot};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    Ack,
    /// The store refused the write; it is waiting in the local queue.
    Queued { reason: String },
}

/// Best-effort writer for answer events and progress snapshots. Never fails:
/// anything the store refuses goes to the pending queue.
#[derive(Debug, Default)]
pub struct AttemptRecorder {
    queue: PendingQueue,
}

impl AttemptRecorder {
    pub fn new(queue: PendingQueue) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    pub fn record<S: QuizStore + ?Sized>(&mut self, store: &mut S, event: AnswerEvent) -> RecordOutcome {
        match store.append_answer_event(&event) {
            Ok(()) => RecordOutcome::Ack,
            Err(e) => {
                log::warn!(
                    "Answer for sub-question {} queued locally: {e}",
                    event.sub_question_id
                );
                self.queue.push(PendingWrite::Answer(event));
                RecordOutcome::Queued {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn record_progress<S: QuizStore + ?Sized>(
        &mut self,
        store: &mut S,
        snapshot: ProgressSnapshot,
    ) -> RecordOutcome {
        match store.append_progress_snapshot(&snapshot) {
            Ok(()) => RecordOutcome::Ack,
            Err(e) => {
                log::warn!("Progress snapshot for {} queued locally: {e}", snapshot.tier);
                self.queue.push(PendingWrite::Progress(snapshot));
                RecordOutcome::Queued {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn flush_queued<S: QuizStore + ?Sized>(&mut self, store: &mut S) -> FlushReport {
        if self.queue.is_empty() {
            return FlushReport::default();
        }
        let report = self.queue.flush(store);
        log::info!(
            "Replayed {} queued write(s), {} still pending",
            report.replayed,
            report.remaining
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::accumulator::Ability;
    use crate::engine::tier::Tier;
    use crate::store::memory::MemoryStore;
    use chrono::Utc;

    fn event(sub_question_id: u64) -> AnswerEvent {
        AnswerEvent {
            learner_id: "learner-1".to_string(),
            sub_question_id,
            main_question_id: 1,
            correct: true,
            elapsed_secs: 4,
            tier: Tier::Easy,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_success_acks() {
        let mut store = MemoryStore::new();
        let mut recorder = AttemptRecorder::default();
        assert_eq!(recorder.record(&mut store, event(1)), RecordOutcome::Ack);
        assert_eq!(store.answers().len(), 1);
        assert!(recorder.queue().is_empty());
    }

    #[test]
    fn test_failure_queues_then_flush_drains_in_order() {
        let mut store = MemoryStore::new();
        store.set_fail_writes(true);
        let mut recorder = AttemptRecorder::default();

        for id in 1..=3 {
            let outcome = recorder.record(&mut store, event(id));
            assert!(matches!(outcome, RecordOutcome::Queued { .. }));
        }
        let snapshot = ProgressSnapshot {
            learner_id: "learner-1".to_string(),
            tier: Tier::Easy,
            accuracy: 1.0,
            hint_usage_ratio: 0.0,
            mistakes: 0,
            ability: Ability::Strong,
            correct_main: 1,
            points: 2,
            timestamp: Utc::now(),
        };
        assert!(matches!(
            recorder.record_progress(&mut store, snapshot),
            RecordOutcome::Queued { .. }
        ));
        assert_eq!(recorder.queue().len(), 4);
        assert!(store.answers().is_empty());

        store.set_fail_writes(false);
        let report = recorder.flush_queued(&mut store);
        assert_eq!(report, FlushReport { replayed: 4, remaining: 0 });
        let ids: Vec<_> = store.answers().iter().map(|e| e.sub_question_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(store.snapshots().len(), 1);
    }
}
