use std::time::{Duration, Instant};

/// Fixed wall-clock budget for each sub-question.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeoutPolicy {
    pub budget: Duration,
}

impl TimeoutPolicy {
    pub fn from_secs(secs: u64) -> Self {
        Self {
            budget: Duration::from_secs(secs),
        }
    }

    pub fn budget_secs(&self) -> u32 {
        self.budget.as_secs().min(u32::MAX as u64) as u32
    }
}

/// Clock for the sub-question currently on screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuestionClock {
    pub rendered_at: Instant,
    pub deadline: Instant,
}

impl QuestionClock {
    pub fn start(policy: TimeoutPolicy, rendered_at: Instant) -> Self {
        Self {
            rendered_at,
            deadline: rendered_at + policy.budget,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Whole seconds since rendering, never more than the budget.
    pub fn elapsed_secs(&self, now: Instant, policy: TimeoutPolicy) -> u32 {
        let elapsed = now.saturating_duration_since(self.rendered_at).as_secs();
        elapsed.min(policy.budget.as_secs()).min(u32::MAX as u64) as u32
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }
}
