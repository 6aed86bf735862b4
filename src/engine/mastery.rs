use crate::config::Config;
use crate::engine::tier::Tier;

/// Goal table and attempt cap for one deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MasteryPolicy {
    pub easy_goal: u32,
    pub attempt_cap: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TierStatus {
    InProgress,
    GoalReached,
    AttemptCapReached,
}

impl MasteryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            easy_goal: config.easy_goal,
            attempt_cap: config.attempt_cap,
        }
    }

    /// Fully-correct rounds required to finish `tier`. Medium needs one fewer
    /// than Easy and Hard two fewer, never less than one.
    pub fn goal(&self, tier: Tier) -> u32 {
        let reduction = match tier {
            Tier::Easy => 0,
            Tier::Medium => 1,
            Tier::Hard => 2,
        };
        self.easy_goal.saturating_sub(reduction).max(1)
    }

    /// The goal is checked before the attempt cap.
    pub fn evaluate(&self, tier: Tier, tier_score: u32, attempted: u32) -> TierStatus {
        if tier_score >= self.goal(tier) {
            TierStatus::GoalReached
        } else if attempted >= self.attempt_cap {
            TierStatus::AttemptCapReached
        } else {
            TierStatus::InProgress
        }
    }
}

impl Default for MasteryPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
