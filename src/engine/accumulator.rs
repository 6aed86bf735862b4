use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::tier::Tier;
use crate::store::schema::ProgressSnapshot;

const STRONG_ACCURACY: f64 = 0.75;
const STRONG_HINT_RATIO: f64 = 0.3;
const STRONG_MAX_MISTAKES: u32 = 2;

const WEAK_ACCURACY: f64 = 0.5;
const WEAK_HINT_RATIO: f64 = 0.5;
const WEAK_MIN_MISTAKES: u32 = 5;

/// Discrete summary of performance quality within a tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Ability {
    Struggling,
    Steady,
    Strong,
}

impl From<Ability> for i8 {
    fn from(ability: Ability) -> Self {
        match ability {
            Ability::Struggling => -1,
            Ability::Steady => 0,
            Ability::Strong => 1,
        }
    }
}

impl TryFrom<i8> for Ability {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Ability::Struggling),
            0 => Ok(Ability::Steady),
            1 => Ok(Ability::Strong),
            other => Err(format!("ability out of range: {other}")),
        }
    }
}

/// Strong is checked before Struggling; anything else is Steady.
pub fn ability_from(accuracy: f64, hint_usage_ratio: f64, mistakes: u32) -> Ability {
    if accuracy >= STRONG_ACCURACY
        && hint_usage_ratio < STRONG_HINT_RATIO
        && mistakes <= STRONG_MAX_MISTAKES
    {
        Ability::Strong
    } else if accuracy < WEAK_ACCURACY
        || hint_usage_ratio > WEAK_HINT_RATIO
        || mistakes >= WEAK_MIN_MISTAKES
    {
        Ability::Struggling
    } else {
        Ability::Steady
    }
}

/// Running counters for the active tier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgressAccumulator {
    attempted: u32,
    correct_main: u32,
    hints_used: u32,
    mistakes: u32,
    points: u32,
}

impl ProgressAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset_for_new_tier(&mut self) {
        *self = Self::default();
    }

    /// Count a finished main question.
    pub fn record_round(&mut self, fully_correct: bool) {
        self.attempted += 1;
        if fully_correct {
            self.correct_main += 1;
        } else {
            self.mistakes += 1;
        }
    }

    pub fn record_hint(&mut self) {
        self.hints_used += 1;
    }

    pub fn award_point(&mut self) {
        self.points += 1;
    }

    pub fn attempted(&self) -> u32 {
        self.attempted
    }

    pub fn correct_main(&self) -> u32 {
        self.correct_main
    }

    pub fn hints_used(&self) -> u32 {
        self.hints_used
    }

    pub fn mistakes(&self) -> u32 {
        self.mistakes
    }

    pub fn points(&self) -> u32 {
        self.points
    }

    pub fn accuracy(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.correct_main as f64 / self.attempted as f64
    }

    pub fn hint_usage_ratio(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        (self.hints_used as f64 / self.attempted as f64).min(1.0)
    }

    pub fn ability(&self) -> Ability {
        ability_from(self.accuracy(), self.hint_usage_ratio(), self.mistakes)
    }

    pub fn snapshot(&self, learner_id: &str, tier: Tier, timestamp: DateTime<Utc>) -> ProgressSnapshot {
        ProgressSnapshot {
            learner_id: learner_id.to_string(),
            tier,
            accuracy: self.accuracy(),
            hint_usage_ratio: self.hint_usage_ratio(),
            mistakes: self.mistakes,
            ability: self.ability(),
            correct_main: self.correct_main,
            points: self.points,
            timestamp,
        }
    }
}
