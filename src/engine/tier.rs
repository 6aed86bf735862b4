use std::fmt;

use serde::{Deserialize, Serialize};

/// Minimum accuracy for a learner to be moved up (or kept on Hard).
pub const ADJUST_ACCURACY: f64 = 0.75;

// --- Tier ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Easy,
    Medium,
    Hard,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Easy => "Easy",
            Tier::Medium => "Medium",
            Tier::Hard => "Hard",
        }
    }

    /// Parse a content-authored difficulty label. Matching is case-insensitive
    /// and accepts the synonyms that show up in question banks.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "easy" | "simple" | "basic" => Some(Tier::Easy),
            "medium" | "average" | "moderate" | "intermediate" => Some(Tier::Medium),
            "hard" | "difficult" | "advanced" => Some(Tier::Hard),
            _ => None,
        }
    }

    pub fn all() -> &'static [Tier] {
        &[Tier::Easy, Tier::Medium, Tier::Hard]
    }

    fn harder(self) -> Tier {
        match self {
            Tier::Easy => Tier::Medium,
            Tier::Medium | Tier::Hard => Tier::Hard,
        }
    }

    fn easier(self) -> Tier {
        match self {
            Tier::Easy | Tier::Medium => Tier::Easy,
            Tier::Hard => Tier::Medium,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Scaffold level ---

/// How much instructional support the learner currently needs.
/// Stored as the integers 0/1/2.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ScaffoldLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl ScaffoldLevel {
    /// Zero-based index of the hint tier shown at this level.
    pub fn hint_index(self) -> usize {
        u8::from(self) as usize
    }
}

impl From<ScaffoldLevel> for u8 {
    fn from(level: ScaffoldLevel) -> Self {
        match level {
            ScaffoldLevel::Low => 0,
            ScaffoldLevel::Medium => 1,
            ScaffoldLevel::High => 2,
        }
    }
}

impl TryFrom<u8> for ScaffoldLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ScaffoldLevel::Low),
            1 => Ok(ScaffoldLevel::Medium),
            2 => Ok(ScaffoldLevel::High),
            other => Err(format!("scaffold level out of range: {other}")),
        }
    }
}

// --- Advance rule ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierMove {
    Advance,
    Hold,
    Regress,
}

impl TierMove {
    fn between(from: Tier, to: Tier) -> Self {
        match to.cmp(&from) {
            std::cmp::Ordering::Greater => TierMove::Advance,
            std::cmp::Ordering::Equal => TierMove::Hold,
            std::cmp::Ordering::Less => TierMove::Regress,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TierDecision {
    pub next: Tier,
    pub movement: TierMove,
    /// Scaffold level and accuracy both allowed moving up.
    pub can_adjust: bool,
}

/// Decide the tier that follows `current` once its goal has been reached.
///
/// Easy moves up to Medium or holds; Medium moves up to Hard or drops to Easy;
/// Hard holds or drops to Medium. A High scaffold level never allows moving up.
pub fn decide_next_tier(current: Tier, scaffold: ScaffoldLevel, accuracy: f64) -> TierDecision {
    let can_adjust =
        matches!(scaffold, ScaffoldLevel::Low | ScaffoldLevel::Medium) && accuracy >= ADJUST_ACCURACY;

    let next = match (current, can_adjust) {
        (Tier::Easy, true) => current.harder(),
        (Tier::Easy, false) => Tier::Easy,
        (Tier::Medium, true) => current.harder(),
        (Tier::Medium, false) => current.easier(),
        (Tier::Hard, true) => Tier::Hard,
        (Tier::Hard, false) => current.easier(),
    };

    TierDecision {
        next,
        movement: TierMove::between(current, next),
        can_adjust,
    }
}
