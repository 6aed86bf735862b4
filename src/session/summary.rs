use crate::engine::accumulator::Ability;
use crate::engine::tier::Tier;
use crate::store::schema::ProgressSnapshot;

/// Numbers shown on the progress view, derived from the latest snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProgressSummary {
    pub questions_answered: u32,
    pub correct: u32,
    pub accuracy_percent: u32,
    pub last_tier: Option<Tier>,
    pub ability: Option<Ability>,
    pub points: u32,
}

impl ProgressSummary {
    pub fn from_latest(latest: Option<&ProgressSnapshot>) -> Self {
        let Some(snapshot) = latest else {
            return Self::default();
        };
        // Older rows carry no points; the correct count stands in.
        let points = if snapshot.points > 0 {
            snapshot.points
        } else {
            snapshot.correct_main
        };
        Self {
            questions_answered: snapshot.correct_main + snapshot.mistakes,
            correct: snapshot.correct_main,
            accuracy_percent: (snapshot.accuracy * 100.0).round().clamp(0.0, 100.0) as u32,
            last_tier: Some(snapshot.tier),
            ability: Some(snapshot.ability),
            points,
        }
    }
}
