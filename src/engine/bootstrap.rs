use crate::engine::tier::{ScaffoldLevel, Tier, decide_next_tier};
use crate::store::QuizStore;
use crate::store::schema::ProgressSnapshot;

/// Starting tier for a new session from the last stored snapshot.
/// No history starts on Easy.
pub fn recommend_tier(latest: Option<&ProgressSnapshot>, scaffold: ScaffoldLevel) -> Tier {
    match latest {
        Some(snapshot) => decide_next_tier(snapshot.tier, scaffold, snapshot.accuracy).next,
        None => Tier::Easy,
    }
}

/// Read the learner's history and scaffold level and pick a starting tier.
/// Store read failures fall back to no history and a Low scaffold level.
pub fn recommend_starting_tier<S: QuizStore + ?Sized>(
    store: &S,
    learner_id: &str,
) -> (Tier, ScaffoldLevel) {
    let latest = store.latest_progress(learner_id).unwrap_or_else(|e| {
        log::warn!("Could not read progress for {learner_id}: {e}");
        None
    });
    let scaffold = store.scaffold_level(learner_id).unwrap_or_else(|e| {
        log::warn!("Could not read scaffold level for {learner_id}: {e}");
        ScaffoldLevel::Low
    });
    let tier = recommend_tier(latest.as_ref(), scaffold);
    log::info!(
        "Recommended start for {learner_id}: {tier} (last tier {:?}, scaffold {scaffold:?})",
        latest.as_ref().map(|s| s.tier)
    );
    (tier, scaffold)
}
