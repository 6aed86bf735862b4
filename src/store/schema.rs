use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use icu_normalizer::ComposingNormalizerBorrowed;
use serde::{Deserialize, Deserializer, Serialize};

use crate::engine::accumulator::Ability;
use crate::engine::tier::{ScaffoldLevel, Tier};

pub const SCHEMA_VERSION: u32 = 1;

pub type QuestionId = u64;

// --- Question content ---

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintSet {
    #[serde(default, alias = "first_hint")]
    pub tier1: Option<String>,
    #[serde(default, alias = "second_hint")]
    pub tier2: Option<String>,
    #[serde(default, alias = "third_hint")]
    pub tier3: Option<String>,
}

impl HintSet {
    /// Hint for a scaffold level: Low shows tier 1, Medium tier 2, High tier 3.
    /// Falls back to the nearest lower tier, then to any tier at all.
    pub fn for_level(&self, level: ScaffoldLevel) -> Option<&str> {
        let tiers = [
            self.tier1.as_deref(),
            self.tier2.as_deref(),
            self.tier3.as_deref(),
        ];
        let wanted = level.hint_index();
        tiers[..=wanted]
            .iter()
            .rev()
            .chain(tiers[wanted + 1..].iter())
            .copied()
            .flatten()
            .find(|h| !h.trim().is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQuestion {
    pub id: QuestionId,
    pub main_question_id: QuestionId,
    #[serde(alias = "step_number")]
    pub step: u32,
    #[serde(alias = "question")]
    pub prompt: String,
    #[serde(deserialize_with = "deserialize_choices")]
    pub choices: Vec<String>,
    #[serde(alias = "correct_answer")]
    pub correct_choice: String,
    #[serde(default)]
    pub hints: Option<HintSet>,
}

impl SubQuestion {
    /// `None` when the index does not name a choice.
    pub fn is_correct(&self, choice_index: usize) -> Option<bool> {
        let chosen = self.choices.get(choice_index)?;
        Some(normalize_answer(chosen) == normalize_answer(&self.correct_choice))
    }

    pub fn hint_for(&self, level: ScaffoldLevel) -> Option<&str> {
        self.hints.as_ref().and_then(|h| h.for_level(level))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainQuestion {
    pub id: QuestionId,
    pub difficulty: String,
    #[serde(default)]
    pub topic: String,
    #[serde(alias = "main_question", default)]
    pub prompt: String,
    #[serde(default)]
    pub sub_questions: Vec<SubQuestion>,
}

impl MainQuestion {
    pub fn tier(&self) -> Option<Tier> {
        Tier::from_label(&self.difficulty)
    }

    /// A question whose sub-questions failed to load cannot be played.
    pub fn is_usable(&self) -> bool {
        !self.sub_questions.is_empty()
    }
}

fn normalize_answer(value: &str) -> String {
    ComposingNormalizerBorrowed::new_nfc()
        .normalize(value.trim())
        .into_owned()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChoicesRepr {
    List(Vec<String>),
    Encoded(String),
}

/// Choices arrive either as an array or as a string holding a list literal,
/// possibly with single quotes (`"['1/2', '7/10']"`).
fn deserialize_choices<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match ChoicesRepr::deserialize(deserializer)? {
        ChoicesRepr::List(list) => list,
        ChoicesRepr::Encoded(raw) => parse_choice_list(&raw),
    })
}

pub fn parse_choice_list(raw: &str) -> Vec<String> {
    if let Ok(list) = serde_json::from_str::<Vec<String>>(raw) {
        return list;
    }
    match serde_json::from_str::<Vec<String>>(&raw.replace('\'', "\"")) {
        Ok(list) => list,
        Err(e) => {
            log::warn!("Could not decode choice list {raw:?}: {e}");
            Vec::new()
        }
    }
}

// --- Learner history ---

/// One submitted or timed-out sub-question. Never mutated once written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerEvent {
    pub learner_id: String,
    pub sub_question_id: QuestionId,
    pub main_question_id: QuestionId,
    pub correct: bool,
    pub elapsed_secs: u32,
    #[serde(alias = "difficulty")]
    pub tier: Tier,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub learner_id: String,
    #[serde(alias = "difficulty")]
    pub tier: Tier,
    pub accuracy: f64,
    pub hint_usage_ratio: f64,
    #[serde(alias = "mistake")]
    pub mistakes: u32,
    pub ability: Ability,
    pub correct_main: u32,
    #[serde(default)]
    pub points: u32,
    pub timestamp: DateTime<Utc>,
}

// --- Persisted files ---

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuestionBank {
    pub schema_version: u32,
    pub questions: Vec<MainQuestion>,
}

impl Default for QuestionBank {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            questions: Vec::new(),
        }
    }
}

impl QuestionBank {
    /// Main questions for `tier` in id order, without sub-questions attached.
    pub fn main_questions(
        &self,
        tier: Tier,
        exclude_ids: &[QuestionId],
        limit: usize,
    ) -> Vec<MainQuestion> {
        let mut found: Vec<MainQuestion> = self
            .questions
            .iter()
            .filter(|q| q.tier() == Some(tier) && !exclude_ids.contains(&q.id))
            .map(|q| MainQuestion {
                sub_questions: Vec::new(),
                ..q.clone()
            })
            .collect();
        found.sort_by_key(|q| q.id);
        found.truncate(limit);
        found
    }

    /// Sub-questions in step order, or `None` for an unknown main question.
    pub fn sub_questions(&self, main_question_id: QuestionId) -> Option<Vec<SubQuestion>> {
        let main = self.questions.iter().find(|q| q.id == main_question_id)?;
        let mut subs = main.sub_questions.clone();
        subs.sort_by_key(|s| s.step);
        Some(subs)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnswerLog {
    pub schema_version: u32,
    pub events: Vec<AnswerEvent>,
}

impl Default for AnswerLog {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            events: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressLog {
    pub schema_version: u32,
    pub snapshots: Vec<ProgressSnapshot>,
}

impl Default for ProgressLog {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            snapshots: Vec::new(),
        }
    }
}

impl ProgressLog {
    /// Newest snapshot for the learner; on equal timestamps the later append wins.
    pub fn latest_for(&self, learner_id: &str) -> Option<&ProgressSnapshot> {
        self.snapshots
            .iter()
            .filter(|s| s.learner_id == learner_id)
            .max_by_key(|s| s.timestamp)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileData {
    pub schema_version: u32,
    pub scaffold_levels: BTreeMap<String, ScaffoldLevel>,
}

impl Default for ProfileData {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            scaffold_levels: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sub(choices: &[&str], correct: &str) -> SubQuestion {
        SubQuestion {
            id: 1,
            main_question_id: 1,
            step: 1,
            prompt: "?".to_string(),
            choices: choices.iter().map(|c| c.to_string()).collect(),
            correct_choice: correct.to_string(),
            hints: None,
        }
    }

    #[test]
    fn test_choices_accept_encoded_string() {
        let json = r#"{
            "id": 3, "main_question_id": 1, "step_number": 2,
            "question": "Add the fractions",
            "choices": "['1/2', '7/10']",
            "correct_answer": "7/10"
        }"#;
        let sq: SubQuestion = serde_json::from_str(json).unwrap();
        assert_eq!(sq.choices, vec!["1/2", "7/10"]);
        assert_eq!(sq.step, 2);
        assert_eq!(sq.is_correct(1), Some(true));
    }

    #[test]
    fn test_unparseable_choice_string_degrades_to_empty() {
        assert!(parse_choice_list("not a list").is_empty());
    }

    #[test]
    fn test_answer_comparison_normalizes() {
        // "é" precomposed vs. "e" + combining acute.
        let sq = sub(&["caf\u{e9} ", "tea"], "cafe\u{301}");
        assert_eq!(sq.is_correct(0), Some(true));
        assert_eq!(sq.is_correct(1), Some(false));
        assert_eq!(sq.is_correct(2), None);
    }

    #[test]
    fn test_hint_tier_follows_scaffold_level() {
        let hints = HintSet {
            tier1: Some("first".to_string()),
            tier2: Some("second".to_string()),
            tier3: Some("third".to_string()),
        };
        assert_eq!(hints.for_level(ScaffoldLevel::Low), Some("first"));
        assert_eq!(hints.for_level(ScaffoldLevel::Medium), Some("second"));
        assert_eq!(hints.for_level(ScaffoldLevel::High), Some("third"));
    }

    #[test]
    fn test_hint_falls_back_lower_then_any() {
        let only_first = HintSet {
            tier1: Some("first".to_string()),
            ..HintSet::default()
        };
        assert_eq!(only_first.for_level(ScaffoldLevel::High), Some("first"));

        let only_third = HintSet {
            tier3: Some("third".to_string()),
            ..HintSet::default()
        };
        assert_eq!(only_third.for_level(ScaffoldLevel::Low), Some("third"));
        assert_eq!(HintSet::default().for_level(ScaffoldLevel::Low), None);
    }

    #[test]
    fn test_bank_filters_by_tier_label_and_exclusions() {
        let mk = |id, difficulty: &str| MainQuestion {
            id,
            difficulty: difficulty.to_string(),
            topic: String::new(),
            prompt: String::new(),
            sub_questions: vec![sub(&["a"], "a")],
        };
        let bank = QuestionBank {
            schema_version: SCHEMA_VERSION,
            questions: vec![mk(4, "average"), mk(2, "Medium"), mk(3, "easy"), mk(1, "MEDIUM")],
        };
        let found = bank.main_questions(Tier::Medium, &[2], 10);
        let ids: Vec<_> = found.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![1, 4]);
        assert!(found.iter().all(|q| q.sub_questions.is_empty()));
        assert_eq!(bank.main_questions(Tier::Medium, &[], 1).len(), 1);
        assert!(bank.sub_questions(99).is_none());
    }

    #[test]
    fn test_latest_snapshot_by_timestamp() {
        let now = Utc::now();
        let snap = |learner: &str, tier, offset| ProgressSnapshot {
            learner_id: learner.to_string(),
            tier,
            accuracy: 0.5,
            hint_usage_ratio: 0.0,
            mistakes: 0,
            ability: Ability::Steady,
            correct_main: 0,
            points: 0,
            timestamp: now + Duration::seconds(offset),
        };
        let log = ProgressLog {
            schema_version: SCHEMA_VERSION,
            snapshots: vec![
                snap("a", Tier::Hard, 10),
                snap("a", Tier::Medium, 20),
                snap("b", Tier::Easy, 30),
                snap("a", Tier::Easy, 5),
            ],
        };
        assert_eq!(log.latest_for("a").unwrap().tier, Tier::Medium);
        assert!(log.latest_for("c").is_none());
    }
}
