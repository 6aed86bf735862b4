use std::fs;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};

use crate::engine::tier::{ScaffoldLevel, Tier};
use crate::store::bundled;
use crate::store::schema::{
    AnswerEvent, AnswerLog, MainQuestion, ProfileData, ProgressLog, ProgressSnapshot,
    QuestionBank, QuestionId, SubQuestion,
};
use crate::store::{QuizStore, StoreError, quarantine};

const QUESTIONS_FILE: &str = "questions.json";
const ANSWERS_FILE: &str = "answers.jsonl";
const PROGRESS_FILE: &str = "progress.json";
const PROFILES_FILE: &str = "profiles.json";
const PENDING_FILE: &str = "pending.json";

/// Store backed by JSON files in one directory.
pub struct JsonStore {
    base_dir: PathBuf,
    bank: QuestionBank,
}

impl JsonStore {
    pub fn new() -> Result<Self, StoreError> {
        let base_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quizladder");
        Self::with_base_dir(base_dir)
    }

    /// Open the store at `base_dir`. Uses `questions.json` from that directory
    /// when present, otherwise the bundled bank.
    pub fn with_base_dir(base_dir: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&base_dir)?;
        let bank_path = base_dir.join(QUESTIONS_FILE);
        let bank = if bank_path.exists() {
            let content = fs::read_to_string(&bank_path)?;
            serde_json::from_str(&content)?
        } else {
            log::debug!("No {QUESTIONS_FILE} in {}, using bundled bank", base_dir.display());
            bundled::default_question_bank()
        };
        Ok(Self { base_dir, bank })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn pending_queue_path(&self) -> PathBuf {
        self.file_path(PENDING_FILE)
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    fn load<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        let path = self.file_path(name);
        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                    log::warn!("{name} could not be parsed, treating as empty: {e}");
                    T::default()
                }),
                Err(_) => T::default(),
            }
        } else {
            T::default()
        }
    }

    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<(), StoreError> {
        let path = self.file_path(name);
        let tmp_path = path.with_extension("tmp");

        let json = serde_json::to_string_pretty(data)?;
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Load a file that is about to be rewritten. A file that exists but
    /// does not parse is moved aside first so the rewrite cannot destroy it.
    fn load_for_write<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T, StoreError> {
        let path = self.file_path(name);
        if !path.exists() {
            return Ok(T::default());
        }
        let content = fs::read_to_string(&path)?;
        match serde_json::from_str(&content) {
            Ok(data) => Ok(data),
            Err(e) => {
                let moved = quarantine(&path)?;
                log::warn!("{name} could not be parsed ({e}), moved to {}", moved.display());
                Ok(T::default())
            }
        }
    }

    /// The answer log is one JSON object per line. Damaged lines are skipped.
    pub fn load_answers(&self) -> AnswerLog {
        let mut log = AnswerLog::default();
        let Ok(file) = fs::File::open(self.file_path(ANSWERS_FILE)) else {
            return log;
        };
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(event) => log.events.push(event),
                Err(e) => log::warn!("Skipping damaged line {} of {ANSWERS_FILE}: {e}", number + 1),
            }
        }
        log
    }

    fn append_line<T: Serialize>(&self, name: &str, record: &T) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(self.file_path(name))?;
        // A torn last line must not swallow the new record.
        if file.metadata()?.len() > 0 {
            file.seek(SeekFrom::End(-1))?;
            let mut last = [0u8; 1];
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                line.insert(0, '\n');
            }
        }
        file.write_all(line.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    pub fn load_progress(&self) -> ProgressLog {
        self.load(PROGRESS_FILE)
    }

    fn load_profiles(&self) -> ProfileData {
        self.load(PROFILES_FILE)
    }
}

impl QuizStore for JsonStore {
    fn main_questions(
        &self,
        tier: Tier,
        exclude_ids: &[QuestionId],
        limit: usize,
    ) -> Result<Vec<MainQuestion>, StoreError> {
        Ok(self.bank.main_questions(tier, exclude_ids, limit))
    }

    fn sub_questions(&self, main_question_id: QuestionId) -> Result<Vec<SubQuestion>, StoreError> {
        self.bank
            .sub_questions(main_question_id)
            .ok_or(StoreError::NotFound(main_question_id))
    }

    fn latest_progress(&self, learner_id: &str) -> Result<Option<ProgressSnapshot>, StoreError> {
        Ok(self.load_progress().latest_for(learner_id).cloned())
    }

    fn scaffold_level(&self, learner_id: &str) -> Result<ScaffoldLevel, StoreError> {
        Ok(self
            .load_profiles()
            .scaffold_levels
            .get(learner_id)
            .copied()
            .unwrap_or_default())
    }

    fn append_answer_event(&mut self, event: &AnswerEvent) -> Result<(), StoreError> {
        self.append_line(ANSWERS_FILE, event)
    }

    fn append_progress_snapshot(&mut self, snapshot: &ProgressSnapshot) -> Result<(), StoreError> {
        let mut log: ProgressLog = self.load_for_write(PROGRESS_FILE)?;
        log.snapshots.push(snapshot.clone());
        self.save(PROGRESS_FILE, &log)
    }

    fn update_scaffold_level(
        &mut self,
        learner_id: &str,
        level: ScaffoldLevel,
    ) -> Result<(), StoreError> {
        let mut profiles: ProfileData = self.load_for_write(PROFILES_FILE)?;
        profiles
            .scaffold_levels
            .insert(learner_id.to_string(), level);
        self.save(PROFILES_FILE, &profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::accumulator::Ability;
    use crate::store::schema::SCHEMA_VERSION;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn make_test_store() -> (TempDir, JsonStore) {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::with_base_dir(dir.path().to_path_buf()).unwrap();
        (dir, store)
    }

    fn snapshot(tier: Tier, offset_secs: i64) -> ProgressSnapshot {
        ProgressSnapshot {
            learner_id: "learner-1".to_string(),
            tier,
            accuracy: 0.8,
            hint_usage_ratio: 0.1,
            mistakes: 1,
            ability: Ability::Strong,
            correct_main: 4,
            points: 9,
            timestamp: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn test_falls_back_to_bundled_bank() {
        let (_dir, store) = make_test_store();
        assert!(!store.main_questions(Tier::Easy, &[], 100).unwrap().is_empty());
    }

    #[test]
    fn test_local_bank_overrides_bundled() {
        let dir = TempDir::new().unwrap();
        let bank = QuestionBank {
            schema_version: SCHEMA_VERSION,
            questions: Vec::new(),
        };
        fs::write(
            dir.path().join(QUESTIONS_FILE),
            serde_json::to_string(&bank).unwrap(),
        )
        .unwrap();
        let store = JsonStore::with_base_dir(dir.path().to_path_buf()).unwrap();
        assert!(store.main_questions(Tier::Easy, &[], 100).unwrap().is_empty());
    }

    #[test]
    fn test_progress_round_trip_latest_wins() {
        let (_dir, mut store) = make_test_store();
        store.append_progress_snapshot(&snapshot(Tier::Easy, 0)).unwrap();
        store.append_progress_snapshot(&snapshot(Tier::Medium, 5)).unwrap();
        let latest = store.latest_progress("learner-1").unwrap().unwrap();
        assert_eq!(latest.tier, Tier::Medium);
        assert_eq!(latest.points, 9);
        assert!(store.latest_progress("someone-else").unwrap().is_none());
    }

    #[test]
    fn test_answers_append_and_leave_no_tmp_files() {
        let (dir, mut store) = make_test_store();
        let event = AnswerEvent {
            learner_id: "learner-1".to_string(),
            sub_question_id: 1001,
            main_question_id: 1,
            correct: true,
            elapsed_secs: 12,
            tier: Tier::Easy,
            created_at: Utc::now(),
        };
        store.append_answer_event(&event).unwrap();
        store.append_answer_event(&event).unwrap();
        assert_eq!(store.load_answers().events.len(), 2);

        let tmp_files: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("tmp"))
            .collect();
        assert!(tmp_files.is_empty(), "no residual .tmp files");
    }

    #[test]
    fn test_scaffold_level_persists() {
        let (_dir, mut store) = make_test_store();
        assert_eq!(store.scaffold_level("learner-1").unwrap(), ScaffoldLevel::Low);
        store
            .update_scaffold_level("learner-1", ScaffoldLevel::High)
            .unwrap();
        assert_eq!(store.scaffold_level("learner-1").unwrap(), ScaffoldLevel::High);
    }

    #[test]
    fn test_corrupt_progress_file_reads_as_empty() {
        let (dir, store) = make_test_store();
        fs::write(dir.path().join(PROGRESS_FILE), "garbage").unwrap();
        assert!(store.latest_progress("learner-1").unwrap().is_none());
    }

    fn event(sub_question_id: u64) -> AnswerEvent {
        AnswerEvent {
            learner_id: "learner-1".to_string(),
            sub_question_id,
            main_question_id: 1,
            correct: true,
            elapsed_secs: 5,
            tier: Tier::Easy,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_append_after_damaged_answer_keeps_history() {
        let (dir, mut store) = make_test_store();
        store.append_answer_event(&event(1)).unwrap();
        store.append_answer_event(&event(2)).unwrap();

        let path = dir.path().join(ANSWERS_FILE);
        let mut raw = fs::read_to_string(&path).unwrap();
        raw.push('x');
        fs::write(&path, raw).unwrap();

        store.append_answer_event(&event(3)).unwrap();
        let ids: Vec<_> = store
            .load_answers()
            .events
            .iter()
            .map(|e| e.sub_question_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_append_after_damaged_progress_moves_old_file_aside() {
        let (dir, mut store) = make_test_store();
        store.append_progress_snapshot(&snapshot(Tier::Easy, 0)).unwrap();
        let path = dir.path().join(PROGRESS_FILE);
        let mut damaged = fs::read_to_string(&path).unwrap();
        damaged.push('x');
        fs::write(&path, &damaged).unwrap();

        store.append_progress_snapshot(&snapshot(Tier::Medium, 5)).unwrap();
        assert_eq!(store.load_progress().snapshots.len(), 1);

        let kept: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("progress.json.corrupt-"))
            .collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(fs::read_to_string(kept[0].path()).unwrap(), damaged);
    }
}
