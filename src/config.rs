use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_easy_goal")]
    pub easy_goal: u32,
    #[serde(default = "default_attempt_cap")]
    pub attempt_cap: u32,
    #[serde(default = "default_question_time_secs")]
    pub question_time_secs: u64,
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_learner_id")]
    pub learner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predictor_url: Option<String>,
}

fn default_easy_goal() -> u32 {
    5
}
fn default_attempt_cap() -> u32 {
    10
}
fn default_question_time_secs() -> u64 {
    60
}
fn default_batch_limit() -> usize {
    100
}
fn default_data_dir() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quizladder")
        .to_string_lossy()
        .to_string()
}
fn default_learner_id() -> String {
    "local-learner".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            easy_goal: default_easy_goal(),
            attempt_cap: default_attempt_cap(),
            question_time_secs: default_question_time_secs(),
            batch_limit: default_batch_limit(),
            data_dir: default_data_dir(),
            learner_id: default_learner_id(),
            predictor_url: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let mut config: Config = toml::from_str(&content)?;
            config.validate();
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quizladder")
            .join("config.toml")
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    /// Clamp hand-edited values back into a playable range. Call after
    /// deserialization or after applying command-line overrides.
    pub fn validate(&mut self) {
        self.easy_goal = self.easy_goal.clamp(3, 20);
        self.attempt_cap = self.attempt_cap.max(self.easy_goal);
        self.question_time_secs = self.question_time_secs.clamp(10, 600);
        self.batch_limit = self.batch_limit.clamp(1, 500);
        if self.learner_id.trim().is_empty() {
            self.learner_id = default_learner_id();
        }
        if self
            .predictor_url
            .as_deref()
            .is_some_and(|url| url.trim().is_empty())
        {
            self.predictor_url = None;
        }
    }
}
