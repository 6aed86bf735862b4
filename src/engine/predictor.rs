use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::accumulator::Ability;
use crate::engine::tier::{ScaffoldLevel, Tier};
use crate::store::schema::ProgressSnapshot;

/// Feature vector sent to the scaffold predictor after a tier is finished.
/// Field names follow the predictor's training columns.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PredictorInput {
    pub learner_id: String,
    pub accuracy: f64,
    #[serde(rename = "hint_usage")]
    pub hint_usage_ratio: f64,
    #[serde(rename = "mistake")]
    pub mistakes: u32,
    pub ability: Ability,
    #[serde(rename = "difficulty")]
    pub tier: Tier,
}

impl PredictorInput {
    pub fn from_snapshot(snapshot: &ProgressSnapshot) -> Self {
        Self {
            learner_id: snapshot.learner_id.clone(),
            accuracy: snapshot.accuracy,
            hint_usage_ratio: snapshot.hint_usage_ratio,
            mistakes: snapshot.mistakes,
            ability: snapshot.ability,
            tier: snapshot.tier,
        }
    }
}

#[derive(Debug, Error)]
pub enum PredictorError {
    #[error("predictor request failed: {0}")]
    Request(String),
    #[error("predictor returned an unusable response: {0}")]
    BadResponse(String),
}

pub trait ScaffoldPredictor {
    fn predict(&self, input: &PredictorInput) -> Result<ScaffoldLevel, PredictorError>;
}

impl<P: ScaffoldPredictor + ?Sized> ScaffoldPredictor for Box<P> {
    fn predict(&self, input: &PredictorInput) -> Result<ScaffoldLevel, PredictorError> {
        (**self).predict(input)
    }
}

/// Rule-based stand-in for the trained model: ability sets the base level and
/// heavy hint use asks for one more level of support.
#[derive(Clone, Copy, Debug)]
pub struct HeuristicPredictor {
    pub hint_pressure: f64,
}

impl Default for HeuristicPredictor {
    fn default() -> Self {
        Self { hint_pressure: 0.5 }
    }
}

impl ScaffoldPredictor for HeuristicPredictor {
    fn predict(&self, input: &PredictorInput) -> Result<ScaffoldLevel, PredictorError> {
        let base = match input.ability {
            Ability::Strong => ScaffoldLevel::Low,
            Ability::Steady => ScaffoldLevel::Medium,
            Ability::Struggling => ScaffoldLevel::High,
        };
        if input.hint_usage_ratio > self.hint_pressure {
            let raised = (u8::from(base) + 1).min(2);
            return ScaffoldLevel::try_from(raised).map_err(PredictorError::BadResponse);
        }
        Ok(base)
    }
}

#[derive(Debug, Deserialize)]
struct PredictorResponse {
    scaffold_level: u8,
}

/// Calls a remote predictor over HTTP. The endpoint receives the
/// `PredictorInput` as JSON and answers `{"scaffold_level": 0|1|2}`.
#[cfg(feature = "network")]
pub struct HttpPredictor {
    url: String,
    client: reqwest::blocking::Client,
}

#[cfg(feature = "network")]
impl HttpPredictor {
    pub fn new(url: &str) -> Result<Self, PredictorError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| PredictorError::Request(e.to_string()))?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }
}

#[cfg(feature = "network")]
impl ScaffoldPredictor for HttpPredictor {
    fn predict(&self, input: &PredictorInput) -> Result<ScaffoldLevel, PredictorError> {
        let response = self
            .client
            .post(&self.url)
            .json(input)
            .send()
            .map_err(|e| PredictorError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(PredictorError::Request(format!(
                "status {}",
                response.status()
            )));
        }
        let body: PredictorResponse = response
            .json()
            .map_err(|e| PredictorError::BadResponse(e.to_string()))?;
        ScaffoldLevel::try_from(body.scaffold_level).map_err(PredictorError::BadResponse)
    }
}
