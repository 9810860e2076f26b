use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::model::{ModelParams, DEFAULT_HIDDEN_UNITS, DEFAULT_LEARNING_RATE};
use crate::session::SessionError;

/// Training steps applied per feedback submission.
pub const DEFAULT_FEEDBACK_STEPS: usize = 10;

/// File name offered when saving a recording.
pub const DEFAULT_DOWNLOAD_FILENAME: &str = "speech.wav";

/// Session settings. Every field has a default, so a config file only needs
/// the keys it changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub feedback_steps: usize,
    pub learning_rate: f32,
    pub hidden_units: usize,
    /// Weight initialization seed. `None` draws from OS entropy.
    pub seed: Option<u64>,
    pub poll_interval_ms: u64,
    pub download_filename: String,
    /// Selectable speaking styles. Only the selected position feeds the model.
    pub styles: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            feedback_steps: DEFAULT_FEEDBACK_STEPS,
            learning_rate: DEFAULT_LEARNING_RATE,
            hidden_units: DEFAULT_HIDDEN_UNITS,
            seed: None,
            poll_interval_ms: 100,
            download_filename: DEFAULT_DOWNLOAD_FILENAME.to_string(),
            styles: ["neutral", "cheerful", "calm", "excited", "serious"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl SessionConfig {
    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, SessionError> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| SessionError::Config(format!("Failed to parse JSON: {e}")))?;
        if config.styles.is_empty() {
            return Err(SessionError::Config("'styles' must not be empty".to_string()));
        }
        Ok(config)
    }

    pub fn model_params(&self) -> ModelParams {
        ModelParams {
            hidden_units: self.hidden_units,
            learning_rate: self.learning_rate,
            seed: self.seed,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
