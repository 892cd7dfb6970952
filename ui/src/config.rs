//! Study configuration: calendar gates, snapshot retention, network retry and audio
//! location. Pool sizes are deliberately not configurable.

use std::path::Path;

use serde::{Deserialize, Serialize};
use time::Duration;

use crate::sync::RetryPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StudyConfig {
    pub schedule: ScheduleConfig,
    pub progress: ProgressConfig,
    pub retry: RetryPolicy,
    pub audio_base_url: String,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            schedule: ScheduleConfig::default(),
            progress: ProgressConfig::default(),
            retry: RetryPolicy::default(),
            audio_base_url: "/audio".to_string(),
        }
    }
}

impl StudyConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Reads `path` when it exists; a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_json_str(&raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Days that must elapse before the delayed post-tests open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScheduleConfig {
    pub posttest1_after_training_days: i64,
    pub posttest2_after_training_days: i64,
    /// Used instead when the account predates `trainingCompletedDate`.
    pub posttest1_after_pretest_days: i64,
    pub posttest2_after_pretest_days: i64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            posttest1_after_training_days: 7,
            posttest2_after_training_days: 30,
            posttest1_after_pretest_days: 12,
            posttest2_after_pretest_days: 35,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProgressConfig {
    pub max_snapshot_age_days: i64,
}

impl ProgressConfig {
    pub fn max_snapshot_age(&self) -> Duration {
        Duration::days(self.max_snapshot_age_days)
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            max_snapshot_age_days: 30,
        }
    }
}
