use serde::{Deserialize, Serialize};
use time::Duration;

/// Current layout of [`ActivityProgressSnapshot`].
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Serialized state of a partly finished activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityProgressSnapshot {
    /// Index of the next stimulus to present (number already answered).
    pub stimulus_index: usize,
    /// Last response entered, free text or a number rendered as text.
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_index: Option<usize>,
    /// Unix epoch milliseconds of the write.
    pub timestamp: i64,
    pub schema_version: u32,
}

/// Why a stored snapshot was discarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotRejection {
    #[error("snapshot is not valid JSON or lacks required fields: {0}")]
    Malformed(String),
    #[error("snapshot schema {found} is newer than supported {supported}")]
    UnsupportedSchema { found: u32, supported: u32 },
    #[error("snapshot from {age_days} days ago exceeds retention")]
    Stale { age_days: i64 },
    #[error("snapshot timestamp lies in the future")]
    FromTheFuture,
}

impl ActivityProgressSnapshot {
    pub fn new(stimulus_index: usize, response: impl Into<String>, timestamp: i64) -> Self {
        Self {
            stimulus_index,
            response: response.into(),
            rating: None,
            story_index: None,
            timestamp,
            schema_version: SNAPSHOT_SCHEMA_VERSION,
        }
    }

    /// Deserialize and validate against `now_ms`.
    pub fn parse(raw: &str, now_ms: i64, max_age: Duration) -> Result<Self, SnapshotRejection> {
        let snapshot: Self = serde_json::from_str(raw)
            .map_err(|err| SnapshotRejection::Malformed(err.to_string()))?;
        snapshot.validate(now_ms, max_age)?;
        Ok(snapshot)
    }

    pub fn validate(&self, now_ms: i64, max_age: Duration) -> Result<(), SnapshotRejection> {
        if self.schema_version == 0 || self.schema_version > SNAPSHOT_SCHEMA_VERSION {
            return Err(SnapshotRejection::UnsupportedSchema {
                found: self.schema_version,
                supported: SNAPSHOT_SCHEMA_VERSION,
            });
        }

        let age_ms = now_ms.saturating_sub(self.timestamp);
        // A little clock skew between devices is tolerated.
        if age_ms < -Duration::minutes(5).whole_milliseconds() as i64 {
            return Err(SnapshotRejection::FromTheFuture);
        }
        if age_ms > max_age.whole_milliseconds() as i64 {
            return Err(SnapshotRejection::Stale {
                age_days: age_ms / Duration::DAY.whole_milliseconds() as i64,
            });
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
