//! Resumable mid-activity progress.
//!
//! One snapshot per `(user, phase, test type)` in flight, written after every answered
//! stimulus and cleared when the activity completes. Anything unreadable or older than
//! the retention window is treated as if it were never written.

mod repository;
mod snapshot;

pub use repository::{KvProgressRepository, ProgressKey, ProgressRepository, SaveOutcome};
pub(crate) use repository::escape_segment;
pub use snapshot::{ActivityProgressSnapshot, SnapshotRejection, SNAPSHOT_SCHEMA_VERSION};
