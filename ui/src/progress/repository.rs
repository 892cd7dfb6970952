use time::Duration;

use crate::core::storage::{KeyValueStore, StoreError};
use crate::core::timing;
use crate::protocol::Activity;

use super::snapshot::ActivityProgressSnapshot;

const PROGRESS_PREFIX: &str = "progress/";
const DEMOGRAPHICS_PREFIX: &str = "demographics/";

/// Identifies one in-flight activity of one participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgressKey {
    pub user_id: String,
    pub activity: Activity,
}

impl ProgressKey {
    pub fn new(user_id: impl Into<String>, activity: Activity) -> Self {
        Self {
            user_id: user_id.into(),
            activity,
        }
    }

    /// `progress/{user}/{phase}/{test}`.
    pub fn storage_key(&self) -> String {
        format!(
            "{}/{}/{}",
            user_prefix(&self.user_id),
            self.activity.phase_label(),
            self.activity.test_label()
        )
    }
}

fn user_prefix(user_id: &str) -> String {
    format!("{PROGRESS_PREFIX}{}", escape_segment(user_id))
}

/// Escapes `%` and `/` so a user id always occupies exactly one key segment.
pub(crate) fn escape_segment(raw: &str) -> String {
    raw.replace('%', "%25").replace('/', "%2F")
}

/// Result of a save. Failures are reported, never raised: losing progress only means
/// the activity restarts from its first stimulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The first write hit the quota; stale entries were purged and the retry landed.
    SavedAfterCleanup { removed: usize },
    Abandoned,
}

impl SaveOutcome {
    pub fn is_saved(self) -> bool {
        !matches!(self, SaveOutcome::Abandoned)
    }
}

/// Typed access to progress snapshots.
pub trait ProgressRepository {
    fn save(&self, key: &ProgressKey, snapshot: &ActivityProgressSnapshot) -> SaveOutcome;

    /// The snapshot, if one exists and is still valid. Invalid entries are deleted.
    fn load(&self, key: &ProgressKey) -> Option<ActivityProgressSnapshot>;

    fn clear(&self, key: &ProgressKey);

    /// Drops every snapshot of `user_id` (administrative reset, test-account reinit).
    fn clear_all(&self, user_id: &str);

    /// The stand-alone "demographics completed" flag older builds wrote locally.
    fn legacy_demographics_flag(&self, user_id: &str) -> bool;

    fn set_demographics_flag(&self, user_id: &str, completed: bool);
}

/// [`ProgressRepository`] over any [`KeyValueStore`].
#[derive(Debug)]
pub struct KvProgressRepository<S> {
    store: S,
    max_age: Duration,
}

impl<S: KeyValueStore> KvProgressRepository<S> {
    pub fn new(store: S, max_age: Duration) -> Self {
        Self { store, max_age }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn load_at(&self, key: &ProgressKey, now_ms: i64) -> Option<ActivityProgressSnapshot> {
        let storage_key = key.storage_key();
        let raw = match self.store.get(&storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                log::warn!("could not read progress {storage_key}: {err}");
                return None;
            }
        };

        match ActivityProgressSnapshot::parse(&raw, now_ms, self.max_age) {
            Ok(snapshot) => Some(snapshot),
            Err(rejection) => {
                log::warn!("discarding progress {storage_key}: {rejection}");
                self.remove_quietly(&storage_key);
                None
            }
        }
    }

    /// Removes every stale or unreadable snapshot, for any user, except `keep`.
    pub fn cleanup_stale(&self, now_ms: i64, keep: Option<&str>) -> usize {
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(err) => {
                log::warn!("could not list progress entries for cleanup: {err}");
                return 0;
            }
        };

        let mut removed = 0;
        for key in keys {
            if !key.starts_with(PROGRESS_PREFIX) || Some(key.as_str()) == keep {
                continue;
            }
            let valid = matches!(
                self.store.get(&key),
                Ok(Some(raw)) if ActivityProgressSnapshot::parse(&raw, now_ms, self.max_age).is_ok()
            );
            if !valid && self.store.remove(&key).is_ok() {
                removed += 1;
            }
        }
        removed
    }

    fn save_at(
        &self,
        key: &ProgressKey,
        snapshot: &ActivityProgressSnapshot,
        now_ms: i64,
    ) -> SaveOutcome {
        let storage_key = key.storage_key();
        let payload = match snapshot.to_json() {
            Ok(payload) => payload,
            Err(err) => {
                log::warn!("could not serialise progress {storage_key}: {err}");
                return SaveOutcome::Abandoned;
            }
        };

        match self.write_confirmed(&storage_key, &payload) {
            Ok(()) => SaveOutcome::Saved,
            Err(StoreError::QuotaExceeded) => {
                let removed = self.cleanup_stale(now_ms, Some(&storage_key));
                match self.write_confirmed(&storage_key, &payload) {
                    Ok(()) => SaveOutcome::SavedAfterCleanup { removed },
                    Err(err) => {
                        log::warn!("abandoning progress {storage_key} after cleanup: {err}");
                        SaveOutcome::Abandoned
                    }
                }
            }
            Err(err) => {
                log::warn!("abandoning progress {storage_key}: {err}");
                SaveOutcome::Abandoned
            }
        }
    }

    /// Write, then read back to confirm the store holds exactly `payload`.
    fn write_confirmed(&self, key: &str, payload: &str) -> Result<(), StoreError> {
        self.store.set(key, payload)?;
        match self.store.get(key)? {
            Some(stored) if stored == payload => Ok(()),
            _ => Err(StoreError::Unavailable(format!(
                "write to {key} did not persist"
            ))),
        }
    }

    fn remove_quietly(&self, key: &str) {
        if let Err(err) = self.store.remove(key) {
            log::warn!("could not remove {key}: {err}");
        }
    }
}

impl<S: KeyValueStore> ProgressRepository for KvProgressRepository<S> {
    fn save(&self, key: &ProgressKey, snapshot: &ActivityProgressSnapshot) -> SaveOutcome {
        self.save_at(key, snapshot, timing::now_millis())
    }

    fn load(&self, key: &ProgressKey) -> Option<ActivityProgressSnapshot> {
        self.load_at(key, timing::now_millis())
    }

    fn clear(&self, key: &ProgressKey) {
        self.remove_quietly(&key.storage_key());
    }

    fn clear_all(&self, user_id: &str) {
        let prefix = format!("{}/", user_prefix(user_id));
        match self.store.keys() {
            Ok(keys) => keys
                .iter()
                .filter(|key| key.starts_with(&prefix))
                .for_each(|key| self.remove_quietly(key)),
            Err(err) => log::warn!("could not list progress entries for {user_id}: {err}"),
        }
    }

    fn legacy_demographics_flag(&self, user_id: &str) -> bool {
        let key = format!("{DEMOGRAPHICS_PREFIX}{}", escape_segment(user_id));
        matches!(self.store.get(&key), Ok(Some(value)) if value.trim() == "true")
    }

    fn set_demographics_flag(&self, user_id: &str, completed: bool) {
        let key = format!("{DEMOGRAPHICS_PREFIX}{}", escape_segment(user_id));
        let result = if completed {
            self.store.set(&key, "true")
        } else {
            self.store.remove(&key)
        };
        if let Err(err) = result {
            log::warn!("could not update demographics flag for {user_id}: {err}");
        }
    }
}
