//! Typed completion record and the one-time migration from the account's string map.

use std::collections::{BTreeMap, BTreeSet};

use api::TestType;

use super::activity::{Activity, TestPhase, TrainingDay};

/// Set of completed activities. Grows monotonically; only [`CompletionRecord::clear`]
/// (administrative reset) removes entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionRecord {
    completed: BTreeSet<Activity>,
    /// Keys that matched no known activity, carried through so a write-back keeps them.
    unrecognized: BTreeMap<String, bool>,
}

impl CompletionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the account's `completedTests` map.
    ///
    /// Legacy spellings (un-prefixed test names meaning pretest, `listeningEffort`,
    /// `trainingDay2`, `demographicsCompleted`) are folded into the canonical activity.
    /// Any variant set to `true` marks the activity complete; a `false` never
    /// cancels a `true` from another spelling.
    pub fn from_raw(raw: &BTreeMap<String, bool>) -> Self {
        let mut record = Self::new();
        for (key, done) in raw {
            match parse_completion_key(key) {
                Some(activity) => {
                    if *done {
                        record.completed.insert(activity);
                    }
                }
                None => {
                    log::debug!("keeping unrecognised completion key `{key}`");
                    record.unrecognized.insert(key.clone(), *done);
                }
            }
        }
        record
    }

    /// Canonical string map for writing back to the account.
    pub fn to_raw(&self) -> BTreeMap<String, bool> {
        let mut raw = self.unrecognized.clone();
        for activity in &self.completed {
            raw.insert(activity.completion_key(), true);
        }
        raw
    }

    pub fn is_completed(&self, activity: &Activity) -> bool {
        self.completed.contains(activity)
    }

    /// Marks `activity` complete; returns `false` when it already was.
    pub fn record(&mut self, activity: Activity) -> bool {
        self.completed.insert(activity)
    }

    /// All three tests of `phase` are done (AND across the battery).
    pub fn battery_completed(&self, phase: TestPhase) -> bool {
        Activity::battery(phase).all(|activity| self.is_completed(&activity))
    }

    pub fn training_completed(&self) -> bool {
        TrainingDay::all().all(|day| self.is_completed(&Activity::Training(day)))
    }

    /// First training day not yet completed.
    pub fn first_open_training_day(&self) -> Option<TrainingDay> {
        TrainingDay::all().find(|day| !self.is_completed(&Activity::Training(*day)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Activity> {
        self.completed.iter()
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    pub fn clear(&mut self) {
        self.completed.clear();
        self.unrecognized.clear();
    }
}

/// Maps a raw completion key, canonical or legacy, to its activity.
pub(crate) fn parse_completion_key(raw: &str) -> Option<Activity> {
    let key = raw.trim();
    let lower = key.to_ascii_lowercase();

    if matches!(
        lower.as_str(),
        "demographics" | "demographicscompleted" | "demographics_completed"
    ) {
        return Some(Activity::Demographics);
    }

    for prefix in ["training_day", "trainingday"] {
        if let Some(day) = lower.strip_prefix(prefix) {
            return day
                .parse::<u8>()
                .ok()
                .and_then(TrainingDay::new)
                .map(Activity::Training);
        }
    }

    for phase in TestPhase::ALL {
        if let Some(rest) = lower.strip_prefix(phase.as_str()) {
            let rest = rest.trim_start_matches(['_', '-']);
            return TestType::parse_lenient(rest).map(|test| Activity::Test { phase, test });
        }
    }

    // Un-prefixed test names predate the post-tests and always meant the pretest.
    TestType::parse_lenient(&lower).map(|test| Activity::Test {
        phase: TestPhase::Pretest,
        test,
    })
}
