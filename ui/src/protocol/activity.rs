use std::fmt;
use std::str::FromStr;

use api::{Phase, TestType, UnknownName};

use crate::stimuli::{
    PhaseKey, StimulusPool, COMPREHENSION_STORIES, EFFORT_POOL, INTELLIGIBILITY_POOL,
    TRAINING_NARRATIVES,
};

/// A phase that runs the three-test battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TestPhase {
    Pretest,
    Posttest1,
    Posttest2,
}

impl TestPhase {
    pub const ALL: [TestPhase; 3] = [TestPhase::Pretest, TestPhase::Posttest1, TestPhase::Posttest2];

    pub fn phase(self) -> Phase {
        match self {
            TestPhase::Pretest => Phase::Pretest,
            TestPhase::Posttest1 => Phase::Posttest1,
            TestPhase::Posttest2 => Phase::Posttest2,
        }
    }

    pub fn from_phase(phase: Phase) -> Option<TestPhase> {
        match phase {
            Phase::Pretest => Some(TestPhase::Pretest),
            Phase::Posttest1 => Some(TestPhase::Posttest1),
            Phase::Posttest2 => Some(TestPhase::Posttest2),
            Phase::Training | Phase::Completed => None,
        }
    }

    /// Position in the battery sequence (pretest = 0).
    pub fn ordinal(self) -> usize {
        match self {
            TestPhase::Pretest => 0,
            TestPhase::Posttest1 => 1,
            TestPhase::Posttest2 => 2,
        }
    }

    pub fn phase_key(self) -> PhaseKey {
        match self {
            TestPhase::Pretest => PhaseKey::Pretest,
            TestPhase::Posttest1 => PhaseKey::Posttest1,
            TestPhase::Posttest2 => PhaseKey::Posttest2,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.phase().as_str()
    }
}

/// Training day number, always within `1..=4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrainingDay(u8);

impl TrainingDay {
    pub const FIRST: TrainingDay = TrainingDay(1);
    pub const LAST: TrainingDay = TrainingDay(4);

    pub fn new(day: u8) -> Option<Self> {
        (Self::FIRST.0..=Self::LAST.0)
            .contains(&day)
            .then_some(Self(day))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn next(self) -> Option<Self> {
        Self::new(self.0 + 1)
    }

    pub fn previous(self) -> Option<Self> {
        self.0.checked_sub(1).and_then(Self::new)
    }

    pub fn all() -> impl Iterator<Item = TrainingDay> {
        (Self::FIRST.0..=Self::LAST.0).map(TrainingDay)
    }
}

impl fmt::Display for TrainingDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Anything a participant can complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Activity {
    Demographics,
    Test { phase: TestPhase, test: TestType },
    Training(TrainingDay),
}

impl Activity {
    /// Every activity in protocol order.
    pub fn all() -> Vec<Activity> {
        let mut all = vec![Activity::Demographics];
        all.extend(Self::battery(TestPhase::Pretest));
        all.extend(TrainingDay::all().map(Activity::Training));
        all.extend(Self::battery(TestPhase::Posttest1));
        all.extend(Self::battery(TestPhase::Posttest2));
        all
    }

    /// The three tests of `phase`, in the order they must be taken.
    pub fn battery(phase: TestPhase) -> impl Iterator<Item = Activity> {
        TestType::ORDERED
            .into_iter()
            .map(move |test| Activity::Test { phase, test })
    }

    /// Account phase this activity belongs to; demographics belongs to none.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Activity::Demographics => None,
            Activity::Test { phase, .. } => Some(phase.phase()),
            Activity::Training(_) => Some(Phase::Training),
        }
    }

    /// Phase segment used on the wire, in storage keys and in audio paths.
    pub fn phase_label(&self) -> &'static str {
        self.phase().map(Phase::as_str).unwrap_or("demographics")
    }

    pub fn test_type(&self) -> Option<TestType> {
        match self {
            Activity::Test { test, .. } => Some(*test),
            _ => None,
        }
    }

    /// Test-type segment used on the wire (`"effort"`, `"day2"`, `"form"`).
    pub fn test_label(&self) -> String {
        match self {
            Activity::Demographics => "form".to_string(),
            Activity::Test { test, .. } => test.as_str().to_string(),
            Activity::Training(day) => format!("day{day}"),
        }
    }

    /// Canonical key in the account's `completedTests` map.
    pub fn completion_key(&self) -> String {
        match self {
            Activity::Demographics => "demographics".to_string(),
            Activity::Test { phase, test } => format!("{}_{}", phase.as_str(), test.as_str()),
            Activity::Training(day) => format!("training_day{day}"),
        }
    }

    /// Pool the activity's stimulus numbers are drawn from.
    pub fn stimulus_pool(&self) -> Option<StimulusPool> {
        match self {
            Activity::Demographics => None,
            Activity::Test { test, .. } => Some(match test {
                TestType::Intelligibility => INTELLIGIBILITY_POOL,
                TestType::Effort => EFFORT_POOL,
                TestType::Comprehension => COMPREHENSION_STORIES,
            }),
            Activity::Training(_) => Some(TRAINING_NARRATIVES),
        }
    }

    /// Parses the pair sent to the completion API (`phase`, `testType`).
    pub fn from_wire(phase: &str, test_type: &str) -> Option<Activity> {
        if phase.eq_ignore_ascii_case("demographics") {
            return Some(Activity::Demographics);
        }
        let phase: Phase = phase.parse().ok()?;
        match TestPhase::from_phase(phase) {
            Some(phase) => TestType::parse_lenient(test_type).map(|test| Activity::Test { phase, test }),
            None if phase == Phase::Training => test_type
                .trim()
                .strip_prefix("day")
                .and_then(|day| day.parse().ok())
                .and_then(TrainingDay::new)
                .map(Activity::Training),
            None => None,
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.completion_key())
    }
}

impl FromStr for Activity {
    type Err = UnknownName;

    /// Accepts canonical and legacy completion keys.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        super::completion::parse_completion_key(s).ok_or_else(|| UnknownName(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_order_lists_every_activity_once() {
        let all = Activity::all();
        assert_eq!(all.len(), 1 + 3 + 4 + 3 + 3);
        assert_eq!(all[0], Activity::Demographics);
        assert_eq!(
            all[1],
            Activity::Test {
                phase: TestPhase::Pretest,
                test: TestType::Intelligibility
            }
        );
        assert_eq!(all[4], Activity::Training(TrainingDay::FIRST));
    }

    #[test]
    fn every_activity_parses_back_from_its_key() {
        for activity in Activity::all() {
            assert_eq!(activity.completion_key().parse::<Activity>(), Ok(activity));
        }
        assert!("consent".parse::<Activity>().is_err());
    }

    #[test]
    fn training_day_bounds() {
        assert!(TrainingDay::new(0).is_none());
        assert!(TrainingDay::new(5).is_none());
        assert_eq!(TrainingDay::LAST.next(), None);
        assert_eq!(TrainingDay::FIRST.previous(), None);
        assert_eq!(TrainingDay::new(3).unwrap().previous(), TrainingDay::new(2));
    }

    #[test]
    fn completion_keys_are_phase_prefixed() {
        let effort = Activity::Test {
            phase: TestPhase::Posttest2,
            test: TestType::Effort,
        };
        assert_eq!(effort.completion_key(), "posttest2_effort");
        assert_eq!(
            Activity::Training(TrainingDay::new(2).unwrap()).completion_key(),
            "training_day2"
        );
    }

    #[test]
    fn wire_pairs_parse_back() {
        for activity in Activity::all() {
            let parsed = Activity::from_wire(activity.phase_label(), &activity.test_label());
            assert_eq!(parsed, Some(activity));
        }
        assert_eq!(Activity::from_wire("training", "day7"), None);
        assert_eq!(Activity::from_wire("completed", "effort"), None);
    }
}
