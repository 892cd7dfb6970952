use std::fmt;
use std::str::FromStr;

use api::UnknownName;

/// Family of recordings a pool is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentFamily {
    Intelligibility,
    ListeningEffort,
    ComprehensionStories,
    TrainingNarratives,
}

/// Immutable, numbered stimulus pool (`1..=size`) split into `group_size` chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StimulusPool {
    pub family: ContentFamily,
    pub size: u16,
    pub group_size: u16,
}

/// 160 sentences, 8 groups of 20: pretest, four training days, two post-tests, one spare.
pub const INTELLIGIBILITY_POOL: StimulusPool = StimulusPool {
    family: ContentFamily::Intelligibility,
    size: 160,
    group_size: 20,
};

/// 90 sentences, 3 groups of 30: pretest and the two post-tests.
pub const EFFORT_POOL: StimulusPool = StimulusPool {
    family: ContentFamily::ListeningEffort,
    size: 90,
    group_size: 30,
};

/// 6 comprehension stories handed out in pairs.
pub const COMPREHENSION_STORIES: StimulusPool = StimulusPool {
    family: ContentFamily::ComprehensionStories,
    size: 6,
    group_size: 2,
};

/// 4 training narratives, one per training day.
pub const TRAINING_NARRATIVES: StimulusPool = StimulusPool {
    family: ContentFamily::TrainingNarratives,
    size: 4,
    group_size: 1,
};

impl StimulusPool {
    /// `ceil(size / group_size)`; the last group is short when the sizes do not divide.
    pub fn group_count(&self) -> usize {
        let group_size = usize::from(self.group_size.max(1));
        usize::from(self.size).div_ceil(group_size)
    }

    pub fn indices(&self) -> Vec<u16> {
        (1..=self.size).collect()
    }

    /// The contiguous, unshuffled groups in pool order.
    pub fn contiguous_groups(&self) -> Vec<Vec<u16>> {
        let group_size = usize::from(self.group_size.max(1));
        self.indices()
            .chunks(group_size)
            .map(<[u16]>::to_vec)
            .collect()
    }

    pub fn contains(&self, stimulus: u16) -> bool {
        (1..=self.size).contains(&stimulus)
    }
}

/// Logical slot a group is assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PhaseKey {
    Pretest,
    TrainingDay(u8),
    Posttest1,
    Posttest2,
    /// Anything else; resolves to the reserved last group instead of failing.
    Other(String),
}

impl PhaseKey {
    pub fn as_key(&self) -> String {
        match self {
            PhaseKey::Pretest => "pretest".to_string(),
            PhaseKey::TrainingDay(day) => format!("training_day{day}"),
            PhaseKey::Posttest1 => "posttest1".to_string(),
            PhaseKey::Posttest2 => "posttest2".to_string(),
            PhaseKey::Other(raw) => raw.clone(),
        }
    }
}

impl fmt::Display for PhaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_key())
    }
}

impl FromStr for PhaseKey {
    type Err = UnknownName;

    /// Never fails; unknown names become [`PhaseKey::Other`].
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        let key = match normalized.as_str() {
            "pretest" => PhaseKey::Pretest,
            "posttest1" => PhaseKey::Posttest1,
            "posttest2" => PhaseKey::Posttest2,
            other => ["training_day", "trainingday", "training", "day"]
                .iter()
                .find_map(|prefix| other.strip_prefix(prefix))
                .and_then(|digits| digits.parse::<u8>().ok())
                .filter(|day| (1..=4).contains(day))
                .map(PhaseKey::TrainingDay)
                .unwrap_or_else(|| PhaseKey::Other(raw.to_string())),
        };
        Ok(key)
    }
}
