//! Study vocabulary shared between the client and the completion API.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Top-level stage of the protocol as stored on the account (`currentPhase`).
///
/// Demographics is deliberately absent: it runs alongside the lattice rather than
/// being a step in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Pretest,
    Training,
    Posttest1,
    Posttest2,
    Completed,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Pretest,
        Phase::Training,
        Phase::Posttest1,
        Phase::Posttest2,
        Phase::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Pretest => "pretest",
            Phase::Training => "training",
            Phase::Posttest1 => "posttest1",
            Phase::Posttest2 => "posttest2",
            Phase::Completed => "completed",
        }
    }

    /// The phase that follows this one, `None` once the study is over.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Pretest => Some(Phase::Training),
            Phase::Training => Some(Phase::Posttest1),
            Phase::Posttest1 => Some(Phase::Posttest2),
            Phase::Posttest2 => Some(Phase::Completed),
            Phase::Completed => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = UnknownName;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|phase| phase.as_str().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| UnknownName(raw.to_string()))
    }
}

/// One of the three repeatable activities inside a test phase, in their fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    Intelligibility,
    Effort,
    Comprehension,
}

impl TestType {
    pub const ORDERED: [TestType; 3] = [
        TestType::Intelligibility,
        TestType::Effort,
        TestType::Comprehension,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TestType::Intelligibility => "intelligibility",
            TestType::Effort => "effort",
            TestType::Comprehension => "comprehension",
        }
    }

    /// The test that has to be finished before this one opens.
    pub fn previous(self) -> Option<TestType> {
        match self {
            TestType::Intelligibility => None,
            TestType::Effort => Some(TestType::Intelligibility),
            TestType::Comprehension => Some(TestType::Effort),
        }
    }

    /// Parses the canonical name and the spellings older clients wrote.
    pub fn parse_lenient(raw: &str) -> Option<TestType> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "intelligibility" => Some(TestType::Intelligibility),
            "effort" | "listeningeffort" | "listening_effort" | "listening-effort" => {
                Some(TestType::Effort)
            }
            "comprehension" => Some(TestType::Comprehension),
            _ => None,
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestType {
    type Err = UnknownName;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        TestType::parse_lenient(raw).ok_or_else(|| UnknownName(raw.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown name `{0}`")]
pub struct UnknownName(pub String);
