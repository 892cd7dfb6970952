use api::{AccountRecord, Phase};
use time::Date;

use crate::core::timing::{format_calendar_date, parse_calendar_date};

use super::activity::{Activity, TrainingDay};
use super::completion::CompletionRecord;

/// Phase bookkeeping stored on the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountPhaseState {
    pub current_phase: Phase,
    pub training_day: TrainingDay,
    /// Set once, by the first pretest completion.
    pub pretest_date: Option<Date>,
    /// Set once, by the fourth training-day completion.
    pub training_completed_date: Option<Date>,
}

impl Default for AccountPhaseState {
    fn default() -> Self {
        Self {
            current_phase: Phase::Pretest,
            training_day: TrainingDay::FIRST,
            pretest_date: None,
            training_completed_date: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemographicsStatus {
    Pending,
    Completed,
}

/// Where a participant stands overall, including the demographics prerequisite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DemographicsPending,
    Pretest,
    Training(TrainingDay),
    Posttest1,
    Posttest2,
    Completed,
}

/// Everything the state machine knows about one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub user_id: String,
    pub state: AccountPhaseState,
    pub completions: CompletionRecord,
}

impl Participant {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            state: AccountPhaseState::default(),
            completions: CompletionRecord::new(),
        }
    }

    /// Load from the server record, folding in the client-local demographics flag older
    /// builds kept. After this the completion record is the only source of truth.
    pub fn from_account(record: &AccountRecord, legacy_demographics_flag: bool) -> Self {
        let mut completions = CompletionRecord::from_raw(&record.completed_tests);
        if legacy_demographics_flag && completions.record(Activity::Demographics) {
            log::debug!(
                "migrated local demographics flag into completion record for {}",
                record.user_id
            );
        }

        let current_phase = parse_current_phase(&record.current_phase);
        let training_day = TrainingDay::new(record.training_day).unwrap_or_else(|| {
            log::warn!(
                "account {} has out-of-range training day {}; using day 1",
                record.user_id,
                record.training_day
            );
            TrainingDay::FIRST
        });

        Self {
            user_id: record.user_id.clone(),
            state: AccountPhaseState {
                current_phase,
                training_day,
                pretest_date: record.pretest_date.as_deref().and_then(parse_calendar_date),
                training_completed_date: record
                    .training_completed_date
                    .as_deref()
                    .and_then(parse_calendar_date),
            },
            completions,
        }
    }

    /// Account record reflecting the current state, with canonical completion keys.
    pub fn to_account(&self) -> AccountRecord {
        AccountRecord {
            user_id: self.user_id.clone(),
            current_phase: self.state.current_phase.as_str().to_string(),
            training_day: self.state.training_day.get(),
            pretest_date: self.state.pretest_date.map(format_calendar_date),
            training_completed_date: self.state.training_completed_date.map(format_calendar_date),
            completed_tests: self.completions.to_raw(),
        }
    }

    pub fn demographics(&self) -> DemographicsStatus {
        if self.completions.is_completed(&Activity::Demographics) {
            DemographicsStatus::Completed
        } else {
            DemographicsStatus::Pending
        }
    }

    pub fn stage(&self) -> Stage {
        if self.demographics() == DemographicsStatus::Pending {
            return Stage::DemographicsPending;
        }
        match self.state.current_phase {
            Phase::Pretest => Stage::Pretest,
            Phase::Training => Stage::Training(self.state.training_day),
            Phase::Posttest1 => Stage::Posttest1,
            Phase::Posttest2 => Stage::Posttest2,
            Phase::Completed => Stage::Completed,
        }
    }
}

/// Older accounts stored `"demographics"` (or nothing) before the pretest began.
fn parse_current_phase(raw: &str) -> Phase {
    match raw.trim() {
        "" => Phase::Pretest,
        s if s.eq_ignore_ascii_case("demographics") => Phase::Pretest,
        s => s.parse().unwrap_or_else(|_| {
            log::warn!("unknown current phase `{s}`; treating account as in pretest");
            Phase::Pretest
        }),
    }
}
