//! Account mutations driven by completion events.

use api::Phase;
use time::Date;

use super::account::{AccountPhaseState, Participant};
use super::activity::{Activity, TestPhase, TrainingDay};

/// What a completion event changed. All-`false`/`None` means the event was a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub newly_recorded: bool,
    pub advanced_to: Option<Phase>,
    pub training_day: Option<TrainingDay>,
    pub pretest_date_set: bool,
    pub training_completed_date_set: bool,
}

impl TransitionOutcome {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Record `activity` as completed on `today` and advance the account if that finished
/// the current phase.
///
/// Idempotent: replaying an event that was already recorded changes nothing. An event
/// for a phase other than the current one is recorded but never advances the account.
pub fn apply(participant: &mut Participant, activity: Activity, today: Date) -> TransitionOutcome {
    let mut outcome = TransitionOutcome {
        newly_recorded: participant.completions.record(activity),
        ..TransitionOutcome::default()
    };
    if !outcome.newly_recorded {
        return outcome;
    }

    let completions = &participant.completions;
    let state = &mut participant.state;

    match activity {
        Activity::Demographics => {}
        Activity::Test { phase, .. } => {
            if phase == TestPhase::Pretest && state.pretest_date.is_none() {
                state.pretest_date = Some(today);
                outcome.pretest_date_set = true;
            }
            if state.current_phase == phase.phase() && completions.battery_completed(phase) {
                outcome.advanced_to = advance(state);
                if state.current_phase == Phase::Training {
                    state.training_day = TrainingDay::FIRST;
                    outcome.training_day = Some(TrainingDay::FIRST);
                }
            }
        }
        Activity::Training(_) => {
            if state.current_phase == Phase::Training {
                match completions.first_open_training_day() {
                    Some(next) => {
                        if next != state.training_day {
                            state.training_day = next;
                            outcome.training_day = Some(next);
                        }
                    }
                    None => {
                        if state.training_completed_date.is_none() {
                            state.training_completed_date = Some(today);
                            outcome.training_completed_date_set = true;
                        }
                        outcome.advanced_to = advance(state);
                    }
                }
            }
        }
    }

    if let Some(phase) = outcome.advanced_to {
        log::debug!("{} advanced to {phase}", participant.user_id);
    }
    outcome
}

fn advance(state: &mut AccountPhaseState) -> Option<Phase> {
    let next = state.current_phase.next()?;
    state.current_phase = next;
    Some(next)
}

/// Administrative reset: wipe completions and dates and start over at the pretest.
/// Client-local progress must be cleared separately (`ProgressRepository::clear_all`).
pub fn reset(participant: &mut Participant) {
    participant.completions.clear();
    participant.state = AccountPhaseState::default();
    log::debug!("{} reset to a fresh pretest", participant.user_id);
}
