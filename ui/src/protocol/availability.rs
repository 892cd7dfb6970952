//! Read-only availability computation.
//!
//! Every rule here is a pure function of the participant, the calendar day and the
//! progress store. Missing dates lock the activity they gate; nothing defaults open.

use api::Phase;
use time::{Date, Duration};

use crate::config::ScheduleConfig;
use crate::progress::{ProgressKey, ProgressRepository};

use super::account::{DemographicsStatus, Participant};
use super::activity::{Activity, TestPhase, TrainingDay};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityStatus {
    Locked,
    Available,
    InProgress,
    Completed,
}

impl ActivityStatus {
    /// The participant can start or resume this activity now.
    pub fn is_actionable(self) -> bool {
        matches!(self, ActivityStatus::Available | ActivityStatus::InProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityStatus::Locked => "locked",
            ActivityStatus::Available => "available",
            ActivityStatus::InProgress => "in-progress",
            ActivityStatus::Completed => "completed",
        }
    }
}

/// Why a card is locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockReason {
    DemographicsPending,
    /// The account is in a different phase.
    NotCurrentPhase,
    /// The preceding test or training day is not complete.
    PreviousIncomplete,
    /// The account is scheduled for a different training day.
    NotScheduledDay,
    /// The phase before a post-test is not fully complete.
    PriorPhaseIncomplete,
    /// The calendar gate has not opened yet (see [`ActivityCard::unlocks_on`]).
    WaitingForDate,
    /// The date the gate is measured from was never recorded.
    MissingDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityCard {
    pub activity: Activity,
    pub status: ActivityStatus,
    pub lock_reason: Option<LockReason>,
    /// First day the calendar gate lets this activity open, when one applies and is known.
    pub unlocks_on: Option<Date>,
}

/// Status of every activity for one participant on one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityBoard {
    pub today: Date,
    pub cards: Vec<ActivityCard>,
}

impl ActivityBoard {
    pub fn card(&self, activity: &Activity) -> Option<&ActivityCard> {
        self.cards.iter().find(|card| &card.activity == activity)
    }

    pub fn status(&self, activity: &Activity) -> ActivityStatus {
        self.card(activity)
            .map(|card| card.status)
            .unwrap_or(ActivityStatus::Locked)
    }

    /// First card, in protocol order, the participant can act on.
    pub fn next_actionable(&self) -> Option<&ActivityCard> {
        self.cards.iter().find(|card| card.status.is_actionable())
    }

    pub fn can_proceed_today(&self) -> bool {
        self.next_actionable().is_some()
    }

    /// Earliest date a currently date-locked card opens.
    pub fn next_unlock(&self) -> Option<Date> {
        self.cards
            .iter()
            .filter(|card| card.lock_reason == Some(LockReason::WaitingForDate))
            .filter_map(|card| card.unlocks_on)
            .min()
    }

    pub fn cards_in(&self, phase: Option<Phase>) -> impl Iterator<Item = &ActivityCard> {
        self.cards
            .iter()
            .filter(move |card| card.activity.phase() == phase)
    }
}

/// Compute the board for `participant` on `today`.
pub fn evaluate(
    participant: &Participant,
    today: Date,
    progress: &dyn ProgressRepository,
    schedule: &ScheduleConfig,
) -> ActivityBoard {
    let cards = Activity::all()
        .into_iter()
        .map(|activity| card_for(participant, activity, today, progress, schedule))
        .collect();
    ActivityBoard { today, cards }
}

fn card_for(
    participant: &Participant,
    activity: Activity,
    today: Date,
    progress: &dyn ProgressRepository,
    schedule: &ScheduleConfig,
) -> ActivityCard {
    if participant.completions.is_completed(&activity) {
        return ActivityCard {
            activity,
            status: ActivityStatus::Completed,
            lock_reason: None,
            unlocks_on: None,
        };
    }

    let gate = gate_for(participant, &activity, today, schedule);
    match gate {
        Gate::Open => {
            let key = ProgressKey::new(participant.user_id.clone(), activity);
            let status = if progress.load(&key).is_some() {
                ActivityStatus::InProgress
            } else {
                ActivityStatus::Available
            };
            ActivityCard {
                activity,
                status,
                lock_reason: None,
                unlocks_on: None,
            }
        }
        Gate::Locked { reason, unlocks_on } => ActivityCard {
            activity,
            status: ActivityStatus::Locked,
            lock_reason: Some(reason),
            unlocks_on,
        },
    }
}

enum Gate {
    Open,
    Locked {
        reason: LockReason,
        unlocks_on: Option<Date>,
    },
}

impl Gate {
    fn locked(reason: LockReason) -> Self {
        Gate::Locked {
            reason,
            unlocks_on: None,
        }
    }
}

fn gate_for(
    participant: &Participant,
    activity: &Activity,
    today: Date,
    schedule: &ScheduleConfig,
) -> Gate {
    match activity {
        Activity::Demographics => Gate::Open,
        _ if participant.demographics() == DemographicsStatus::Pending => {
            Gate::locked(LockReason::DemographicsPending)
        }
        Activity::Test { phase, test } => {
            if !phase_reachable(participant, *phase) {
                return Gate::locked(LockReason::NotCurrentPhase);
            }
            if let Some(gate) = posttest_gate(participant, *phase, today, schedule) {
                return gate;
            }
            match test.previous() {
                Some(previous)
                    if !participant.completions.is_completed(&Activity::Test {
                        phase: *phase,
                        test: previous,
                    }) =>
                {
                    Gate::locked(LockReason::PreviousIncomplete)
                }
                _ => Gate::Open,
            }
        }
        Activity::Training(day) => training_gate(participant, *day, today),
    }
}

/// A test phase's cards are live while it is the current phase. The pretest stays
/// reachable during training so its finished cards keep rendering.
fn phase_reachable(participant: &Participant, phase: TestPhase) -> bool {
    let current = participant.state.current_phase;
    current == phase.phase() || (phase == TestPhase::Pretest && current == Phase::Training)
}

fn training_gate(participant: &Participant, day: TrainingDay, today: Date) -> Gate {
    let state = &participant.state;
    if state.current_phase != Phase::Training {
        return Gate::locked(LockReason::NotCurrentPhase);
    }
    if let Some(previous) = day.previous() {
        if !participant.completions.is_completed(&Activity::Training(previous)) {
            return Gate::locked(LockReason::PreviousIncomplete);
        }
    }
    if state.training_day != day {
        return Gate::locked(LockReason::NotScheduledDay);
    }
    let Some(pretest_date) = state.pretest_date else {
        return Gate::locked(LockReason::MissingDate);
    };
    date_gate(pretest_date, i64::from(day.get()), today)
}

/// Post-test prerequisites and calendar gate; `None` for the pretest.
fn posttest_gate(
    participant: &Participant,
    phase: TestPhase,
    today: Date,
    schedule: &ScheduleConfig,
) -> Option<Gate> {
    let completions = &participant.completions;
    let state = &participant.state;

    let (prior_done, after_training, after_pretest) = match phase {
        TestPhase::Pretest => return None,
        TestPhase::Posttest1 => (
            completions.battery_completed(TestPhase::Pretest) && completions.training_completed(),
            schedule.posttest1_after_training_days,
            schedule.posttest1_after_pretest_days,
        ),
        TestPhase::Posttest2 => (
            completions.battery_completed(TestPhase::Posttest1),
            schedule.posttest2_after_training_days,
            schedule.posttest2_after_pretest_days,
        ),
    };

    if !prior_done {
        return Some(Gate::locked(LockReason::PriorPhaseIncomplete));
    }

    let Some(pretest) = state.pretest_date else {
        return Some(Gate::locked(LockReason::MissingDate));
    };
    let gate = match state.training_completed_date {
        Some(trained) => date_gate(trained, after_training, today),
        None => date_gate(pretest, after_pretest, today),
    };
    match gate {
        Gate::Open => None,
        locked => Some(locked),
    }
}

/// Open once `today >= anchor + days`.
fn date_gate(anchor: Date, days: i64, today: Date) -> Gate {
    let opens = anchor.saturating_add(Duration::days(days));
    if today >= opens {
        Gate::Open
    } else {
        Gate::Locked {
            reason: LockReason::WaitingForDate,
            unlocks_on: Some(opens),
        }
    }
}

#[cfg(test)]
mod tests {
    use api::TestType;
    use time::macros::date;

    use super::*;
    use crate::core::storage::MemoryStore;
    use crate::core::timing;
    use crate::progress::{ActivityProgressSnapshot, KvProgressRepository};

    fn repo() -> KvProgressRepository<MemoryStore> {
        KvProgressRepository::new(MemoryStore::new(), Duration::days(30))
    }

    fn test(phase: TestPhase, test: TestType) -> Activity {
        Activity::Test { phase, test }
    }

    fn day(n: u8) -> Activity {
        Activity::Training(TrainingDay::new(n).unwrap())
    }

    fn participant() -> Participant {
        let mut p = Participant::new("p1");
        p.completions.record(Activity::Demographics);
        p
    }

    fn board(p: &Participant, today: Date) -> ActivityBoard {
        evaluate(p, today, &repo(), &ScheduleConfig::default())
    }

    #[test]
    fn demographics_gates_everything() {
        let p = Participant::new("p1");
        let board = board(&p, date!(2024 - 01 - 01));
        assert_eq!(
            board.status(&Activity::Demographics),
            ActivityStatus::Available
        );
        for card in board.cards.iter().skip(1) {
            assert_eq!(card.status, ActivityStatus::Locked);
            assert_eq!(card.lock_reason, Some(LockReason::DemographicsPending));
        }
    }

    #[test]
    fn pretest_tests_open_in_order() {
        let mut p = participant();
        p.completions
            .record(test(TestPhase::Pretest, TestType::Intelligibility));
        let board = board(&p, date!(2024 - 01 - 01));
        assert_eq!(
            board.status(&test(TestPhase::Pretest, TestType::Intelligibility)),
            ActivityStatus::Completed
        );
        assert_eq!(
            board.status(&test(TestPhase::Pretest, TestType::Effort)),
            ActivityStatus::Available
        );
        let comprehension = board
            .card(&test(TestPhase::Pretest, TestType::Comprehension))
            .unwrap();
        assert_eq!(comprehension.status, ActivityStatus::Locked);
        assert_eq!(
            comprehension.lock_reason,
            Some(LockReason::PreviousIncomplete)
        );
    }

    #[test]
    fn training_day_waits_for_calendar() {
        let mut p = participant();
        p.state.current_phase = Phase::Training;
        p.state.pretest_date = Some(date!(2024 - 01 - 01));

        let same_day = board(&p, date!(2024 - 01 - 01));
        let card = same_day.card(&day(1)).unwrap();
        assert_eq!(card.status, ActivityStatus::Locked);
        assert_eq!(card.lock_reason, Some(LockReason::WaitingForDate));
        assert_eq!(card.unlocks_on, Some(date!(2024 - 01 - 02)));
        assert_eq!(same_day.next_unlock(), Some(date!(2024 - 01 - 02)));

        let next_day = board(&p, date!(2024 - 01 - 02));
        assert_eq!(next_day.status(&day(1)), ActivityStatus::Available);
    }

    #[test]
    fn training_without_pretest_date_fails_closed() {
        let mut p = participant();
        for activity in Activity::battery(TestPhase::Pretest) {
            p.completions.record(activity);
        }
        p.state.current_phase = Phase::Training;
        let board = board(&p, date!(2030 - 01 - 01));
        let card = board.card(&day(1)).unwrap();
        assert_eq!(card.status, ActivityStatus::Locked);
        assert_eq!(card.lock_reason, Some(LockReason::MissingDate));
        assert!(!board.can_proceed_today());
    }

    #[test]
    fn only_the_scheduled_day_opens() {
        let mut p = participant();
        p.state.current_phase = Phase::Training;
        p.state.training_day = TrainingDay::new(2).unwrap();
        p.state.pretest_date = Some(date!(2024 - 01 - 01));
        p.completions.record(day(1));

        let board = board(&p, date!(2024 - 01 - 15));
        assert_eq!(board.status(&day(1)), ActivityStatus::Completed);
        assert_eq!(board.status(&day(2)), ActivityStatus::Available);
        assert_eq!(
            board.card(&day(3)).unwrap().lock_reason,
            Some(LockReason::PreviousIncomplete)
        );
    }

    fn ready_for_posttest1() -> Participant {
        let mut p = participant();
        for activity in Activity::battery(TestPhase::Pretest) {
            p.completions.record(activity);
        }
        for n in 1..=4 {
            p.completions.record(day(n));
        }
        p.state.current_phase = Phase::Posttest1;
        p.state.training_day = TrainingDay::LAST;
        p.state.pretest_date = Some(date!(2024 - 01 - 01));
        p
    }

    #[test]
    fn posttest1_waits_a_week_after_training() {
        let mut p = ready_for_posttest1();
        p.state.training_completed_date = Some(date!(2024 - 01 - 05));
        let first = test(TestPhase::Posttest1, TestType::Intelligibility);

        let early = board(&p, date!(2024 - 01 - 11));
        assert_eq!(early.card(&first).unwrap().unlocks_on, Some(date!(2024 - 01 - 12)));
        assert_eq!(board(&p, date!(2024 - 01 - 12)).status(&first), ActivityStatus::Available);
    }

    #[test]
    fn posttest1_falls_back_to_pretest_date() {
        let p = ready_for_posttest1();
        let first = test(TestPhase::Posttest1, TestType::Intelligibility);
        assert_eq!(
            board(&p, date!(2024 - 01 - 12)).card(&first).unwrap().unlocks_on,
            Some(date!(2024 - 01 - 13))
        );
        assert_eq!(board(&p, date!(2024 - 01 - 13)).status(&first), ActivityStatus::Available);
    }

    #[test]
    fn posttest1_without_any_date_stays_locked() {
        let mut p = ready_for_posttest1();
        p.state.pretest_date = None;
        let card = board(&p, date!(2030 - 01 - 01))
            .card(&test(TestPhase::Posttest1, TestType::Intelligibility))
            .cloned()
            .unwrap();
        assert_eq!(card.lock_reason, Some(LockReason::MissingDate));
    }

    #[test]
    fn training_date_alone_does_not_open_posttests() {
        let mut p = ready_for_posttest1();
        p.state.pretest_date = None;
        p.state.training_completed_date = Some(date!(2024 - 01 - 05));
        let first = test(TestPhase::Posttest1, TestType::Intelligibility);
        let board = board(&p, date!(2024 - 02 - 01));
        let card = board.card(&first).unwrap();
        assert_eq!(card.status, ActivityStatus::Locked);
        assert_eq!(card.lock_reason, Some(LockReason::MissingDate));

        p.state.current_phase = Phase::Posttest2;
        for activity in Activity::battery(TestPhase::Posttest1) {
            p.completions.record(activity);
        }
        let later = self::board(&p, date!(2024 - 06 - 01));
        assert_eq!(
            later.status(&test(TestPhase::Posttest2, TestType::Intelligibility)),
            ActivityStatus::Locked
        );
    }

    #[test]
    fn posttest2_needs_posttest1_battery_and_thirty_days() {
        let mut p = ready_for_posttest1();
        p.state.training_completed_date = Some(date!(2024 - 01 - 05));
        p.state.current_phase = Phase::Posttest2;
        let first = test(TestPhase::Posttest2, TestType::Intelligibility);

        let card = board(&p, date!(2024 - 03 - 01)).card(&first).cloned().unwrap();
        assert_eq!(card.lock_reason, Some(LockReason::PriorPhaseIncomplete));

        for activity in Activity::battery(TestPhase::Posttest1) {
            p.completions.record(activity);
        }
        assert_eq!(
            board(&p, date!(2024 - 02 - 03)).card(&first).unwrap().unlocks_on,
            Some(date!(2024 - 02 - 04))
        );
        assert_eq!(board(&p, date!(2024 - 02 - 04)).status(&first), ActivityStatus::Available);
    }

    #[test]
    fn snapshot_marks_card_in_progress() {
        let p = participant();
        let repo = repo();
        let first = test(TestPhase::Pretest, TestType::Intelligibility);
        repo.save(
            &ProgressKey::new("p1", first),
            &ActivityProgressSnapshot::new(5, "x", timing::now_millis()),
        );
        let board = evaluate(&p, date!(2024 - 01 - 01), &repo, &ScheduleConfig::default());
        assert_eq!(board.status(&first), ActivityStatus::InProgress);
        assert_eq!(board.next_actionable().unwrap().activity, first);
    }

    #[test]
    fn snapshot_never_unlocks_a_locked_card() {
        let p = participant();
        let repo = repo();
        let comprehension = test(TestPhase::Pretest, TestType::Comprehension);
        repo.save(
            &ProgressKey::new("p1", comprehension),
            &ActivityProgressSnapshot::new(1, "x", timing::now_millis()),
        );
        let board = evaluate(&p, date!(2024 - 01 - 01), &repo, &ScheduleConfig::default());
        assert_eq!(board.status(&comprehension), ActivityStatus::Locked);
    }
}
