use api::{Phase, TestType};
use time::Date;

use crate::core::timing::format_calendar_date;
use crate::protocol::{Activity, ActivityStatus, LockReason, Stage};
use crate::t;

pub fn activity_label(activity: &Activity) -> String {
    match activity {
        Activity::Demographics => t!("activity-demographics"),
        Activity::Test { test, .. } => match test {
            TestType::Intelligibility => t!("activity-intelligibility"),
            TestType::Effort => t!("activity-effort"),
            TestType::Comprehension => t!("activity-comprehension"),
        },
        Activity::Training(day) => t!("activity-training-day", day = day.get()),
    }
}

pub fn section_label(phase: Option<Phase>) -> String {
    match phase {
        None => t!("phase-demographics"),
        Some(Phase::Pretest) => t!("phase-pretest"),
        Some(Phase::Training) => t!("phase-training"),
        Some(Phase::Posttest1) => t!("phase-posttest1"),
        Some(Phase::Posttest2) | Some(Phase::Completed) => t!("phase-posttest2"),
    }
}

pub fn stage_label(stage: Stage) -> String {
    match stage {
        Stage::DemographicsPending => t!("stage-demographics"),
        Stage::Pretest => t!("stage-pretest"),
        Stage::Training(day) => t!("stage-training", day = day.get()),
        Stage::Posttest1 => t!("stage-posttest1"),
        Stage::Posttest2 => t!("stage-posttest2"),
        Stage::Completed => t!("stage-completed"),
    }
}

pub fn status_label(status: ActivityStatus) -> String {
    match status {
        ActivityStatus::Locked => t!("status-locked"),
        ActivityStatus::Available => t!("status-available"),
        ActivityStatus::InProgress => t!("status-in-progress"),
        ActivityStatus::Completed => t!("status-completed"),
    }
}

pub fn lock_label(reason: LockReason, unlocks_on: Option<Date>) -> String {
    match reason {
        LockReason::DemographicsPending => t!("lock-demographics-pending"),
        LockReason::NotCurrentPhase => t!("lock-not-current-phase"),
        LockReason::PreviousIncomplete => t!("lock-previous-incomplete"),
        LockReason::NotScheduledDay => t!("lock-not-scheduled-day"),
        LockReason::PriorPhaseIncomplete => t!("lock-prior-phase-incomplete"),
        LockReason::WaitingForDate => match unlocks_on {
            Some(date) => t!("lock-waiting-for-date", date = format_calendar_date(date)),
            None => t!("lock-not-scheduled-day"),
        },
        LockReason::MissingDate => t!("lock-missing-date"),
    }
}
