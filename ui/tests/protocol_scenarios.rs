//! End-to-end walks through the study protocol using only the public API.

use std::collections::{BTreeMap, BTreeSet};

use api::{AccountRecord, CompletionApi, CompletionMark, Phase, TestType};
use futures::executor::block_on;
use time::macros::date;
use time::{Date, Duration};

use ui::config::ScheduleConfig;
use ui::core::storage::MemoryStore;
use ui::progress::KvProgressRepository;
use ui::protocol::{
    apply, evaluate, Activity, ActivityStatus, LockReason, Participant, Stage, TestPhase,
    TrainingDay,
};
use ui::stimuli::{all_groups, assign_group, PhaseKey, INTELLIGIBILITY_POOL};
use ui::sync::LocalCompletionApi;

fn repo() -> KvProgressRepository<MemoryStore> {
    KvProgressRepository::new(MemoryStore::new(), Duration::days(30))
}

fn test(phase: TestPhase, test: TestType) -> Activity {
    Activity::Test { phase, test }
}

fn day(n: u8) -> Activity {
    Activity::Training(TrainingDay::new(n).unwrap())
}

fn account(phase: &str, training_day: u8, completed: &[&str]) -> AccountRecord {
    AccountRecord {
        user_id: "p1".into(),
        current_phase: phase.into(),
        training_day,
        completed_tests: completed
            .iter()
            .map(|key| (key.to_string(), true))
            .collect::<BTreeMap<_, _>>(),
        ..AccountRecord::default()
    }
}

#[test]
fn p1_pretest_group_is_stable_and_disjoint_from_posttest1() {
    let first = assign_group(&INTELLIGIBILITY_POOL, &PhaseKey::Pretest, "p1").stimuli;
    let again = assign_group(&INTELLIGIBILITY_POOL, &PhaseKey::Pretest, "p1").stimuli;
    let post = assign_group(&INTELLIGIBILITY_POOL, &PhaseKey::Posttest1, "p1").stimuli;

    assert_eq!(first.len(), 20);
    assert_eq!(first, again);
    assert_eq!(post.len(), 20);
    let first: BTreeSet<_> = first.into_iter().collect();
    assert!(post.iter().all(|n| !first.contains(n)));
}

#[test]
fn intelligibility_groups_partition_the_pool() {
    for user in ["p1", "p2", "participant-0042", ""] {
        let groups = all_groups(&INTELLIGIBILITY_POOL, user);
        assert_eq!(groups.len(), 8);
        let mut seen: Vec<u16> = groups.into_iter().flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, (1..=160).collect::<Vec<_>>(), "user {user:?}");
    }
}

#[test]
fn effort_opens_after_intelligibility() {
    let participant = Participant::from_account(
        &account("pretest", 1, &["pretest_intelligibility"]),
        true,
    );
    let board = evaluate(&participant, date!(2024 - 03 - 01), &repo(), &ScheduleConfig::default());

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
    assert_eq!(comprehension.lock_reason, Some(LockReason::PreviousIncomplete));
}

#[test]
fn second_training_day_two_weeks_after_pretest() {
    let today = date!(2024 - 03 - 15);
    let mut record = account("training", 2, &["demographics", "training_day1"]);
    record.pretest_date = Some("2024-03-01".into());
    let participant = Participant::from_account(&record, false);
    let board = evaluate(&participant, today, &repo(), &ScheduleConfig::default());

    assert_eq!(board.status(&day(1)), ActivityStatus::Completed);
    assert_eq!(board.status(&day(2)), ActivityStatus::Available);
    assert_eq!(board.status(&day(3)), ActivityStatus::Locked);
}

#[test]
fn training_day_waits_for_the_calendar() {
    let mut record = account("training", 1, &["demographics"]);
    record.pretest_date = Some("2024-01-01".into());
    let participant = Participant::from_account(&record, false);

    let on_pretest_day =
        evaluate(&participant, date!(2024 - 01 - 01), &repo(), &ScheduleConfig::default());
    let card = on_pretest_day.card(&day(1)).unwrap();
    assert_eq!(card.lock_reason, Some(LockReason::WaitingForDate));
    assert_eq!(card.unlocks_on, Some(date!(2024 - 01 - 02)));

    let next_day = evaluate(&participant, date!(2024 - 01 - 02), &repo(), &ScheduleConfig::default());
    assert_eq!(next_day.status(&day(1)), ActivityStatus::Available);
}

#[test]
fn missing_pretest_date_keeps_training_locked() {
    let participant = Participant::from_account(&account("training", 1, &["demographics"]), false);
    let board = evaluate(&participant, date!(2030 - 01 - 01), &repo(), &ScheduleConfig::default());
    assert_eq!(board.card(&day(1)).unwrap().lock_reason, Some(LockReason::MissingDate));
}

/// Completes whatever the board offers, one activity per step, advancing the clock when
/// nothing is actionable. Checks that a completed card never becomes actionable again.
#[test]
fn full_protocol_walk_is_monotonic() {
    let schedule = ScheduleConfig::default();
    let progress = repo();
    let mut participant = Participant::new("p1");
    let mut today = date!(2024 - 01 - 01);
    let mut completed: BTreeSet<Activity> = BTreeSet::new();
    let mut completion_days: BTreeMap<Activity, Date> = BTreeMap::new();

    for _ in 0..200 {
        if participant.stage() == Stage::Completed {
            break;
        }
        let board = evaluate(&participant, today, &progress, &schedule);
        for activity in &completed {
            assert_eq!(board.status(activity), ActivityStatus::Completed, "{activity} regressed");
        }
        match board.next_actionable() {
            Some(card) => {
                let activity = card.activity;
                apply(&mut participant, activity, today);
                completed.insert(activity);
                completion_days.insert(activity, today);
            }
            None => {
                let next = board.next_unlock().expect("a locked protocol must name a date");
                assert!(next > today);
                today = next;
            }
        }
    }

    assert_eq!(participant.stage(), Stage::Completed);
    assert_eq!(completed.len(), Activity::all().len());

    let pretest_day = completion_days[&test(TestPhase::Pretest, TestType::Comprehension)];
    assert_eq!(completion_days[&day(1)], pretest_day + Duration::days(1));
    assert_eq!(completion_days[&day(4)], pretest_day + Duration::days(4));
    let post1 = completion_days[&test(TestPhase::Posttest1, TestType::Intelligibility)];
    assert_eq!(post1, completion_days[&day(4)] + Duration::days(7));
    let post2 = completion_days[&test(TestPhase::Posttest2, TestType::Intelligibility)];
    assert_eq!(post2, completion_days[&day(4)] + Duration::days(30));
    assert_eq!(participant.state.current_phase, Phase::Completed);
}

#[test]
fn marking_twice_leaves_completed_tests_unchanged() {
    let store = MemoryStore::new();
    let api = LocalCompletionApi::new(&store, "p1");
    let mark = CompletionMark {
        phase: "pretest".into(),
        test_type: "intelligibility".into(),
        completed: true,
    };

    block_on(api.mark_test_completed(&mark)).unwrap();
    let after_first = api.account().unwrap().completed_tests;
    block_on(api.mark_test_completed(&mark)).unwrap();
    assert_eq!(api.account().unwrap().completed_tests, after_first);
    assert_eq!(after_first.get("pretest_intelligibility"), Some(&true));
}

#[test]
fn legacy_keys_count_as_pretest() {
    let participant = Participant::from_account(
        &account(
            "training",
            1,
            &["demographics", "intelligibility", "listeningEffort", "comprehension"],
        ),
        false,
    );
    assert!(participant
        .completions
        .is_completed(&test(TestPhase::Pretest, TestType::Effort)));
    let raw = participant.to_account().completed_tests;
    assert!(raw.contains_key("pretest_effort"));
    assert!(!raw.contains_key("listeningEffort"));
}
