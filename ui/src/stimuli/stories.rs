//! Story-level assignment for the comprehension test and the training days.

use crate::core::seed::{seeded_shuffle, Seed};
use crate::protocol::{TestPhase, TrainingDay};

use super::pool::{StimulusPool, COMPREHENSION_STORIES, TRAINING_NARRATIVES};

/// 1-based identifier of a recorded story.
pub type StoryId = u16;

const STORIES_PER_PHASE: usize = 2;

/// The two comprehension stories heard in `phase`.
///
/// The six stories are shuffled once per participant and sliced into consecutive
/// pairs, so pretest and both post-tests never repeat a story.
pub fn stories_for_phase(user_id: &str, phase: TestPhase) -> Vec<StoryId> {
    let shuffled = shuffled_ids(&COMPREHENSION_STORIES, user_id);
    let start = phase.ordinal() * STORIES_PER_PHASE;
    shuffled
        .get(start..start + STORIES_PER_PHASE)
        .map(<[StoryId]>::to_vec)
        .unwrap_or_default()
}

/// The narrative played on a training day. Every day gets a different one.
pub fn narrative_for_day(user_id: &str, day: TrainingDay) -> StoryId {
    let shuffled = shuffled_ids(&TRAINING_NARRATIVES, user_id);
    let index = usize::from(day.get() - 1) % shuffled.len();
    shuffled[index]
}

fn shuffled_ids(pool: &StimulusPool, user_id: &str) -> Vec<StoryId> {
    seeded_shuffle(&pool.indices(), Seed::for_user(user_id))
}
