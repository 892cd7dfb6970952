//! Deterministic per-participant stimulus assignment.
//!
//! Each content family has a fixed pool of numbered recordings. A participant's pool is
//! cut into equal, contiguous groups; the *order* of those groups is shuffled with the
//! participant's seed and every phase reads a fixed slot of the shuffled order. Because
//! all phases share one shuffled order, no two phases ever see the same recording.

mod audio;
mod groups;
mod pool;
mod stories;

pub use audio::{
    collects_rating, AudioError, AudioResolver, StimulusPresentation, UrlTemplateResolver,
};
pub use groups::{all_groups, assign_group, GroupAssignment, SeedScope};
pub use pool::{
    ContentFamily, PhaseKey, StimulusPool, COMPREHENSION_STORIES, EFFORT_POOL,
    INTELLIGIBILITY_POOL, TRAINING_NARRATIVES,
};
pub use stories::{narrative_for_day, stories_for_phase, StoryId};
