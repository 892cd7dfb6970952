//! One participant working through one activity: the stimulus sequence, resume from a
//! saved snapshot, the double-submit guard and the wire payload for each answer.

use api::{ResponseSubmission, TestType};
use uuid::Uuid;

use crate::progress::{ActivityProgressSnapshot, ProgressKey, ProgressRepository, SaveOutcome};
use crate::protocol::{Activity, ActivityBoard, LockReason};
use crate::stimuli::{
    assign_group, collects_rating, narrative_for_day, stories_for_phase, SeedScope,
};

/// Lowest value on the listening-effort scale.
pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 10;

/// Response recorded when the stimulus audio could not be played.
pub const NOT_AVAILABLE: &str = "NA";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActivityError {
    #[error("{0} has no stimuli to present")]
    NoStimuli(Activity),
    #[error("{activity} is locked: {reason:?}")]
    Locked {
        activity: Activity,
        reason: Option<LockReason>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("a response is already being submitted")]
    SubmitInFlight,
    #[error("the activity is already finished")]
    Finished,
    #[error("this activity requires a rating between {MIN_RATING} and {MAX_RATING}")]
    RatingRequired,
    #[error("rating {0} is outside {MIN_RATING}..={MAX_RATING}")]
    RatingOutOfRange(u8),
}

/// One answer to the current stimulus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub text: String,
    pub rating: Option<u8>,
}

impl Response {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rating: None,
        }
    }

    pub fn rated(text: impl Into<String>, rating: u8) -> Self {
        Self {
            text: text.into(),
            rating: Some(rating),
        }
    }

    /// The fallback answer for a stimulus whose audio is unavailable.
    pub fn not_available() -> Self {
        Self::rated(NOT_AVAILABLE, MIN_RATING)
    }

    pub fn is_not_available(&self) -> bool {
        self.text == NOT_AVAILABLE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStep {
    /// Index of the stimulus to present next.
    Next(usize),
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivitySession {
    user_id: String,
    activity: Activity,
    stimuli: Vec<u16>,
    position: usize,
    resumed: bool,
    in_flight: bool,
}

impl ActivitySession {
    /// Open `activity` for `user_id`, resuming from a stored snapshot when it is usable.
    pub fn start(
        user_id: impl Into<String>,
        activity: Activity,
        repo: &dyn ProgressRepository,
    ) -> Result<Self, ActivityError> {
        let user_id = user_id.into();
        let stimuli = stimulus_sequence(&user_id, &activity);
        if stimuli.is_empty() {
            return Err(ActivityError::NoStimuli(activity));
        }

        let key = ProgressKey::new(user_id.clone(), activity);
        let position = match repo.load(&key) {
            Some(snapshot) if snapshot.stimulus_index < stimuli.len() => {
                log::debug!(
                    "resuming {activity} for {user_id} at stimulus {}",
                    snapshot.stimulus_index
                );
                snapshot.stimulus_index
            }
            Some(snapshot) => {
                log::warn!(
                    "snapshot for {activity} points past the end ({}); restarting",
                    snapshot.stimulus_index
                );
                repo.clear(&key);
                0
            }
            None => 0,
        };

        Ok(Self {
            user_id,
            activity,
            stimuli,
            position,
            resumed: position > 0,
            in_flight: false,
        })
    }

    /// Like [`ActivitySession::start`], refusing activities the board does not offer.
    pub fn open(
        board: &ActivityBoard,
        user_id: impl Into<String>,
        activity: Activity,
        repo: &dyn ProgressRepository,
    ) -> Result<Self, ActivityError> {
        match board.card(&activity) {
            Some(card) if card.status.is_actionable() => Self::start(user_id, activity, repo),
            card => Err(ActivityError::Locked {
                activity,
                reason: card.and_then(|card| card.lock_reason),
            }),
        }
    }

    pub fn activity(&self) -> Activity {
        self.activity
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn stimuli(&self) -> &[u16] {
        &self.stimuli
    }

    /// Zero-based position of the current stimulus.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.stimuli.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stimuli.is_empty()
    }

    pub fn was_resumed(&self) -> bool {
        self.resumed
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.stimuli.len()
    }

    pub fn is_last(&self) -> bool {
        self.position + 1 == self.stimuli.len()
    }

    pub fn current_stimulus(&self) -> Option<u16> {
        self.stimuli.get(self.position).copied()
    }

    pub fn submit_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Claim the single submit slot. Fails while an earlier submit is outstanding.
    pub fn begin_submit(&mut self) -> Result<(), SessionError> {
        if self.is_finished() {
            return Err(SessionError::Finished);
        }
        if self.in_flight {
            return Err(SessionError::SubmitInFlight);
        }
        self.in_flight = true;
        Ok(())
    }

    /// Release the submit slot without advancing, e.g. after a failed request.
    pub fn finish_submit(&mut self) {
        self.in_flight = false;
    }

    pub fn validate(&self, response: &Response) -> Result<(), SessionError> {
        if self.is_finished() {
            return Err(SessionError::Finished);
        }
        match response.rating {
            Some(rating) if !(MIN_RATING..=MAX_RATING).contains(&rating) => {
                Err(SessionError::RatingOutOfRange(rating))
            }
            None if collects_rating(&self.activity) => Err(SessionError::RatingRequired),
            _ => Ok(()),
        }
    }

    /// Payload for answering the current stimulus.
    pub fn submission(&self, response: &Response) -> Result<ResponseSubmission, SessionError> {
        self.validate(response)?;
        let stimulus_id = match self.activity {
            Activity::Demographics => "form".to_string(),
            _ => self.stimuli[self.position].to_string(),
        };
        Ok(ResponseSubmission {
            request_id: Uuid::new_v4().to_string(),
            phase: self.activity.phase_label().to_string(),
            test_type: self.activity.test_label(),
            stimulus_id,
            response: response.text.clone(),
            rating: response.rating,
            is_test_completed: self.is_last(),
        })
    }

    /// Accept `response` for the current stimulus and move on.
    ///
    /// A snapshot is written after every stimulus but the last; finishing clears it.
    pub fn record(
        &mut self,
        response: &Response,
        repo: &dyn ProgressRepository,
        now_ms: i64,
    ) -> Result<SessionStep, SessionError> {
        self.validate(response)?;
        self.in_flight = false;
        self.position += 1;

        let key = self.progress_key();
        if self.is_finished() {
            repo.clear(&key);
            log::debug!("{} finished {}", self.user_id, self.activity);
            return Ok(SessionStep::Finished);
        }

        let snapshot = self.snapshot(response, now_ms);
        if let SaveOutcome::Abandoned = repo.save(&key, &snapshot) {
            log::warn!(
                "progress for {} not saved; a reload restarts at an earlier stimulus",
                self.activity
            );
        }
        Ok(SessionStep::Next(self.position))
    }

    /// Discard progress and restart at the first stimulus.
    pub fn reset(&mut self, repo: &dyn ProgressRepository) {
        repo.clear(&self.progress_key());
        self.position = 0;
        self.resumed = false;
        self.in_flight = false;
    }

    fn progress_key(&self) -> ProgressKey {
        ProgressKey::new(self.user_id.clone(), self.activity)
    }

    fn snapshot(&self, response: &Response, now_ms: i64) -> ActivityProgressSnapshot {
        let mut snapshot = ActivityProgressSnapshot::new(self.position, response.text.clone(), now_ms);
        snapshot.rating = response.rating;
        if uses_stories(&self.activity) {
            snapshot.story_index = Some(self.position);
        }
        snapshot
    }
}

fn uses_stories(activity: &Activity) -> bool {
    matches!(
        activity,
        Activity::Training(_)
            | Activity::Test {
                test: TestType::Comprehension,
                ..
            }
    )
}

/// Stimulus numbers (or story ids) the participant works through, in order.
pub fn stimulus_sequence(user_id: &str, activity: &Activity) -> Vec<u16> {
    match *activity {
        Activity::Demographics => vec![0],
        Activity::Training(day) => vec![narrative_for_day(user_id, day)],
        Activity::Test {
            phase,
            test: TestType::Comprehension,
        } => stories_for_phase(user_id, phase),
        Activity::Test { phase, .. } => match activity.stimulus_pool() {
            Some(pool) => assign_group(&pool, &phase.phase_key(), user_id)
                .presentation_order(SeedScope::UserPhase),
            None => Vec::new(),
        },
    }
}
